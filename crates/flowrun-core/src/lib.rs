pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod http;
pub mod loader;
pub mod record;
pub mod tool;
pub mod vector;
pub mod widget;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{MissingField, RunConfig};
    pub use crate::context::{ExecutionData, RunMetadata, Scope, Trigger, TriggerKind};
    pub use crate::error::{
        ErrorKind, ExpressionError, ExternalCallError, FlowError, Result, ValidationIssue,
    };
    pub use crate::gateway::{Completion, CompletionRequest, LlmGateway, ModelConfig, Usage};
    pub use crate::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
    pub use crate::loader::ContentLoader;
    pub use crate::record::{ChatRecord, Role, ToolCall};
    pub use crate::tool::{Tool, ToolCatalog, ToolDefinition};
    pub use crate::vector::{VectorDelete, VectorHit, VectorQuery, VectorStore};
    pub use crate::widget::{ExprItem, Widget, WidgetKind};
}
