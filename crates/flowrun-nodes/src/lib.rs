pub mod control;
pub mod http;
pub mod llm;
pub mod services;
pub mod state;
pub mod text;
pub mod tool;
pub mod vector;

mod support;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::control::{EndRunner, IfElseRunner, StartRunner};
    pub use crate::http::HttpRunner;
    pub use crate::llm::LlmRunner;
    pub use crate::services::{Services, builtin_registry};
    pub use crate::state::{CacheGetRunner, CacheSetRunner, VariableOp, VariableRunner};
    pub use crate::text::{SplitterOptions, TextLoaderRunner, TextSplitterRunner, split_text};
    pub use crate::tool::ToolRunner;
    pub use crate::vector::{VectorDeleteRunner, VectorSearchRunner};
}
