pub mod constants;
pub mod executor;
pub mod flow;
pub mod loader;
pub mod node;
pub mod registry;
pub mod runner;
pub mod schema;
pub mod vertex;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::constants::{DEFAULT_HANDLE, DEFAULT_VERSION, END_NODE_TYPE, START_NODE_TYPE};
    pub use crate::executor::{FlowExecutor, RunError, RunReport, StepRecord};
    pub use crate::flow::Flow;
    pub use crate::loader::{FlowDocument, load_flow_file, load_flow_json, load_flow_yaml};
    pub use crate::node::{DebugResult, Edge, Node};
    pub use crate::registry::RunnerRegistry;
    pub use crate::runner::{NodeRunner, Step};
    pub use crate::schema::{FieldType, Schema, SchemaField};
    pub use crate::vertex::{VertexError, VertexResult};
}
