pub mod http;
pub mod loader;
pub mod openai;
pub mod tools;
pub mod vector;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::http::ReqwestHttpClient;
    pub use crate::loader::FsContentLoader;
    pub use crate::openai::OpenAiGateway;
    pub use crate::tools::{CalculatorTool, DateTimeTool, builtin_tools};
    pub use crate::vector::{InMemoryVectorStore, StoredDocument};
}
