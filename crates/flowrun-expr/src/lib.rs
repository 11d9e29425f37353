pub mod evaluator;
pub mod functions;
pub mod value;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::evaluator::Evaluator;
    pub use crate::functions::{Function, FunctionCatalog};
    pub use crate::value::{to_text, truthy};
}
