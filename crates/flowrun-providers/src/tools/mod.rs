//! Built-in tools offered to tool and LLM nodes.

pub mod calculator;
pub mod datetime;

use std::sync::Arc;

use flowrun_core::tool::ToolCatalog;

pub use calculator::CalculatorTool;
pub use datetime::DateTimeTool;

/// Catalog holding every built-in tool.
pub fn builtin_tools() -> ToolCatalog {
    ToolCatalog::new()
        .with(Arc::new(CalculatorTool))
        .with(Arc::new(DateTimeTool))
}
