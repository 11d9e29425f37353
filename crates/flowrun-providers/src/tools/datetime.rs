use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use flowrun_core::error::{ExternalCallError, Result};
use flowrun_core::tool::{Tool, ToolDefinition};
use serde_json::{Value, json};

const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Returns the current UTC time, optionally in a caller-chosen format.
pub struct DateTimeTool;

fn render(now: DateTime<Utc>, format: &str) -> Result<Value> {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|i| matches!(i, Item::Error)) {
        return Err(ExternalCallError::rejected("datetime", format!("invalid format '{format}'")).into());
    }
    Ok(json!({
        "utc": now.to_rfc3339(),
        "unix": now.timestamp(),
        "formatted": now.format_with_items(items.into_iter()).to_string(),
    }))
}

#[async_trait]
impl Tool for DateTimeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "datetime".into(),
            description: "Returns the current date and time in UTC.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "format": {
                        "type": "string",
                        "description": "strftime pattern for the `formatted` field"
                    }
                },
                "required": []
            }),
        }
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let format = input
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_FORMAT);
        render(Utc::now(), format)
    }
}
