use std::collections::HashMap;

use flowrun_core::widget::Widget;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{DEFAULT_HANDLE, DEFAULT_VERSION};
use crate::schema::Schema;

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_handle() -> String {
    DEFAULT_HANDLE.to_string()
}

/// Outcome of the most recent execution of a node, for debugging surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A typed, configurable unit of work in a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Expression-bearing parameters.
    #[serde(default)]
    pub params: HashMap<String, Widget>,
    /// Structural settings read by the runner (branches, tools, sizes).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_output: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_result: Option<DebugResult>,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            version: default_version(),
            title: None,
            params: HashMap::new(),
            config: Map::new(),
            output: None,
            system_output: None,
            debug_result: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, widget: Widget) -> Self {
        self.params.insert(key.into(), widget);
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn with_output(mut self, schema: Schema) -> Self {
        self.output = Some(schema);
        self
    }

    /// Display name used in logs.
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// Directed connection from a source handle to a target node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    #[serde(default = "default_handle")]
    pub source_handle: String,
    pub target: String,
}

impl Edge {
    /// Edge on the default handle.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            source_handle: default_handle(),
            target: target.into(),
        }
    }

    pub fn with_handle(
        source: impl Into<String>,
        handle: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_handle: handle.into(),
            target: target.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_defaults_from_json() {
        let node: Node = serde_json::from_value(json!({
            "id": "n1",
            "type": "http",
            "params": {"url": {"type": "const", "const_value": [{"type": "text", "value": "https://x"}]}}
        }))
        .unwrap();
        assert_eq!(node.version, "1");
        assert!(node.config.is_empty());
        assert_eq!(node.params["url"].literal(), Some(json!("https://x")));
        assert!(node.debug_result.is_none());
    }

    #[test]
    fn edge_default_handle() {
        let edge: Edge = serde_json::from_value(json!({"source": "a", "target": "b"})).unwrap();
        assert_eq!(edge, Edge::new("a", "b"));
        assert_eq!(edge.source_handle, "source");
    }

    #[test]
    fn builder_methods() {
        let node = Node::new("n", "llm")
            .with_title("Ask")
            .with_version("2")
            .with_param("user_prompt", Widget::text("hi"))
            .with_config("model", json!("gpt"));
        assert_eq!(node.label(), "Ask");
        assert_eq!(node.version, "2");
        assert_eq!(node.config["model"], json!("gpt"));
        assert!(node.params.contains_key("user_prompt"));
    }
}
