use std::path::Path;

use flowrun_core::error::{FlowError, Result};
use serde::{Deserialize, Serialize};

use crate::flow::Flow;
use crate::node::{Edge, Node};

/// Document format version understood by the loader.
pub const FLOW_DOCUMENT_VERSION: &str = "1.0";

fn default_document_version() -> String {
    FLOW_DOCUMENT_VERSION.to_string()
}

/// Serialized form of a [`Flow`], as stored in JSON or YAML files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDocument {
    #[serde(default = "default_document_version")]
    pub version: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Explicit entry nodes; defaults to every node of type `start`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub start_node_ids: Vec<String>,
}

impl FlowDocument {
    /// Validate the document and build a [`Flow`].
    pub fn into_flow(self) -> Result<Flow> {
        if self.version != FLOW_DOCUMENT_VERSION {
            return Err(FlowError::InvalidFlow(format!(
                "Unsupported flow document version '{}' (expected {FLOW_DOCUMENT_VERSION})",
                self.version
            )));
        }
        let flow = Flow::with_start_nodes(self.id, self.nodes, self.edges, self.start_node_ids)?;
        Ok(match self.name {
            Some(name) => flow.with_name(name),
            None => flow,
        })
    }
}

impl From<&Flow> for FlowDocument {
    fn from(flow: &Flow) -> Self {
        Self {
            version: default_document_version(),
            id: flow.id().to_string(),
            name: flow.name().map(str::to_string),
            nodes: flow.nodes().cloned().collect(),
            edges: flow.edges().to_vec(),
            start_node_ids: flow.start_node_ids().to_vec(),
        }
    }
}

/// Build a flow from a JSON document.
pub fn load_flow_json(json_str: &str) -> Result<Flow> {
    let doc: FlowDocument = serde_json::from_str(json_str)
        .map_err(|e| FlowError::InvalidFlow(format!("Cannot parse flow JSON: {e}")))?;
    doc.into_flow()
}

/// Build a flow from a YAML document.
pub fn load_flow_yaml(yaml_str: &str) -> Result<Flow> {
    let doc: FlowDocument = serde_yaml::from_str(yaml_str)
        .map_err(|e| FlowError::InvalidFlow(format!("Cannot parse flow YAML: {e}")))?;
    doc.into_flow()
}

/// Load a flow file; `.yaml`/`.yml` are read as YAML, anything else as JSON.
pub fn load_flow_file(path: impl AsRef<Path>) -> Result<Flow> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| FlowError::InvalidFlow(format!("Cannot read {}: {e}", path.display())))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => load_flow_yaml(&text),
        _ => load_flow_json(&text),
    }
}
