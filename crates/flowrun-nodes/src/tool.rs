use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flowrun_core::context::ExecutionData;
use flowrun_core::error::{FlowError, Result, ValidationIssue};
use flowrun_core::tool::Tool;
use flowrun_graph::node::Node;
use flowrun_graph::runner::{NodeRunner, Step, config_as};
use flowrun_graph::vertex::VertexResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::services::Services;

pub const TOOL_NODE_TYPE: &str = "tool";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolNodeConfig {
    pub tool: String,
    /// Fire the tool without waiting for it.
    #[serde(default, rename = "async")]
    pub is_async: bool,
}

/// Invokes one catalog tool with the node's params as arguments.
pub struct ToolRunner {
    services: Arc<Services>,
}

impl ToolRunner {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl NodeRunner for ToolRunner {
    fn node_type(&self) -> &str {
        TOOL_NODE_TYPE
    }

    fn validate(&self, node: &Node) -> Vec<ValidationIssue> {
        match config_as::<ToolNodeConfig>(node) {
            Ok(config) if !self.services.tools.contains(&config.tool) => {
                vec![ValidationIssue::field(
                    &node.id,
                    "tool",
                    format!("unknown tool '{}'", config.tool),
                )]
            }
            Ok(_) => Vec::new(),
            Err(e) => vec![ValidationIssue::field(&node.id, "config", e.to_string())],
        }
    }

    async fn execute(
        &self,
        step: &Step<'_>,
        vertex: &mut VertexResult,
        ctx: &mut ExecutionData,
    ) -> Result<()> {
        let config: ToolNodeConfig = step.config_as()?;
        let Some(tool) = self.services.tools.get(&config.tool) else {
            return Err(FlowError::invalid(
                step.node_id(),
                "tool",
                format!("unknown tool '{}'", config.tool),
            ));
        };

        let mut args = Map::new();
        for (key, widget) in &step.node.params {
            args.insert(key.clone(), step.evaluator.evaluate(widget, ctx)?);
        }

        vertex.set("tool", Value::String(config.tool.clone()));
        if config.is_async {
            spawn_detached(tool, config.tool, Value::Object(args), step.config.tool_timeout());
            vertex.set("dispatched", Value::Bool(true));
        } else {
            let output = step
                .external(&config.tool, step.config.tool_timeout(), tool.call(Value::Object(args)))
                .await?;
            vertex.set("output", output);
        }
        vertex.activate(step.all_successors());
        Ok(())
    }
}

/// Run a tool on its own task; the outcome is only logged.
pub(crate) fn spawn_detached(tool: Arc<dyn Tool>, name: String, args: Value, timeout: Duration) {
    tokio::spawn(async move {
        match tokio::time::timeout(timeout, tool.call(args)).await {
            Ok(Ok(_)) => debug!(tool = %name, "async tool finished"),
            Ok(Err(e)) => warn!(tool = %name, error = %e, "async tool failed"),
            Err(_) => warn!(tool = %name, after_ms = timeout.as_millis() as u64, "async tool timed out"),
        }
    });
}
