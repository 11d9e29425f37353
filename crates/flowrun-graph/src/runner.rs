use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use flowrun_core::config::{MissingField, RunConfig};
use flowrun_core::context::ExecutionData;
use flowrun_core::error::{ExternalCallError, FlowError, Result, ValidationIssue};
use flowrun_expr::evaluator::Evaluator;
use flowrun_expr::value::to_text;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::constants::DEFAULT_VERSION;
use crate::node::{Edge, Node};
use crate::vertex::VertexResult;

/// Executes nodes of one `(type, version)`.
///
/// Runners are stateless with respect to a run: everything they need comes
/// through the [`Step`] and the execution context.
#[async_trait]
pub trait NodeRunner: Send + Sync {
    fn node_type(&self) -> &str;

    fn version(&self) -> &str {
        DEFAULT_VERSION
    }

    /// Structural checks run right before execution. Any issue aborts the run.
    fn validate(&self, _node: &Node) -> Vec<ValidationIssue> {
        Vec::new()
    }

    async fn execute(
        &self,
        step: &Step<'_>,
        vertex: &mut VertexResult,
        ctx: &mut ExecutionData,
    ) -> Result<()>;
}

/// Everything a runner sees about the node it is executing.
pub struct Step<'a> {
    pub node: &'a Node,
    /// Outgoing edges of the node, in declaration order.
    pub edges: Vec<&'a Edge>,
    /// Nodes whose results activated this one.
    pub upstream: Vec<String>,
    pub config: &'a RunConfig,
    pub evaluator: &'a Evaluator,
    pub cancel: &'a CancellationToken,
}

impl Step<'_> {
    pub fn node_id(&self) -> &str {
        &self.node.id
    }

    pub fn has_param(&self, key: &str) -> bool {
        self.node.params.get(key).is_some_and(|w| !w.is_empty())
    }

    /// Evaluate a required parameter with the run's missing-field policy.
    pub fn param(&self, key: &str, ctx: &ExecutionData) -> Result<Value> {
        let widget = self
            .node
            .params
            .get(key)
            .filter(|w| !w.is_empty())
            .ok_or_else(|| FlowError::invalid(&self.node.id, key, "required parameter is missing"))?;
        Ok(self.evaluator.evaluate(widget, ctx)?)
    }

    /// Evaluate an optional parameter; absent, empty, unresolved and `null`
    /// all yield `None`.
    pub fn optional_param(&self, key: &str, ctx: &ExecutionData) -> Result<Option<Value>> {
        let Some(widget) = self.node.params.get(key).filter(|w| !w.is_empty()) else {
            return Ok(None);
        };
        match self.evaluator.evaluate_with(widget, ctx, MissingField::Null)? {
            Value::Null => Ok(None),
            value => Ok(Some(value)),
        }
    }

    /// Required parameter rendered as text.
    pub fn param_text(&self, key: &str, ctx: &ExecutionData) -> Result<String> {
        Ok(to_text(&self.param(key, ctx)?))
    }

    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.node.config.get(key)
    }

    /// Deserialize the node's `config` map into a runner-specific type.
    pub fn config_as<T: DeserializeOwned>(&self) -> Result<T> {
        config_as(self.node)
    }

    /// Targets wired to `handle`, distinct, in edge order.
    pub fn successors(&self, handle: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for edge in self.edges.iter().filter(|e| e.source_handle == handle) {
            if !out.contains(&edge.target) {
                out.push(edge.target.clone());
            }
        }
        out
    }

    /// Targets on every handle, distinct, in edge order.
    pub fn all_successors(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for edge in &self.edges {
            if !out.contains(&edge.target) {
                out.push(edge.target.clone());
            }
        }
        out
    }

    /// Await an external call, bounded by `timeout` and the run's cancellation.
    pub async fn external<T, F>(&self, service: &str, timeout: Duration, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FlowError::Cancelled),
            outcome = tokio::time::timeout(timeout, call) => match outcome {
                Ok(result) => result,
                Err(_) => Err(ExternalCallError::Timeout {
                    service: service.to_string(),
                    after_ms: timeout.as_millis() as u64,
                }
                .into()),
            },
        }
    }
}

/// Deserialize a node's `config` map; failures become validation errors.
pub fn config_as<T: DeserializeOwned>(node: &Node) -> Result<T> {
    serde_json::from_value(Value::Object(node.config.clone()))
        .map_err(|e| FlowError::invalid(&node.id, "config", e.to_string()))
}
