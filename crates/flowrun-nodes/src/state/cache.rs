use async_trait::async_trait;
use flowrun_core::context::ExecutionData;
use flowrun_core::error::{Result, ValidationIssue};
use flowrun_graph::node::Node;
use flowrun_graph::runner::{NodeRunner, Step};
use flowrun_graph::vertex::VertexResult;
use serde_json::Value;
use tracing::debug;

use crate::support::{check_scope_literal, require_params, scope_param};

pub const CACHE_GET_NODE_TYPE: &str = "cache_get";
pub const CACHE_SET_NODE_TYPE: &str = "cache_set";

fn validate_cache_node(node: &Node, keys: &[&str]) -> Vec<ValidationIssue> {
    let mut issues = require_params(node, keys);
    issues.extend(check_scope_literal(node, "cache_scope"));
    issues
}

/// Reads `cache_key` from one scope. A miss yields `{value: null, hit: false}`.
pub struct CacheGetRunner;

#[async_trait]
impl NodeRunner for CacheGetRunner {
    fn node_type(&self) -> &str {
        CACHE_GET_NODE_TYPE
    }

    fn validate(&self, node: &Node) -> Vec<ValidationIssue> {
        validate_cache_node(node, &["cache_scope", "cache_key"])
    }

    async fn execute(
        &self,
        step: &Step<'_>,
        vertex: &mut VertexResult,
        ctx: &mut ExecutionData,
    ) -> Result<()> {
        let scope = scope_param(step, "cache_scope", ctx)?;
        let key = step.param_text("cache_key", ctx)?;
        let cached = ctx.get_scoped(scope, &key).cloned();
        debug!(node = %step.node_id(), %scope, key = %key, hit = cached.is_some(), "cache read");

        vertex.set("hit", Value::Bool(cached.is_some()));
        vertex.set("value", cached.unwrap_or(Value::Null));
        vertex.activate(step.all_successors());
        Ok(())
    }
}

/// Writes `value` under `cache_key` in one scope, replacing any previous entry.
pub struct CacheSetRunner;

#[async_trait]
impl NodeRunner for CacheSetRunner {
    fn node_type(&self) -> &str {
        CACHE_SET_NODE_TYPE
    }

    fn validate(&self, node: &Node) -> Vec<ValidationIssue> {
        validate_cache_node(node, &["cache_scope", "cache_key", "value"])
    }

    async fn execute(
        &self,
        step: &Step<'_>,
        vertex: &mut VertexResult,
        ctx: &mut ExecutionData,
    ) -> Result<()> {
        let scope = scope_param(step, "cache_scope", ctx)?;
        let key = step.param_text("cache_key", ctx)?;
        let value = step.param("value", ctx)?;
        debug!(node = %step.node_id(), %scope, key = %key, "cache write");

        ctx.set_scoped(scope, key.clone(), value.clone());
        vertex.set("cache_key", Value::String(key));
        vertex.set("value", value);
        vertex.activate(step.all_successors());
        Ok(())
    }
}
