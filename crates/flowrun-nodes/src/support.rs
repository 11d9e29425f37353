use std::str::FromStr;

use flowrun_core::context::{ExecutionData, Scope};
use flowrun_core::error::{FlowError, Result, ValidationIssue};
use flowrun_expr::value::to_text;
use flowrun_graph::node::Node;
use flowrun_graph::runner::Step;
use serde_json::{Map, Value};

/// A param that is present and holds at least one item.
pub(crate) fn has_param(node: &Node, key: &str) -> bool {
    node.params.get(key).is_some_and(|w| !w.is_empty())
}

/// Issue for every key in `keys` that has no (or an empty) widget.
pub(crate) fn require_params(node: &Node, keys: &[&str]) -> Vec<ValidationIssue> {
    keys.iter()
        .filter(|key| !has_param(node, key))
        .map(|key| ValidationIssue::field(&node.id, *key, "required parameter is missing"))
        .collect()
}

/// Check a scope param when it is a literal; expressions are checked at run time.
pub(crate) fn check_scope_literal(node: &Node, key: &str) -> Option<ValidationIssue> {
    let literal = node.params.get(key)?.literal()?;
    Scope::from_str(&to_text(&literal))
        .err()
        .map(|e| ValidationIssue::field(&node.id, key, e))
}

pub(crate) fn scope_param(step: &Step<'_>, key: &str, ctx: &ExecutionData) -> Result<Scope> {
    let raw = step.param_text(key, ctx)?;
    Scope::from_str(&raw).map_err(|e| FlowError::invalid(step.node_id(), key, e))
}

/// Optional param that must be an object when present.
pub(crate) fn object_param(
    step: &Step<'_>,
    key: &str,
    ctx: &ExecutionData,
) -> Result<Map<String, Value>> {
    match step.optional_param(key, ctx)? {
        None => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Map::new()),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(FlowError::invalid(step.node_id(), key, "expected an object")),
        },
        Some(_) => Err(FlowError::invalid(step.node_id(), key, "expected an object")),
    }
}
