use std::sync::LazyLock;

use async_trait::async_trait;
use flowrun_core::context::{ExecutionData, Scope};
use flowrun_core::error::{FlowError, Result, ValidationIssue};
use flowrun_graph::node::Node;
use flowrun_graph::runner::{NodeRunner, Step, config_as};
use flowrun_graph::vertex::VertexResult;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::support::require_params;

static VARIABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("variable name pattern is valid")
});

pub fn is_valid_variable_name(name: &str) -> bool {
    VARIABLE_NAME.is_match(name)
}

/// The mutation a [`VariableRunner`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableOp {
    Set,
    Push,
    Pop,
    Shift,
}

impl VariableOp {
    pub fn node_type(&self) -> &'static str {
        match self {
            VariableOp::Set => "variable_set",
            VariableOp::Push => "array_push",
            VariableOp::Pop => "array_pop",
            VariableOp::Shift => "array_shift",
        }
    }

    fn takes_value(&self) -> bool {
        matches!(self, VariableOp::Set | VariableOp::Push)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableConfig {
    pub scope: Scope,
    pub variable: String,
}

/// Read-modify-write of one named variable in a scope.
///
/// Result keys: `value` holds the variable after the mutation; pop and shift
/// add `item` (the removed element, `null` when the array was empty) and the
/// array ops add `length`. A missing variable counts as an empty array.
pub struct VariableRunner {
    op: VariableOp,
}

impl VariableRunner {
    pub fn new(op: VariableOp) -> Self {
        Self { op }
    }

    fn array_of(&self, step: &Step<'_>, name: &str, current: Option<Value>) -> Result<Vec<Value>> {
        match current {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(FlowError::invalid(
                step.node_id(),
                "variable",
                format!("'{name}' is not an array"),
            )),
        }
    }
}

#[async_trait]
impl NodeRunner for VariableRunner {
    fn node_type(&self) -> &str {
        self.op.node_type()
    }

    fn validate(&self, node: &Node) -> Vec<ValidationIssue> {
        let mut issues = if self.op.takes_value() {
            require_params(node, &["value"])
        } else {
            Vec::new()
        };
        match config_as::<VariableConfig>(node) {
            Ok(config) if !is_valid_variable_name(&config.variable) => {
                issues.push(ValidationIssue::field(
                    &node.id,
                    "variable",
                    format!("invalid variable name '{}'", config.variable),
                ));
            }
            Ok(_) => {}
            Err(e) => issues.push(ValidationIssue::field(&node.id, "config", e.to_string())),
        }
        issues
    }

    async fn execute(
        &self,
        step: &Step<'_>,
        vertex: &mut VertexResult,
        ctx: &mut ExecutionData,
    ) -> Result<()> {
        let VariableConfig { scope, variable } = step.config_as()?;
        if !is_valid_variable_name(&variable) {
            return Err(FlowError::invalid(
                step.node_id(),
                "variable",
                format!("invalid variable name '{variable}'"),
            ));
        }

        let current = ctx.get_scoped(scope, &variable).cloned();
        let updated = match self.op {
            VariableOp::Set => step.param("value", ctx)?,
            VariableOp::Push => {
                let value = step.param("value", ctx)?;
                let mut items = self.array_of(step, &variable, current)?;
                items.push(value);
                vertex.set("length", Value::from(items.len()));
                Value::Array(items)
            }
            VariableOp::Pop | VariableOp::Shift => {
                let mut items = self.array_of(step, &variable, current)?;
                let item = match self.op {
                    VariableOp::Pop => items.pop(),
                    _ if items.is_empty() => None,
                    _ => Some(items.remove(0)),
                };
                vertex.set("item", item.unwrap_or(Value::Null));
                vertex.set("length", Value::from(items.len()));
                Value::Array(items)
            }
        };
        debug!(node = %step.node_id(), op = self.op.node_type(), %scope, variable = %variable, "variable updated");

        ctx.set_scoped(scope, variable, updated.clone());
        vertex.set("value", updated);
        vertex.activate(step.all_successors());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::testing::Fixture;
    use flowrun_core::widget::Widget;
    use serde_json::json;

    fn node(op: VariableOp, variable: &str) -> Node {
        Node::new("v", op.node_type())
            .with_config("scope", json!("topic"))
            .with_config("variable", json!(variable))
    }

    async fn run(op: VariableOp, node: Node, ctx: &mut ExecutionData) -> Result<VertexResult> {
        let fx = Fixture::new(node);
        let mut vertex = VertexResult::new("v");
        VariableRunner::new(op).execute(&fx.step(), &mut vertex, ctx).await?;
        Ok(vertex)
    }

    #[test]
    fn name_grammar() {
        assert!(is_valid_variable_name("queue"));
        assert!(is_valid_variable_name("_tmp_2"));
        assert!(is_valid_variable_name(&"a".repeat(64)));
        assert!(!is_valid_variable_name(&"a".repeat(65)));
        assert!(!is_valid_variable_name("2fast"));
        assert!(!is_valid_variable_name("has-dash"));
        assert!(!is_valid_variable_name(""));
    }

    #[tokio::test]
    async fn set_then_push() {
        let mut ctx = ExecutionData::default();
        let set = node(VariableOp::Set, "items").with_param("value", Widget::value(json!(["a"])));
        run(VariableOp::Set, set, &mut ctx).await.unwrap();

        let push = node(VariableOp::Push, "items").with_param("value", Widget::text("b"));
        let vertex = run(VariableOp::Push, push, &mut ctx).await.unwrap();
        assert_eq!(vertex.result["length"], json!(2));
        assert_eq!(ctx.get_scoped(Scope::Topic, "items"), Some(&json!(["a", "b"])));
    }

    #[tokio::test]
    async fn pop_and_shift_take_opposite_ends() {
        let mut ctx = ExecutionData::default();
        ctx.set_scoped(Scope::Topic, "q", json!([1, 2, 3]));

        let popped = run(VariableOp::Pop, node(VariableOp::Pop, "q"), &mut ctx).await.unwrap();
        assert_eq!(popped.result["item"], json!(3));
        let shifted = run(VariableOp::Shift, node(VariableOp::Shift, "q"), &mut ctx).await.unwrap();
        assert_eq!(shifted.result["item"], json!(1));
        assert_eq!(shifted.result["value"], json!([2]));
        assert_eq!(ctx.get_scoped(Scope::Topic, "q"), Some(&json!([2])));
    }

    #[tokio::test]
    async fn shift_on_missing_variable_yields_null() {
        let mut ctx = ExecutionData::default();
        let vertex = run(VariableOp::Shift, node(VariableOp::Shift, "q"), &mut ctx).await.unwrap();
        assert_eq!(vertex.result["item"], Value::Null);
        assert_eq!(vertex.result["length"], json!(0));
    }

    #[tokio::test]
    async fn non_arrays_are_rejected() {
        let mut ctx = ExecutionData::default();
        ctx.set_scoped(Scope::Topic, "name", json!("crab"));
        let err = run(VariableOp::Pop, node(VariableOp::Pop, "name"), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
        assert_eq!(ctx.get_scoped(Scope::Topic, "name"), Some(&json!("crab")));
    }

    #[tokio::test]
    async fn invalid_names_never_mutate() {
        let mut ctx = ExecutionData::default();
        let bad = node(VariableOp::Set, "bad name").with_param("value", Widget::text("x"));
        assert_eq!(VariableRunner::new(VariableOp::Set).validate(&bad).len(), 1);
        assert!(run(VariableOp::Set, bad, &mut ctx).await.is_err());
        assert!(ctx.scope_vars(Scope::Topic).is_none());
    }

    #[test]
    fn push_requires_value() {
        let runner = VariableRunner::new(VariableOp::Push);
        assert_eq!(runner.validate(&node(VariableOp::Push, "q")).len(), 1);
        assert!(VariableRunner::new(VariableOp::Pop).validate(&node(VariableOp::Pop, "q")).is_empty());
    }
}
