use std::collections::HashSet;

use async_trait::async_trait;
use flowrun_core::context::ExecutionData;
use flowrun_core::error::{FlowError, Result, ValidationIssue};
use flowrun_core::widget::Widget;
use flowrun_graph::node::Node;
use flowrun_graph::runner::{NodeRunner, Step, config_as};
use flowrun_graph::vertex::VertexResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const IF_ELSE_NODE_TYPE: &str = "if_else";

/// One outgoing branch. A branch without a condition is the `else` branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Widget>,
}

impl Branch {
    fn is_else(&self) -> bool {
        self.condition.as_ref().is_none_or(Widget::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfElseConfig {
    pub branches: Vec<Branch>,
}

/// Selects exactly one branch: the first whose condition is truthy, else the
/// unconditioned branch. Later conditions are never evaluated once one matches.
pub struct IfElseRunner;

#[async_trait]
impl NodeRunner for IfElseRunner {
    fn node_type(&self) -> &str {
        IF_ELSE_NODE_TYPE
    }

    fn validate(&self, node: &Node) -> Vec<ValidationIssue> {
        let config: IfElseConfig = match config_as(node) {
            Ok(config) => config,
            Err(FlowError::Validation(issues)) => return issues,
            Err(e) => return vec![ValidationIssue::field(&node.id, "config", e.to_string())],
        };

        let mut issues = Vec::new();
        if config.branches.is_empty() {
            issues.push(ValidationIssue::field(&node.id, "branches", "at least one branch is required"));
        }
        let mut seen = HashSet::new();
        for (i, branch) in config.branches.iter().enumerate() {
            if !seen.insert(branch.handle.as_str()) {
                issues.push(ValidationIssue::field(
                    &node.id,
                    "branches",
                    format!("duplicate branch handle '{}'", branch.handle),
                ));
            }
            if branch.is_else() && i + 1 != config.branches.len() {
                issues.push(ValidationIssue::field(
                    &node.id,
                    "branches",
                    format!("else branch '{}' must be the last branch", branch.handle),
                ));
            }
        }
        issues
    }

    async fn execute(
        &self,
        step: &Step<'_>,
        vertex: &mut VertexResult,
        ctx: &mut ExecutionData,
    ) -> Result<()> {
        let config: IfElseConfig = step.config_as()?;
        let mut selected: Option<&Branch> = None;
        for branch in &config.branches {
            let taken = match &branch.condition {
                Some(condition) if !condition.is_empty() => {
                    step.evaluator.evaluate_bool(condition, ctx)?
                }
                _ => true,
            };
            if taken {
                selected = Some(branch);
                break;
            }
        }

        match selected {
            Some(branch) => {
                vertex.set("branch", Value::String(branch.handle.clone()));
                vertex.activate(step.successors(&branch.handle));
            }
            None => vertex.set("branch", Value::Null),
        }
        Ok(())
    }
}
