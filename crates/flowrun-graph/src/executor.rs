use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use flowrun_core::config::RunConfig;
use flowrun_core::context::ExecutionData;
use flowrun_core::error::{ErrorKind, FlowError};
use flowrun_expr::evaluator::Evaluator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::constants::END_NODE_TYPE;
use crate::flow::Flow;
use crate::node::DebugResult;
use crate::registry::RunnerRegistry;
use crate::runner::{NodeRunner, Step};
use crate::vertex::{VertexError, VertexResult};

/// Record of one executed node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub node_id: String,
    pub node_type: String,
    pub elapsed_ms: u64,
    pub children: Vec<String>,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub steps: Vec<StepRecord>,
    /// Result of the last executed `end` node; empty when none ran.
    pub output: Map<String, Value>,
}

impl RunReport {
    pub fn executed(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.node_id.as_str()).collect()
    }
}

/// A run that stopped early.
///
/// Outputs of nodes that completed before the failure remain in the caller's
/// `ExecutionData`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RunError {
    pub node_id: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: FlowError,
    /// Steps that completed before the failure.
    pub completed: Vec<StepRecord>,
}

impl RunError {
    fn new(node_id: Option<&str>, source: FlowError, completed: Vec<StepRecord>) -> Self {
        let message = match node_id {
            Some(id) => format!("Node '{id}' failed: {source}"),
            None => source.to_string(),
        };
        Self {
            node_id: node_id.map(str::to_string),
            kind: source.kind(),
            message,
            source,
            completed,
        }
    }
}

/// Drives a [`Flow`] to completion against a caller-owned [`ExecutionData`].
///
/// Nodes run one at a time in FIFO activation order. A node activated again
/// while it is still waiting in the frontier is not queued twice, so joins fire
/// once on first activation.
#[derive(Debug, Clone)]
pub struct FlowExecutor {
    registry: Arc<RunnerRegistry>,
    evaluator: Evaluator,
    config: RunConfig,
}

impl FlowExecutor {
    pub fn new(registry: Arc<RunnerRegistry>) -> Self {
        let config = RunConfig::default();
        Self {
            registry,
            evaluator: Evaluator::new().with_missing(config.missing_field),
            config,
        }
    }

    /// Replace the run configuration; the evaluator adopts its missing-field policy.
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.evaluator = self.evaluator.with_missing(config.missing_field);
        self.config = config;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator.with_missing(self.config.missing_field);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn registry(&self) -> &RunnerRegistry {
        &self.registry
    }

    pub async fn run(
        &self,
        flow: &mut Flow,
        ctx: &mut ExecutionData,
    ) -> Result<RunReport, RunError> {
        self.run_with_cancellation(flow, ctx, CancellationToken::new())
            .await
    }

    /// Execute `flow`, stopping between nodes (and inside external calls)
    /// once `cancel` fires.
    pub async fn run_with_cancellation(
        &self,
        flow: &mut Flow,
        ctx: &mut ExecutionData,
        cancel: CancellationToken,
    ) -> Result<RunReport, RunError> {
        let run_id = self.config.run_id;
        info!(%run_id, flow = flow.id(), nodes = flow.len(), "flow run started");

        // Every node must have a runner before anything touches the context.
        let mut plan: HashMap<String, Arc<dyn NodeRunner>> = HashMap::with_capacity(flow.len());
        for node in flow.nodes() {
            let runner = self
                .registry
                .resolve(node)
                .map_err(|e| RunError::new(Some(node.id.as_str()), e, Vec::new()))?;
            plan.insert(node.id.clone(), runner);
        }

        let mut frontier: VecDeque<String> = VecDeque::new();
        let mut queued: HashSet<String> = HashSet::new();
        let mut activated_by: HashMap<String, Vec<String>> = HashMap::new();
        for id in flow.start_node_ids() {
            if queued.insert(id.clone()) {
                frontier.push_back(id.clone());
            }
        }

        let mut steps: Vec<StepRecord> = Vec::new();
        let mut output = Map::new();

        while let Some(node_id) = frontier.pop_front() {
            queued.remove(&node_id);

            if cancel.is_cancelled() {
                info!(%run_id, "flow run cancelled");
                return Err(RunError::new(None, FlowError::Cancelled, steps));
            }
            if steps.len() >= self.config.max_steps {
                return Err(RunError::new(
                    Some(node_id.as_str()),
                    FlowError::StepLimit {
                        limit: self.config.max_steps,
                    },
                    steps,
                ));
            }

            let runner = plan.get(&node_id).cloned().ok_or_else(|| {
                RunError::new(
                    Some(node_id.as_str()),
                    FlowError::InvalidFlow(format!("Node '{node_id}' not found during execution")),
                    Vec::new(),
                )
            })?;
            let upstream = activated_by.remove(&node_id).unwrap_or_default();

            let started = Instant::now();
            let (node_type, outcome) = {
                let Some(node) = flow.node(&node_id) else {
                    continue;
                };
                let issues = runner.validate(node);
                let outcome = if issues.is_empty() {
                    let step = Step {
                        node,
                        edges: flow.edges_from(&node_id),
                        upstream,
                        config: &self.config,
                        evaluator: &self.evaluator,
                        cancel: &cancel,
                    };
                    debug!(node = %node_id, node_type = %node.node_type, "executing node");
                    let mut vertex = VertexResult::new(&node_id);
                    match runner.execute(&step, &mut vertex, ctx).await {
                        Ok(()) if vertex.success => Ok(vertex),
                        Ok(()) => {
                            let failure = vertex.error.clone().unwrap_or_else(|| VertexError {
                                code: "node_failed".into(),
                                message: "node reported failure".into(),
                            });
                            Err(FlowError::NodeFailed {
                                code: failure.code,
                                message: failure.message,
                            })
                        }
                        Err(e) => Err(e),
                    }
                } else {
                    Err(FlowError::Validation(issues))
                };
                (node.node_type.clone(), outcome)
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let vertex = match outcome {
                Ok(vertex) => vertex,
                Err(e) => {
                    error!(node = %node_id, kind = %e.kind(), error = %e, "node failed");
                    if let Some(node) = flow.node_mut(&node_id) {
                        node.debug_result = Some(DebugResult {
                            success: false,
                            message: Some(e.to_string()),
                        });
                    }
                    return Err(RunError::new(Some(node_id.as_str()), e, steps));
                }
            };

            if self.config.check_outputs {
                if let Some(schema) = flow.node(&node_id).and_then(|n| n.output.as_ref()) {
                    for issue in schema.check(&node_id, &vertex.result) {
                        warn!(node = %node_id, %issue, "node output does not match its declared shape");
                    }
                }
            }

            ctx.save_node_context(&node_id, vertex.result.clone());
            if node_type == END_NODE_TYPE {
                output = vertex.result.clone();
            }
            if let Some(node) = flow.node_mut(&node_id) {
                node.debug_result = Some(DebugResult {
                    success: true,
                    message: None,
                });
            }

            for child in &vertex.children_ids {
                if flow.node(child).is_none() {
                    let err = FlowError::InvalidFlow(format!(
                        "Node '{node_id}' activated unknown node '{child}'"
                    ));
                    return Err(RunError::new(Some(node_id.as_str()), err, steps));
                }
                activated_by
                    .entry(child.clone())
                    .or_default()
                    .push(node_id.clone());
                if queued.insert(child.clone()) {
                    frontier.push_back(child.clone());
                }
            }

            debug!(node = %node_id, elapsed_ms, children = ?vertex.children_ids, "node completed");
            steps.push(StepRecord {
                node_id,
                node_type,
                elapsed_ms,
                children: vertex.children_ids,
            });
        }

        info!(%run_id, steps = steps.len(), "flow run finished");
        Ok(RunReport {
            run_id,
            steps,
            output,
        })
    }
}
