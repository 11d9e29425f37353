use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use flowrun_core::context::ExecutionData;
use flowrun_core::error::{FlowError, Result, ValidationIssue};
use flowrun_core::gateway::{CompletionRequest, ModelConfig, Usage};
use flowrun_core::record::{ChatRecord, ToolCall, window};
use flowrun_core::tool::Tool;
use flowrun_expr::value::to_text;
use flowrun_graph::node::Node;
use flowrun_graph::runner::{NodeRunner, Step, config_as};
use flowrun_graph::vertex::VertexResult;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::services::Services;
use crate::support::require_params;
use crate::tool::spawn_detached;

pub const LLM_NODE_TYPE: &str = "llm";

/// A tool the model may call from this node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionTool {
    pub name: String,
    /// Fire the call without waiting for its result.
    #[serde(default, rename = "async")]
    pub is_async: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub model_config: ModelConfig,
    #[serde(default)]
    pub option_tools: Vec<OptionTool>,
}

/// Outcome of one batch of tool calls requested by the model.
#[derive(Default)]
struct ToolRound {
    replies: Vec<ChatRecord>,
    results: Vec<Value>,
    errors: Vec<Value>,
    dispatched: Vec<Value>,
    awaited: usize,
}

/// Calls the LLM gateway, running declared tools between rounds.
///
/// Synchronous tool calls of one round run concurrently and their results are
/// fed back to the model for another round, up to `max_tool_rounds`. A failing
/// synchronous tool is recorded in `tool_errors` rather than failing the node.
pub struct LlmRunner {
    services: Arc<Services>,
}

impl LlmRunner {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    async fn run_tools(
        &self,
        step: &Step<'_>,
        declared: &HashMap<&str, bool>,
        calls: &[ToolCall],
    ) -> Result<ToolRound> {
        let mut round = ToolRound::default();
        let mut awaited: Vec<(&ToolCall, Arc<dyn Tool>)> = Vec::new();

        for call in calls {
            let Some(&is_async) = declared.get(call.name.as_str()) else {
                warn!(node = %step.node_id(), tool = %call.name, "model requested an undeclared tool; ignoring");
                round.replies.push(ChatRecord::tool(
                    format!("tool '{}' is not available", call.name),
                    &call.id,
                ));
                continue;
            };
            let Some(tool) = self.services.tools.get(&call.name) else {
                round.errors.push(json!({
                    "id": call.id,
                    "name": call.name,
                    "error": "tool is not registered",
                }));
                round.replies.push(ChatRecord::tool("error: tool is not registered", &call.id));
                continue;
            };
            if is_async {
                debug!(node = %step.node_id(), tool = %call.name, "dispatching async tool");
                spawn_detached(
                    tool,
                    call.name.clone(),
                    call.arguments.clone(),
                    step.config.tool_timeout(),
                );
                round.dispatched.push(json!({"id": call.id, "name": call.name}));
                round.replies.push(ChatRecord::tool(r#"{"dispatched":true}"#, &call.id));
            } else {
                awaited.push((call, tool));
            }
        }

        let timeout = step.config.tool_timeout();
        let outcomes = join_all(awaited.iter().map(|(call, tool)| async move {
            let outcome = step
                .external(&call.name, timeout, tool.call(call.arguments.clone()))
                .await;
            (*call, outcome)
        }))
        .await;

        round.awaited = outcomes.len();
        for (call, outcome) in outcomes {
            match outcome {
                Ok(output) => {
                    round.replies.push(ChatRecord::tool(to_text(&output), &call.id));
                    round.results.push(json!({
                        "id": call.id,
                        "name": call.name,
                        "output": output,
                    }));
                }
                Err(FlowError::Cancelled) => return Err(FlowError::Cancelled),
                Err(e) => {
                    warn!(node = %step.node_id(), tool = %call.name, error = %e, "tool call failed");
                    round.replies.push(ChatRecord::tool(format!("error: {e}"), &call.id));
                    round.errors.push(json!({
                        "id": call.id,
                        "name": call.name,
                        "error": e.to_string(),
                    }));
                }
            }
        }
        Ok(round)
    }
}

#[async_trait]
impl NodeRunner for LlmRunner {
    fn node_type(&self) -> &str {
        LLM_NODE_TYPE
    }

    fn validate(&self, node: &Node) -> Vec<ValidationIssue> {
        let mut issues = require_params(node, &["user_prompt"]);
        match config_as::<LlmConfig>(node) {
            Ok(config) => {
                for tool in &config.option_tools {
                    if !self.services.tools.contains(&tool.name) {
                        issues.push(ValidationIssue::field(
                            &node.id,
                            "option_tools",
                            format!("unknown tool '{}'", tool.name),
                        ));
                    }
                }
            }
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
        let config: LlmConfig = step.config_as()?;
        let gateway = self.services.llm()?;
        let system_prompt = step
            .optional_param("system_prompt", ctx)?
            .map(|v| to_text(&v))
            .unwrap_or_default();
        let user_prompt = step.param_text("user_prompt", ctx)?;

        let declared: HashMap<&str, bool> = config
            .option_tools
            .iter()
            .map(|t| (t.name.as_str(), t.is_async))
            .collect();
        let names: Vec<&str> = config.option_tools.iter().map(|t| t.name.as_str()).collect();
        let mut request = CompletionRequest {
            model: config.model.clone(),
            system_prompt,
            user_prompt: user_prompt.clone(),
            records: window(&ctx.metadata.history, config.model_config.max_record).to_vec(),
            exchange: Vec::new(),
            model_config: config.model_config.clone(),
            tools: self.services.tools.definitions(&names),
        };

        let mut usage = Usage::default();
        let mut tool_results = Vec::new();
        let mut tool_errors = Vec::new();
        let mut dispatched = Vec::new();
        let mut rounds = 0usize;
        let text = loop {
            let completion = step
                .external("llm", step.config.llm_timeout(), gateway.complete(request.clone()))
                .await?;
            if let Some(u) = &completion.usage {
                usage.add(u);
            }
            if completion.tool_calls.is_empty() {
                break completion.content;
            }

            let round = self.run_tools(step, &declared, &completion.tool_calls).await?;
            tool_results.extend(round.results);
            tool_errors.extend(round.errors);
            dispatched.extend(round.dispatched);
            if round.awaited == 0 {
                break completion.content;
            }
            if rounds >= step.config.max_tool_rounds {
                warn!(
                    node = %step.node_id(),
                    limit = step.config.max_tool_rounds,
                    "tool round limit reached; using the last reply"
                );
                break completion.content;
            }
            rounds += 1;
            request.exchange.push(ChatRecord::assistant_with_tool_calls(
                completion.content,
                completion.tool_calls,
            ));
            request.exchange.extend(round.replies);
        };

        if config.model_config.auto_memory {
            ctx.metadata.history.push(ChatRecord::user(user_prompt));
            ctx.metadata.history.push(ChatRecord::assistant(text.clone()));
        }

        vertex.set("text", Value::String(text));
        vertex.set("tool_results", Value::Array(tool_results));
        vertex.set("tool_errors", Value::Array(tool_errors));
        vertex.set("dispatched", Value::Array(dispatched));
        vertex.set("usage", serde_json::to_value(usage)?);
        vertex.activate(step.all_successors());
        Ok(())
    }
}
