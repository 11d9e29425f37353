use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::{ChatRecord, ToolCall};
use crate::tool::ToolDefinition;

fn default_max_record() -> usize {
    10
}

/// Per-node model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// How many history records are sent with the prompt.
    #[serde(default = "default_max_record")]
    pub max_record: usize,

    /// Append the exchange to the run's conversation history.
    #[serde(default)]
    pub auto_memory: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            temperature: None,
            max_record: default_max_record(),
            auto_memory: false,
        }
    }
}

/// Request sent to the LLM gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    #[serde(default)]
    pub system_prompt: String,
    pub user_prompt: String,
    /// Prior conversation, oldest first; sent before the user prompt.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<ChatRecord>,
    /// Tool round trips of the current node; sent after the user prompt.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exchange: Vec<ChatRecord>,
    #[serde(default)]
    pub model_config: ModelConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// Token accounting reported by the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl Usage {
    pub fn add(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Structured completion returned by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Narrow interface to the LLM gateway collaborator.
///
/// Implementations handle provider-specific request formatting and error
/// mapping; failures should be reported as `ExternalCallError`.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
}
