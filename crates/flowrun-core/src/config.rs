use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a field reference resolves to when its target is missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingField {
    /// Fail with `ExpressionError::UnresolvedField`.
    #[default]
    Error,
    /// Resolve to `null`.
    Null,
}

/// Configuration for a single flow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Unique identifier for this run.
    pub run_id: Uuid,

    /// Maximum number of node executions before the run is aborted.
    pub max_steps: usize,

    /// Default policy for unresolved field references.
    pub missing_field: MissingField,

    /// Timeout for LLM gateway calls, in milliseconds.
    pub llm_timeout_ms: u64,

    /// Default timeout for HTTP node calls, in milliseconds.
    pub http_timeout_ms: u64,

    /// Timeout for vector store and content loader calls, in milliseconds.
    pub vector_timeout_ms: u64,

    /// Timeout for tool calls, in milliseconds.
    pub tool_timeout_ms: u64,

    /// Upper bound on LLM/tool round trips inside one LLM node.
    pub max_tool_rounds: usize,

    /// Check each node result against its declared output schema.
    pub check_outputs: bool,

    /// Tags for filtering and categorization.
    pub tags: Vec<String>,

    /// Arbitrary metadata key-value pairs.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            max_steps: 256,
            missing_field: MissingField::Error,
            llm_timeout_ms: 60_000,
            http_timeout_ms: 10_000,
            vector_timeout_ms: 10_000,
            tool_timeout_ms: 30_000,
            max_tool_rounds: 4,
            check_outputs: true,
            tags: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_max_steps(mut self, limit: usize) -> Self {
        self.max_steps = limit;
        self
    }

    pub fn with_missing_field(mut self, policy: MissingField) -> Self {
        self.missing_field = policy;
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_check_outputs(mut self, check: bool) -> Self {
        self.check_outputs = check;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn vector_timeout(&self) -> Duration {
        Duration::from_millis(self.vector_timeout_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = RunConfig::default();
        assert_eq!(config.max_steps, 256);
        assert_eq!(config.missing_field, MissingField::Error);
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert!(config.tags.is_empty());
    }

    #[test]
    fn builder_methods() {
        let config = RunConfig::new()
            .with_max_steps(8)
            .with_missing_field(MissingField::Null)
            .with_llm_timeout(Duration::from_millis(250))
            .with_tag("debug")
            .with_metadata("source", serde_json::json!("cli"));

        assert_eq!(config.max_steps, 8);
        assert_eq!(config.missing_field, MissingField::Null);
        assert_eq!(config.llm_timeout_ms, 250);
        assert_eq!(config.tags, vec!["debug"]);
        assert_eq!(config.metadata["source"], serde_json::json!("cli"));
    }

    #[test]
    fn run_id_uniqueness() {
        assert_ne!(RunConfig::new().run_id, RunConfig::new().run_id);
    }

    #[test]
    fn partial_yaml_like_json_uses_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{"max_steps": 10, "missing_field": "null"}"#).unwrap();
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.missing_field, MissingField::Null);
        assert_eq!(config.max_tool_rounds, 4);
    }

    #[test]
    fn serde_roundtrip_keeps_run_id() {
        let config = RunConfig::new().with_tag("t");
        let json = serde_json::to_string(&config).unwrap();
        let back: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, config.run_id);
        assert_eq!(back.tags, config.tags);
    }
}
