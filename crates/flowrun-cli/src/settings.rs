use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use flowrun_core::config::RunConfig;
use flowrun_providers::vector::StoredDocument;
use serde::{Deserialize, Serialize};

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Connection settings for the OpenAI-compatible gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Model used by LLM nodes that do not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            api_key_env: default_api_key_env(),
        }
    }
}

/// Engine settings read from a YAML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub run: RunConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmSettings>,
    /// Root directory for text loader sources; the loader is disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_root: Option<PathBuf>,
    /// Documents seeded into the in-memory vector store, by knowledge id.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub knowledge: HashMap<String, Vec<StoredDocument>>,
}

impl EngineSettings {
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(text).context("invalid settings YAML")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read settings file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("in {}", path.display()))
    }
}
