pub mod settings;

use std::sync::Arc;

use anyhow::Context;
use flowrun_core::context::{ExecutionData, RunMetadata};
use flowrun_core::error::ValidationIssue;
use flowrun_core::gateway::LlmGateway;
use flowrun_graph::executor::{FlowExecutor, RunError, RunReport};
use flowrun_graph::flow::Flow;
use flowrun_graph::registry::RunnerRegistry;
use flowrun_graph::runner::NodeRunner;
use flowrun_nodes::llm::LLM_NODE_TYPE;
use flowrun_nodes::services::{Services, builtin_registry};
use flowrun_providers::prelude::*;
use serde_json::Value;
use tracing::{info, warn};

use crate::settings::{EngineSettings, LlmSettings};

/// Wire the concrete collaborators described by `settings`.
pub async fn build_services(settings: &EngineSettings) -> anyhow::Result<Services> {
    let store = InMemoryVectorStore::new();
    for (knowledge_id, docs) in &settings.knowledge {
        store.add_documents(knowledge_id, docs.clone()).await;
    }

    let mut services = Services::new()
        .with_http(Arc::new(ReqwestHttpClient::new()))
        .with_vectors(Arc::new(store))
        .with_tools(builtin_tools());

    if let Some(root) = &settings.content_root {
        services = services.with_loader(Arc::new(FsContentLoader::new(root)));
    }
    if let Some(llm) = &settings.llm {
        services = services.with_llm(gateway(llm)?);
    }
    Ok(services)
}

fn gateway(llm: &LlmSettings) -> anyhow::Result<Arc<dyn LlmGateway>> {
    let api_key = std::env::var(&llm.api_key_env)
        .with_context(|| format!("LLM API key variable {} is not set", llm.api_key_env))?;
    let gateway = match &llm.base_url {
        Some(url) => OpenAiGateway::new(api_key).with_base_url(url),
        None => OpenAiGateway::new(api_key),
    };
    Ok(Arc::new(gateway))
}

/// Give every LLM node without a `model` the configured default.
pub fn apply_default_model(flow: &mut Flow, model: &str) {
    let ids: Vec<String> = flow
        .nodes()
        .filter(|n| n.node_type == LLM_NODE_TYPE && !n.config.contains_key("model"))
        .map(|n| n.id.clone())
        .collect();
    for id in ids {
        if let Some(node) = flow.node_mut(&id) {
            node.config
                .insert("model".into(), Value::String(model.to_string()));
        }
    }
}

/// Registry used by `validate`: no network or storage collaborators, but the
/// same tool catalog a run gets, so tool names check the same way.
pub fn validation_registry() -> RunnerRegistry {
    builtin_registry(Services::new().with_tools(builtin_tools()))
}

/// Every problem the registry can find without running the flow.
pub fn validate_flow(registry: &RunnerRegistry, flow: &Flow) -> Vec<ValidationIssue> {
    let mut nodes: Vec<_> = flow.nodes().collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    nodes
        .into_iter()
        .flat_map(|node| match registry.resolve(node) {
            Ok(runner) => runner.validate(node),
            Err(e) => vec![ValidationIssue::new(&node.id, e.to_string())],
        })
        .collect()
}

/// Run `flow` once with the collaborators and run settings from `settings`.
pub async fn run_flow(
    settings: &EngineSettings,
    flow: &mut Flow,
    mut metadata: RunMetadata,
) -> anyhow::Result<(RunReport, ExecutionData)> {
    if let Some(model) = settings.llm.as_ref().and_then(|l| l.model.as_deref()) {
        apply_default_model(flow, model);
    }
    let registry = Arc::new(builtin_registry(build_services(settings).await?));
    let executor = FlowExecutor::new(registry).with_config(settings.run.clone());

    metadata.run_id = settings.run.run_id;
    let mut ctx = ExecutionData::new(metadata);
    match executor.run(flow, &mut ctx).await {
        Ok(report) => {
            info!(run_id = %report.run_id, steps = report.steps.len(), "run finished");
            Ok((report, ctx))
        }
        Err(RunError {
            node_id,
            kind,
            message,
            completed,
            ..
        }) => {
            warn!(node = ?node_id, %kind, completed = completed.len(), "run failed");
            Err(anyhow::anyhow!("{message} ({kind})"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowrun_graph::loader::load_flow_json;
    use serde_json::json;

    fn flow_with_llm(config: Value) -> Flow {
        load_flow_json(
            &json!({
                "id": "f",
                "nodes": [
                    {"id": "start", "type": "start"},
                    {"id": "ask", "type": "llm", "config": config},
                    {"id": "end", "type": "end"}
                ],
                "edges": [
                    {"source": "start", "target": "ask"},
                    {"source": "ask", "target": "end"}
                ]
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn default_model_fills_only_missing() {
        let mut flow = flow_with_llm(json!({}));
        apply_default_model(&mut flow, "local");
        assert_eq!(flow.node("ask").unwrap().config["model"], json!("local"));

        let mut flow = flow_with_llm(json!({"model": "pinned"}));
        apply_default_model(&mut flow, "local");
        assert_eq!(flow.node("ask").unwrap().config["model"], json!("pinned"));
    }

    #[tokio::test]
    async fn services_follow_settings() {
        let services = build_services(&EngineSettings::default()).await.unwrap();
        assert!(services.llm.is_none());
        assert!(services.loader.is_none());
        assert!(services.http.is_some());
        assert!(services.tools.contains("calculator"));
    }

    #[tokio::test]
    async fn missing_api_key_is_reported() {
        let settings = EngineSettings {
            llm: Some(LlmSettings {
                api_key_env: "FLOWRUN_TEST_KEY_THAT_IS_NEVER_SET".into(),
                ..LlmSettings::default()
            }),
            ..EngineSettings::default()
        };
        let err = build_services(&settings).await.unwrap_err();
        assert!(err.to_string().contains("FLOWRUN_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
