use std::sync::Arc;

use async_trait::async_trait;
use flowrun_core::context::ExecutionData;
use flowrun_core::error::{Result, ValidationIssue};
use flowrun_graph::node::Node;
use flowrun_graph::runner::{NodeRunner, Step};
use flowrun_graph::vertex::VertexResult;
use serde_json::Value;

use crate::services::Services;
use crate::support::require_params;

pub const TEXT_LOADER_NODE_TYPE: &str = "text_loader";

/// Loads raw text for the `source` param through the content loader.
pub struct TextLoaderRunner {
    services: Arc<Services>,
}

impl TextLoaderRunner {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl NodeRunner for TextLoaderRunner {
    fn node_type(&self) -> &str {
        TEXT_LOADER_NODE_TYPE
    }

    fn validate(&self, node: &Node) -> Vec<ValidationIssue> {
        require_params(node, &["source"])
    }

    async fn execute(
        &self,
        step: &Step<'_>,
        vertex: &mut VertexResult,
        ctx: &mut ExecutionData,
    ) -> Result<()> {
        let loader = self.services.loader()?;
        let source = step.param_text("source", ctx)?;
        let content = step
            .external("content_loader", step.config.http_timeout(), loader.load(&source))
            .await?;
        vertex.set("length", Value::from(content.chars().count()));
        vertex.set("source", Value::String(source));
        vertex.set("content", Value::String(content));
        vertex.activate(step.all_successors());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::testing::Fixture;
    use flowrun_core::config::RunConfig;
    use flowrun_core::error::{ExternalCallError, FlowError};
    use flowrun_core::loader::ContentLoader;
    use flowrun_core::widget::Widget;
    use serde_json::json;
    use std::time::Duration;

    struct Fixed;

    #[async_trait]
    impl ContentLoader for Fixed {
        async fn load(&self, source: &str) -> Result<String> {
            match source {
                "greeting.txt" => Ok("こんにちは".into()),
                other => Err(FlowError::Other(format!("no such source: {other}"))),
            }
        }
    }

    fn runner() -> TextLoaderRunner {
        TextLoaderRunner::new(Arc::new(Services::new().with_loader(Arc::new(Fixed))))
    }

    #[tokio::test]
    async fn loads_content() {
        let fx = Fixture::new(
            Node::new("l", TEXT_LOADER_NODE_TYPE).with_param("source", Widget::text("greeting.txt")),
        );
        let mut vertex = VertexResult::new("l");
        runner()
            .execute(&fx.step(), &mut vertex, &mut ExecutionData::default())
            .await
            .unwrap();
        assert_eq!(vertex.result["content"], json!("こんにちは"));
        assert_eq!(vertex.result["length"], json!(5));
    }

    #[tokio::test]
    async fn loader_errors_propagate() {
        let fx = Fixture::new(
            Node::new("l", TEXT_LOADER_NODE_TYPE).with_param("source", Widget::text("missing.txt")),
        );
        let err = runner()
            .execute(&fx.step(), &mut VertexResult::new("l"), &mut ExecutionData::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing.txt"));
    }

    struct Stalled;

    #[async_trait]
    impl ContentLoader for Stalled {
        async fn load(&self, _source: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_loads_hit_the_vector_timeout() {
        let config = RunConfig {
            vector_timeout_ms: 50,
            http_timeout_ms: 120_000,
            ..RunConfig::default()
        };
        let fx = Fixture::new(
            Node::new("l", TEXT_LOADER_NODE_TYPE).with_param("source", Widget::text("big.txt")),
        )
        .with_config(config);
        let runner = TextLoaderRunner::new(Arc::new(Services::new().with_loader(Arc::new(Stalled))));
        let err = runner
            .execute(&fx.step(), &mut VertexResult::new("l"), &mut ExecutionData::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::ExternalCall(ExternalCallError::Timeout { after_ms: 50, .. })
        ));
        assert_eq!(err.kind().as_str(), "external_call");
    }

    #[test]
    fn source_is_required() {
        assert_eq!(runner().validate(&Node::new("l", TEXT_LOADER_NODE_TYPE)).len(), 1);
    }
}
