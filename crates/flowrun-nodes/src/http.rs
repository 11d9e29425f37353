use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flowrun_core::context::ExecutionData;
use flowrun_core::error::{ExternalCallError, FlowError, Result, ValidationIssue};
use flowrun_core::http::{HttpMethod, HttpRequest};
use flowrun_expr::value::to_text;
use flowrun_graph::node::Node;
use flowrun_graph::runner::{NodeRunner, Step, config_as};
use flowrun_graph::vertex::VertexResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::services::Services;
use crate::support::{object_param, require_params};

pub const HTTP_NODE_TYPE: &str = "http";

/// Result keys written by the runner itself; output fields may not reuse them.
const RESPONSE_KEYS: [&str; 3] = ["status_code", "headers", "body"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpNodeConfig {
    /// Overrides the run's HTTP timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Performs one HTTP request built from the node's params.
///
/// Any status outside 2xx fails the node with `ExternalCallError::Status`.
/// The result holds `status_code`, `headers` and `body` (parsed as JSON when
/// possible), plus the body projected onto the node's `output` schema.
pub struct HttpRunner {
    services: Arc<Services>,
}

impl HttpRunner {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    fn method(step: &Step<'_>, ctx: &ExecutionData) -> Result<HttpMethod> {
        match step.optional_param("method", ctx)? {
            None => Ok(HttpMethod::Get),
            Some(value) => HttpMethod::from_str(&to_text(&value))
                .map_err(|e| FlowError::invalid(step.node_id(), "method", e)),
        }
    }
}

#[async_trait]
impl NodeRunner for HttpRunner {
    fn node_type(&self) -> &str {
        HTTP_NODE_TYPE
    }

    fn validate(&self, node: &Node) -> Vec<ValidationIssue> {
        let mut issues = require_params(node, &["url"]);
        if let Some(method) = node.params.get("method").and_then(|w| w.literal()) {
            if let Err(e) = HttpMethod::from_str(&to_text(&method)) {
                issues.push(ValidationIssue::field(&node.id, "method", e));
            }
        }
        if let Err(e) = config_as::<HttpNodeConfig>(node) {
            issues.push(ValidationIssue::field(&node.id, "config", e.to_string()));
        }
        if let Some(schema) = &node.output {
            for field in schema.fields.iter().filter(|f| RESPONSE_KEYS.contains(&f.key.as_str())) {
                issues.push(ValidationIssue::field(
                    &node.id,
                    "output",
                    format!("field '{}' collides with a response key", field.key),
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
        let config: HttpNodeConfig = step.config_as()?;
        let client = self.services.http()?;
        let timeout = config
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| step.config.http_timeout());

        let request = HttpRequest {
            method: Self::method(step, ctx)?,
            url: step.param_text("url", ctx)?,
            headers: object_param(step, "headers", ctx)?
                .into_iter()
                .map(|(k, v)| (k, to_text(&v)))
                .collect(),
            body: step.optional_param("body", ctx)?,
            timeout,
        };
        debug!(node = %step.node_id(), method = %request.method, url = %request.url, "sending request");

        let response = step.external("http", timeout, client.send(request)).await?;
        if !response.is_success() {
            return Err(ExternalCallError::Status {
                service: "http".into(),
                status: response.status,
                body: response.body,
            }
            .into());
        }

        let body = response.body_value();
        let headers: Map<String, Value> = response
            .headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), Value::String(v)))
            .collect();
        if let Some(schema) = &step.node.output {
            vertex.extend(schema.project(&body));
        }
        vertex.set("status_code", Value::from(response.status));
        vertex.set("headers", Value::Object(headers));
        vertex.set("body", body);
        vertex.activate(step.all_successors());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::testing::Fixture;
    use flowrun_core::http::{HttpClient, HttpResponse};
    use flowrun_core::widget::{ExprItem, Widget};
    use flowrun_graph::schema::{FieldType, Schema, SchemaField};
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns a fixed response and keeps the last request.
    struct MockHttp {
        status: u16,
        body: String,
        last: Mutex<Option<HttpRequest>>,
    }

    impl MockHttp {
        fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body: body.into(),
                last: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl HttpClient for MockHttp {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            *self.last.lock().unwrap() = Some(request);
            Ok(HttpResponse {
                status: self.status,
                headers: vec![("Content-Type".into(), "application/json".into())],
                body: self.body.clone(),
            })
        }
    }

    fn runner(http: Arc<MockHttp>) -> HttpRunner {
        HttpRunner::new(Arc::new(Services::new().with_http(http)))
    }

    fn node() -> Node {
        Node::new("h", HTTP_NODE_TYPE)
            .with_param("method", Widget::text("post"))
            .with_param(
                "url",
                Widget::expression(vec![
                    ExprItem::text("https://api.test/items/"),
                    ExprItem::field("s.id"),
                ]),
            )
            .with_param("headers", Widget::value(json!({"X-Trace": 7})))
            .with_param("body", Widget::value(json!({"q": "rust"})))
    }

    fn ctx() -> ExecutionData {
        let mut ctx = ExecutionData::default();
        ctx.save_node_context("s", json!({"id": 42}).as_object().cloned().unwrap());
        ctx
    }

    #[tokio::test]
    async fn builds_request_and_parses_body() {
        let http = MockHttp::new(200, r#"{"name": "crab", "legs": "10"}"#);
        let schema = Schema::new(vec![
            SchemaField::new("name", FieldType::String),
            SchemaField::new("legs", FieldType::Number),
        ]);
        let fx = Fixture::new(node().with_output(schema));
        let mut vertex = VertexResult::new("h");
        runner(http.clone())
            .execute(&fx.step(), &mut vertex, &mut ctx())
            .await
            .unwrap();

        let sent = http.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.url, "https://api.test/items/42");
        assert_eq!(sent.headers, vec![("X-Trace".to_string(), "7".to_string())]);
        assert_eq!(sent.body, Some(json!({"q": "rust"})));

        assert_eq!(vertex.result["status_code"], json!(200));
        assert_eq!(vertex.result["headers"]["content-type"], json!("application/json"));
        assert_eq!(vertex.result["body"]["name"], json!("crab"));
        assert_eq!(vertex.result["legs"], json!(10));
    }

    #[tokio::test]
    async fn non_success_status_fails() {
        let fx = Fixture::new(node());
        let err = runner(MockHttp::new(503, "busy"))
            .execute(&fx.step(), &mut VertexResult::new("h"), &mut ctx())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::ExternalCall(ExternalCallError::Status { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn text_bodies_stay_strings() {
        let fx = Fixture::new(Node::new("h", HTTP_NODE_TYPE).with_param("url", Widget::text("https://x.test")));
        let http = MockHttp::new(200, "plain");
        let mut vertex = VertexResult::new("h");
        runner(http.clone())
            .execute(&fx.step(), &mut vertex, &mut ctx())
            .await
            .unwrap();
        assert_eq!(vertex.result["body"], json!("plain"));
        assert_eq!(http.last.lock().unwrap().as_ref().unwrap().method, HttpMethod::Get);
    }

    #[test]
    fn validate_checks_url_and_method() {
        let runner = runner(MockHttp::new(200, ""));
        assert!(runner.validate(&node()).is_empty());
        let bad = Node::new("h", HTTP_NODE_TYPE).with_param("method", Widget::text("FETCH"));
        assert_eq!(runner.validate(&bad).len(), 2);
    }

    #[test]
    fn output_fields_may_not_shadow_response_keys() {
        let runner = runner(MockHttp::new(200, ""));
        let schema = Schema::new(vec![
            SchemaField::new("status_code", FieldType::Number),
            SchemaField::new("body", FieldType::String),
            SchemaField::new("name", FieldType::String),
        ]);
        let issues = runner.validate(&node().with_output(schema));
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.field.as_deref() == Some("output")));
        assert!(issues[0].message.contains("status_code"));
        assert!(issues[1].message.contains("body"));
    }
}
