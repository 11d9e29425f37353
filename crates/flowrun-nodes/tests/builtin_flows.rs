use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flowrun_core::config::{MissingField, RunConfig};
use flowrun_core::context::{ExecutionData, RunMetadata, Scope, Trigger};
use flowrun_core::error::{ErrorKind, Result};
use flowrun_core::gateway::{Completion, CompletionRequest, LlmGateway};
use flowrun_core::widget::{ExprItem, Widget};
use flowrun_graph::prelude::*;
use flowrun_nodes::prelude::*;
use serde_json::{Value, json};

/// Answers every prompt with a fixed prefix and remembers what it saw.
#[derive(Default)]
struct EchoGateway {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LlmGateway for EchoGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        self.prompts.lock().unwrap().push(request.user_prompt.clone());
        Ok(Completion::text(format!("{}: {}", request.model, request.user_prompt)))
    }
}

fn executor(services: Services) -> FlowExecutor {
    FlowExecutor::new(Arc::new(builtin_registry(services)))
}

fn message_ctx(text: &str) -> ExecutionData {
    ExecutionData::new(RunMetadata {
        trigger: Trigger::message(text),
        ..RunMetadata::default()
    })
}

fn widget_json(widget: Widget) -> Value {
    serde_json::to_value(widget).unwrap()
}

#[tokio::test]
async fn end_copies_referenced_output() {
    let mut flow = Flow::new(
        "round-trip",
        vec![
            Node::new("s", "start"),
            Node::new("end", "end").with_param("message", Widget::field("9527.xxx")),
        ],
        vec![Edge::new("s", "end")],
    )
    .unwrap();
    let mut ctx = ExecutionData::default();
    ctx.save_node_context("9527", json!({"xxx": "嘻嘻"}).as_object().cloned().unwrap());

    let report = executor(Services::new()).run(&mut flow, &mut ctx).await.unwrap();

    assert_eq!(report.executed(), vec!["s", "end"]);
    assert!(report.steps[1].children.is_empty());
    assert_eq!(ctx.get_node_context("end").unwrap()["message"], json!("嘻嘻"));
    assert_eq!(report.output["message"], json!("嘻嘻"));
}

#[tokio::test]
async fn cache_writes_stay_in_their_scope() {
    let mut flow = Flow::new(
        "cache",
        vec![
            Node::new("s", "start"),
            Node::new("put", "cache_set")
                .with_param("cache_scope", Widget::text("user"))
                .with_param("cache_key", Widget::text("K"))
                .with_param("value", Widget::field("s.query")),
            Node::new("agent_read", "cache_get")
                .with_param("cache_scope", Widget::text("agent"))
                .with_param("cache_key", Widget::text("K")),
            Node::new("user_read", "cache_get")
                .with_param("cache_scope", Widget::text("user"))
                .with_param("cache_key", Widget::text("K")),
        ],
        vec![
            Edge::new("s", "put"),
            Edge::new("put", "agent_read"),
            Edge::new("agent_read", "user_read"),
        ],
    )
    .unwrap();
    let mut ctx = message_ctx("remember me");

    executor(Services::new()).run(&mut flow, &mut ctx).await.unwrap();

    let agent = ctx.get_node_context("agent_read").unwrap();
    assert_eq!(agent["hit"], json!(false));
    assert_eq!(agent["value"], Value::Null);
    let user = ctx.get_node_context("user_read").unwrap();
    assert_eq!(user["hit"], json!(true));
    assert_eq!(user["value"], json!("remember me"));
    assert!(ctx.get_scoped(Scope::Agent, "K").is_none());
}

fn routed_flow() -> Flow {
    let condition = Widget::func(
        "contains",
        vec![Widget::field("s.query"), Widget::text("weather")],
    );
    let branches = json!([
        {"handle": "weather", "condition": widget_json(condition)},
        {"handle": "else"},
    ]);
    let prompt = |prefix: &str| {
        Widget::expression(vec![ExprItem::text(prefix), ExprItem::field("s.query")])
    };
    Flow::new(
        "routed",
        vec![
            Node::new("s", "start"),
            Node::new("route", "if_else").with_config("branches", branches),
            Node::new("forecast", "llm")
                .with_config("model", json!("forecaster"))
                .with_param("user_prompt", prompt("forecast: ")),
            Node::new("chat", "llm")
                .with_config("model", json!("chatter"))
                .with_param("user_prompt", prompt("chat: ")),
            Node::new("end", "end").with_param(
                "answer",
                Widget::func(
                    "default",
                    vec![Widget::field("forecast.text"), Widget::field("chat.text")],
                ),
            ),
        ],
        vec![
            Edge::new("s", "route"),
            Edge::with_handle("route", "weather", "forecast"),
            Edge::with_handle("route", "else", "chat"),
            Edge::new("forecast", "end"),
            Edge::new("chat", "end"),
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn branch_selects_one_llm_path() {
    let gateway = Arc::new(EchoGateway::default());
    let executor = executor(Services::new().with_llm(gateway.clone()))
        .with_config(RunConfig::new().with_missing_field(MissingField::Null));

    let mut flow = routed_flow();
    let mut ctx = message_ctx("weather in Osaka?");
    let report = executor.run(&mut flow, &mut ctx).await.unwrap();
    assert_eq!(report.executed(), vec!["s", "route", "forecast", "end"]);
    assert_eq!(ctx.get_node_context("route").unwrap()["branch"], json!("weather"));
    assert_eq!(
        report.output["answer"],
        json!("forecaster: forecast: weather in Osaka?")
    );

    let mut flow = routed_flow();
    let mut ctx = message_ctx("hello there");
    let report = executor.run(&mut flow, &mut ctx).await.unwrap();
    assert_eq!(report.executed(), vec!["s", "route", "chat", "end"]);
    assert_eq!(report.output["answer"], json!("chatter: chat: hello there"));

    let prompts = gateway.prompts.lock().unwrap();
    assert_eq!(
        *prompts,
        vec!["forecast: weather in Osaka?", "chat: hello there"]
    );
}

#[tokio::test]
async fn llm_without_gateway_fails_the_run() {
    let mut flow = routed_flow();
    let mut ctx = message_ctx("hello");
    let err = executor(Services::new()).run(&mut flow, &mut ctx).await.unwrap_err();
    assert_eq!(err.node_id.as_deref(), Some("chat"));
    assert_eq!(err.kind, ErrorKind::ExternalCall);
    assert!(ctx.get_node_context("route").is_some());
    assert!(ctx.get_node_context("chat").is_none());
}

#[tokio::test]
async fn variable_ops_form_a_queue() {
    let var = |id: &str, node_type: &str| {
        Node::new(id, node_type)
            .with_config("scope", json!("topic"))
            .with_config("variable", json!("queue"))
    };
    let mut flow = Flow::new(
        "queue",
        vec![
            Node::new("s", "start"),
            var("init", "variable_set").with_param("value", Widget::value(json!([]))),
            var("push_a", "array_push").with_param("value", Widget::text("a")),
            var("push_b", "array_push").with_param("value", Widget::text("b")),
            var("take", "array_shift"),
        ],
        vec![
            Edge::new("s", "init"),
            Edge::new("init", "push_a"),
            Edge::new("push_a", "push_b"),
            Edge::new("push_b", "take"),
        ],
    )
    .unwrap();
    let mut ctx = ExecutionData::default();

    executor(Services::new()).run(&mut flow, &mut ctx).await.unwrap();

    assert_eq!(ctx.get_node_context("take").unwrap()["item"], json!("a"));
    assert_eq!(ctx.get_scoped(Scope::Topic, "queue"), Some(&json!(["b"])));
}

#[tokio::test]
async fn invalid_variable_name_aborts_before_mutation() {
    let mut flow = Flow::new(
        "bad-name",
        vec![
            Node::new("s", "start"),
            Node::new("set", "variable_set")
                .with_config("scope", json!("user"))
                .with_config("variable", json!("9lives"))
                .with_param("value", Widget::value(json!(1))),
        ],
        vec![Edge::new("s", "set")],
    )
    .unwrap();
    let mut ctx = ExecutionData::default();
    let err = executor(Services::new()).run(&mut flow, &mut ctx).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert!(ctx.scope_vars(Scope::User).is_none());
}

const SPLIT_FLOW: &str = r#"
id: split
nodes:
  - id: s
    type: start
  - id: split
    type: text_splitter
    params:
      content:
        type: expression
        expression_value:
          - type: fields
            value: s.query
    config:
      chunk_size: 12
      chunk_overlap: 0
  - id: end
    type: end
    params:
      count:
        type: expression
        expression_value:
          - type: fields
            value: split.count
edges:
  - source: s
    target: split
  - source: split
    target: end
"#;

#[tokio::test]
async fn yaml_flow_runs_with_builtin_runners() {
    let text = "alpha beta gamma delta epsilon";
    let executor = executor(Services::new());

    let mut first = message_ctx(text);
    let mut flow = load_flow_yaml(SPLIT_FLOW).unwrap();
    let report = executor.run(&mut flow, &mut first).await.unwrap();
    assert_eq!(report.executed(), vec!["s", "split", "end"]);

    let mut second = message_ctx(text);
    let mut flow = load_flow_yaml(SPLIT_FLOW).unwrap();
    executor.run(&mut flow, &mut second).await.unwrap();

    let chunks = &first.get_node_context("split").unwrap()["chunks"];
    assert_eq!(chunks, &second.get_node_context("split").unwrap()["chunks"]);
    assert_eq!(report.output["count"], json!(chunks.as_array().unwrap().len()));
    assert!(
        chunks
            .as_array()
            .unwrap()
            .iter()
            .all(|c| c.as_str().unwrap().chars().count() <= 12)
    );
}
