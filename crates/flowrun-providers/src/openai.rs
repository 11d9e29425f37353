//! OpenAI-compatible Chat Completions gateway.

use async_trait::async_trait;
use flowrun_core::error::{ExternalCallError, Result};
use flowrun_core::gateway::{Completion, CompletionRequest, LlmGateway, Usage};
use flowrun_core::record::{ChatRecord, Role, ToolCall};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SERVICE: &str = "llm";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

// ---------------------------------------------------------------------------
// Chat Completions API request/response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Serialize)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: FunctionDef,
}

#[derive(Debug, Serialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: WireFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunction {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
pub struct WireUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn record_to_message(record: &ChatRecord) -> ChatMessage {
    let tool_calls = if record.tool_calls.is_empty() {
        None
    } else {
        Some(
            record
                .tool_calls
                .iter()
                .map(|tc| WireToolCall {
                    id: tc.id.clone(),
                    call_type: function_type(),
                    function: WireFunction {
                        name: tc.name.clone(),
                        arguments: tc.arguments.to_string(),
                    },
                })
                .collect(),
        )
    };
    ChatMessage {
        role: role_name(record.role),
        content: record.content.clone(),
        tool_call_id: record.tool_call_id.clone(),
        tool_calls,
    }
}

/// Message order: system prompt, history, user prompt, tool round trips.
pub fn build_request(request: &CompletionRequest) -> ChatRequest {
    let mut messages = Vec::with_capacity(request.records.len() + request.exchange.len() + 2);
    if !request.system_prompt.is_empty() {
        messages.push(record_to_message(&ChatRecord::system(request.system_prompt.clone())));
    }
    messages.extend(request.records.iter().map(record_to_message));
    messages.push(record_to_message(&ChatRecord::user(request.user_prompt.clone())));
    messages.extend(request.exchange.iter().map(record_to_message));

    let tools = if request.tools.is_empty() {
        None
    } else {
        Some(
            request
                .tools
                .iter()
                .map(|t| ToolDef {
                    tool_type: "function",
                    function: FunctionDef {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters.clone(),
                    },
                })
                .collect(),
        )
    };

    ChatRequest {
        model: request.model.clone(),
        messages,
        temperature: request.model_config.temperature,
        tools,
    }
}

/// First choice of the response; unparseable tool arguments become `null`.
pub fn parse_response(response: ChatResponse) -> Completion {
    let usage = response.usage.map(|u| Usage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });
    let Some(choice) = response.choices.into_iter().next() else {
        return Completion {
            usage,
            ..Completion::default()
        };
    };
    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall {
            id: tc.id,
            name: tc.function.name,
            arguments: serde_json::from_str(&tc.function.arguments)
                .unwrap_or(serde_json::Value::Null),
        })
        .collect();
    Completion {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        usage,
    }
}

// ---------------------------------------------------------------------------
// OpenAiGateway
// ---------------------------------------------------------------------------

/// [`LlmGateway`] speaking the Chat Completions protocol.
///
/// Works against any compatible endpoint; `base_url` excludes the
/// `/chat/completions` suffix.
pub struct OpenAiGateway {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiGateway {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl std::fmt::Debug for OpenAiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LlmGateway for OpenAiGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let body = build_request(&request);
        debug!(model = %body.model, messages = body.messages.len(), "sending chat completion");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExternalCallError::transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read response body".into());
            let message = serde_json::from_str::<ApiError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(ExternalCallError::Status {
                service: SERVICE.into(),
                status: status.as_u16(),
                body: message,
            }
            .into());
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExternalCallError::transport(SERVICE, format!("invalid response: {e}")))?;
        Ok(parse_response(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowrun_core::gateway::ModelConfig;
    use flowrun_core::tool::ToolDefinition;
    use serde_json::json;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-test".into(),
            system_prompt: String::new(),
            user_prompt: "hi".into(),
            records: Vec::new(),
            exchange: Vec::new(),
            model_config: ModelConfig::default(),
            tools: Vec::new(),
        }
    }

    fn roles(body: &ChatRequest) -> Vec<&str> {
        body.messages.iter().map(|m| m.role).collect()
    }

    #[test]
    fn build_request_orders_messages() {
        let mut req = request();
        req.system_prompt = "be brief".into();
        req.records = vec![ChatRecord::user("earlier"), ChatRecord::assistant("reply")];
        req.exchange = vec![
            ChatRecord::assistant_with_tool_calls(
                "",
                vec![ToolCall {
                    id: "c1".into(),
                    name: "weather".into(),
                    arguments: json!({"city": "Kyoto"}),
                }],
            ),
            ChatRecord::tool("sunny", "c1"),
        ];
        let body = build_request(&req);
        assert_eq!(roles(&body), vec!["system", "user", "assistant", "user", "assistant", "tool"]);
        assert_eq!(body.messages[3].content, "hi");

        let value = serde_json::to_value(&body).unwrap();
        let call = &value["messages"][4]["tool_calls"][0];
        assert_eq!(call["type"], json!("function"));
        assert_eq!(call["function"]["arguments"], json!(r#"{"city":"Kyoto"}"#));
        assert_eq!(value["messages"][5]["tool_call_id"], json!("c1"));
    }

    #[test]
    fn build_request_without_system_or_tools() {
        let body = build_request(&request());
        assert_eq!(roles(&body), vec!["user"]);
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("temperature").is_none());
    }

    #[test]
    fn build_request_with_tools_and_temperature() {
        let mut req = request();
        req.model_config.temperature = Some(0.2);
        req.tools = vec![ToolDefinition {
            name: "calculator".into(),
            description: "math".into(),
            parameters: json!({"type": "object"}),
        }];
        let value = serde_json::to_value(build_request(&req)).unwrap();
        assert_eq!(value["temperature"], json!(0.2));
        assert_eq!(value["tools"][0]["type"], json!("function"));
        assert_eq!(value["tools"][0]["function"]["name"], json!("calculator"));
    }

    #[test]
    fn parse_response_text_and_usage() {
        let raw = json!({
            "choices": [{"message": {"content": "hello"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        });
        let completion = parse_response(serde_json::from_value(raw).unwrap());
        assert_eq!(completion.content, "hello");
        assert!(completion.tool_calls.is_empty());
        assert_eq!(completion.usage.unwrap().total_tokens, 5);
    }

    #[test]
    fn parse_response_tool_calls() {
        let raw = json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [
                    {"id": "a", "type": "function", "function": {"name": "calculator", "arguments": "{\"expression\":\"1+1\"}"}},
                    {"id": "b", "type": "function", "function": {"name": "broken", "arguments": "{not json"}}
                ]
            }}]
        });
        let completion = parse_response(serde_json::from_value(raw).unwrap());
        assert_eq!(completion.content, "");
        assert_eq!(completion.tool_calls.len(), 2);
        assert_eq!(completion.tool_calls[0].arguments, json!({"expression": "1+1"}));
        assert_eq!(completion.tool_calls[1].arguments, serde_json::Value::Null);
    }

    #[test]
    fn parse_response_without_choices() {
        let raw = json!({"choices": []});
        let completion = parse_response(serde_json::from_value(raw).unwrap());
        assert_eq!(completion, Completion::default());
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let gateway = OpenAiGateway::new("key").with_base_url("http://localhost:8080/v1/");
        assert_eq!(gateway.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert!(!format!("{gateway:?}").contains("key"));
    }
}
