//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, Ollama, vLLM, llama.cpp server, and any endpoint
//! exposing `/v1/chat/completions` with function calling.

use async_trait::async_trait;
use asploop_core::error::{mentions_missing_model, ProviderError};
use asploop_core::message::{Message, MessageToolCall, Role};
use asploop_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                    Role::Tool => "tool".into(),
                },
                content: Some(m.content.clone()),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }

        body
    }

    /// Map a non-200 status and body to a provider error.
    fn status_error(status: u16, body: String) -> ProviderError {
        match status {
            429 => ProviderError::RateLimited { retry_after_secs: 5 },
            401 | 403 => ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ),
            404 if mentions_missing_model(&format!("404 {body}")) => {
                ProviderError::ModelNotFound(body)
            }
            _ => ProviderError::ApiError {
                status_code: status,
                message: body,
            },
        }
    }

    fn parse_response(
        api_response: ApiResponse,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        let tool_calls: Vec<MessageToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| MessageToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let mut message = Message::assistant(choice.message.content.unwrap_or_default());
        message.tool_calls = tool_calls;

        Ok(ProviderResponse {
            message,
            usage: api_response.usage,
            model: api_response.model,
        })
    }
}

#[async_trait]
impl asploop_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(Self::status_error(status, error_body));
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        Self::parse_response(api_response)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use asploop_core::Provider;

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None);
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url().contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::new("vllm", "http://localhost:8000/v1/", "k");
        assert_eq!(provider.base_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are an ASP expert"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let mut msg = Message::assistant("");
        msg.tool_calls = vec![MessageToolCall {
            id: "call_1".into(),
            name: "add_item".into(),
            arguments: r#"{"item":"node(1..4)."}"#.into(),
        }];
        let api =
            OpenAiCompatProvider::to_api_messages(&[msg, Message::tool_result("call_1", "ok")]);
        let calls = api[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "add_item");
        assert_eq!(calls[0].r#type, "function");
        assert_eq!(api[1].role, "tool");
        assert_eq!(api[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn request_body_includes_tools_only_when_present() {
        let mut request = ProviderRequest {
            model: "gpt-oss:20b".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.0,
            max_tokens: None,
            tools: vec![],
            stop: vec![],
        };
        let body = OpenAiCompatProvider::request_body(&request);
        assert!(body.get("tools").is_none());
        assert_eq!(body["stream"], false);

        request.tools.push(ToolDefinition {
            name: "solve_model".into(),
            description: "Solve".into(),
            parameters: serde_json::json!({"type": "object"}),
        });
        let body = OpenAiCompatProvider::request_body(&request);
        assert_eq!(body["tools"][0]["function"]["name"], "solve_model");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            OpenAiCompatProvider::status_error(401, String::new()),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            OpenAiCompatProvider::status_error(429, String::new()),
            ProviderError::RateLimited { .. }
        ));
        assert!(matches!(
            OpenAiCompatProvider::status_error(404, r#"{"error":"model 'x' not found"}"#.into()),
            ProviderError::ModelNotFound(_)
        ));
        assert!(matches!(
            OpenAiCompatProvider::status_error(404, "no route".into()),
            ProviderError::ApiError { status_code: 404, .. }
        ));
    }

    #[test]
    fn parse_response_with_tool_calls_and_usage() {
        let raw = r#"{
            "model": "gpt-oss:20b",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "solve_model", "arguments": "{}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 8, "total_tokens": 128}
        }"#;
        let api: ApiResponse = serde_json::from_str(raw).unwrap();
        let response = OpenAiCompatProvider::parse_response(api).unwrap();
        assert_eq!(response.message.content, "");
        assert_eq!(response.message.tool_calls[0].name, "solve_model");
        let usage = response.usage.unwrap();
        assert_eq!(usage.input_tokens, 120);
        assert_eq!(usage.output_tokens, 8);
        assert_eq!(usage.total_tokens, 128);
    }

    #[test]
    fn parse_response_without_choices_fails() {
        let api: ApiResponse = serde_json::from_str(r#"{"model":"m","choices":[]}"#).unwrap();
        assert!(OpenAiCompatProvider::parse_response(api).is_err());
    }
}
