//! HTTP generation backend.
//!
//! Speaks the Anthropic Messages API and the OpenAI chat-completions format
//! (OpenAI, Gemini, OpenRouter, Grok and DeepSeek all accept the latter).
//! Each call is a single attempt; retries are not this layer's concern.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{GenerationRequest, GenerationService};
use crate::error::StageError;
use crate::models::LlmProvider;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// reqwest-backed [`GenerationService`]
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    max_tokens: u32,
}

impl Default for HttpGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpGateway {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    async fn call_anthropic(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<String, String> {
        let url = format!("{}/messages", request.model.endpoint());
        let body = anthropic_body(request, self.max_tokens);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(describe_send_error)?;

        let text = read_success_body(response).await?;
        parse_anthropic_response(&text)
    }

    async fn call_openai_compatible(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<String, String> {
        let url = format!("{}/chat/completions", request.model.endpoint());
        let body = chat_body(request, self.max_tokens);

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json");
        if request.model.provider == LlmProvider::OpenRouter {
            builder = builder.header("X-Title", "PromptCrew");
        }

        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(describe_send_error)?;

        let text = read_success_body(response).await?;
        parse_chat_response(&text)
    }
}

#[async_trait]
impl GenerationService for HttpGateway {
    async fn generate(&self, request: GenerationRequest) -> Result<String, StageError> {
        let provider = request.model.provider;
        let api_key = api_key(provider).ok_or_else(|| {
            StageError::transport(
                &request.stage,
                format!("{} is not set", provider.env_var()),
            )
        })?;

        tracing::debug!(
            stage = %request.stage,
            provider = provider.id(),
            model = %request.model.model,
            "Sending generation request"
        );

        let result = if provider.is_openai_compatible() {
            self.call_openai_compatible(&request, &api_key).await
        } else {
            self.call_anthropic(&request, &api_key).await
        };

        result.map_err(|message| {
            tracing::warn!(stage = %request.stage, "Generation failed: {}", message);
            StageError::transport(&request.stage, message)
        })
    }
}

/// The provider's key from its environment variable, blank counts as unset
fn api_key(provider: LlmProvider) -> Option<String> {
    std::env::var(provider.env_var())
        .ok()
        .filter(|k| !k.trim().is_empty())
}

fn describe_send_error(e: reqwest::Error) -> String {
    if e.is_timeout() {
        format!("Request timeout: {}", e)
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        format!("Request failed: {}", e)
    }
}

async fn read_success_body(response: reqwest::Response) -> Result<String, String> {
    let status = response.status();
    check_body(status, response.text().await)
}

fn check_body(
    status: reqwest::StatusCode,
    body: Result<String, reqwest::Error>,
) -> Result<String, String> {
    match body {
        Ok(body) if status.is_success() => Ok(body),
        Ok(body) => Err(format!("HTTP {}: {}", status.as_u16(), truncate(&body, 500))),
        Err(e) if status.is_success() => Err(format!(
            "HTTP {} but the body could not be read: {}",
            status.as_u16(),
            describe_send_error(e)
        )),
        Err(e) => Err(format!("HTTP {} (body unreadable: {})", status.as_u16(), e)),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

// ============================================================================
// Wire formats
// ============================================================================

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn anthropic_body(request: &GenerationRequest, max_tokens: u32) -> AnthropicRequest<'_> {
    AnthropicRequest {
        model: &request.model.model,
        max_tokens,
        system: &request.system_prompt,
        messages: vec![WireMessage {
            role: "user",
            content: &request.prompt,
        }],
    }
}

fn chat_body(request: &GenerationRequest, max_tokens: u32) -> ChatRequest<'_> {
    ChatRequest {
        model: &request.model.model,
        max_tokens,
        messages: vec![
            WireMessage {
                role: "system",
                content: &request.system_prompt,
            },
            WireMessage {
                role: "user",
                content: &request.prompt,
            },
        ],
    }
}

fn parse_anthropic_response(body: &str) -> Result<String, String> {
    let parsed: AnthropicResponse = serde_json::from_str(body)
        .map_err(|e| format!("Failed to parse response: {}", e))?;
    let text: String = parsed
        .content
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() {
        return Err("No text content in response".to_string());
    }
    Ok(text)
}

fn parse_chat_response(body: &str) -> Result<String, String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| format!("Failed to parse response: {}", e))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| "No choices in response".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelConfig;

    fn request(provider: LlmProvider) -> GenerationRequest {
        GenerationRequest {
            agent: "architect".to_string(),
            stage: "architect".to_string(),
            model: ModelConfig::with_provider(provider, provider.default_model()),
            system_prompt: "You are an architect.".to_string(),
            prompt: "Analyze this.".to_string(),
            schema: serde_json::json!({"type": "object"}),
        }
    }

    #[test]
    fn test_anthropic_body_uses_system_field() {
        let req = request(LlmProvider::Anthropic);
        let body = serde_json::to_value(anthropic_body(&req, 1024)).unwrap();
        assert_eq!(body["system"], "You are an architect.");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_chat_body_prepends_system_message() {
        let req = request(LlmProvider::DeepSeek);
        let body = serde_json::to_value(chat_body(&req, 2048)).unwrap();
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Analyze this.");
    }

    #[test]
    fn test_parse_anthropic_response_joins_text_blocks() {
        let body = r#"{"content": [
            {"type": "text", "text": "{\"a\": "},
            {"type": "tool_use", "id": "x"},
            {"type": "text", "text": "1}"}
        ]}"#;
        assert_eq!(parse_anthropic_response(body).unwrap(), "{\"a\": 1}");
        assert!(parse_anthropic_response(r#"{"content": []}"#).is_err());
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "hello"}}]}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "hello");
        assert!(parse_chat_response(r#"{"choices": []}"#).is_err());
        assert!(parse_chat_response("not json").is_err());
    }

    #[test]
    fn test_api_key_from_env() {
        std::env::set_var(LlmProvider::OpenRouter.env_var(), "  ");
        assert_eq!(api_key(LlmProvider::OpenRouter), None);
        std::env::set_var(LlmProvider::OpenRouter.env_var(), "test-key");
        assert_eq!(api_key(LlmProvider::OpenRouter), Some("test-key".to_string()));
        std::env::remove_var(LlmProvider::OpenRouter.env_var());
    }

    #[tokio::test]
    async fn test_unreadable_success_body_is_reported() {
        // A relative URL fails in the request builder without touching the network
        let read_error = Client::new().get("not-a-url").send().await.unwrap_err();
        let err = check_body(reqwest::StatusCode::OK, Err(read_error)).unwrap_err();
        assert!(err.starts_with("HTTP 200 but the body could not be read"));
        assert!(err.contains("Request failed"));
    }

    #[test]
    fn test_check_body_status_handling() {
        assert_eq!(
            check_body(reqwest::StatusCode::OK, Ok("{}".to_string())),
            Ok("{}".to_string())
        );
        assert_eq!(
            check_body(reqwest::StatusCode::TOO_MANY_REQUESTS, Ok("slow down".to_string())),
            Err("HTTP 429: slow down".to_string())
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
