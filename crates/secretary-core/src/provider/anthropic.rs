use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;
use crate::types::{
    CompletionRequest, CompletionResponse, ContentBlock, Role, StopReason, TokenUsage,
    ToolDefinition, Turn,
};

use super::LlmProvider;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Native Anthropic Messages API provider.
pub struct AnthropicProvider {
    http: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl AnthropicProvider {
    pub fn new(http: Client, api_key: String, api_base: Option<String>, default_model: String) -> Self {
        let base = api_base.unwrap_or_else(|| "https://api.anthropic.com".to_string());
        Self {
            http,
            api_key,
            api_base: base.trim_end_matches('/').to_string(),
            default_model,
        }
    }

    /// Normalize model name: strip "anthropic/" prefix.
    fn normalize_model(model: &str) -> &str {
        model.strip_prefix("anthropic/").unwrap_or(model)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireTurn<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
}

#[derive(Serialize)]
struct WireTurn<'a> {
    role: Role,
    content: Vec<&'a ContentBlock>,
}

impl<'a> WireTurn<'a> {
    /// Blocks we could not interpret are never echoed back upstream.
    fn from_turn(turn: &'a Turn) -> Self {
        Self {
            role: turn.role,
            content: turn
                .content
                .iter()
                .filter(|b| !matches!(b, ContentBlock::Unsupported))
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(&self, request: &CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        let url = format!("{}/v1/messages", self.api_base);
        let model_name = Self::normalize_model(&request.model);
        let body = MessagesRequest {
            model: model_name,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system.as_deref(),
            messages: request.turns.iter().map(WireTurn::from_turn).collect(),
            tools: (!request.tools.is_empty()).then_some(request.tools.as_slice()),
        };

        debug!(
            "Anthropic request to {} with model {} ({} turns)",
            url,
            model_name,
            request.turns.len()
        );

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let data: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(CompletionResponse {
            content: data.content,
            stop_reason: StopReason::parse(data.stop_reason.as_deref()),
            usage: data
                .usage
                .map(|u| TokenUsage {
                    input_tokens: u.input_tokens,
                    output_tokens: u.output_tokens,
                })
                .unwrap_or_default(),
        })
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(turns: Vec<Turn>) -> CompletionRequest {
        CompletionRequest {
            model: "anthropic/claude-sonnet-4-5".into(),
            system: Some("You are a secretary.".into()),
            turns,
            tools: vec![ToolDefinition {
                name: "list_calendar_events".into(),
                description: "List events".into(),
                input_schema: json!({"type": "object", "properties": {}}),
            }],
            max_tokens: 1024,
            temperature: 0.3,
        }
    }

    fn provider(server: &MockServer) -> AnthropicProvider {
        AnthropicProvider::new(
            Client::new(),
            "sk-test".into(),
            Some(server.uri()),
            "claude-sonnet-4-5".into(),
        )
    }

    #[tokio::test]
    async fn test_chat_parses_tool_use() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(json!({
                "model": "claude-sonnet-4-5",
                "system": "You are a secretary.",
                "messages": [{"role": "user", "content": [{"type": "text", "text": "明日の予定は？"}]}],
                "tools": [{"name": "list_calendar_events"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "content": [
                    {"type": "text", "text": "確認します。"},
                    {"type": "tool_use", "id": "toolu_1", "name": "list_calendar_events", "input": {"max_results": 5}}
                ],
                "stop_reason": "tool_use",
                "usage": {"input_tokens": 120, "output_tokens": 30}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = provider(&server)
            .chat(&request(vec![Turn::user("明日の予定は？")]))
            .await
            .unwrap();

        assert_eq!(resp.stop_reason, StopReason::ToolUse);
        assert_eq!(resp.first_text(), Some("確認します。"));
        let calls = resp.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].input, json!({"max_results": 5}));
        assert_eq!(resp.usage.input_tokens, 120);
    }

    #[tokio::test]
    async fn test_unsupported_blocks_are_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "user", "content": [{"type": "text", "text": "hi"}]},
                    {"role": "assistant", "content": [{"type": "text", "text": "hello"}]}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "ok"}],
                "stop_reason": "end_turn"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let turns = vec![
            Turn::user("hi"),
            Turn::assistant(vec![ContentBlock::Unsupported, ContentBlock::text("hello")]),
        ];
        let resp = provider(&server).chat(&request(turns)).await.unwrap();
        assert!(resp.stop_reason.is_final());
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .chat(&request(vec![Turn::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 529, .. }));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let provider = AnthropicProvider::new(Client::new(), String::new(), None, "m".into());
        let err = provider.chat(&request(vec![Turn::user("hi")])).await.unwrap_err();
        assert!(matches!(err, ProviderError::NoApiKey));
    }
}
