//! Client for the hosted agent runtime's `/invocations` endpoint.

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::agent::FALLBACK_NO_RESPONSE;
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;

/// Header carrying the runtime session id.
pub const SESSION_HEADER: &str = "X-Amzn-Bedrock-AgentCore-Runtime-Session-Id";

/// The runtime rejects session ids shorter than this.
const MIN_SESSION_ID_LEN: usize = 33;

/// Session id for a user, stable across messages.
pub fn session_id_for(user_id: &str) -> String {
    format!("{:0<width$}", user_id, width = MIN_SESSION_ID_LEN)
}

pub struct RuntimeClient {
    http: Client,
    invoke_url: String,
}

impl RuntimeClient {
    pub fn new(http: Client, config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        if config.agent_runtime_arn.is_empty() {
            return Err(RuntimeError::NotConfigured);
        }
        let invoke_url = format!(
            "{}/runtimes/{}/invocations?qualifier={}",
            config.endpoint_url().trim_end_matches('/'),
            urlencoding::encode(&config.agent_runtime_arn),
            urlencoding::encode(&config.qualifier),
        );
        Ok(Self { http, invoke_url })
    }

    /// Send a prompt for `user_id` and return the agent's text answer.
    pub async fn invoke(
        &self,
        prompt: &str,
        user_id: &str,
        bearer_token: &str,
    ) -> Result<String, RuntimeError> {
        debug!("Invoking runtime for user {}", user_id);

        let resp = self
            .http
            .post(&self.invoke_url)
            .bearer_auth(bearer_token)
            .header(SESSION_HEADER, session_id_for(user_id))
            .json(&json!({"prompt": prompt, "user_id": user_id}))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(RuntimeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = resp.text().await?;
        Ok(extract_answer(&content_type, &body))
    }
}

/// Turn a runtime reply body into the answer text.
fn extract_answer(content_type: &str, body: &str) -> String {
    if content_type.contains("text/event-stream") {
        let lines: Vec<&str> = body
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .collect();
        if lines.is_empty() {
            return FALLBACK_NO_RESPONSE.to_string();
        }
        return lines.join("\n");
    }

    if content_type.starts_with("application/json") {
        return serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("response").and_then(|r| r.as_str()).map(str::to_string))
            .unwrap_or_else(|| FALLBACK_NO_RESPONSE.to_string());
    }

    warn!("Unexpected runtime content type: {}", content_type);
    FALLBACK_NO_RESPONSE.to_string()
}
