use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::LineConfig;
use crate::error::ChannelError;
use crate::util::truncate_string;

/// LINE rejects text messages longer than this.
pub const MAX_TEXT_LENGTH: usize = 5000;

/// LINE Messaging API client.
pub struct LineChannel {
    http: Client,
    api_base: String,
    access_token: String,
}

impl LineChannel {
    pub fn new(http: Client, config: &LineConfig) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token: config.channel_access_token.clone(),
        }
    }

    /// Verify webhook signature using HMAC-SHA256.
    ///
    /// `signature` is the base64 value of the `x-line-signature` header.
    pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
        #[cfg(feature = "http-api")]
        {
            use base64::Engine;
            use hmac::{Hmac, Mac};
            use sha2::Sha256;

            type HmacSha256 = Hmac<Sha256>;

            let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature) else {
                return false;
            };
            let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
                return false;
            };
            mac.update(body);
            mac.verify_slice(&expected).is_ok()
        }
        #[cfg(not(feature = "http-api"))]
        {
            let _ = (channel_secret, body, signature);
            false
        }
    }

    /// Parse LINE webhook events from the request body.
    pub fn parse_webhook_events(body: &str) -> Result<Vec<LineEvent>, ChannelError> {
        let webhook: LineWebhook = serde_json::from_str(body)?;
        Ok(webhook.events)
    }

    /// Reply to a LINE message using the reply token.
    /// Must be called within 1 minute of receiving the webhook.
    pub async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "replyToken": reply_token,
            "messages": [{
                "type": "text",
                "text": truncate_string(text, MAX_TEXT_LENGTH, "…")
            }]
        });

        let resp = self
            .http
            .post(format!("{}/v2/bot/message/reply", self.api_base))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!("LINE reply API error: {} {}", status, text);
            return Err(ChannelError::Send(format!("LINE reply API error: {status}")));
        }

        debug!("LINE reply sent successfully");
        Ok(())
    }
}

/// A text message pulled out of a webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub user_id: String,
    pub reply_token: String,
    pub text: String,
}

impl LineEvent {
    /// Returns the text message carried by this event, if it is one.
    pub fn text_message(&self) -> Option<TextMessage> {
        if self.event_type != "message" {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.msg_type != "text" {
            debug!("Ignoring non-text LINE message: {}", message.msg_type);
            return None;
        }
        Some(TextMessage {
            user_id: self
                .source
                .as_ref()
                .and_then(|s| s.user_id.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            reply_token: self.reply_token.clone()?,
            text: message.text.clone().unwrap_or_default(),
        })
    }
}

// ====== LINE Webhook Types ======

#[derive(Debug, Deserialize)]
pub struct LineWebhook {
    #[serde(default)]
    pub events: Vec<LineEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reply_token: Option<String>,
    pub source: Option<LineSource>,
    pub message: Option<LineMessage>,
    pub timestamp: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub room_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineMessage {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[cfg(feature = "http-api")]
    fn sign(secret: &str, body: &str) -> String {
        use base64::Engine;
        use hmac::{Hmac, Mac};
        let mut mac = Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    #[cfg(feature = "http-api")]
    #[test]
    fn test_verify_signature() {
        let body = r#"{"events":[]}"#;
        let sig = sign("channel-secret", body);
        assert!(LineChannel::verify_signature("channel-secret", body.as_bytes(), &sig));
        assert!(!LineChannel::verify_signature("wrong-secret", body.as_bytes(), &sig));
        assert!(!LineChannel::verify_signature("channel-secret", b"{}", &sig));
        assert!(!LineChannel::verify_signature("channel-secret", body.as_bytes(), "not base64!"));
    }

    #[test]
    fn test_parse_webhook_text_message() {
        let body = r#"{
            "events": [{
                "type": "message",
                "replyToken": "token123",
                "source": {
                    "type": "user",
                    "userId": "U1234567890"
                },
                "message": {
                    "id": "msg001",
                    "type": "text",
                    "text": "明日の予定を教えて"
                },
                "timestamp": 1625000000000
            }]
        }"#;

        let events = LineChannel::parse_webhook_events(body).unwrap();
        assert_eq!(events.len(), 1);
        let msg = events[0].text_message().unwrap();
        assert_eq!(msg.user_id, "U1234567890");
        assert_eq!(msg.reply_token, "token123");
        assert_eq!(msg.text, "明日の予定を教えて");
    }

    #[test]
    fn test_non_text_events_are_skipped() {
        let body = r#"{
            "events": [
                {"type": "follow", "replyToken": "r1", "source": {"type": "user", "userId": "U9"}},
                {"type": "message", "replyToken": "r2", "source": {"type": "user", "userId": "U9"},
                 "message": {"id": "m", "type": "sticker"}}
            ]
        }"#;

        let events = LineChannel::parse_webhook_events(body).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.text_message().is_none()));
    }

    #[test]
    fn test_parse_webhook_malformed() {
        assert!(matches!(
            LineChannel::parse_webhook_events("not json"),
            Err(ChannelError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_reply_posts_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/reply"))
            .and(header("authorization", "Bearer line-token"))
            .and(body_partial_json(serde_json::json!({
                "replyToken": "r1",
                "messages": [{"type": "text", "text": "了解しました"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let config = LineConfig {
            channel_access_token: "line-token".into(),
            api_base: server.uri(),
            ..Default::default()
        };
        let line = LineChannel::new(Client::new(), &config);
        line.reply("r1", "了解しました").await.unwrap();
    }

    fn sent_text(server_requests: &[wiremock::Request]) -> String {
        let body: serde_json::Value = serde_json::from_slice(&server_requests[0].body).unwrap();
        body["messages"][0]["text"].as_str().unwrap().to_string()
    }

    async fn reply_and_capture(text: &str) -> String {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/reply"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let config = LineConfig {
            api_base: server.uri(),
            ..Default::default()
        };
        LineChannel::new(Client::new(), &config).reply("r1", text).await.unwrap();
        sent_text(&server.received_requests().await.unwrap())
    }

    #[tokio::test]
    async fn test_reply_keeps_long_japanese_under_char_limit() {
        // 3000 chars but 9000 bytes
        let text = "予".repeat(3000);
        assert_eq!(reply_and_capture(&text).await, text);
    }

    #[tokio::test]
    async fn test_reply_truncates_to_char_limit() {
        let sent = reply_and_capture(&"予".repeat(MAX_TEXT_LENGTH + 10)).await;
        assert_eq!(sent.chars().count(), MAX_TEXT_LENGTH);
        assert!(sent.ends_with('…'));
    }

    #[tokio::test]
    async fn test_reply_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Invalid reply token"))
            .mount(&server)
            .await;

        let config = LineConfig {
            api_base: server.uri(),
            ..Default::default()
        };
        let line = LineChannel::new(Client::new(), &config);
        assert!(matches!(line.reply("expired", "hi").await, Err(ChannelError::Send(_))));
    }
}
