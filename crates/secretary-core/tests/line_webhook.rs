#![cfg(feature = "http-api")]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use secretary_core::agent::FALLBACK_ERROR;
use secretary_core::channel::line::LineChannel;
use secretary_core::config::{IdentityConfig, LineConfig, RuntimeConfig};
use secretary_core::identity::bridge::IdentityBridge;
use secretary_core::identity::cognito::StaticTokenIssuer;
use secretary_core::identity::IdentityClient;
use secretary_core::runtime::{session_id_for, RuntimeClient, SESSION_HEADER};
use secretary_core::service::http::{create_webhook_router, WebhookState};
use secretary_core::session::MemorySessionStore;

const SECRET: &str = "line-channel-secret";

fn sign(secret: &str, body: &str) -> String {
    let mut mac = Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

fn text_event(user_id: &str, text: &str) -> String {
    json!({
        "destination": "Ubot",
        "events": [{
            "type": "message",
            "replyToken": "reply-1",
            "source": {"type": "user", "userId": user_id},
            "message": {"id": "m1", "type": "text", "text": text},
            "timestamp": 1700000000000u64
        }]
    })
    .to_string()
}

fn router(server: &MockServer, allow_from: Vec<String>) -> axum::Router {
    let line = LineChannel::new(
        Client::new(),
        &LineConfig {
            channel_access_token: "line-token".into(),
            api_base: server.uri(),
            ..Default::default()
        },
    );
    let runtime = RuntimeClient::new(
        Client::new(),
        &RuntimeConfig {
            agent_runtime_arn: "arn:aws:bedrock-agentcore:ap-northeast-1:123456789012:runtime/secretary".into(),
            endpoint: Some(server.uri()),
            ..Default::default()
        },
    )
    .unwrap();
    let identity = IdentityClient::new(
        Client::new(),
        &IdentityConfig {
            endpoint: Some(server.uri()),
            ..Default::default()
        },
    );

    create_webhook_router(Arc::new(WebhookState {
        channel_secret: SECRET.into(),
        allow_from,
        line,
        tokens: Arc::new(StaticTokenIssuer::new("user-jwt")),
        runtime,
        identity: Arc::new(IdentityBridge::new(
            identity,
            Arc::new(MemorySessionStore::new()),
            600,
        )),
    }))
}

fn webhook_request(body: String, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header("x-line-signature", sig);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn mount_runtime(server: &MockServer, expected_calls: u64, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/runtimes/.+/invocations$"))
        .respond_with(response)
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn wrong_secret_is_rejected_without_downstream_calls() {
    let server = MockServer::start().await;
    mount_runtime(&server, 0, ResponseTemplate::new(200)).await;
    Mock::given(method("POST"))
        .and(path("/v2/bot/message/reply"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let body = text_event("U1", "明日の予定は？");
    let resp = router(&server, vec![])
        .oneshot(webhook_request(body.clone(), Some(sign("other-secret", &body))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_signature_is_rejected() {
    let server = MockServer::start().await;
    mount_runtime(&server, 0, ResponseTemplate::new(200)).await;

    let resp = router(&server, vec![])
        .oneshot(webhook_request(text_event("U1", "hi"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn text_message_is_answered_through_the_runtime() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/runtimes/.+/invocations$"))
        .and(header("authorization", "Bearer user-jwt"))
        .and(header(SESSION_HEADER, session_id_for("U1").as_str()))
        .and(body_partial_json(json!({"prompt": "明日の予定は？", "user_id": "U1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "明日は会議が1件です。"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/bot/message/reply"))
        .and(body_partial_json(json!({
            "replyToken": "reply-1",
            "messages": [{"type": "text", "text": "明日は会議が1件です。"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let body = text_event("U1", "明日の予定は？");
    let resp = router(&server, vec![])
        .oneshot(webhook_request(body.clone(), Some(sign(SECRET, &body))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn runtime_failure_replies_with_apology() {
    let server = MockServer::start().await;
    mount_runtime(&server, 1, ResponseTemplate::new(500).set_body_string("boom")).await;
    Mock::given(method("POST"))
        .and(path("/v2/bot/message/reply"))
        .and(body_partial_json(json!({"messages": [{"type": "text", "text": FALLBACK_ERROR}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let body = text_event("U1", "hi");
    let resp = router(&server, vec![])
        .oneshot(webhook_request(body.clone(), Some(sign(SECRET, &body))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn sender_outside_allow_list_is_ignored() {
    let server = MockServer::start().await;
    mount_runtime(&server, 0, ResponseTemplate::new(200)).await;

    let body = text_event("U-stranger", "hi");
    let resp = router(&server, vec!["U1".into()])
        .oneshot(webhook_request(body.clone(), Some(sign(SECRET, &body))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn reply_failure_is_a_server_error() {
    let server = MockServer::start().await;
    mount_runtime(
        &server,
        1,
        ResponseTemplate::new(200).set_body_json(json!({"response": "ok"})),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/v2/bot/message/reply"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Invalid reply token"))
        .mount(&server)
        .await;

    let body = text_event("U1", "hi");
    let resp = router(&server, vec![])
        .oneshot(webhook_request(body.clone(), Some(sign(SECRET, &body))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn malformed_body_is_a_server_error() {
    let server = MockServer::start().await;
    let body = "not json".to_string();
    let resp = router(&server, vec![])
        .oneshot(webhook_request(body.clone(), Some(sign(SECRET, &body))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
