use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::agent::{AgentLoop, FALLBACK_ERROR};
use crate::calendar::DEFAULT_USER_ID;
use crate::error::SecretaryError;
use crate::channel::is_allowed;
use crate::channel::line::{LineChannel, TextMessage};
use crate::identity::bridge::IdentityBridge;
use crate::identity::cognito::UserTokenIssuer;
use crate::runtime::RuntimeClient;
use crate::service::pages;
use crate::types::{CallerIdentity, InvocationRequest, InvocationResponse};

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// GET /health: Health check
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
    })
}

// ====== Runtime surface ======

/// Shared state of the agent runtime server.
pub struct RuntimeState {
    pub agent: AgentLoop,
}

pub fn create_runtime_router(state: Arc<RuntimeState>) -> Router {
    Router::new()
        .route("/ping", get(handle_ping))
        .route("/health", get(handle_health))
        .route("/invocations", post(handle_invocations))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /ping: liveness check of the runtime host
async fn handle_ping() -> impl IntoResponse {
    Json(serde_json::json!({"status": "Healthy"}))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// POST /invocations: run the agent for one prompt
async fn handle_invocations(
    State(state): State<Arc<RuntimeState>>,
    headers: HeaderMap,
    Json(req): Json<InvocationRequest>,
) -> impl IntoResponse {
    let user_id = req.user_id.unwrap_or_else(|| DEFAULT_USER_ID.to_string());
    info!(
        "Invocation for user {}: {} chars",
        user_id,
        req.prompt.chars().count()
    );

    let caller = CallerIdentity::new(user_id.clone(), bearer_token(&headers));
    let response = state.agent.respond(&req.prompt, &caller).await;

    let mut metadata = serde_json::Map::new();
    metadata.insert("user_id".to_string(), serde_json::json!(user_id));
    Json(InvocationResponse {
        response,
        metadata: Some(metadata),
    })
}

// ====== Webhook surface ======

/// Shared state of the LINE webhook and OAuth callback server.
pub struct WebhookState {
    pub channel_secret: String,
    pub allow_from: Vec<String>,
    pub line: LineChannel,
    pub tokens: Arc<dyn UserTokenIssuer>,
    pub runtime: RuntimeClient,
    pub identity: Arc<IdentityBridge>,
}

impl WebhookState {
    /// Ask the runtime on behalf of the sender. Failures become the apology.
    async fn answer(&self, msg: &TextMessage) -> String {
        let token = match self.tokens.issue(&msg.user_id).await {
            Ok(token) => token,
            Err(e) => {
                error!("Failed to issue token for {}: {}", msg.user_id, e);
                return FALLBACK_ERROR.to_string();
            }
        };

        match self.runtime.invoke(&msg.text, &msg.user_id, &token).await {
            Ok(text) => text,
            Err(e) => {
                error!("Error invoking agent runtime: {}", e);
                FALLBACK_ERROR.to_string()
            }
        }
    }
}

pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/webhook", post(handle_line_webhook))
        .route("/webhooks/line", post(handle_line_webhook))
        .route("/oauth/callback", get(handle_oauth_callback))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /webhook: LINE Messaging API webhook
async fn handle_line_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    info!("LINE webhook received: {} bytes", body.len());

    let Some(signature) = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok())
    else {
        warn!("Missing x-line-signature header");
        return StatusCode::BAD_REQUEST;
    };

    if !LineChannel::verify_signature(&state.channel_secret, &body, signature) {
        warn!("Invalid LINE signature");
        return StatusCode::BAD_REQUEST;
    }

    let events = match std::str::from_utf8(&body)
        .map_err(|e| e.to_string())
        .and_then(|s| LineChannel::parse_webhook_events(s).map_err(|e| e.to_string()))
    {
        Ok(events) => events,
        Err(e) => {
            error!("Failed to parse LINE webhook: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    for event in &events {
        let Some(msg) = event.text_message() else {
            debug!("Ignoring LINE event: {}", event.event_type);
            continue;
        };
        if !is_allowed(&msg.user_id, &state.allow_from) {
            warn!("LINE user {} is not in the allow list", msg.user_id);
            continue;
        }

        let reply = state.answer(&msg).await;
        if let Err(e) = state.line.reply(&msg.reply_token, &reply).await {
            error!("Failed to reply to LINE: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    }

    StatusCode::OK
}

#[derive(Deserialize)]
struct CallbackQuery {
    session_id: Option<String>,
}

/// GET /oauth/callback: completes a pending consent flow
async fn handle_oauth_callback(
    State(state): State<Arc<WebhookState>>,
    Query(query): Query<CallbackQuery>,
) -> (StatusCode, Html<String>) {
    let Some(session_id) = query.session_id.filter(|s| !s.is_empty()) else {
        return (StatusCode::BAD_REQUEST, Html(pages::missing_session_page()));
    };

    match state.identity.complete_session(&session_id).await {
        Ok(Some(_)) => (StatusCode::OK, Html(pages::success_page())),
        Ok(None) => {
            warn!("OAuth session not found: {}", session_id);
            (StatusCode::NOT_FOUND, Html(pages::not_found_page()))
        }
        Err(e) => {
            error!("Failed to complete OAuth session {}: {}", session_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(pages::error_page(&e.to_string())),
            )
        }
    }
}

/// Start the HTTP server on the given address.
pub async fn serve(addr: &str, router: Router) -> Result<(), SecretaryError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}
