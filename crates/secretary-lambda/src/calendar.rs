//! Calendar target invoked by the tool gateway.
//!
//! Accepts either `{operation, parameters}` or, when the gateway calls the
//! function directly, the bare tool arguments with the tool name carried in
//! the client context.

use std::sync::Arc;
use std::time::Duration;

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::{info, warn};

use secretary_core::calendar::google::GoogleCalendarClient;
use secretary_core::calendar::{CalendarRequest, CalendarService};
use secretary_core::config;
use secretary_core::identity::bridge::IdentityBridge;
use secretary_core::identity::IdentityClient;
use secretary_core::session::dynamo_store::DynamoSessionStore;
use secretary_core::util::http::build_client;
use secretary_core::util::sigv4::SigV4Signer;

/// Client-context key holding the gateway-qualified tool name.
const TOOL_NAME_KEY: &str = "bedrockAgentCoreToolName";

fn to_request(event: LambdaEvent<Value>) -> Result<CalendarRequest, serde_json::Error> {
    let (payload, context) = event.into_parts();
    if payload.get("operation").is_some() {
        return serde_json::from_value(payload);
    }

    let operation = context
        .client_context
        .as_ref()
        .and_then(|c| c.custom.get(TOOL_NAME_KEY).cloned())
        .unwrap_or_default();
    Ok(CalendarRequest {
        operation,
        parameters: match payload {
            Value::Object(map) => map,
            _ => Default::default(),
        },
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("calendar=info".parse()?)
                .add_directive("secretary_core=info".parse()?),
        )
        .with_ansi(false)
        .init();

    info!("Calendar Lambda starting...");

    let cfg = config::load_config_from_env();

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let credentials = aws_config
        .credentials_provider()
        .ok_or("no AWS credentials provider configured")?;
    let sessions = Arc::new(DynamoSessionStore::new(
        aws_sdk_dynamodb::Client::new(&aws_config),
        cfg.oauth_sessions.table_name.clone(),
    ));
    let identity = IdentityClient::new(
        build_client(Duration::from_secs(cfg.identity.timeout_secs))?,
        &cfg.identity,
    )
    .with_signer(Arc::new(SigV4Signer::new(credentials, cfg.identity.region.clone())));
    let bridge = Arc::new(IdentityBridge::new(identity, sessions, cfg.oauth_sessions.ttl_secs));

    let calendar = GoogleCalendarClient::new(
        build_client(Duration::from_secs(cfg.calendar.timeout_secs))?,
        &cfg.calendar,
    );
    let service = Arc::new(CalendarService::new(calendar, bridge, &cfg.calendar));

    run(service_fn(move |event: LambdaEvent<Value>| {
        let service = service.clone();
        async move {
            let request = match to_request(event) {
                Ok(request) => request,
                Err(e) => {
                    warn!("Malformed calendar event: {}", e);
                    return Ok::<Value, Error>(serde_json::json!({
                        "success": false,
                        "error": format!("Invalid event: {e}"),
                    }));
                }
            };
            Ok(service.handle(request).await)
        }
    }))
    .await
}
