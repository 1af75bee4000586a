use std::sync::Arc;
use std::time::Duration;

use lambda_http::{run, Error};
use tracing::info;

use secretary_core::channel::line::LineChannel;
use secretary_core::config;
use secretary_core::identity::bridge::IdentityBridge;
use secretary_core::identity::cognito::{CognitoTokenIssuer, StaticTokenIssuer, UserTokenIssuer};
use secretary_core::identity::IdentityClient;
use secretary_core::runtime::RuntimeClient;
use secretary_core::service::http::{create_webhook_router, WebhookState};
use secretary_core::session::dynamo_store::DynamoSessionStore;
use secretary_core::util::http::build_client;
use secretary_core::util::sigv4::SigV4Signer;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bootstrap=info".parse()?)
                .add_directive("secretary_core=info".parse()?),
        )
        .with_ansi(false)
        .init();

    info!("LINE webhook Lambda starting...");

    let cfg = config::load_config_from_env();

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let credentials = aws_config
        .credentials_provider()
        .ok_or("no AWS credentials provider configured")?;
    let dynamo_client = aws_sdk_dynamodb::Client::new(&aws_config);
    let sessions = Arc::new(DynamoSessionStore::new(
        dynamo_client,
        cfg.oauth_sessions.table_name.clone(),
    ));

    let tokens: Arc<dyn UserTokenIssuer> = match &cfg.cognito.static_token {
        Some(token) => {
            info!("Using static bearer token for all users");
            Arc::new(StaticTokenIssuer::new(token.clone()))
        }
        None => Arc::new(CognitoTokenIssuer::new(
            aws_sdk_cognitoidentityprovider::Client::new(&aws_config),
            &cfg.cognito,
        )),
    };

    let line = LineChannel::new(build_client(Duration::from_secs(10))?, &cfg.line);
    let runtime = RuntimeClient::new(
        build_client(Duration::from_secs(cfg.runtime.timeout_secs))?,
        &cfg.runtime,
    )?;
    let identity = IdentityClient::new(
        build_client(Duration::from_secs(cfg.identity.timeout_secs))?,
        &cfg.identity,
    )
    .with_signer(Arc::new(SigV4Signer::new(credentials, cfg.identity.region.clone())));

    let state = Arc::new(WebhookState {
        channel_secret: cfg.line.channel_secret.clone(),
        allow_from: cfg.line.allow_from.clone(),
        line,
        tokens,
        runtime,
        identity: Arc::new(IdentityBridge::new(
            identity,
            sessions,
            cfg.oauth_sessions.ttl_secs,
        )),
    });

    let router = create_webhook_router(state);

    run(router).await?;

    Ok(())
}
