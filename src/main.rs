use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use secretary_core::agent::AgentLoop;
use secretary_core::channel::line::LineChannel;
use secretary_core::config::{self, Config};
use secretary_core::gateway::GatewayClient;
use secretary_core::identity::bridge::IdentityBridge;
use secretary_core::identity::cognito::{StaticTokenIssuer, UserTokenIssuer};
use secretary_core::identity::IdentityClient;
use secretary_core::provider::anthropic::AnthropicProvider;
use secretary_core::runtime::RuntimeClient;
use secretary_core::service::http::{
    create_runtime_router, create_webhook_router, serve, RuntimeState, WebhookState,
};
use secretary_core::session::OAuthSessionStore;
use secretary_core::util::http::build_client;

#[derive(Parser)]
#[command(
    name = "line-secretary",
    about = "LINE calendar secretary",
    version = secretary_core::VERSION,
)]
struct Cli {
    /// Config file (defaults to ~/.line-secretary/config.json)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the agent runtime (/ping, /invocations)
    Runtime {
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },
    /// Serve the LINE webhook and OAuth callback
    Webhook {
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("line_secretary=info".parse()?)
                .add_directive("secretary_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => config::load_config(Some(path.as_path())),
        None => config::load_config_from_env(),
    };

    match cli.command {
        Commands::Runtime { port, host } => run_runtime(cfg, &format!("{host}:{port}")).await,
        Commands::Webhook { port, host } => run_webhook(cfg, &format!("{host}:{port}")).await,
    }
}

async fn run_runtime(cfg: Config, addr: &str) -> Result<()> {
    let provider = AnthropicProvider::new(
        build_client(Duration::from_secs(cfg.model.timeout_secs))?,
        cfg.model.api_key.clone(),
        cfg.model.api_base.clone(),
        cfg.model.model.clone(),
    );
    let gateway = GatewayClient::new(
        build_client(Duration::from_secs(cfg.gateway.timeout_secs))?,
        &cfg.gateway,
    )
    .context("gateway.url (AGENTCORE_GATEWAY_URL) must be set")?;
    #[cfg(feature = "aws")]
    let gateway = gateway.with_signer(signer(&cfg.runtime.region).await?);

    let agent = AgentLoop::new(
        Arc::new(provider),
        Arc::new(gateway),
        &cfg.model,
        &cfg.calendar.time_zone,
    );

    info!("Starting agent runtime v{}", secretary_core::VERSION);
    Ok(serve(addr, create_runtime_router(Arc::new(RuntimeState { agent }))).await?)
}

async fn run_webhook(cfg: Config, addr: &str) -> Result<()> {
    let (sessions, tokens) = backends(&cfg).await?;

    let line = LineChannel::new(build_client(Duration::from_secs(10))?, &cfg.line);
    let runtime = RuntimeClient::new(
        build_client(Duration::from_secs(cfg.runtime.timeout_secs))?,
        &cfg.runtime,
    )
    .context("runtime.agentRuntimeArn (AGENT_RUNTIME_ARN) must be set")?;
    let identity = IdentityClient::new(
        build_client(Duration::from_secs(cfg.identity.timeout_secs))?,
        &cfg.identity,
    );
    #[cfg(feature = "aws")]
    let identity = identity.with_signer(signer(&cfg.identity.region).await?);

    let state = Arc::new(WebhookState {
        channel_secret: cfg.line.channel_secret.clone(),
        allow_from: cfg.line.allow_from.clone(),
        line,
        tokens,
        runtime,
        identity: Arc::new(IdentityBridge::new(identity, sessions, cfg.oauth_sessions.ttl_secs)),
    });

    info!("Starting LINE webhook v{}", secretary_core::VERSION);
    Ok(serve(addr, create_webhook_router(state)).await?)
}

/// SigV4 signer for the IAM-authorized gateway and identity endpoints.
#[cfg(feature = "aws")]
async fn signer(region: &str) -> Result<Arc<secretary_core::util::sigv4::SigV4Signer>> {
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let credentials = aws_config
        .credentials_provider()
        .context("no AWS credentials provider configured")?;
    Ok(Arc::new(secretary_core::util::sigv4::SigV4Signer::new(credentials, region)))
}

type Backends = (Arc<dyn OAuthSessionStore>, Arc<dyn UserTokenIssuer>);

/// DynamoDB and Cognito when built with `aws`, unless a static token is configured.
#[cfg(feature = "aws")]
async fn backends(cfg: &Config) -> Result<Backends> {
    use secretary_core::identity::cognito::CognitoTokenIssuer;
    use secretary_core::session::dynamo_store::DynamoSessionStore;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let sessions: Arc<dyn OAuthSessionStore> = Arc::new(DynamoSessionStore::new(
        aws_sdk_dynamodb::Client::new(&aws_config),
        cfg.oauth_sessions.table_name.clone(),
    ));
    let tokens: Arc<dyn UserTokenIssuer> = match &cfg.cognito.static_token {
        Some(token) => Arc::new(StaticTokenIssuer::new(token.clone())),
        None => Arc::new(CognitoTokenIssuer::new(
            aws_sdk_cognitoidentityprovider::Client::new(&aws_config),
            &cfg.cognito,
        )),
    };
    Ok((sessions, tokens))
}

/// In-memory sessions and a static token for local runs.
#[cfg(not(feature = "aws"))]
async fn backends(cfg: &Config) -> Result<Backends> {
    use secretary_core::session::MemorySessionStore;

    let token = cfg
        .cognito
        .static_token
        .clone()
        .context("cognito.staticToken (SECRETARY_STATIC_TOKEN) must be set without the aws feature")?;
    let sessions: Arc<dyn OAuthSessionStore> = Arc::new(MemorySessionStore::new());
    let tokens: Arc<dyn UserTokenIssuer> = Arc::new(StaticTokenIssuer::new(token));
    Ok((sessions, tokens))
}
