use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Root configuration for the secretary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[derive(Default)]
pub struct Config {
    pub line: LineConfig,
    pub model: ModelConfig,
    pub gateway: GatewayConfig,
    pub runtime: RuntimeConfig,
    pub identity: IdentityConfig,
    pub cognito: CognitoConfig,
    pub oauth_sessions: OAuthSessionConfig,
    pub calendar: CalendarConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineConfig {
    pub channel_secret: String,
    pub channel_access_token: String,
    pub allow_from: Vec<String>,
    pub api_base: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_secret: String::new(),
            channel_access_token: String::new(),
            allow_from: Vec::new(),
            api_base: "https://api.line.me".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    pub api_key: String,
    pub api_base: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub max_iterations: u32,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 4096,
            temperature: 0.3,
            max_iterations: 10,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    /// MCP endpoint of the tool gateway.
    pub url: String,
    /// Target name the gateway prefixes tool names with.
    pub target_name: String,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            target_name: "calendar".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    pub agent_runtime_arn: String,
    pub region: String,
    /// Overrides the regional data-plane endpoint.
    pub endpoint: Option<String>,
    pub qualifier: String,
    pub port: u16,
    pub timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            agent_runtime_arn: String::new(),
            region: "ap-northeast-1".to_string(),
            endpoint: None,
            qualifier: "DEFAULT".to_string(),
            port: 8080,
            timeout_secs: 120,
        }
    }
}

impl RuntimeConfig {
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-agentcore.{}.amazonaws.com", self.region))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityConfig {
    pub region: String,
    pub endpoint: Option<String>,
    pub workload_name: String,
    pub credential_provider_name: String,
    pub scopes: Vec<String>,
    /// Where the provider redirects after consent (our OAuth callback).
    pub callback_url: String,
    pub timeout_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            region: "ap-northeast-1".to_string(),
            endpoint: None,
            workload_name: "line-agent-secretary".to_string(),
            credential_provider_name: "google-calendar-provider".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/calendar".to_string()],
            callback_url: String::new(),
            timeout_secs: 15,
        }
    }
}

impl IdentityConfig {
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-agentcore.{}.amazonaws.com", self.region))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[derive(Default)]
pub struct CognitoConfig {
    pub user_pool_id: String,
    pub app_client_id: String,
    pub app_client_secret: String,
    /// Fixed bearer token used instead of Cognito (local development).
    pub static_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OAuthSessionConfig {
    pub table_name: String,
    pub ttl_secs: i64,
}

impl Default for OAuthSessionConfig {
    fn default() -> Self {
        Self {
            table_name: "line-agent-oauth-sessions".to_string(),
            ttl_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalendarConfig {
    pub api_base: String,
    pub calendar_id: String,
    pub time_zone: String,
    pub default_max_results: u32,
    pub timeout_secs: u64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/calendar/v3".to_string(),
            calendar_id: "primary".to_string(),
            time_zone: "Asia/Tokyo".to_string(),
            default_max_results: 10,
            timeout_secs: 20,
        }
    }
}

// ====== Config loading/saving ======

/// Load configuration from environment variables.
///
/// Priority:
/// 1. `SECRETARY_CONFIG` env var: full JSON config
/// 2. Individual env vars (merged on top of the file config)
/// 3. File fallback (`~/.line-secretary/config.json`)
pub fn load_config_from_env() -> Config {
    // 1. Full JSON from SECRETARY_CONFIG
    if let Ok(json) = std::env::var("SECRETARY_CONFIG") {
        match serde_json::from_str::<Config>(&json) {
            Ok(config) => return config,
            Err(e) => {
                tracing::warn!("Failed to parse SECRETARY_CONFIG: {}", e);
            }
        }
    }

    // 2. Start with file fallback, then overlay individual env vars
    let mut cfg = load_config(None);

    // LINE
    if let Ok(v) = std::env::var("LINE_CHANNEL_SECRET") {
        cfg.line.channel_secret = v;
    }
    if let Ok(v) = std::env::var("LINE_CHANNEL_ACCESS_TOKEN") {
        cfg.line.channel_access_token = v;
    }
    if let Ok(v) = std::env::var("LINE_ALLOW_FROM") {
        cfg.line.allow_from = split_list(&v);
    }

    // Model
    if let Ok(v) = std::env::var("ANTHROPIC_API_KEY") {
        cfg.model.api_key = v;
    }
    if let Ok(v) = std::env::var("ANTHROPIC_API_BASE") {
        cfg.model.api_base = Some(v);
    }
    if let Ok(v) = std::env::var("SECRETARY_MODEL") {
        cfg.model.model = v;
    }

    // Gateway
    if let Ok(v) = std::env::var("AGENTCORE_GATEWAY_URL") {
        cfg.gateway.url = v;
    }
    if let Ok(v) = std::env::var("GATEWAY_TARGET_NAME") {
        cfg.gateway.target_name = v;
    }

    // Runtime + identity share the region
    if let Ok(v) = std::env::var("AWS_REGION") {
        cfg.runtime.region = v.clone();
        cfg.identity.region = v;
    }
    if let Ok(v) = std::env::var("AGENT_RUNTIME_ARN") {
        cfg.runtime.agent_runtime_arn = v;
    }
    if let Ok(v) = std::env::var("WORKLOAD_NAME") {
        cfg.identity.workload_name = v;
    }
    if let Ok(v) = std::env::var("CREDENTIAL_PROVIDER_NAME") {
        cfg.identity.credential_provider_name = v;
    }
    if let Ok(v) = std::env::var("OAUTH_CALLBACK_URL") {
        cfg.identity.callback_url = v;
    }

    // Cognito
    if let Ok(v) = std::env::var("COGNITO_USER_POOL_ID") {
        cfg.cognito.user_pool_id = v;
    }
    if let Ok(v) = std::env::var("COGNITO_APP_CLIENT_ID") {
        cfg.cognito.app_client_id = v;
    }
    if let Ok(v) = std::env::var("COGNITO_APP_CLIENT_SECRET") {
        cfg.cognito.app_client_secret = v;
    }
    if let Ok(v) = std::env::var("SECRETARY_STATIC_TOKEN") {
        cfg.cognito.static_token = Some(v).filter(|t| !t.is_empty());
    }

    // Session table + calendar
    if let Ok(v) = std::env::var("OAUTH_SESSION_TABLE_NAME") {
        cfg.oauth_sessions.table_name = v;
    }
    if let Ok(v) = std::env::var("CALENDAR_TIME_ZONE") {
        cfg.calendar.time_zone = v;
    }

    cfg
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Get the default configuration file path.
pub fn get_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".line-secretary")
        .join("config.json")
}

/// Load configuration from file or create default.
pub fn load_config(config_path: Option<&Path>) -> Config {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if path.exists() {
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Config>(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse config from {}: {}", path.display(), e);
                    tracing::warn!("Using default configuration.");
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config from {}: {}", path.display(), e);
                tracing::warn!("Using default configuration.");
            }
        }
    }

    Config::default()
}

/// Save configuration to file.
pub fn save_config(config: &Config, config_path: Option<&Path>) -> std::result::Result<(), ConfigError> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    }

    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    Ok(())
}
