/// Core error types for the secretary.
#[derive(Debug, thiserror::Error)]
pub enum SecretaryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("No API key configured for provider")]
    NoApiKey,
}

/// Transport-level gateway failures. HTTP status errors are not
/// represented here; they come back as `{success:false}` tool results.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway URL not configured")]
    NotConfigured,

    #[cfg(feature = "aws")]
    #[error("Request signing failed: {0}")]
    Signing(#[from] SigningError),
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Identity API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected identity response: {0}")]
    Parse(String),

    #[error("Cognito error: {0}")]
    Cognito(String),

    #[error("User not provisioned: {0}")]
    UnknownUser(String),

    #[error("Session store error: {0}")]
    Session(#[from] SessionError),

    #[cfg(feature = "aws")]
    #[error("Request signing failed: {0}")]
    Signing(#[from] SigningError),
}

/// SigV4 signing of a request for an IAM-authorized AWS endpoint.
#[cfg(feature = "aws")]
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("No AWS credentials: {0}")]
    Credentials(String),

    #[error("{0}")]
    Sign(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Google Calendar API error: {status} - {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Malformed webhook body: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Send error: {0}")]
    Send(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to read session: {0}")]
    Read(String),

    #[error("Failed to write session: {0}")]
    Write(String),

    #[error("Invalid session record: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Runtime returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Runtime ARN not configured")]
    NotConfigured,
}

/// Why a single agent invocation did not produce a model answer.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Model invocation failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool execution failed: {0}")]
    Tool(#[from] GatewayError),

    #[error("Iteration limit of {0} reached")]
    IterationLimit(u32),

    #[error("Model finished without text")]
    EmptyResponse,

    #[error("Unexpected stop reason: {0}")]
    UnexpectedStop(String),
}
