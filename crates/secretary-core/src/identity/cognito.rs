//! Per-user JWTs for the runtime.
//!
//! The webhook authenticates each LINE user to the hosted runtime with a
//! Cognito access token. Users must already exist in the pool as
//! `line_<LINE user id>`.

use async_trait::async_trait;

use crate::error::IdentityError;

/// Issues a bearer token for a LINE user.
#[async_trait]
pub trait UserTokenIssuer: Send + Sync {
    async fn issue(&self, line_user_id: &str) -> Result<String, IdentityError>;
}

/// Cognito username for a LINE user.
pub fn cognito_username(line_user_id: &str) -> String {
    format!("line_{line_user_id}")
}

/// Hands out one configured token to everyone. Local development only.
pub struct StaticTokenIssuer {
    token: String,
}

impl StaticTokenIssuer {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl UserTokenIssuer for StaticTokenIssuer {
    async fn issue(&self, _line_user_id: &str) -> Result<String, IdentityError> {
        Ok(self.token.clone())
    }
}

/// Random password that satisfies the default Cognito policy.
#[cfg(feature = "aws")]
fn generate_password() -> String {
    use rand::Rng;

    const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    const DIGITS: &[u8] = b"0123456789";
    const SYMBOLS: &[u8] = b"!@#$%^&*";

    let mut rng = rand::thread_rng();
    let mut pick = |set: &[u8]| set[rng.gen_range(0..set.len())] as char;

    let mut password: String = [LOWER, UPPER, DIGITS, SYMBOLS].iter().map(|set| pick(*set)).collect();
    let all: Vec<u8> = [LOWER, UPPER, DIGITS, SYMBOLS].concat();
    while password.len() < 32 {
        password.push(pick(&all));
    }
    password
}

#[cfg(feature = "aws")]
pub use self::aws::{secret_hash, CognitoTokenIssuer};

#[cfg(feature = "aws")]
mod aws {
    use async_trait::async_trait;
    use aws_sdk_cognitoidentityprovider::error::DisplayErrorContext;
    use aws_sdk_cognitoidentityprovider::types::AuthFlowType;
    use aws_sdk_cognitoidentityprovider::Client;
    use base64::Engine;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    use tracing::{error, info};

    use super::{cognito_username, generate_password, UserTokenIssuer};
    use crate::config::CognitoConfig;
    use crate::error::IdentityError;

    /// `base64(HMAC-SHA256(client_secret, username + client_id))`.
    pub fn secret_hash(client_secret: &str, username: &str, client_id: &str) -> Result<String, IdentityError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(client_secret.as_bytes())
            .map_err(|e| IdentityError::Cognito(e.to_string()))?;
        mac.update(username.as_bytes());
        mac.update(client_id.as_bytes());
        Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Issues tokens with a password reset plus `ADMIN_NO_SRP_AUTH`.
    pub struct CognitoTokenIssuer {
        client: Client,
        user_pool_id: String,
        client_id: String,
        client_secret: Option<String>,
    }

    impl CognitoTokenIssuer {
        pub fn new(client: Client, config: &CognitoConfig) -> Self {
            Self {
                client,
                user_pool_id: config.user_pool_id.clone(),
                client_id: config.app_client_id.clone(),
                client_secret: (!config.app_client_secret.is_empty())
                    .then(|| config.app_client_secret.clone()),
            }
        }
    }

    #[async_trait]
    impl UserTokenIssuer for CognitoTokenIssuer {
        async fn issue(&self, line_user_id: &str) -> Result<String, IdentityError> {
            let username = cognito_username(line_user_id);
            let password = generate_password();

            self.client
                .admin_set_user_password()
                .user_pool_id(&self.user_pool_id)
                .username(&username)
                .password(&password)
                .permanent(true)
                .send()
                .await
                .map_err(|e| {
                    if e.as_service_error().is_some_and(|se| se.is_user_not_found_exception()) {
                        return IdentityError::UnknownUser(username.clone());
                    }
                    error!("Cognito admin_set_user_password failed: {}", DisplayErrorContext(&e));
                    IdentityError::Cognito(DisplayErrorContext(&e).to_string())
                })?;

            let mut request = self
                .client
                .admin_initiate_auth()
                .user_pool_id(&self.user_pool_id)
                .client_id(&self.client_id)
                .auth_flow(AuthFlowType::AdminNoSrpAuth)
                .auth_parameters("USERNAME", &username)
                .auth_parameters("PASSWORD", &password);
            if let Some(secret) = &self.client_secret {
                request = request.auth_parameters("SECRET_HASH", secret_hash(secret, &username, &self.client_id)?);
            }

            let output = request.send().await.map_err(|e| {
                error!("Cognito admin_initiate_auth failed: {}", DisplayErrorContext(&e));
                IdentityError::Cognito(DisplayErrorContext(&e).to_string())
            })?;

            let token = output
                .authentication_result()
                .and_then(|r| r.access_token())
                .ok_or_else(|| IdentityError::Cognito("no access token in auth result".to_string()))?;

            info!("Issued JWT for {}", username);
            Ok(token.to_string())
        }
    }
}
