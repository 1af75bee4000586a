//! AgentCore Identity data-plane client and the token plumbing around it.
//!
//! The calendar side asks for a Google access token through
//! [`AccessTokenSource`]. When the user has not granted consent yet, the
//! identity service answers with an authorization URL and a session URI
//! that the OAuth callback later completes.

pub mod bridge;
pub mod cognito;

#[cfg(feature = "aws")]
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::IdentityConfig;
use crate::error::IdentityError;
use crate::types::CallerIdentity;
#[cfg(feature = "aws")]
use crate::util::sigv4::SigV4Signer;

/// Result of asking for a resource OAuth2 token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOutcome {
    Token(String),
    AuthorizationRequired {
        authorization_url: String,
        session_uri: String,
    },
}

/// What a calendar call gets back when it asks for credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessToken {
    Granted(String),
    ConsentRequired { authorization_url: String },
}

/// Source of Google access tokens for a caller.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self, caller: &CallerIdentity) -> Result<AccessToken, IdentityError>;
}

/// Who completes a pending OAuth session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UserIdentifier {
    UserToken(String),
    UserId(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkloadTokenResponse {
    workload_access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OAuth2TokenResponse {
    access_token: Option<String>,
    authorization_url: Option<String>,
    session_uri: Option<String>,
}

/// HTTP client for the identity endpoints.
pub struct IdentityClient {
    http: Client,
    endpoint: String,
    workload_name: String,
    credential_provider_name: String,
    scopes: Vec<String>,
    callback_url: String,
    #[cfg(feature = "aws")]
    signer: Option<Arc<SigV4Signer>>,
}

impl IdentityClient {
    pub fn new(http: Client, config: &IdentityConfig) -> Self {
        Self {
            http,
            endpoint: config.endpoint_url().trim_end_matches('/').to_string(),
            workload_name: config.workload_name.clone(),
            credential_provider_name: config.credential_provider_name.clone(),
            scopes: config.scopes.clone(),
            callback_url: config.callback_url.clone(),
            #[cfg(feature = "aws")]
            signer: None,
        }
    }

    /// Sign every call with SigV4. The identity actions are IAM-authorized.
    #[cfg(feature = "aws")]
    pub fn with_signer(mut self, signer: Arc<SigV4Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    async fn send(&self, path: &str, body: serde_json::Value) -> Result<String, IdentityError> {
        let url = format!("{}{}", self.endpoint, path);
        debug!("Identity request to {}", url);

        #[allow(unused_mut)]
        let mut request = self.http.post(&url).json(&body).build()?;
        #[cfg(feature = "aws")]
        if let Some(signer) = &self.signer {
            signer.sign(&mut request).await?;
        }

        let resp = self.http.execute(request).await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Api {
                status: status.as_u16(),
                message: text,
            });
        }
        Ok(resp.text().await?)
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, IdentityError> {
        let text = self.send(path, body).await?;
        serde_json::from_str(&text).map_err(|e| IdentityError::Parse(e.to_string()))
    }

    /// Workload token for a caller authenticated with a user JWT.
    pub async fn workload_token_for_jwt(&self, user_token: &str) -> Result<String, IdentityError> {
        let resp: WorkloadTokenResponse = self
            .post(
                "/identities/GetWorkloadAccessTokenForJWT",
                serde_json::json!({
                    "workloadName": self.workload_name,
                    "userToken": user_token,
                }),
            )
            .await?;
        Ok(resp.workload_access_token)
    }

    /// Workload token for a caller known only by user id.
    pub async fn workload_token_for_user_id(&self, user_id: &str) -> Result<String, IdentityError> {
        let resp: WorkloadTokenResponse = self
            .post(
                "/identities/GetWorkloadAccessTokenForUserId",
                serde_json::json!({
                    "workloadName": self.workload_name,
                    "userId": user_id,
                }),
            )
            .await?;
        Ok(resp.workload_access_token)
    }

    /// Ask for the user's OAuth2 token with the user-federation flow.
    pub async fn resource_oauth2_token(&self, workload_token: &str) -> Result<TokenOutcome, IdentityError> {
        let mut body = serde_json::json!({
            "resourceCredentialProviderName": self.credential_provider_name,
            "scopes": self.scopes,
            "oauth2Flow": "USER_FEDERATION",
            "workloadIdentityToken": workload_token,
        });
        if !self.callback_url.is_empty() {
            body["resourceOauth2ReturnUrl"] = serde_json::json!(self.callback_url);
        }

        let resp: OAuth2TokenResponse = self.post("/identities/oauth2/token", body).await?;
        match resp {
            OAuth2TokenResponse {
                access_token: Some(token),
                ..
            } => Ok(TokenOutcome::Token(token)),
            OAuth2TokenResponse {
                authorization_url: Some(authorization_url),
                session_uri: Some(session_uri),
                ..
            } => Ok(TokenOutcome::AuthorizationRequired {
                authorization_url,
                session_uri,
            }),
            _ => Err(IdentityError::Parse(
                "neither accessToken nor authorizationUrl with sessionUri".to_string(),
            )),
        }
    }

    /// Finish a consent flow the user completed in the browser.
    pub async fn complete_resource_token_auth(
        &self,
        session_uri: &str,
        user: &UserIdentifier,
    ) -> Result<(), IdentityError> {
        self.send(
            "/identities/CompleteResourceTokenAuth",
            serde_json::json!({
                "sessionUri": session_uri,
                "userIdentifier": user,
            }),
        )
        .await?;
        Ok(())
    }
}
