use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{AccessToken, AccessTokenSource, IdentityClient, TokenOutcome, UserIdentifier};
use crate::error::IdentityError;
use crate::session::{OAuthSession, OAuthSessionStore};
use crate::types::CallerIdentity;

/// Ties the identity client to the pending-session table.
///
/// Both ends of the consent flow go through here: the calendar side
/// records a pending session when consent is needed, and the OAuth
/// callback consumes it.
pub struct IdentityBridge {
    client: IdentityClient,
    sessions: Arc<dyn OAuthSessionStore>,
    ttl_secs: i64,
}

impl IdentityBridge {
    pub fn new(client: IdentityClient, sessions: Arc<dyn OAuthSessionStore>, ttl_secs: i64) -> Self {
        Self {
            client,
            sessions,
            ttl_secs,
        }
    }

    /// Consume a pending session and complete its consent flow.
    ///
    /// Returns `Ok(None)` when no live session exists for `session_id`.
    /// The record is removed before completion is attempted, so a failed
    /// completion cannot be replayed.
    pub async fn complete_session(&self, session_id: &str) -> Result<Option<OAuthSession>, IdentityError> {
        let Some(session) = self.sessions.take(session_id).await? else {
            return Ok(None);
        };

        let user = match &session.bearer_credential {
            Some(token) => UserIdentifier::UserToken(token.clone()),
            None => UserIdentifier::UserId(session.line_user_id.clone()),
        };
        self.client
            .complete_resource_token_auth(&session.session_id, &user)
            .await?;

        info!("OAuth flow completed for line_user_id={}", session.line_user_id);
        Ok(Some(session))
    }
}

#[async_trait]
impl AccessTokenSource for IdentityBridge {
    async fn access_token(&self, caller: &CallerIdentity) -> Result<AccessToken, IdentityError> {
        let workload_token = match &caller.bearer_token {
            Some(jwt) => self.client.workload_token_for_jwt(jwt).await?,
            None => self.client.workload_token_for_user_id(&caller.user_id).await?,
        };

        match self.client.resource_oauth2_token(&workload_token).await? {
            TokenOutcome::Token(token) => Ok(AccessToken::Granted(token)),
            TokenOutcome::AuthorizationRequired {
                authorization_url,
                session_uri,
            } => {
                self.sessions
                    .put(OAuthSession::new(
                        session_uri,
                        caller.user_id.clone(),
                        caller.bearer_token.clone(),
                        self.ttl_secs,
                    ))
                    .await?;
                info!("Consent required for user {}", caller.user_id);
                Ok(AccessToken::ConsentRequired { authorization_url })
            }
        }
    }
}
