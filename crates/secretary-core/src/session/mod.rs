//! Pending OAuth correlation records.
//!
//! A record links an identity-service session URI to the LINE user that
//! triggered the consent flow. It is written when the calendar side needs
//! consent and consumed exactly once by the OAuth callback.

#[cfg(feature = "aws")]
pub mod dynamo_store;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::SessionError;
use crate::util::epoch_seconds;

/// A pending OAuth session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthSession {
    /// Session URI returned by the identity service; the table key.
    pub session_id: String,
    pub line_user_id: String,
    /// Cognito JWT of the user, when the flow started from a JWT caller.
    pub bearer_credential: Option<String>,
    /// Epoch seconds after which the record is treated as absent.
    pub expires_at: i64,
}

impl OAuthSession {
    pub fn new(
        session_id: impl Into<String>,
        line_user_id: impl Into<String>,
        bearer_credential: Option<String>,
        ttl_secs: i64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            line_user_id: line_user_id.into(),
            bearer_credential,
            expires_at: epoch_seconds() + ttl_secs,
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Storage for pending OAuth sessions.
#[async_trait]
pub trait OAuthSessionStore: Send + Sync {
    /// Insert or replace the record for `session.session_id`.
    async fn put(&self, session: OAuthSession) -> Result<(), SessionError>;

    /// Atomically read and delete a record.
    ///
    /// Returns `None` when the record is missing or already expired, so a
    /// second `take` of the same id always yields `None`.
    async fn take(&self, session_id: &str) -> Result<Option<OAuthSession>, SessionError>;

    /// Delete a record. Deleting a missing record is not an error.
    async fn delete(&self, session_id: &str) -> Result<(), SessionError>;
}

/// In-process store, used by the local server and tests.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, OAuthSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl OAuthSessionStore for MemorySessionStore {
    async fn put(&self, session: OAuthSession) -> Result<(), SessionError> {
        self.sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn take(&self, session_id: &str) -> Result<Option<OAuthSession>, SessionError> {
        let taken = self.sessions.remove(session_id).map(|(_, s)| s);
        Ok(taken.filter(|s| !s.is_expired_at(epoch_seconds())))
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions.remove(session_id);
        Ok(())
    }
}
