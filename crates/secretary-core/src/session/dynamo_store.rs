use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use tracing::{debug, warn};

use super::{OAuthSession, OAuthSessionStore};
use crate::error::SessionError;
use crate::util::epoch_seconds;

/// DynamoDB-backed OAuth session table.
///
/// Items are keyed by `session_id` and carry `line_user_id`, an optional
/// `cognito_token` and a numeric `ttl` the table expires on.
pub struct DynamoSessionStore {
    client: Client,
    table_name: String,
}

impl DynamoSessionStore {
    pub fn new(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }
}

#[async_trait]
impl OAuthSessionStore for DynamoSessionStore {
    async fn put(&self, session: OAuthSession) -> Result<(), SessionError> {
        let mut request = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .item("session_id", AttributeValue::S(session.session_id.clone()))
            .item("line_user_id", AttributeValue::S(session.line_user_id))
            .item("ttl", AttributeValue::N(session.expires_at.to_string()));
        if let Some(token) = session.bearer_credential {
            request = request.item("cognito_token", AttributeValue::S(token));
        }

        request.send().await.map_err(|e| {
            warn!("DynamoDB put_item error: {}", DisplayErrorContext(&e));
            SessionError::Write(DisplayErrorContext(&e).to_string())
        })?;
        debug!("Stored OAuth session {}", session.session_id);
        Ok(())
    }

    async fn take(&self, session_id: &str) -> Result<Option<OAuthSession>, SessionError> {
        let output = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("session_id", AttributeValue::S(session_id.to_string()))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| {
                warn!("DynamoDB delete_item error: {}", DisplayErrorContext(&e));
                SessionError::Read(DisplayErrorContext(&e).to_string())
            })?;

        let Some(item) = output.attributes else {
            return Ok(None);
        };
        let session = parse_session_from_item(&item)?;
        // TTL sweeping is lazy, so a stale item can still be returned here.
        if session.is_expired_at(epoch_seconds()) {
            debug!("OAuth session {} had expired", session_id);
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("session_id", AttributeValue::S(session_id.to_string()))
            .send()
            .await
            .map_err(|e| SessionError::Write(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

fn parse_session_from_item(item: &HashMap<String, AttributeValue>) -> Result<OAuthSession, SessionError> {
    let string_attr = |name: &str| item.get(name).and_then(|v| v.as_s().ok()).cloned();

    let session_id = string_attr("session_id")
        .ok_or_else(|| SessionError::Invalid("missing session_id".to_string()))?;
    let line_user_id = string_attr("line_user_id")
        .ok_or_else(|| SessionError::Invalid("missing line_user_id".to_string()))?;
    let expires_at = item
        .get("ttl")
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<i64>().ok())
        .ok_or_else(|| SessionError::Invalid("missing ttl".to_string()))?;

    Ok(OAuthSession {
        session_id,
        line_user_id,
        bearer_credential: string_attr("cognito_token"),
        expires_at,
    })
}
