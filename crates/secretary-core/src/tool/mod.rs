pub mod catalog;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::types::{CallerIdentity, ToolCall};

/// Runs one tool call on behalf of a caller.
///
/// Implementations return the structured outcome as JSON. Domain failures
/// (bad parameters, upstream HTTP errors) are part of that outcome as
/// `{"success": false, "error": ..}`; only transport failures are `Err`.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        call: &ToolCall,
        caller: &CallerIdentity,
    ) -> Result<serde_json::Value, GatewayError>;
}

/// Shape a failure the model should see and adapt to.
pub fn failure(error: impl Into<String>) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "error": error.into(),
    })
}
