pub mod anthropic;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{CompletionRequest, CompletionResponse};

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one completion request carrying the full conversation so far.
    async fn chat(&self, request: &CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;
}
