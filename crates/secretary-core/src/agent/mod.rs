pub mod context;

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::ModelConfig;
use crate::error::AgentError;
use crate::provider::LlmProvider;
use crate::tool::catalog::calendar_tools;
use crate::tool::ToolExecutor;
use crate::types::{
    CallerIdentity, CompletionRequest, ContentBlock, StopReason, ToolDefinition, Turn,
};

use self::context::ContextBuilder;

/// Reply when the model or a tool call failed.
pub const FALLBACK_ERROR: &str = "申し訳ございません。エラーが発生しました。";
/// Reply when the model finished without any text.
pub const FALLBACK_NO_RESPONSE: &str = "申し訳ございません。応答を生成できませんでした。";
/// Reply when the iteration cap was reached.
pub const FALLBACK_TIMEOUT: &str = "処理がタイムアウトしました。もう一度お試しください。";
/// Reply when the model stopped for a reason we do not handle.
pub const FALLBACK_UNEXPECTED_STOP: &str = "申し訳ございません。リクエストを処理できませんでした。";

impl AgentError {
    /// The fixed text the user sees for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            AgentError::Provider(_) | AgentError::Tool(_) => FALLBACK_ERROR,
            AgentError::IterationLimit(_) => FALLBACK_TIMEOUT,
            AgentError::EmptyResponse => FALLBACK_NO_RESPONSE,
            AgentError::UnexpectedStop(_) => FALLBACK_UNEXPECTED_STOP,
        }
    }
}

/// The model/tool loop for a single user message.
///
/// Turns live only for one [`AgentLoop::run`] call. The loop itself holds
/// nothing but shared handles and settings, so one instance serves every
/// request.
pub struct AgentLoop {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<dyn ToolExecutor>,
    catalog: Vec<ToolDefinition>,
    context: ContextBuilder,
    model: String,
    max_tokens: u32,
    temperature: f64,
    max_iterations: u32,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<dyn ToolExecutor>,
        config: &ModelConfig,
        time_zone: &str,
    ) -> Self {
        let model = if config.model.is_empty() {
            provider.default_model().to_string()
        } else {
            config.model.clone()
        };
        Self {
            provider,
            tools,
            catalog: calendar_tools(),
            context: ContextBuilder::new(time_zone),
            model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_iterations: config.max_iterations,
        }
    }

    /// Run the loop and turn any failure into its user-facing text.
    pub async fn respond(&self, message: &str, caller: &CallerIdentity) -> String {
        match self.run(message, caller).await {
            Ok(text) => text,
            Err(e) => {
                error!("Agent failed for user {}: {}", caller.user_id, e);
                e.user_message().to_string()
            }
        }
    }

    /// Run the LLM -> tool -> loop cycle.
    pub async fn run(&self, message: &str, caller: &CallerIdentity) -> Result<String, AgentError> {
        let mut request = CompletionRequest {
            model: self.model.clone(),
            system: Some(self.context.build_system_prompt(chrono::Utc::now())),
            turns: vec![Turn::user(message)],
            tools: self.catalog.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        for iteration in 0..self.max_iterations {
            debug!("Agent loop iteration {}", iteration + 1);

            let response = self.provider.chat(&request).await?;
            debug!(
                "Tokens: {} in / {} out",
                response.usage.input_tokens, response.usage.output_tokens
            );

            let stop_reason = response.stop_reason.clone();
            match stop_reason {
                StopReason::ToolUse => {
                    let calls = response.tool_calls();
                    if calls.is_empty() {
                        warn!("tool_use stop without any tool_use block");
                        return Err(AgentError::UnexpectedStop(
                            "tool_use without tool calls".to_string(),
                        ));
                    }
                    request.turns.push(Turn::assistant(response.content));

                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        info!("Executing tool: {}", call.name);
                        let start = Instant::now();
                        let outcome = self.tools.execute(call, caller).await?;
                        info!(
                            "{} completed in {:.2}s",
                            call.name,
                            start.elapsed().as_secs_f64()
                        );

                        let failed = outcome.get("success").and_then(|v| v.as_bool()) == Some(false);
                        results.push(ContentBlock::tool_result(
                            &call.id,
                            outcome.to_string(),
                            failed,
                        ));
                    }
                    request.turns.push(Turn::tool_results(results));
                }
                reason if reason.is_final() => {
                    return response
                        .first_text()
                        .map(str::to_string)
                        .ok_or(AgentError::EmptyResponse);
                }
                other => {
                    warn!("Unexpected stop reason: {}", other);
                    return Err(AgentError::UnexpectedStop(other.to_string()));
                }
            }
        }

        warn!("Agent loop hit the cap of {} iterations", self.max_iterations);
        Err(AgentError::IterationLimit(self.max_iterations))
    }
}
