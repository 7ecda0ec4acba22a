//! LLM integration.
//!
//! Supports these backends, tried in this order when configured:
//! - **Gemini**: Google `generateContent` API with your own key
//! - **DeepAI**: `text-generator` API with your own key
//! - **Simulated**: canned offline replies, opt-in via `USE_SIMULATED_AI`
//!
//! All of them sit behind [`FallbackChain`], which never fails: when every
//! backend is down the user gets a friendly fallback message instead.

mod deepai;
mod failover;
mod gemini;
mod http;
pub mod prompt;
mod provider;
mod retry;
mod simulated;

pub use deepai::DeepAiProvider;
pub use failover::{
    AttemptOutcome, ChainEntry, ChainOutcome, FallbackChain, MESSAGE_FALLBACK, ProviderAttempt,
    fallback_text,
};
pub use gemini::GeminiProvider;
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};
pub use retry::RetryPolicy;
pub use simulated::SimulatedProvider;

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::LlmError;

/// Build the fallback chain described by `config`.
///
/// An empty chain is valid; it answers everything with the fallback text.
pub fn build_chain(config: &LlmConfig) -> Result<FallbackChain, LlmError> {
    let retry = config.retry_policy();
    let mut entries: Vec<ChainEntry> = Vec::new();

    if let Some(gemini) = &config.gemini {
        let provider = GeminiProvider::new(gemini.clone(), config.request_timeout)?;
        tracing::info!(model = %gemini.model, "Gemini provider enabled");
        entries.push(ChainEntry::new(Arc::new(provider), retry.clone()));
    }

    if let Some(deepai) = &config.deepai {
        let provider = DeepAiProvider::new(deepai.clone(), config.request_timeout)?;
        tracing::info!("DeepAI provider enabled");
        entries.push(ChainEntry::new(Arc::new(provider), retry.clone()));
    }

    if config.use_simulated {
        tracing::info!("Simulated provider enabled");
        entries.push(ChainEntry::new(Arc::new(SimulatedProvider::new()), retry));
    }

    if entries.is_empty() {
        tracing::warn!(
            "No LLM providers configured; set GEMINI_API_KEY, DEEPAI_API_KEY or USE_SIMULATED_AI=true"
        );
    }

    Ok(FallbackChain::new(entries))
}
