//! Multi-provider fallback chain.
//!
//! Tries each provider in priority order, retrying each one a bounded number
//! of times, until one returns usable text. When every provider is exhausted
//! (or none is configured) the chain answers with a fixed friendly message,
//! so callers always get something displayable back.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::Serialize;

use crate::context::OptimizedContext;
use crate::error::{FailureCategory, LlmError};
use crate::jobs::{JobInput, size_label};
use crate::llm::prompt::build_request;
use crate::llm::provider::{CompletionRequest, LlmProvider};
use crate::llm::retry::RetryPolicy;

/// Reply used when no provider could answer a chat message.
pub const MESSAGE_FALLBACK: &str = "I'm sorry, I'm having trouble reaching my AI services \
right now. Your message was received, but I can't give you a proper answer at the moment. \
Please try again in a little while, or try rephrasing your question. Thanks for your patience!";

/// Reply used when no provider could analyze an uploaded file.
pub fn fallback_text(input: &JobInput) -> String {
    match input {
        JobInput::Message { .. } => MESSAGE_FALLBACK.to_string(),
        JobInput::File {
            filename,
            file_type,
            file_size,
            ..
        } => format!(
            "I've received your {file_type} file '{filename}' ({} size: {file_size} bytes) and \
it uploaded successfully. Unfortunately my analysis services are unavailable right now, so I \
can't share detailed insights yet. Please try again in a moment. Thanks for your patience!",
            size_label(*file_size)
        ),
    }
}

/// A provider together with its retry policy.
pub struct ChainEntry {
    pub provider: Arc<dyn LlmProvider>,
    pub retry: RetryPolicy,
}

impl ChainEntry {
    pub fn new(provider: Arc<dyn LlmProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }
}

/// Result of one provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure(FailureCategory),
}

/// Record of a single attempt, kept for logging and tests.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
    /// 0 for the first try against this provider.
    pub retry_index: u32,
    pub elapsed: Duration,
}

/// What the chain produced for one request.
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub text: String,
    /// Provider that answered, or `None` when the fallback text was used.
    pub served_by: Option<String>,
    pub attempts: Vec<ProviderAttempt>,
}

impl ChainOutcome {
    pub fn exhausted(&self) -> bool {
        self.served_by.is_none()
    }
}

/// Ordered providers, fixed at construction.
#[derive(Default)]
pub struct FallbackChain {
    entries: Vec<ChainEntry>,
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("providers", &self.provider_names())
            .finish()
    }
}

impl FallbackChain {
    /// Create a chain; the first entry has the highest priority.
    pub fn new(entries: Vec<ChainEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.provider.name()).collect()
    }

    /// Reply to `input` given the optimized history. Never fails.
    pub async fn respond(&self, context: &OptimizedContext, input: &JobInput) -> String {
        self.complete(build_request(context, input), input).await.text
    }

    /// Run `request` through the chain. Exhaustion yields the fallback text
    /// for `input`'s kind.
    pub async fn complete(&self, request: CompletionRequest, input: &JobInput) -> ChainOutcome {
        let mut attempts = Vec::new();

        for (position, entry) in self.entries.iter().enumerate() {
            let provider = entry.provider.name().to_string();
            let max_attempts = entry.retry.max_attempts.max(1);

            for retry_index in 0..max_attempts {
                let started = Instant::now();
                let result = Self::attempt(entry, request.clone()).await;
                let elapsed = started.elapsed();

                match result {
                    Ok(text) => {
                        attempts.push(ProviderAttempt {
                            provider: provider.clone(),
                            outcome: AttemptOutcome::Success,
                            retry_index,
                            elapsed,
                        });
                        tracing::info!(
                            provider = %provider,
                            attempt = retry_index + 1,
                            elapsed_ms = elapsed.as_millis() as u64,
                            "Provider answered"
                        );
                        return ChainOutcome {
                            text,
                            served_by: Some(provider),
                            attempts,
                        };
                    }
                    Err(err) => {
                        let category = err.category();
                        attempts.push(ProviderAttempt {
                            provider: provider.clone(),
                            outcome: AttemptOutcome::Failure(category),
                            retry_index,
                            elapsed,
                        });
                        tracing::warn!(
                            provider = %provider,
                            attempt = retry_index + 1,
                            max_attempts,
                            category = %category,
                            error = %err,
                            "Provider attempt failed"
                        );

                        if retry_index + 1 < max_attempts {
                            let delay = entry.retry.delay_for(retry_index, err.retry_after());
                            tracing::debug!(
                                provider = %provider,
                                delay_ms = delay.as_millis() as u64,
                                "Backing off before retry"
                            );
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }

            if let Some(next) = self.entries.get(position + 1) {
                tracing::info!(
                    provider = %provider,
                    next_provider = %next.provider.name(),
                    "Provider exhausted, trying next provider"
                );
            }
        }

        tracing::warn!(
            providers = self.entries.len(),
            attempts = attempts.len(),
            kind = %input.kind(),
            "All providers exhausted, returning fallback text"
        );
        ChainOutcome {
            text: fallback_text(input),
            served_by: None,
            attempts,
        }
    }

    /// One guarded call: bounded in time, panics contained, blank text
    /// rejected.
    async fn attempt(entry: &ChainEntry, request: CompletionRequest) -> Result<String, LlmError> {
        let provider = Arc::clone(&entry.provider);
        let name = provider.name().to_string();
        let timeout = entry.retry.attempt_timeout;

        let call = AssertUnwindSafe(async move { provider.complete(request).await }).catch_unwind();

        match tokio::time::timeout(timeout, call).await {
            Err(_) => Err(LlmError::Timeout {
                provider: name,
                after: timeout,
            }),
            Ok(Err(_panic)) => {
                tracing::error!(provider = %name, "Provider panicked during completion");
                Err(LlmError::RequestFailed {
                    provider: name,
                    reason: "provider panicked".to_string(),
                })
            }
            Ok(Ok(Err(err))) => Err(err),
            Ok(Ok(Ok(response))) => {
                let text = response.content.trim();
                if text.is_empty() {
                    Err(LlmError::InvalidResponse {
                        provider: name,
                        reason: "empty response text".to_string(),
                    })
                } else {
                    Ok(text.to_string())
                }
            }
        }
    }
}
