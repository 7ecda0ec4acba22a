//! Error types for Parley.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Coarse failure buckets used by the fallback chain when deciding how to
/// log, back off and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Timeout,
    RateLimited,
    Authentication,
    MalformedResponse,
    Unavailable,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Authentication => "authentication",
            Self::MalformedResponse => "malformed_response",
            Self::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {after:?}")]
    Timeout { provider: String, after: Duration },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Classify this error for retry and logging purposes.
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::Timeout { .. } => FailureCategory::Timeout,
            Self::RateLimited { .. } => FailureCategory::RateLimited,
            Self::AuthFailed { .. } => FailureCategory::Authentication,
            Self::InvalidResponse { .. } | Self::Json(_) => FailureCategory::MalformedResponse,
            Self::Http(e) if e.is_timeout() => FailureCategory::Timeout,
            Self::Http(e) if e.is_decode() => FailureCategory::MalformedResponse,
            Self::Http(_) | Self::RequestFailed { .. } => FailureCategory::Unavailable,
        }
    }

    /// Server-suggested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Job-related errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {id} not found")]
    NotFound { id: Uuid },

    #[error("Job {id} already in state {state}, cannot transition to {target}")]
    InvalidTransition {
        id: Uuid,
        state: String,
        target: String,
    },

    #[error("Job {id} did not finish after {attempts} status checks")]
    PollTimeout { id: Uuid, attempts: u32 },
}

/// Submission errors. These are raised before a job is created and never
/// enter the job lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Filename is required")]
    MissingFilename,

    #[error("File type '{extension}' not supported. Allowed types: {allowed}")]
    UnsupportedFileType { extension: String, allowed: String },

    #[error("File size ({size} bytes) exceeds maximum allowed size ({max} bytes)")]
    FileTooLarge { size: u64, max: u64 },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
