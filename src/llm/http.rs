//! HTTP plumbing shared by the network providers.

use std::time::Duration;

use reqwest::{Client, StatusCode, header::HeaderMap};

use crate::error::LlmError;

/// Longest body excerpt quoted in error messages.
const BODY_EXCERPT_CHARS: usize = 200;

/// Build a client whose own timeout matches the per-attempt ceiling.
pub(crate) fn build_client(provider: &str, timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: format!("Failed to build reqwest client: {}", e),
        })
}

/// Map a transport error to the matching `LlmError`.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error, timeout: Duration) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout {
            provider: provider.to_string(),
            after: timeout,
        }
    } else {
        LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Map a non-success status to the matching `LlmError`.
pub(crate) fn status_error(
    provider: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    timeout: Duration,
) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::AuthFailed {
            provider: provider.to_string(),
        },
        429 => LlmError::RateLimited {
            provider: provider.to_string(),
            retry_after: parse_retry_after(headers),
        },
        408 | 504 => LlmError::Timeout {
            provider: provider.to_string(),
            after: timeout,
        },
        _ => LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: format!("HTTP {}: {}", status, excerpt(body)),
        },
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// First few hundred characters of a body, safe on multi-byte text.
pub(crate) fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}
