//! DeepAI text-generator provider.
//!
//! The endpoint takes a single `text` form field, so the structured
//! conversation is flattened into a transcript first.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::DeepAiConfig;
use crate::error::LlmError;
use crate::llm::http::{build_client, excerpt, status_error, transport_error};
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

const PROVIDER_NAME: &str = "deepai";

/// DeepAI provider.
pub struct DeepAiProvider {
    client: Client,
    config: DeepAiConfig,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TextGeneratorResponse {
    #[serde(default)]
    output: Option<String>,
}

impl DeepAiProvider {
    pub fn new(config: DeepAiConfig, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_client(PROVIDER_NAME, timeout)?,
            config,
            timeout,
        })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/api/text-generator",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl LlmProvider for DeepAiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let transcript = req.to_transcript();

        tracing::debug!(chars = transcript.len(), "Sending request to DeepAI");

        let response = self
            .client
            .post(self.api_url())
            .header("api-key", self.config.api_key.expose_secret())
            .form(&[("text", transcript.as_str())])
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER_NAME, e, self.timeout))?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(PROVIDER_NAME, e, self.timeout))?;

        if !status.is_success() {
            return Err(status_error(PROVIDER_NAME, status, &headers, &text, self.timeout));
        }

        let parsed: TextGeneratorResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                reason: format!("JSON parse error: {}. Raw: {}", e, excerpt(&text)),
            })?;

        match parsed.output {
            Some(output) if !output.trim().is_empty() => Ok(CompletionResponse::text(output)),
            _ => Err(LlmError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                reason: "missing or empty 'output' field".to_string(),
            }),
        }
    }
}
