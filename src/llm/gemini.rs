//! Google Gemini provider (`generateContent` REST endpoint).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::GeminiConfig;
use crate::error::LlmError;
use crate::llm::http::{build_client, excerpt, status_error, transport_error};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

const PROVIDER_NAME: &str = "gemini";

/// Gemini chat provider.
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
    timeout: Duration,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_client(PROVIDER_NAME, timeout)?,
            config,
            timeout,
        })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

impl From<&CompletionRequest> for GenerateContentRequest {
    fn from(req: &CompletionRequest) -> Self {
        // Gemini only knows "user" and "model"; system text goes separately.
        let contents = req
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Content {
                role: Some(
                    match m.role {
                        Role::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: Some(m.content.clone()),
                }],
            })
            .collect();

        let system_instruction = req.system_prompt().map(|text| SystemInstruction {
            parts: vec![Part { text: Some(text) }],
        });

        let generation_config = if req.max_tokens.is_some() || req.temperature.is_some() {
            Some(GenerationConfig {
                max_output_tokens: req.max_tokens,
                temperature: req.temperature,
            })
        } else {
            None
        };

        Self {
            contents,
            system_instruction,
            generation_config,
        }
    }
}

fn finish_reason(raw: Option<&str>) -> FinishReason {
    match raw {
        Some("STOP") => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") => FinishReason::ContentFilter,
        _ => FinishReason::Unknown,
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = GenerateContentRequest::from(&req);
        let url = self.api_url();

        tracing::debug!(model = %self.config.model, "Sending request to Gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.config.api_key.expose_secret())
            .json(&body)
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

        let parsed: GenerateContentResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                reason: format!("JSON parse error: {}. Raw: {}", e, excerpt(&text)),
            })?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                reason: "no candidates in response".to_string(),
            })?;

        let content: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                reason: format!(
                    "empty candidate (finish reason {})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ),
            });
        }

        Ok(CompletionResponse {
            content,
            finish_reason: finish_reason(candidate.finish_reason.as_deref()),
        })
    }
}
