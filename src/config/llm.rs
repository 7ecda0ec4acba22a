use std::time::Duration;

use secrecy::SecretString;

use crate::config::helpers::{
    optional_env, parse_bool_env, parse_millis_env, parse_optional_env, parse_secs_env,
};
use crate::error::ConfigError;
use crate::llm::RetryPolicy;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_DEEPAI_BASE_URL: &str = "https://api.deepai.org";

/// Google Gemini access. Present only when `GEMINI_API_KEY` is set.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
}

/// DeepAI text-generator access. Present only when `DEEPAI_API_KEY` is set.
#[derive(Debug, Clone)]
pub struct DeepAiConfig {
    pub api_key: SecretString,
    pub base_url: String,
}

/// Provider chain configuration.
///
/// Credential presence decides which network providers join the chain. With
/// no credentials and the simulated provider off, the chain is empty and
/// every request resolves to the friendly fallback text.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub gemini: Option<GeminiConfig>,
    pub deepai: Option<DeepAiConfig>,
    /// Append the no-network simulated provider as the lowest-priority entry.
    pub use_simulated: bool,
    /// Attempts per provider before moving to the next one (>= 1).
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Per-attempt ceiling, also used as the HTTP client timeout.
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            gemini: None,
            deepai: None,
            use_simulated: false,
            max_attempts: 2,
            backoff_base: Duration::from_millis(1000),
            backoff_max: Duration::from_millis(8000),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl LlmConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let gemini = optional_env("GEMINI_API_KEY")?
            .map(|key| -> Result<GeminiConfig, ConfigError> {
                Ok(GeminiConfig {
                    api_key: SecretString::from(key),
                    model: optional_env("GEMINI_MODEL")?
                        .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                    base_url: optional_env("GEMINI_BASE_URL")?
                        .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                })
            })
            .transpose()?;

        let deepai = optional_env("DEEPAI_API_KEY")?
            .map(|key| -> Result<DeepAiConfig, ConfigError> {
                Ok(DeepAiConfig {
                    api_key: SecretString::from(key),
                    base_url: optional_env("DEEPAI_BASE_URL")?
                        .unwrap_or_else(|| DEFAULT_DEEPAI_BASE_URL.to_string()),
                })
            })
            .transpose()?;

        let max_attempts = parse_optional_env("LLM_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LLM_MAX_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let backoff_base = parse_millis_env("LLM_BACKOFF_MS", 1000)?;
        let backoff_max = parse_millis_env("LLM_MAX_BACKOFF_MS", 8000)?;
        if backoff_max < backoff_base {
            return Err(ConfigError::InvalidValue {
                key: "LLM_MAX_BACKOFF_MS".to_string(),
                message: format!(
                    "must be >= LLM_BACKOFF_MS ({} ms)",
                    backoff_base.as_millis()
                ),
            });
        }

        Ok(Self {
            gemini,
            deepai,
            use_simulated: parse_bool_env("USE_SIMULATED_AI", defaults.use_simulated)?,
            max_attempts,
            backoff_base,
            backoff_max,
            request_timeout: parse_secs_env("LLM_TIMEOUT_SECS", 10)?,
        })
    }

    /// Retry policy applied to every provider entry in the chain.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.backoff_base,
            max_delay: self.backoff_max,
            attempt_timeout: self.request_timeout,
        }
    }

    /// Names of the providers this config enables, in priority order.
    pub fn enabled_providers(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.gemini.is_some() {
            names.push("gemini");
        }
        if self.deepai.is_some() {
            names.push("deepai");
        }
        if self.use_simulated {
            names.push("simulated");
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::helpers::test_support::ENV_LOCK;

    const KEYS: &[&str] = &[
        "GEMINI_API_KEY",
        "GEMINI_MODEL",
        "GEMINI_BASE_URL",
        "DEEPAI_API_KEY",
        "DEEPAI_BASE_URL",
        "USE_SIMULATED_AI",
        "LLM_MAX_ATTEMPTS",
        "LLM_BACKOFF_MS",
        "LLM_MAX_BACKOFF_MS",
        "LLM_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for key in KEYS {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    fn no_credentials_means_empty_chain() {
        let _lock = ENV_LOCK.lock();
        clear_env();

        let config = LlmConfig::from_env().unwrap();
        assert!(config.gemini.is_none());
        assert!(config.deepai.is_none());
        assert!(config.enabled_providers().is_empty());
        assert_eq!(config.max_attempts, 2);
    }

    #[test]
    fn credentials_enable_providers_in_priority_order() {
        let _lock = ENV_LOCK.lock();
        clear_env();
        unsafe {
            std::env::set_var("DEEPAI_API_KEY", "d-key");
            std::env::set_var("GEMINI_API_KEY", "g-key");
            std::env::set_var("USE_SIMULATED_AI", "true");
        }

        let config = LlmConfig::from_env().unwrap();
        assert_eq!(config.enabled_providers(), vec!["gemini", "deepai", "simulated"]);
        assert_eq!(
            config.gemini.as_ref().map(|g| g.model.as_str()),
            Some(DEFAULT_GEMINI_MODEL)
        );
        clear_env();
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let _lock = ENV_LOCK.lock();
        clear_env();
        unsafe { std::env::set_var("LLM_MAX_ATTEMPTS", "0") };

        let err = LlmConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "LLM_MAX_ATTEMPTS"
        ));
        clear_env();
    }

    #[test]
    fn retry_policy_mirrors_config() {
        let config = LlmConfig {
            max_attempts: 3,
            backoff_base: Duration::from_millis(50),
            backoff_max: Duration::from_millis(400),
            request_timeout: Duration::from_secs(2),
            ..LlmConfig::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(50));
        assert_eq!(policy.max_delay, Duration::from_millis(400));
        assert_eq!(policy.attempt_timeout, Duration::from_secs(2));
    }
}
