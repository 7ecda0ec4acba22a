//! Configuration for Parley.
//!
//! Everything is read from the process environment, after loading a `.env`
//! file from the working directory if one exists. Each section owns its
//! variables and defaults; unset or blank variables fall back to the default.

mod helpers;
mod llm;

use std::time::Duration;

pub use self::llm::{
    DEFAULT_DEEPAI_BASE_URL, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, DeepAiConfig,
    GeminiConfig, LlmConfig,
};

use self::helpers::{optional_env, parse_millis_env, parse_optional_env};
use crate::context::OptimizerConfig;
use crate::error::ConfigError;
use crate::jobs::UploadPolicy;
use crate::service::PollPolicy;

/// Main configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub llm: LlmConfig,
    pub context: ContextConfig,
    pub jobs: JobsConfig,
    pub upload: UploadConfig,
    pub poll: PollConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            llm: LlmConfig::from_env()?,
            context: ContextConfig::from_env()?,
            jobs: JobsConfig::from_env()?,
            upload: UploadConfig::from_env()?,
            poll: PollConfig::from_env()?,
        })
    }
}

/// Context optimizer budget settings.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Maximum estimated size of history plus current input sent to a provider.
    pub size_budget: usize,
    /// Allowance reserved for the summary of dropped turns.
    pub summary_max: usize,
    /// Turns larger than this start paying a length penalty.
    pub long_turn_threshold: usize,
    /// Cap on selected turns; `None` leaves only the size budget.
    pub max_turns: Option<usize>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        let defaults = OptimizerConfig::default();
        Self {
            size_budget: defaults.size_budget,
            summary_max: defaults.summary_max,
            long_turn_threshold: defaults.long_turn_threshold,
            max_turns: defaults.max_turns,
        }
    }
}

impl ContextConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let size_budget = parse_optional_env("CONTEXT_SIZE_BUDGET", defaults.size_budget)?;
        let summary_max = parse_optional_env("CONTEXT_SUMMARY_MAX", defaults.summary_max)?;
        if summary_max >= size_budget {
            return Err(ConfigError::InvalidValue {
                key: "CONTEXT_SUMMARY_MAX".to_string(),
                message: format!("must be smaller than CONTEXT_SIZE_BUDGET ({size_budget})"),
            });
        }

        Ok(Self {
            size_budget,
            summary_max,
            long_turn_threshold: parse_optional_env(
                "CONTEXT_LONG_TURN_THRESHOLD",
                defaults.long_turn_threshold,
            )?,
            // 0 means unlimited.
            max_turns: match parse_optional_env("CONTEXT_MAX_TURNS", 0usize)? {
                0 => None,
                n => Some(n),
            },
        })
    }

    /// Convert to the optimizer's own config, keeping default weights.
    pub fn to_optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig {
            size_budget: self.size_budget,
            summary_max: self.summary_max,
            long_turn_threshold: self.long_turn_threshold,
            max_turns: self.max_turns,
            ..OptimizerConfig::default()
        }
    }
}

/// Job registry settings.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// Registry capacity; oldest terminal jobs are evicted beyond it.
    pub max_in_memory: usize,
    /// Pause before the provider call, for a steadier feel in chat UIs.
    pub processing_delay: Duration,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_in_memory: 1000,
            processing_delay: Duration::ZERO,
        }
    }
}

impl JobsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let max_in_memory = parse_optional_env("JOB_MAX_IN_MEMORY", 1000usize)?;
        if max_in_memory == 0 {
            return Err(ConfigError::InvalidValue {
                key: "JOB_MAX_IN_MEMORY".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }
        Ok(Self {
            max_in_memory,
            processing_delay: parse_millis_env("JOB_PROCESSING_DELAY_MS", 0)?,
        })
    }
}

/// File upload acceptance rules.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_bytes: u64,
    /// Lowercase extensions including the dot, e.g. `.pdf`.
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        let policy = UploadPolicy::default();
        Self {
            max_bytes: policy.max_bytes,
            allowed_types: policy.allowed_types.into_iter().collect(),
        }
    }
}

impl UploadConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let allowed_types = optional_env("UPLOAD_ALLOWED_TYPES")?
            .map(|s| {
                s.split(',')
                    .map(|ext| ext.trim().to_lowercase())
                    .filter(|ext| !ext.is_empty())
                    .map(|ext| {
                        if ext.starts_with('.') {
                            ext
                        } else {
                            format!(".{ext}")
                        }
                    })
                    .collect()
            })
            .unwrap_or(defaults.allowed_types);

        Ok(Self {
            max_bytes: parse_optional_env("UPLOAD_MAX_BYTES", defaults.max_bytes)?,
            allowed_types,
        })
    }

    pub fn to_upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_bytes: self.max_bytes,
            allowed_types: self.allowed_types.iter().cloned().collect(),
        }
    }
}

/// Client-side polling ceiling used while waiting for a job to finish.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        let policy = PollPolicy::default();
        Self {
            interval: policy.interval,
            max_attempts: policy.max_attempts,
        }
    }
}

impl PollConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            interval: parse_millis_env("POLL_INTERVAL_MS", defaults.interval.as_millis() as u64)?,
            max_attempts: parse_optional_env("POLL_MAX_ATTEMPTS", defaults.max_attempts)?,
        })
    }

    pub fn to_poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: self.interval,
            max_attempts: self.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::helpers::test_support::ENV_LOCK;
    use super::*;

    #[test]
    fn defaults_line_up_with_domain_types() {
        let config = Config::default();
        let optimizer = config.context.to_optimizer_config();
        assert_eq!(optimizer.size_budget, 4000);
        assert_eq!(config.upload.to_upload_policy(), UploadPolicy::default());
        assert_eq!(config.jobs.max_in_memory, 1000);
    }

    #[test]
    fn upload_types_are_normalized() {
        let _lock = ENV_LOCK.lock();
        unsafe { std::env::set_var("UPLOAD_ALLOWED_TYPES", "TXT, .md ,,csv") };

        let upload = UploadConfig::from_env().unwrap();
        assert_eq!(upload.allowed_types, vec![".txt", ".md", ".csv"]);
        unsafe { std::env::remove_var("UPLOAD_ALLOWED_TYPES") };
    }

    #[test]
    fn summary_allowance_must_fit_in_budget() {
        let _lock = ENV_LOCK.lock();
        unsafe {
            std::env::set_var("CONTEXT_SIZE_BUDGET", "300");
            std::env::set_var("CONTEXT_SUMMARY_MAX", "300");
        }

        assert!(ContextConfig::from_env().is_err());
        unsafe {
            std::env::remove_var("CONTEXT_SIZE_BUDGET");
            std::env::remove_var("CONTEXT_SUMMARY_MAX");
        }
    }

    #[test]
    fn turn_cap_zero_means_unlimited() {
        let _lock = ENV_LOCK.lock();
        unsafe { std::env::set_var("CONTEXT_MAX_TURNS", "0") };
        assert_eq!(ContextConfig::from_env().unwrap().max_turns, None);

        unsafe { std::env::set_var("CONTEXT_MAX_TURNS", "10") };
        let optimizer = ContextConfig::from_env().unwrap().to_optimizer_config();
        assert_eq!(optimizer.max_turns, Some(10));
        unsafe { std::env::remove_var("CONTEXT_MAX_TURNS") };
    }
}
