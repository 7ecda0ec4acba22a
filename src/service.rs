//! The engine's external interface.
//!
//! [`ChatService`] is what a transport (CLI, HTTP, anything else) talks to:
//! submit content, poll status, list history, clear, read analytics.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::{self, AnalyticsSnapshot};
use crate::config::Config;
use crate::context::{ContextOptimizer, OptimizedContext};
use crate::error::{Error, JobError, ValidationError};
use crate::jobs::{Job, JobInput, JobManager, UploadPolicy, check_message};
use crate::llm::{FallbackChain, build_chain};

/// Raw content from the submitting side, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Submission {
    Message {
        text: String,
    },
    File {
        filename: String,
        file_size: u64,
        /// Text already extracted from the file by the caller.
        #[serde(default)]
        extracted_text: String,
    },
}

impl Submission {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message { text: text.into() }
    }

    pub fn file(
        filename: impl Into<String>,
        file_size: u64,
        extracted_text: impl Into<String>,
    ) -> Self {
        Self::File {
            filename: filename.into(),
            file_size,
            extracted_text: extracted_text.into(),
        }
    }

    /// Validate and turn into a job input.
    pub fn into_input(self, policy: &UploadPolicy) -> Result<JobInput, ValidationError> {
        match self {
            Self::Message { text } => Ok(JobInput::Message {
                text: check_message(&text)?,
            }),
            Self::File {
                filename,
                file_size,
                extracted_text,
            } => {
                let file_type = policy.check(&filename, file_size)?;
                Ok(JobInput::File {
                    filename: filename.trim().to_string(),
                    file_type,
                    file_size,
                    extracted_text,
                })
            }
        }
    }
}

/// How long the submitting side waits for a job before giving up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_attempts: 120,
        }
    }
}

/// Conversation engine facade.
#[derive(Debug, Clone)]
pub struct ChatService {
    jobs: JobManager,
    upload: UploadPolicy,
}

impl ChatService {
    pub fn new(jobs: JobManager, upload: UploadPolicy) -> Self {
        Self { jobs, upload }
    }

    /// Wire up providers, optimizer and registry from `config`.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let chain = build_chain(&config.llm)?;
        Ok(Self::with_chain(config, chain))
    }

    /// Like [`ChatService::from_config`] but with a caller-supplied chain.
    pub fn with_chain(config: &Config, chain: FallbackChain) -> Self {
        let optimizer = ContextOptimizer::new(config.context.to_optimizer_config());
        let jobs = JobManager::new(chain, optimizer, &config.jobs);
        Self::new(jobs, config.upload.to_upload_policy())
    }

    /// Validate `submission` and start a job for it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, submission: Submission) -> Result<Uuid, ValidationError> {
        let input = submission.into_input(&self.upload).inspect_err(|e| {
            tracing::info!(error = %e, "Submission rejected");
        })?;
        Ok(self.jobs.create(input))
    }

    pub fn status(&self, id: Uuid) -> Result<Job, JobError> {
        self.jobs.get(id)
    }

    /// Every job in creation order.
    pub fn history(&self) -> Vec<Job> {
        self.jobs.list()
    }

    /// Forget everything. Safe to call repeatedly.
    pub fn clear(&self) -> usize {
        self.jobs.clear()
    }

    pub fn analytics(&self) -> AnalyticsSnapshot {
        analytics::snapshot(&self.jobs)
    }

    /// What would be sent to a provider for `text`, without creating a job.
    pub fn preview(&self, text: &str) -> OptimizedContext {
        self.jobs.preview(text)
    }

    pub fn upload_policy(&self) -> &UploadPolicy {
        &self.upload
    }

    /// Poll until the job is terminal or the policy's attempts run out.
    pub async fn wait_for(&self, id: Uuid, policy: &PollPolicy) -> Result<Job, JobError> {
        for attempt in 0..policy.max_attempts {
            let job = self.jobs.get(id)?;
            if job.is_terminal() {
                return Ok(job);
            }
            if attempt + 1 < policy.max_attempts {
                tokio::time::sleep(policy.interval).await;
            }
        }

        tracing::warn!(job_id = %id, attempts = policy.max_attempts, "Gave up waiting for job");
        Err(JobError::PollTimeout {
            id,
            attempts: policy.max_attempts,
        })
    }
}
