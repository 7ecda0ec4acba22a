//! Job records and their state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ConversationTurn;
use crate::error::JobError;

/// Characters of extracted file text carried into conversation history.
const FILE_EXCERPT_CHARS: usize = 300;

/// What kind of submission a job handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Message,
    File,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::File => "file",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status. Moves strictly forward:
///
/// ```text
/// Pending -> Processing -> Done
///                       -> Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Done)
                | (Self::Processing, Self::Error)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad file family, decides which analysis prompt and simulated reply a
/// file gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Document,
    Image,
    Data,
    Other,
}

impl FileCategory {
    /// Classify by extension, with or without the leading dot.
    pub fn from_extension(extension: &str) -> Self {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "txt" | "pdf" | "docx" | "md" => Self::Document,
            "jpg" | "jpeg" | "png" => Self::Image,
            "csv" | "json" => Self::Data,
            _ => Self::Other,
        }
    }
}

/// Human label for a byte count: under 1 KiB is small, under 1 MiB medium.
pub fn size_label(bytes: u64) -> &'static str {
    if bytes < 1024 {
        "small"
    } else if bytes < 1024 * 1024 {
        "medium"
    } else {
        "large"
    }
}

/// The user's submission, as stored on the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobInput {
    Message {
        text: String,
    },
    File {
        filename: String,
        /// Lowercase extension including the dot, e.g. `.pdf`.
        file_type: String,
        file_size: u64,
        /// Text extracted upstream; may be empty for binary formats.
        extracted_text: String,
    },
}

impl JobInput {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message { text: text.into() }
    }

    pub fn file(
        filename: impl Into<String>,
        file_type: impl Into<String>,
        file_size: u64,
        extracted_text: impl Into<String>,
    ) -> Self {
        Self::File {
            filename: filename.into(),
            file_type: file_type.into(),
            file_size,
            extracted_text: extracted_text.into(),
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            Self::Message { .. } => JobKind::Message,
            Self::File { .. } => JobKind::File,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::File { filename, .. } => Some(filename),
            Self::Message { .. } => None,
        }
    }

    /// How this input reads as the user side of a conversation turn.
    ///
    /// Files become a one-line description followed by an excerpt of the
    /// extracted text.
    pub fn user_text(&self) -> String {
        match self {
            Self::Message { text } => text.clone(),
            Self::File {
                filename,
                file_type,
                file_size,
                extracted_text,
            } => {
                let mut text =
                    format!("Shared a file: {filename} ({file_type}, {file_size} bytes)");
                let excerpt: String = extracted_text
                    .trim()
                    .chars()
                    .take(FILE_EXCERPT_CHARS)
                    .collect();
                if !excerpt.is_empty() {
                    text.push('\n');
                    text.push_str(&excerpt);
                }
                text
            }
        }
    }
}

/// One tracked submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub input: JobInput,
    /// Set exactly when the job is terminal.
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation order within this process.
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl Job {
    pub(crate) fn new(input: JobInput, seq: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: input.kind(),
            status: JobStatus::Pending,
            input,
            result: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            seq,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.seq
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Pending -> Processing.
    pub fn start(&mut self) -> Result<(), JobError> {
        self.transition(JobStatus::Processing)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Processing -> Done with the assistant's reply.
    pub fn complete(&mut self, result: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobStatus::Done)?;
        self.finish(result.into());
        Ok(())
    }

    /// Processing -> Error with a user-facing message.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobStatus::Error)?;
        self.finish(message.into());
        Ok(())
    }

    fn transition(&mut self, target: JobStatus) -> Result<(), JobError> {
        if !self.status.can_transition_to(target) {
            return Err(JobError::InvalidTransition {
                id: self.id,
                state: self.status.to_string(),
                target: target.to_string(),
            });
        }
        tracing::debug!(job_id = %self.id, from = %self.status, to = %target, "Job transition");
        self.status = target;
        Ok(())
    }

    fn finish(&mut self, result: String) {
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
    }

    /// Wall time from start to completion, once both are known.
    pub fn processing_time(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.started_at?)
    }

    /// History view of a finished job. `None` unless the job is `done`.
    pub fn to_turn(&self) -> Option<ConversationTurn> {
        if self.status != JobStatus::Done {
            return None;
        }
        let turn = ConversationTurn::new(
            self.seq,
            self.input.user_text(),
            self.result.clone().unwrap_or_default(),
        );
        Some(match self.input.filename() {
            Some(name) => turn.with_attachment(name),
            None => turn,
        })
    }
}
