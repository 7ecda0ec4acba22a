//! Submission checks that run before a job exists.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::ValidationError;

/// Extensions accepted by default.
pub const DEFAULT_ALLOWED_TYPES: &[&str] = &[
    ".txt", ".pdf", ".docx", ".jpg", ".jpeg", ".png", ".csv", ".json",
];

/// 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Which uploads are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    /// Lowercase extensions including the dot.
    pub allowed_types: BTreeSet<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl UploadPolicy {
    /// Check a file's name and size. Returns the normalized extension.
    pub fn check(&self, filename: &str, file_size: u64) -> Result<String, ValidationError> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(ValidationError::MissingFilename);
        }

        let extension = extension_of(filename).unwrap_or_default();
        if !self.allowed_types.contains(&extension) {
            return Err(ValidationError::UnsupportedFileType {
                extension: if extension.is_empty() {
                    "(none)".to_string()
                } else {
                    extension
                },
                allowed: self.allowed_list(),
            });
        }

        if file_size > self.max_bytes {
            return Err(ValidationError::FileTooLarge {
                size: file_size,
                max: self.max_bytes,
            });
        }

        Ok(extension)
    }

    pub fn allowed_list(&self) -> String {
        self.allowed_types
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Lowercase extension with a leading dot, e.g. `.pdf`.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

/// Reject blank messages. Returns the trimmed text.
pub fn check_message(text: &str) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyMessage)
    } else {
        Ok(trimmed.to_string())
    }
}
