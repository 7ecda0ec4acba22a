use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::jobs::{UploadPolicy, extension_of};
use crate::service::{ChatService, PollPolicy, Submission};

/// Formats whose bytes are read as text. Everything else is sent with an
/// empty extraction and analyzed from its metadata alone.
pub const TEXT_EXTENSIONS: &[&str] = &[".txt", ".md", ".csv", ".json"];

/// Read a local file into a submission.
///
/// Files over the policy's size limit are not read; the submission still
/// carries the real size so validation rejects it with the usual message.
pub fn load_submission(path: &Path, policy: &UploadPolicy) -> Result<Submission> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read file metadata: {}", path.display()))?;
    if !metadata.is_file() {
        bail!("Not a regular file: {}", path.display());
    }

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("File name is not valid UTF-8: {}", path.display()))?
        .to_string();

    let extracted_text = if metadata.len() <= policy.max_bytes {
        extract_text(path, &filename)?
    } else {
        String::new()
    };

    Ok(Submission::file(filename, metadata.len(), extracted_text))
}

/// Text content of `path` when `filename` names a text format, else empty.
pub fn extract_text(path: &Path, filename: &str) -> Result<String> {
    let is_text = extension_of(filename).is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()));
    if !is_text {
        return Ok(String::new());
    }

    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub async fn run_analyze_command(
    service: &ChatService,
    poll: &PollPolicy,
    path: &Path,
    json: bool,
) -> Result<()> {
    let submission = load_submission(path, service.upload_policy())?;
    let job = super::submit_and_wait(service, submission, poll).await?;
    super::print_job(&job, json)
}
