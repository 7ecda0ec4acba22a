//! The background unit of work for one job.

use std::borrow::Cow;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use uuid::Uuid;

use crate::context::{ContextOptimizer, ConversationTurn, OptimizedContext};
use crate::error::JobError;
use crate::jobs::manager::JobManager;
use crate::jobs::model::{JobInput, JobStatus};
use crate::llm::prompt::{current_prompt, fit_input};

/// Shown to the user when processing failed for an internal reason.
pub const GENERIC_ERROR_MESSAGE: &str =
    "Something went wrong while processing your request. Please try again.";

/// Process `job_id` to a terminal state.
///
/// Any failure inside the unit of work, including a panic, marks the job
/// `error` with a generic message. A job that disappears mid-way (cleared or
/// evicted) is left alone.
pub(crate) async fn run(manager: JobManager, job_id: Uuid) {
    let outcome = AssertUnwindSafe(process(&manager, job_id))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => {
            tracing::error!(job_id = %job_id, error = %e, "Job processing failed");
        }
        Err(_) => {
            tracing::error!(job_id = %job_id, "Job processing panicked");
        }
    }

    let marked = manager.update(job_id, |job| {
        if job.status == JobStatus::Pending {
            job.start()?;
        }
        job.fail(GENERIC_ERROR_MESSAGE)
    });
    match marked {
        Ok(Some(())) => tracing::info!(job_id = %job_id, "Job marked as error"),
        Ok(None) => {
            tracing::debug!(job_id = %job_id, "Job gone before it could be marked as error")
        }
        Err(e) => tracing::error!(job_id = %job_id, error = %e, "Could not mark job as error"),
    }
}

async fn process(manager: &JobManager, job_id: Uuid) -> Result<(), JobError> {
    let Some(job) = manager.update(job_id, |job| {
        job.start()?;
        Ok(job.clone())
    })?
    else {
        tracing::debug!(job_id = %job_id, "Job cleared before processing started");
        return Ok(());
    };

    let history = manager.history_excluding(job_id);
    let (input, context) = prepare(manager.optimizer(), &history, &job.input);
    if !manager.record_metrics(job_id, context.metrics) {
        tracing::debug!(job_id = %job_id, "Job cleared before its context was recorded");
        return Ok(());
    }

    tracing::info!(
        job_id = %job_id,
        kind = %job.kind,
        original_turns = context.metrics.original_count,
        selected_turns = context.metrics.selected_count,
        compression_ratio = context.metrics.compression_ratio(),
        profile_name = context.profile.name.as_deref().unwrap_or(""),
        "Context prepared"
    );

    let delay = manager.processing_delay();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let reply = manager.chain().respond(&context, &input).await;

    match manager.update(job_id, |job| job.complete(reply))? {
        Some(()) => tracing::info!(job_id = %job_id, "Job done"),
        None => tracing::debug!(job_id = %job_id, "Job cleared while processing; result discarded"),
    }
    Ok(())
}

/// Fit `input` to the budget and select history around the prompt that will
/// actually be sent.
///
/// The input may take everything but the summary allowance; file excerpts
/// are shortened to get there.
pub(crate) fn prepare<'a>(
    optimizer: &ContextOptimizer,
    history: &[ConversationTurn],
    input: &'a JobInput,
) -> (Cow<'a, JobInput>, OptimizedContext) {
    let config = optimizer.config();
    let input = fit_input(input, config.size_budget.saturating_sub(config.summary_max));
    let context = match input.as_ref() {
        JobInput::Message { text } => optimizer.optimize(history, text),
        file @ JobInput::File { .. } => {
            optimizer.optimize_attachment(history, &current_prompt(file))
        }
    };
    (input, context)
}
