//! Read-only summaries of the job registry.
//!
//! Nothing here is stored; every snapshot is computed from the current
//! registry contents.

use serde::Serialize;

use crate::context::{OptimizationMetrics, UserProfile, extract_profile};
use crate::jobs::{Job, JobInput, JobKind, JobManager, JobStatus};

/// Conversations longer than this get a "start a new topic" hint.
const LONG_CONVERSATION_TURNS: usize = 50;
/// Below this share of questions the user is nudged to ask more.
const LOW_QUESTION_RATE: f64 = 0.3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub done: usize,
    pub error: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub message: usize,
    pub file: usize,
}

/// The latest optimizer run, with derived ratios for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimizationReport {
    #[serde(flatten)]
    pub metrics: OptimizationMetrics,
    pub compression_ratio: f64,
    pub reduction_percent: f64,
    pub optimization_applied: bool,
}

impl From<OptimizationMetrics> for OptimizationReport {
    fn from(metrics: OptimizationMetrics) -> Self {
        Self {
            metrics,
            compression_ratio: metrics.compression_ratio(),
            reduction_percent: metrics.reduction_percent(),
            optimization_applied: metrics.selected_count < metrics.original_count,
        }
    }
}

/// Shape of the completed conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ConversationStats {
    /// Completed turns.
    pub turns: usize,
    /// Characters across user and assistant text.
    pub total_chars: usize,
    pub average_turn_chars: f64,
    /// Share of message turns that end with a question mark.
    pub question_rate: f64,
    /// Share of turns that were file uploads.
    pub file_interaction_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub profile: UserProfile,
    pub counts_by_status: StatusCounts,
    pub counts_by_kind: KindCounts,
    pub last_optimization: Option<OptimizationReport>,
    pub conversation: ConversationStats,
    pub recommendations: Vec<String>,
}

/// Snapshot the manager's registry.
pub fn snapshot(manager: &JobManager) -> AnalyticsSnapshot {
    compute(&manager.list(), manager.last_metrics())
}

/// Build a snapshot from jobs in creation order.
pub fn compute(jobs: &[Job], last_metrics: Option<OptimizationMetrics>) -> AnalyticsSnapshot {
    let mut counts_by_status = StatusCounts {
        total: jobs.len(),
        ..Default::default()
    };
    let mut counts_by_kind = KindCounts::default();
    for job in jobs {
        match job.status {
            JobStatus::Pending => counts_by_status.pending += 1,
            JobStatus::Processing => counts_by_status.processing += 1,
            JobStatus::Done => counts_by_status.done += 1,
            JobStatus::Error => counts_by_status.error += 1,
        }
        match job.kind {
            JobKind::Message => counts_by_kind.message += 1,
            JobKind::File => counts_by_kind.file += 1,
        }
    }

    let done: Vec<&Job> = jobs.iter().filter(|j| j.status == JobStatus::Done).collect();
    let profile = extract_profile(done.iter().filter_map(|j| match &j.input {
        JobInput::Message { text } => Some(text.as_str()),
        JobInput::File { .. } => None,
    }));
    let conversation = conversation_stats(&done);
    let last_optimization = last_metrics.map(OptimizationReport::from);
    let recommendations = recommend(&profile, &conversation, last_optimization.as_ref());

    AnalyticsSnapshot {
        profile,
        counts_by_status,
        counts_by_kind,
        last_optimization,
        conversation,
        recommendations,
    }
}

fn conversation_stats(done: &[&Job]) -> ConversationStats {
    if done.is_empty() {
        return ConversationStats::default();
    }

    let mut total_chars = 0;
    let mut messages = 0usize;
    let mut questions = 0usize;
    let mut files = 0usize;
    for job in done {
        let user_text = job.input.user_text();
        total_chars += user_text.chars().count()
            + job.result.as_deref().map(|r| r.chars().count()).unwrap_or(0);
        match &job.input {
            JobInput::Message { text } => {
                messages += 1;
                if text.trim_end().ends_with('?') {
                    questions += 1;
                }
            }
            JobInput::File { .. } => files += 1,
        }
    }

    let turns = done.len();
    ConversationStats {
        turns,
        total_chars,
        average_turn_chars: total_chars as f64 / turns as f64,
        question_rate: if messages == 0 {
            0.0
        } else {
            questions as f64 / messages as f64
        },
        file_interaction_rate: files as f64 / turns as f64,
    }
}

fn recommend(
    profile: &UserProfile,
    conversation: &ConversationStats,
    last_optimization: Option<&OptimizationReport>,
) -> Vec<String> {
    if conversation.turns == 0 {
        return vec!["Start a conversation to see analytics here.".to_string()];
    }

    let mut tips = Vec::new();
    if conversation.turns > LONG_CONVERSATION_TURNS {
        tips.push(
            "Consider starting a new topic; long conversations are condensed more aggressively."
                .to_string(),
        );
    }
    if profile.name.is_none() {
        tips.push(
            "Try introducing yourself (e.g. 'My name is ...') for more personal replies."
                .to_string(),
        );
    }
    if last_optimization.is_some_and(|o| o.optimization_applied) {
        tips.push(
            "Context optimization is active: replies focus on the most relevant parts of the \
             conversation."
                .to_string(),
        );
    }
    if conversation.file_interaction_rate == 0.0 {
        tips.push("Try uploading a file to get an AI analysis of it.".to_string());
    }
    if conversation.question_rate < LOW_QUESTION_RATE {
        tips.push("Ask more questions to get the most out of the assistant.".to_string());
    }

    if tips.is_empty() {
        tips.push("Great conversation! Keep chatting.".to_string());
    }
    tips
}
