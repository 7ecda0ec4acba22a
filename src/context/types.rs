//! Data carried into and out of the optimizer.

use serde::{Deserialize, Serialize};

use crate::context::profile::UserProfile;

/// One completed exchange, derived from a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Creation order of the job that produced this turn.
    pub position: u64,
    pub user_text: String,
    pub assistant_text: String,
    /// Filename when the turn came from a file upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

impl ConversationTurn {
    pub fn new(
        position: u64,
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
    ) -> Self {
        Self {
            position,
            user_text: user_text.into(),
            assistant_text: assistant_text.into(),
            attachment: None,
        }
    }

    /// Mark this turn as a file upload.
    pub fn with_attachment(mut self, filename: impl Into<String>) -> Self {
        self.attachment = Some(filename.into());
        self
    }

    pub fn has_attachment(&self) -> bool {
        self.attachment.is_some()
    }

    /// User and assistant text joined, used for scoring.
    pub(crate) fn combined_text(&self) -> String {
        format!("{}\n{}", self.user_text, self.assistant_text)
    }
}

/// Size accounting for one optimization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationMetrics {
    pub original_count: usize,
    pub selected_count: usize,
    pub estimated_original_size: usize,
    /// Selected turns plus the summary.
    pub estimated_optimized_size: usize,
}

impl OptimizationMetrics {
    /// Optimized size over original size. `1.0` when there was no history.
    pub fn compression_ratio(&self) -> f64 {
        if self.estimated_original_size == 0 {
            return 1.0;
        }
        self.estimated_optimized_size as f64 / self.estimated_original_size as f64
    }

    /// Percentage of the original size that was removed, clamped at zero.
    pub fn reduction_percent(&self) -> f64 {
        ((1.0 - self.compression_ratio()) * 100.0).max(0.0)
    }

    pub fn within_band(&self, low: f64, high: f64) -> bool {
        let ratio = self.compression_ratio();
        ratio >= low && ratio <= high
    }

    pub fn dropped_count(&self) -> usize {
        self.original_count.saturating_sub(self.selected_count)
    }
}

/// What the optimizer hands to the fallback chain.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizedContext {
    /// Condensed account of dropped turns, if any were dropped.
    pub summary: Option<String>,
    /// Selected turns in chronological order.
    pub turns: Vec<ConversationTurn>,
    pub profile: UserProfile,
    pub metrics: OptimizationMetrics,
}

impl OptimizedContext {
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty() && self.summary.is_none()
    }

    pub fn contains_position(&self, position: u64) -> bool {
        self.turns.iter().any(|t| t.position == position)
    }

    /// True when at least one turn was dropped.
    pub fn optimization_applied(&self) -> bool {
        self.metrics.selected_count < self.metrics.original_count
    }
}
