//! History selection under a size budget.

use std::sync::Arc;

use crate::context::estimate::{CharEstimator, SizeEstimator};
use crate::context::profile::extract_profile;
use crate::context::scoring::{ScoreWeights, Scorer};
use crate::context::summary::summarize;
use crate::context::types::{ConversationTurn, OptimizationMetrics, OptimizedContext};

/// Optimizer tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Maximum estimated size of selected history, summary and current input.
    pub size_budget: usize,
    /// Allowance reserved for the summary when turns must be dropped.
    pub summary_max: usize,
    /// Turns above this size are candidates for the length penalty.
    pub long_turn_threshold: usize,
    pub weights: ScoreWeights,
    /// Per-turn recency multiplier, in `(0, 1]`.
    pub recency_decay: f64,
    /// Upper bound on selected turns, regardless of size.
    pub max_turns: Option<usize>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            size_budget: 4000,
            summary_max: 400,
            long_turn_threshold: 600,
            weights: ScoreWeights::default(),
            recency_decay: 0.85,
            max_turns: None,
        }
    }
}

/// Builds bounded contexts from conversation history.
///
/// Stateless apart from its configuration: the same history and input always
/// produce the same context.
#[derive(Debug, Clone)]
pub struct ContextOptimizer {
    config: OptimizerConfig,
    estimator: Arc<dyn SizeEstimator>,
}

impl Default for ContextOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

impl ContextOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            estimator: Arc::new(CharEstimator),
        }
    }

    /// Swap the size estimator, e.g. for a tokenizer-backed one.
    pub fn with_estimator(mut self, estimator: Arc<dyn SizeEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimize with the configured budget.
    pub fn optimize(&self, history: &[ConversationTurn], current_input: &str) -> OptimizedContext {
        self.optimize_within(history, current_input, self.config.size_budget)
    }

    /// Optimize for a file analysis prompt. The prompt is budgeted and scored
    /// like any input but never feeds the profile.
    pub fn optimize_attachment(
        &self,
        history: &[ConversationTurn],
        prompt: &str,
    ) -> OptimizedContext {
        self.select(history, prompt, None, self.config.size_budget)
    }

    /// Select turns from `history` (chronological) so that the selection,
    /// the summary of what was dropped and `current_input` fit `size_budget`.
    pub fn optimize_within(
        &self,
        history: &[ConversationTurn],
        current_input: &str,
        size_budget: usize,
    ) -> OptimizedContext {
        self.select(history, current_input, Some(current_input), size_budget)
    }

    fn select(
        &self,
        history: &[ConversationTurn],
        current_input: &str,
        profiled_input: Option<&str>,
        size_budget: usize,
    ) -> OptimizedContext {
        let profile = extract_profile(
            history
                .iter()
                .filter(|t| !t.has_attachment())
                .map(|t| t.user_text.as_str())
                .chain(profiled_input),
        );

        let sizes: Vec<usize> = history.iter().map(|t| self.turn_size(t)).collect();
        let original_size: usize = sizes.iter().sum();
        let input_size = self.estimator.estimate(current_input);

        let turn_limit = self.config.max_turns.unwrap_or(usize::MAX);
        if original_size + input_size <= size_budget && history.len() <= turn_limit {
            return OptimizedContext {
                summary: None,
                turns: history.to_vec(),
                profile,
                metrics: OptimizationMetrics {
                    original_count: history.len(),
                    selected_count: history.len(),
                    estimated_original_size: original_size,
                    estimated_optimized_size: original_size,
                },
            };
        }

        let available = size_budget.saturating_sub(input_size + self.config.summary_max);
        if input_size >= size_budget {
            tracing::warn!(
                input_size,
                size_budget,
                "Current input alone exceeds the context budget"
            );
        }

        let scorer = Scorer::new(
            self.config.weights,
            self.config.recency_decay,
            self.config.long_turn_threshold,
            current_input,
            &profile,
        );
        let last = history.len().saturating_sub(1);
        let mut ranked: Vec<(usize, f64)> = history
            .iter()
            .enumerate()
            .map(|(i, turn)| (i, scorer.score(turn, last - i, sizes[i]).total))
            .collect();
        // Highest score first; ties go to the more recent turn.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

        let mut keep = vec![false; history.len()];
        let mut used = 0usize;
        let mut kept = 0usize;
        for (i, _) in &ranked {
            if kept == turn_limit {
                break;
            }
            if used + sizes[*i] <= available {
                keep[*i] = true;
                used += sizes[*i];
                kept += 1;
            }
        }

        let mut turns = Vec::new();
        let mut dropped = Vec::new();
        for (turn, kept) in history.iter().zip(&keep) {
            if *kept {
                turns.push(turn.clone());
            } else {
                dropped.push(turn);
            }
        }

        // Room left after the input and the selection, never more than the
        // reserved allowance.
        let allowance = size_budget
            .saturating_sub(input_size + used)
            .min(self.config.summary_max);
        let summary = summarize(&dropped, allowance, self.estimator.as_ref());
        let summary_size = summary
            .as_deref()
            .map(|s| self.estimator.estimate(s))
            .unwrap_or(0);

        let metrics = OptimizationMetrics {
            original_count: history.len(),
            selected_count: turns.len(),
            estimated_original_size: original_size,
            estimated_optimized_size: used + summary_size,
        };

        tracing::debug!(
            original_count = metrics.original_count,
            selected_count = metrics.selected_count,
            original_size = metrics.estimated_original_size,
            optimized_size = metrics.estimated_optimized_size,
            ratio = metrics.compression_ratio(),
            "Context optimized"
        );

        OptimizedContext {
            summary,
            turns,
            profile,
            metrics,
        }
    }

    fn turn_size(&self, turn: &ConversationTurn) -> usize {
        self.estimator.estimate(&turn.user_text) + self.estimator.estimate(&turn.assistant_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::estimate::ApproxTokenEstimator;

    fn padded_history(count: u64) -> Vec<ConversationTurn> {
        (0..count)
            .map(|i| {
                ConversationTurn::new(
                    i,
                    format!("{:<50}", format!("user message {i}")),
                    format!("{:<50}", format!("assistant reply {i}")),
                )
            })
            .collect()
    }

    fn optimizer(size_budget: usize, summary_max: usize) -> ContextOptimizer {
        ContextOptimizer::new(OptimizerConfig {
            size_budget,
            summary_max,
            ..OptimizerConfig::default()
        })
    }

    #[test]
    fn empty_history_is_empty_context() {
        let ctx = ContextOptimizer::default().optimize(&[], "hello");
        assert!(ctx.is_empty());
        assert_eq!(ctx.metrics.original_count, 0);
        assert_eq!(ctx.metrics.compression_ratio(), 1.0);
    }

    #[test]
    fn history_that_fits_is_kept_whole() {
        let history = padded_history(5);
        let ctx = optimizer(4000, 400).optimize(&history, "next");
        assert_eq!(ctx.turns, history);
        assert_eq!(ctx.summary, None);
        assert!(!ctx.optimization_applied());
    }

    #[test]
    fn oversized_history_is_compressed_into_band() {
        let history = padded_history(40);
        let ctx = optimizer(1200, 300).optimize(&history, "tell me more");

        assert_eq!(ctx.metrics.original_count, 40);
        assert_eq!(ctx.metrics.estimated_original_size, 4000);
        assert!(ctx.metrics.selected_count <= ctx.metrics.original_count);
        assert!(ctx.summary.is_some());
        assert!(
            ctx.metrics.within_band(0.2, 0.4),
            "ratio {}",
            ctx.metrics.compression_ratio()
        );
    }

    #[test]
    fn selection_is_chronological_and_favors_recent_turns() {
        let history = padded_history(40);
        let ctx = optimizer(1200, 300).optimize(&history, "tell me more");

        let positions: Vec<u64> = ctx.turns.iter().map(|t| t.position).collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
        assert!(ctx.contains_position(39));
    }

    #[test]
    fn relevant_old_turn_survives() {
        let mut history = padded_history(40);
        history[2].user_text = format!("{:<50}", "my favourite database is postgres");
        let ctx = optimizer(1200, 300).optimize(&history, "which database did I pick?");
        assert!(ctx.contains_position(2));
    }

    #[test]
    fn selected_size_respects_budget() {
        let history = padded_history(40);
        let input = "tell me more";
        let ctx = optimizer(1200, 300).optimize(&history, input);
        let total = ctx.metrics.estimated_optimized_size + input.chars().count();
        assert!(total <= 1200);
    }

    #[test]
    fn optimization_is_deterministic() {
        let history = padded_history(30);
        let opt = optimizer(900, 200);
        let a = opt.optimize(&history, "what was said?");
        let b = opt.optimize(&history, "what was said?");
        assert_eq!(a.turns, b.turns);
        assert_eq!(a.summary, b.summary);
        assert_eq!(a.metrics, b.metrics);
    }

    #[test]
    fn profile_comes_from_history_and_input() {
        let history = vec![ConversationTurn::new(0, "My name is Bob", "Nice to meet you")];
        let ctx = ContextOptimizer::default().optimize(&history, "I love chess");
        assert_eq!(ctx.profile.name.as_deref(), Some("Bob"));
        assert!(ctx.profile.preferences.contains("chess"));
    }

    #[test]
    fn attachment_text_is_not_profiled() {
        let history = vec![
            ConversationTurn::new(0, "Shared a file: bio.txt\nMy name is Mallory", "Read it")
                .with_attachment("bio.txt"),
        ];
        let ctx = ContextOptimizer::default().optimize(&history, "hi");
        assert_eq!(ctx.profile.name, None);
    }

    #[test]
    fn attachment_prompt_is_budgeted_but_not_profiled() {
        let history = padded_history(40);
        let prompt = format!("Analyze this document:\n\nMy name is Mallory\n{}", "x".repeat(600));
        let ctx = optimizer(1200, 300).optimize_attachment(&history, &prompt);

        assert_eq!(ctx.profile.name, None);
        let total = ctx.metrics.estimated_optimized_size + prompt.chars().count();
        assert!(total <= 1200, "total {total}");
    }

    #[test]
    fn oversized_input_leaves_no_room_for_a_summary() {
        let history = padded_history(10);
        let input = "y".repeat(1300);
        let ctx = optimizer(1200, 300).optimize(&history, &input);
        assert!(ctx.turns.is_empty());
        assert_eq!(ctx.summary, None);
    }

    #[test]
    fn turn_limit_caps_selection() {
        let history = padded_history(12);
        let opt = ContextOptimizer::new(OptimizerConfig {
            max_turns: Some(5),
            ..OptimizerConfig::default()
        });
        let ctx = opt.optimize(&history, "next");

        assert_eq!(ctx.turns.len(), 5);
        assert!(ctx.contains_position(11));
        assert!(ctx.summary.is_some());
        assert_eq!(ctx.metrics.dropped_count(), 7);
    }

    #[test]
    fn custom_estimator_changes_accounting() {
        let history = padded_history(10);
        let opt = ContextOptimizer::default()
            .with_estimator(Arc::new(ApproxTokenEstimator::default()));
        let ctx = opt.optimize(&history, "next");
        assert_eq!(ctx.metrics.estimated_original_size, 10 * (13 + 13));
    }
}
