//! Turn scoring.
//!
//! Each candidate turn gets a weighted score built from four factors, each
//! normalized to `0.0..=1.0`:
//!
//! | Factor          | Signal                                               |
//! |-----------------|------------------------------------------------------|
//! | recency         | `decay ^ distance_from_end`                          |
//! | relevance       | share of the current input's terms found in the turn |
//! | intent          | questions, name mentions, profile facts, memory cues |
//! | length penalty  | long, repetitive turns                               |
//!
//! The penalty is subtracted; the rest are added.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::context::profile::{UserProfile, has_profile_statement};
use crate::context::types::ConversationTurn;

/// Relative weight of each scoring factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub recency: f64,
    pub relevance: f64,
    pub intent: f64,
    pub length_penalty: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            recency: 0.4,
            relevance: 0.3,
            intent: 0.2,
            length_penalty: 0.1,
        }
    }
}

/// Per-factor breakdown of one turn's score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnScore {
    pub recency: f64,
    pub relevance: f64,
    pub intent: f64,
    pub length_penalty: f64,
    pub total: f64,
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "your", "all", "any", "can", "had", "her",
    "was", "one", "our", "out", "has", "have", "his", "how", "its", "may", "who", "did", "get",
    "got", "him", "she", "too", "use", "that", "this", "with", "from", "they", "them", "then",
    "than", "what", "when", "where", "which", "will", "would", "could", "should", "there",
    "their", "about", "into", "just", "like", "more", "some", "such", "tell", "very", "also",
    "been", "being", "were", "does", "doing", "here", "me", "my",
];

/// Phrases that signal the user wants something kept in mind.
const MEMORY_CUES: &[&str] = &[
    "remember",
    "important",
    "don't forget",
    "do not forget",
    "keep in mind",
    "note that",
    "urgent",
    "critical",
];

const INTENT_STEP: f64 = 0.5;

/// Lowercased alphanumeric terms of at least three characters, stopwords
/// removed. Order is preserved and duplicates are kept.
pub fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Unique words over total words, `1.0` for empty text.
fn lexical_density(text: &str) -> f64 {
    let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    if words.is_empty() {
        return 1.0;
    }
    let unique: HashSet<&str> = words.iter().map(String::as_str).collect();
    unique.len() as f64 / words.len() as f64
}

/// Scores turns against one current input.
pub(crate) struct Scorer<'a> {
    weights: ScoreWeights,
    recency_decay: f64,
    long_turn_threshold: usize,
    query_terms: HashSet<String>,
    profile: &'a UserProfile,
}

impl<'a> Scorer<'a> {
    pub(crate) fn new(
        weights: ScoreWeights,
        recency_decay: f64,
        long_turn_threshold: usize,
        current_input: &str,
        profile: &'a UserProfile,
    ) -> Self {
        Self {
            weights,
            recency_decay,
            long_turn_threshold,
            query_terms: terms(current_input).into_iter().collect(),
            profile,
        }
    }

    /// Score `turn`, which sits `distance_from_end` places before the newest
    /// turn and has estimated size `size`.
    pub(crate) fn score(
        &self,
        turn: &ConversationTurn,
        distance_from_end: usize,
        size: usize,
    ) -> TurnScore {
        let text = turn.combined_text();

        let recency = self
            .recency_decay
            .powi(i32::try_from(distance_from_end).unwrap_or(i32::MAX));
        let relevance = self.relevance(&text);
        let intent = self.intent(turn);
        let length_penalty = self.length_penalty(&text, size);

        let total = self.weights.recency * recency
            + self.weights.relevance * relevance
            + self.weights.intent * intent
            - self.weights.length_penalty * length_penalty;

        TurnScore {
            recency,
            relevance,
            intent,
            length_penalty,
            total,
        }
    }

    fn relevance(&self, text: &str) -> f64 {
        if self.query_terms.is_empty() {
            return 0.0;
        }
        let turn_terms: HashSet<String> = terms(text).into_iter().collect();
        let hits = self
            .query_terms
            .iter()
            .filter(|t| turn_terms.contains(*t))
            .count();
        hits as f64 / self.query_terms.len() as f64
    }

    fn intent(&self, turn: &ConversationTurn) -> f64 {
        let user = turn.user_text.as_str();
        let lower = user.to_lowercase();

        let signals = [
            user.contains('?'),
            self.profile.mentions_name(&turn.combined_text()),
            !turn.has_attachment() && has_profile_statement(user),
            MEMORY_CUES.iter().any(|cue| lower.contains(cue)),
        ];
        let count = signals.iter().filter(|s| **s).count();
        (count as f64 * INTENT_STEP).min(1.0)
    }

    fn length_penalty(&self, text: &str, size: usize) -> f64 {
        if size <= self.long_turn_threshold || size == 0 {
            return 0.0;
        }
        let overshoot = 1.0 - self.long_turn_threshold as f64 / size as f64;
        overshoot * (1.0 - lexical_density(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer<'a>(input: &str, profile: &'a UserProfile) -> Scorer<'a> {
        Scorer::new(ScoreWeights::default(), 0.85, 100, input, profile)
    }

    #[test]
    fn terms_drop_short_words_and_stopwords() {
        assert_eq!(
            terms("Tell me about the Rust borrow checker, OK?"),
            vec!["rust", "borrow", "checker"]
        );
    }

    #[test]
    fn recency_decays_with_distance() {
        let profile = UserProfile::default();
        let s = scorer("", &profile);
        let turn = ConversationTurn::new(0, "plain words", "reply");
        let newest = s.score(&turn, 0, 10);
        let older = s.score(&turn, 3, 10);
        assert_eq!(newest.recency, 1.0);
        assert!(older.recency < newest.recency);
        assert!(older.total < newest.total);
    }

    #[test]
    fn relevance_is_fraction_of_query_terms() {
        let profile = UserProfile::default();
        let s = scorer("rust borrow checker", &profile);
        let turn = ConversationTurn::new(0, "how does the borrow checker work", "it checks");
        let score = s.score(&turn, 0, 10);
        assert!((score.relevance - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn intent_counts_signals_and_caps_at_one() {
        let profile = UserProfile {
            name: Some("Bob".into()),
            ..Default::default()
        };
        let s = scorer("", &profile);

        let plain = ConversationTurn::new(0, "the weather", "sunny");
        assert_eq!(s.score(&plain, 0, 10).intent, 0.0);

        let question = ConversationTurn::new(0, "is it sunny?", "yes");
        assert_eq!(s.score(&question, 0, 10).intent, 0.5);

        let loaded = ConversationTurn::new(0, "Remember, my name is Bob. Got it?", "sure Bob");
        assert_eq!(s.score(&loaded, 0, 10).intent, 1.0);
    }

    #[test]
    fn repetitive_long_turns_are_penalized() {
        let profile = UserProfile::default();
        let s = scorer("", &profile);
        let repetitive = ConversationTurn::new(0, "spam ".repeat(100), "");
        let size = repetitive.combined_text().chars().count();
        let score = s.score(&repetitive, 0, size);
        assert!(score.length_penalty > 0.7);

        let short = ConversationTurn::new(0, "spam spam", "");
        assert_eq!(s.score(&short, 0, 9).length_penalty, 0.0);
    }
}
