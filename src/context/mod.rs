//! Context optimization.
//!
//! Turns the conversation so far into a bounded context for the next provider
//! call:
//! - Extracts a user profile (name, likes, dislikes) from the user's messages
//! - Scores each prior turn for recency, relevance and intent
//! - Keeps the best turns that fit the size budget, in chronological order
//! - Condenses everything it dropped into one short summary

mod estimate;
mod optimizer;
mod profile;
mod scoring;
mod summary;
mod types;

pub use estimate::{ApproxTokenEstimator, CharEstimator, SizeEstimator};
pub use optimizer::{ContextOptimizer, OptimizerConfig};
pub use profile::{
    PROFILE_RULES, ProfileField, ProfileRule, UserProfile, extract_profile, has_profile_statement,
};
pub use scoring::{ScoreWeights, TurnScore, terms};
pub use types::{ConversationTurn, OptimizationMetrics, OptimizedContext};
