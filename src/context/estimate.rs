//! Size estimation for budget accounting.

use std::fmt::Debug;

/// Estimates the size of a piece of text in budget units.
///
/// The optimizer only ever compares and sums estimates, so any monotone
/// measure works: characters, approximate tokens, bytes.
pub trait SizeEstimator: Debug + Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// Counts Unicode scalar values. The default estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharEstimator;

impl SizeEstimator for CharEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count()
    }
}

/// Rough token count: characters divided by a fixed ratio, rounded up.
#[derive(Debug, Clone, Copy)]
pub struct ApproxTokenEstimator {
    pub chars_per_token: usize,
}

impl Default for ApproxTokenEstimator {
    fn default() -> Self {
        Self { chars_per_token: 4 }
    }
}

impl SizeEstimator for ApproxTokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        let chars = text.chars().count();
        chars.div_ceil(self.chars_per_token.max(1))
    }
}
