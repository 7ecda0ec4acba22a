//! Condensing dropped turns into a single summary line.

use std::collections::HashMap;

use crate::context::estimate::SizeEstimator;
use crate::context::scoring::terms;
use crate::context::types::ConversationTurn;

const MAX_REQUESTS: usize = 3;
const REQUEST_EXCERPT_CHARS: usize = 60;
const MAX_TOPICS: usize = 5;
const MAX_FILES: usize = 3;
const ELLIPSIS: &str = "...";

/// Summarize `dropped` (chronological) into at most `max_size` units.
///
/// Returns `None` when nothing was dropped or the allowance cannot hold even
/// a truncated summary.
pub(crate) fn summarize(
    dropped: &[&ConversationTurn],
    max_size: usize,
    estimator: &dyn SizeEstimator,
) -> Option<String> {
    if dropped.is_empty() || max_size == 0 {
        return None;
    }

    let mut text = format!(
        "Earlier conversation: {} {} condensed.",
        dropped.len(),
        if dropped.len() == 1 { "turn" } else { "turns" }
    );

    // Most recent requests first; they are the likeliest to be referenced.
    let requests: Vec<String> = dropped
        .iter()
        .rev()
        .filter(|t| !t.has_attachment())
        .filter_map(|t| excerpt(&t.user_text, REQUEST_EXCERPT_CHARS))
        .take(MAX_REQUESTS)
        .map(|r| format!("\"{r}\""))
        .collect();
    if !requests.is_empty() {
        text.push_str(&format!(" The user asked: {}.", requests.join("; ")));
    }

    let topics = top_terms(dropped, MAX_TOPICS);
    if !topics.is_empty() {
        text.push_str(&format!(" Recurring topics: {}.", topics.join(", ")));
    }

    let files: Vec<&str> = dropped
        .iter()
        .filter_map(|t| t.attachment.as_deref())
        .take(MAX_FILES)
        .collect();
    if !files.is_empty() {
        text.push_str(&format!(" Files shared: {}.", files.join(", ")));
    }

    truncate_to_budget(&text, max_size, estimator)
}

/// First line of `text`, trimmed and cut to `max_chars`.
fn excerpt(text: &str, max_chars: usize) -> Option<String> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    if line.chars().count() <= max_chars {
        Some(line.to_string())
    } else {
        let cut: String = line.chars().take(max_chars).collect();
        Some(format!("{}{ELLIPSIS}", cut.trim_end()))
    }
}

/// Most frequent terms across user and assistant text; ties break
/// alphabetically so the output is stable.
fn top_terms(turns: &[&ConversationTurn], limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for turn in turns {
        for term in terms(&turn.combined_text()) {
            *counts.entry(term).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().filter(|(_, n)| *n > 1).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(t, _)| t).collect()
}

/// Longest prefix of `text` (plus an ellipsis when cut) that fits `max_size`.
fn truncate_to_budget(
    text: &str,
    max_size: usize,
    estimator: &dyn SizeEstimator,
) -> Option<String> {
    if estimator.estimate(text) <= max_size {
        return Some(text.to_string());
    }

    let chars: Vec<char> = text.chars().collect();
    let candidate = |n: usize| -> String {
        let prefix: String = chars[..n].iter().collect();
        format!("{}{ELLIPSIS}", prefix.trim_end())
    };

    // Binary search the largest prefix length whose candidate fits.
    let (mut lo, mut hi) = (0usize, chars.len());
    while lo < hi {
        let mid = (lo + hi).div_ceil(2);
        if estimator.estimate(&candidate(mid)) <= max_size {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    if lo == 0 {
        None
    } else {
        Some(candidate(lo))
    }
}
