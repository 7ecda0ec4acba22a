//! Prompt construction from an optimized context.

use std::borrow::Cow;

use crate::context::OptimizedContext;
use crate::jobs::{FileCategory, JobInput};
use crate::llm::provider::{ChatMessage, CompletionRequest};

const PERSONA: &str = "You are Parley, a friendly and helpful AI assistant. \
Answer conversationally, stay concise, and use what you know about the user \
when it is relevant.";

/// Characters of extracted file text included in an analysis prompt.
const ANALYSIS_EXCERPT_CHARS: usize = 2000;

const MAX_TOKENS: u32 = 1024;
const TEMPERATURE: f32 = 0.7;

/// Build the provider request for `input` given the optimized history.
///
/// Layout: one system message (persona, profile facts, summary of dropped
/// turns), then the selected turns as user/assistant pairs, then the current
/// input.
pub fn build_request(context: &OptimizedContext, input: &JobInput) -> CompletionRequest {
    let mut system = PERSONA.to_string();
    if let Some(profile) = context.profile.describe() {
        system.push_str("\n\nWhat you know about the user: ");
        system.push_str(&profile);
    }
    if let Some(summary) = &context.summary {
        system.push_str("\n\n");
        system.push_str(summary);
    }

    let mut messages = Vec::with_capacity(context.turns.len() * 2 + 2);
    messages.push(ChatMessage::system(system));
    for turn in &context.turns {
        messages.push(ChatMessage::user(turn.user_text.clone()));
        messages.push(ChatMessage::assistant(turn.assistant_text.clone()));
    }
    messages.push(ChatMessage::user(current_prompt(input)));

    CompletionRequest::new(messages)
        .with_max_tokens(MAX_TOKENS)
        .with_temperature(TEMPERATURE)
}

/// The final user message: the text itself, or a file analysis request.
pub fn current_prompt(input: &JobInput) -> String {
    match input {
        JobInput::Message { text } => text.clone(),
        JobInput::File {
            filename,
            file_type,
            file_size,
            extracted_text,
        } => {
            let (subject, ask) = match FileCategory::from_extension(file_type) {
                FileCategory::Document => (
                    "document",
                    "Summarize what this document contains and point out anything notable.",
                ),
                FileCategory::Image => (
                    "image",
                    "Describe what this image likely shows based on the information available.",
                ),
                FileCategory::Data => (
                    "data file",
                    "Describe the structure of this data and what it appears to record.",
                ),
                FileCategory::Other => (
                    "file",
                    "Give a brief analysis of this file based on its characteristics.",
                ),
            };

            let mut prompt = format!(
                "Analyze this {subject}:\n- Filename: {filename}\n- Type: {file_type}\n- Size: {file_size} bytes\n\n{ask}"
            );
            let excerpt: String = extracted_text
                .trim()
                .chars()
                .take(ANALYSIS_EXCERPT_CHARS)
                .collect();
            if !excerpt.is_empty() {
                prompt.push_str("\n\nExtracted content:\n");
                prompt.push_str(&excerpt);
            }
            prompt
        }
    }
}

/// `input` with its file excerpt shortened so that [`current_prompt`] stays
/// within `max_chars`. Messages and prompts that already fit are returned
/// as is; the analysis header is never cut.
pub fn fit_input(input: &JobInput, max_chars: usize) -> Cow<'_, JobInput> {
    let size = current_prompt(input).chars().count();
    let JobInput::File {
        filename,
        file_type,
        file_size,
        extracted_text,
    } = input
    else {
        return Cow::Borrowed(input);
    };
    if size <= max_chars {
        return Cow::Borrowed(input);
    }

    let excerpt_len = extracted_text
        .trim()
        .chars()
        .count()
        .min(ANALYSIS_EXCERPT_CHARS);
    let keep = excerpt_len.saturating_sub(size - max_chars);
    Cow::Owned(JobInput::File {
        filename: filename.clone(),
        file_type: file_type.clone(),
        file_size: *file_size,
        extracted_text: extracted_text.trim().chars().take(keep).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextOptimizer, ConversationTurn};
    use crate::llm::provider::Role;

    #[test]
    fn request_carries_profile_turns_and_input() {
        let history = vec![ConversationTurn::new(0, "My name is Bob", "Hi Bob!")];
        let ctx = ContextOptimizer::default().optimize(&history, "What do you like calling me?");
        let req = build_request(&ctx, &JobInput::message("What do you like calling me?"));

        let roles: Vec<Role> = req.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert!(req.messages[0].content.contains("The user's name is Bob."));
        assert_eq!(req.messages[1].content, "My name is Bob");
        assert_eq!(req.last_user_message(), Some("What do you like calling me?"));
    }

    #[test]
    fn summary_goes_into_system_message() {
        let ctx = OptimizedContext {
            summary: Some("Earlier conversation: 4 turns condensed.".into()),
            ..Default::default()
        };
        let req = build_request(&ctx, &JobInput::message("and now?"));
        assert!(req.messages[0].content.ends_with("Earlier conversation: 4 turns condensed."));
        assert_eq!(req.messages.len(), 2);
    }

    #[test]
    fn file_prompt_depends_on_category() {
        let image = current_prompt(&JobInput::file("cat.png", ".png", 900, ""));
        assert!(image.starts_with("Analyze this image:"));
        assert!(!image.contains("Extracted content"));

        let data = current_prompt(&JobInput::file(
            "sales.csv",
            ".csv",
            120,
            "region,total\nnorth,4",
        ));
        assert!(data.starts_with("Analyze this data file:"));
        assert!(data.ends_with("region,total\nnorth,4"));
    }

    #[test]
    fn long_excerpt_is_fitted_to_the_limit() {
        let input = JobInput::file("notes.txt", ".txt", 2000, "z".repeat(2000));
        let fitted = fit_input(&input, 900);

        let prompt = current_prompt(&fitted);
        assert_eq!(prompt.chars().count(), 900);
        assert!(prompt.starts_with("Analyze this document:"));
        assert!(prompt.contains("- Filename: notes.txt"));

        let short = JobInput::message("hi");
        assert!(matches!(fit_input(&short, 1), Cow::Borrowed(_)));
    }
}
