//! No-network provider with canned, deterministic replies.
//!
//! Useful for demos and offline development. It reads the same prompt the
//! real providers get, so profile facts injected by the prompt builder show
//! up in its answers too.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::LlmError;
use crate::jobs::{FileCategory, size_label};
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

const PROVIDER_NAME: &str = "simulated";

static PROFILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"The user's name is ([^.]+)\.").expect("valid regex"));

static FILE_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^- (Filename|Type|Size): (.+)$").expect("valid regex"));

/// Offline provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedProvider;

impl SimulatedProvider {
    pub fn new() -> Self {
        Self
    }

    fn reply(&self, req: &CompletionRequest) -> String {
        let message = req.last_user_message().unwrap_or_default().trim();
        let known_name = req
            .system_prompt()
            .and_then(|s| PROFILE_NAME.captures(&s).map(|c| c[1].to_string()));

        if message.starts_with("Analyze this ") {
            return file_reply(message);
        }

        let lower = message.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let asks_about_name = lower.contains("my name")
            || lower.contains("calling me")
            || lower.contains("call me")
            || lower.contains("who am i");
        if asks_about_name {
            if let Some(name) = &known_name {
                return format!("You told me your name is {name}, so I'll call you {name}!");
            }
        }

        if words.iter().any(|w| matches!(*w, "hello" | "hi" | "hey")) {
            return match &known_name {
                Some(name) => format!("Hello again, {name}! How can I help you today?"),
                None => "Hello! Nice to meet you. How can I assist you today?".to_string(),
            };
        }
        if words.contains(&"help") {
            return "I'm here to help! Feel free to ask me anything you'd like to know.".to_string();
        }
        if message.contains('?') {
            return format!(
                "That's a great question about '{message}'. Let me share some thoughts..."
            );
        }

        let rotating = [
            format!("I understand you mentioned: '{message}'. That's interesting!"),
            format!("Thank you for sharing '{message}' with me. How can I help you with that?"),
            format!("Regarding your message about '{message}', I'd be happy to assist you."),
        ];
        let index = message.chars().count() % rotating.len();
        rotating[index].clone()
    }
}

fn file_reply(prompt: &str) -> String {
    let mut filename = "your file";
    let mut file_type = "";
    let mut size: u64 = 0;
    for caps in FILE_FIELD.captures_iter(prompt) {
        let (Some(field), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        match field.as_str() {
            "Filename" => filename = value.as_str().trim(),
            "Type" => file_type = value.as_str().trim(),
            "Size" => {
                size = value
                    .as_str()
                    .trim()
                    .trim_end_matches(" bytes")
                    .parse()
                    .unwrap_or(0)
            }
            _ => {}
        }
    }

    let label = size_label(size);
    match FileCategory::from_extension(file_type) {
        FileCategory::Document => format!(
            "Document analysis: '{filename}' ({label}, {size} bytes) is a text document. \
The content is readable and well structured."
        ),
        FileCategory::Image => format!(
            "Image analysis: '{filename}' ({label}, {size} bytes) is an image file. \
I've looked over the visual content and it appears to be a valid image."
        ),
        FileCategory::Data => format!(
            "Data analysis: '{filename}' ({label}, {size} bytes) contains structured data. \
The format parses cleanly and the structure looks valid."
        ),
        FileCategory::Other => format!(
            "File analysis: '{filename}' ({label}, {size} bytes) has been processed and is in a supported format."
        ),
    }
}

#[async_trait]
impl LlmProvider for SimulatedProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse::text(self.reply(&req)))
    }
}
