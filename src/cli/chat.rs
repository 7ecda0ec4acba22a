//! Interactive chat loop and the one-shot `ask` command.

use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::service::{ChatService, PollPolicy, Submission};

const HELP: &str = "\
Commands:
  /file <path>     upload a file for analysis
  /history         show the conversation so far
  /analytics       show conversation analytics as JSON
  /preview <text>  show the optimized context for <text> without sending it
  /clear           forget the conversation
  /help            show this help
  /quit            leave";

/// One line typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Message(String),
    File(PathBuf),
    History,
    Analytics,
    Preview(String),
    Clear,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl ChatInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Message(line.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        match (name.to_ascii_lowercase().as_str(), arg) {
            ("file", path) if !path.is_empty() => Self::File(PathBuf::from(path)),
            ("preview", text) if !text.is_empty() => Self::Preview(text.to_string()),
            ("history", _) => Self::History,
            ("analytics" | "stats", _) => Self::Analytics,
            ("clear", _) => Self::Clear,
            ("help" | "?", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

pub async fn run_chat_command(service: &ChatService, poll: &PollPolicy) -> Result<()> {
    println!("Parley chat. Type /help for commands, /quit to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ChatInput::parse(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Help => println!("{HELP}"),
            ChatInput::Unknown(cmd) => println!("Unknown command: {cmd}. Type /help."),
            ChatInput::Message(text) => {
                reply(service, poll, Submission::message(text)).await;
            }
            ChatInput::File(path) => {
                match super::load_submission(&path, service.upload_policy()) {
                    Ok(submission) => reply(service, poll, submission).await,
                    Err(e) => println!("error: {e:#}"),
                }
            }
            ChatInput::History => print_history(service),
            ChatInput::Analytics => {
                println!("{}", serde_json::to_string_pretty(&service.analytics())?);
            }
            ChatInput::Preview(text) => {
                println!("{}", serde_json::to_string_pretty(&service.preview(&text))?);
            }
            ChatInput::Clear => {
                let removed = service.clear();
                println!("Cleared {removed} job(s).");
            }
        }
    }

    Ok(())
}

pub async fn run_ask_command(
    service: &ChatService,
    poll: &PollPolicy,
    message: &str,
    json: bool,
) -> Result<()> {
    let job = super::submit_and_wait(service, Submission::message(message), poll).await?;
    super::print_job(&job, json)
}

async fn reply(service: &ChatService, poll: &PollPolicy, submission: Submission) {
    match super::submit_and_wait(service, submission, poll).await {
        Ok(job) => println!("parley> {}", job.result.as_deref().unwrap_or_default()),
        Err(e) => println!("error: {e}"),
    }
}

fn print_history(service: &ChatService) {
    let jobs = service.history();
    if jobs.is_empty() {
        println!("(no conversation yet)");
        return;
    }
    for job in jobs {
        let user = job.input.user_text();
        let first_line = user.lines().next().unwrap_or_default();
        println!("[{}] you: {first_line}", job.status);
        if let Some(result) = &job.result {
            println!("    parley: {result}");
        }
    }
}

fn print_prompt() {
    use std::io::Write;
    print!("you> ");
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            ChatInput::parse("  hello there  "),
            ChatInput::Message("hello there".to_string())
        );
        assert_eq!(ChatInput::parse("   "), ChatInput::Empty);
    }

    #[test]
    fn slash_commands_are_recognized() {
        assert_eq!(
            ChatInput::parse("/file ./notes.txt"),
            ChatInput::File(PathBuf::from("./notes.txt"))
        );
        assert_eq!(
            ChatInput::parse("/preview what did I say?"),
            ChatInput::Preview("what did I say?".to_string())
        );
        assert_eq!(ChatInput::parse("/STATS"), ChatInput::Analytics);
        assert_eq!(ChatInput::parse("/exit"), ChatInput::Quit);
        assert_eq!(ChatInput::parse("/clear"), ChatInput::Clear);
    }

    #[test]
    fn commands_missing_arguments_are_unknown() {
        assert_eq!(ChatInput::parse("/file"), ChatInput::Unknown("/file".to_string()));
        assert_eq!(ChatInput::parse("/dance"), ChatInput::Unknown("/dance".to_string()));
    }
}
