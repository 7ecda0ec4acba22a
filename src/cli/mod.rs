//! Command-line interface.
//!
//! `parley chat` (the default) runs an interactive session; `ask` and
//! `analyze` submit one message or file and print the reply.

mod analyze;
mod chat;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use analyze::{TEXT_EXTENSIONS, extract_text, load_submission, run_analyze_command};
pub use chat::{ChatInput, run_ask_command, run_chat_command};

use crate::jobs::{Job, JobStatus};
use crate::service::{ChatService, PollPolicy, Submission};

#[derive(Parser, Debug)]
#[command(
    name = "parley",
    version,
    about = "Conversation engine with context optimization and provider fallback"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Append the offline simulated provider to the chain
    #[arg(long, global = true)]
    pub simulated: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Interactive chat session (default)
    Chat,

    /// Send one message and print the reply
    Ask {
        /// Message text
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,

        /// Print the whole job as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload a local file for analysis and print the reply
    Analyze {
        /// Path to the file
        path: PathBuf,

        /// Print the whole job as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Install the global tracing subscriber. Logs go to stderr so they never
/// mix with replies on stdout.
pub fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parley=warn"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Submit and block until the job is terminal.
pub(crate) async fn submit_and_wait(
    service: &ChatService,
    submission: Submission,
    poll: &PollPolicy,
) -> anyhow::Result<Job> {
    let id = service.submit(submission)?;
    Ok(service.wait_for(id, poll).await?)
}

pub(crate) fn print_job(job: &Job, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(job)?);
        return Ok(());
    }

    let reply = job.result.as_deref().unwrap_or_default();
    match job.status {
        JobStatus::Error => eprintln!("error: {reply}"),
        _ => println!("{reply}"),
    }
    Ok(())
}
