use clap::Parser;

use parley::cli::{
    Cli, Command, init_logging, run_analyze_command, run_ask_command, run_chat_command,
};
use parley::{ChatService, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let mut config = Config::from_env()?;
    if cli.simulated {
        config.llm.use_simulated = true;
    }

    let service = ChatService::from_config(&config)?;
    let poll = config.poll.to_poll_policy();

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat_command(&service, &poll).await,
        Command::Ask { message, json } => {
            run_ask_command(&service, &poll, &message.join(" "), json).await
        }
        Command::Analyze { path, json } => run_analyze_command(&service, &poll, &path, json).await,
    }
}
