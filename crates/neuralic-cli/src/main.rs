use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use neuralic::chat::ChatOrchestrator;
use neuralic::config::Config;
use neuralic::keys::ApiKeyRegistry;
use neuralic::memory::MemoryStore;
use neuralic_cli::commands::{AutopilotCommand, IndexCommand, KeysCommand, MemoryCommand};
use neuralic_cli::error::CliResult;
use neuralic_cli::output::OutputFormat;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "neuralic-cli")]
#[command(about = "Neuralic CLI - Management tool for the neuralic memory service")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Store and query memories")]
    Memory(MemoryCommand),

    #[clap(about = "Manage developer API keys")]
    Keys(KeysCommand),

    #[clap(about = "Inspect or provision the vector index")]
    Index(IndexCommand),

    #[clap(about = "Run an autonomous conversation loop for one owner")]
    Autopilot(AutopilotCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Command::Keys(cmd) => {
            let registry = ApiKeyRegistry::new(config.keys.path.clone());
            cmd.execute(&registry, format).await
        }
        Command::Index(cmd) => cmd.execute(&config, format).await,
        Command::Memory(cmd) => {
            let store = MemoryStore::from_config(&config).await?;
            cmd.execute(&store, format).await
        }
        Command::Autopilot(cmd) => {
            let store = MemoryStore::from_config(&config).await?;
            let orchestrator = ChatOrchestrator::from_config(&config, store)?;
            let options = cmd.options(&config.autonomy);
            cmd.execute(orchestrator, options, format).await
        }
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_memory_query() {
        let cli = Cli::try_parse_from([
            "neuralic-cli",
            "--json",
            "memory",
            "query",
            "--owner",
            "alice",
            "-k",
            "3",
            "what color do I like?",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Command::Memory(MemoryCommand {
                command: neuralic_cli::commands::memory::MemorySubcommand::Query(args),
            }) => {
                assert_eq!(args.owner, "alice");
                assert_eq!(args.top_k, Some(3));
                assert_eq!(args.text, "what color do I like?");
            }
            _ => panic!("expected memory query"),
        }
    }

    #[test]
    fn test_parse_autopilot() {
        let cli = Cli::try_parse_from([
            "neuralic-cli",
            "autopilot",
            "--owner",
            "alice",
            "--prompt",
            "reflect",
            "--max-turns",
            "2",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Command::Autopilot(AutopilotCommand {
                max_turns: Some(2),
                interval_secs: None,
                ..
            })
        ));
    }
}
