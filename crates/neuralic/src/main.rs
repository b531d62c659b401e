//! Neuralic daemon - HTTP API over the conversational memory service

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use neuralic::chat::ChatOrchestrator;
use neuralic::config::Config;
use neuralic::error::Result;
use neuralic::keys::ApiKeyRegistry;
use neuralic::memory::MemoryStore;
use neuralic::server::NeuralicServer;

/// Neuralic - chatbot backend with per-user long-term memory
#[derive(Parser)]
#[command(name = "neuralic")]
#[command(about = "Chatbot backend with per-user long-term memory")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,neuralic=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Starting Neuralic daemon");

    let config = Config::load(config_path.as_deref())?;
    tracing::debug!("Config loaded: {:?}", config);

    tracing::info!(
        "Connecting to {} index '{}'",
        config.index.provider,
        config.index.name
    );
    let memory = MemoryStore::from_config(&config).await?;
    tracing::info!("Memory store ready: {:?}", memory);

    let orchestrator = ChatOrchestrator::from_config(&config, memory)?;
    let keys = Arc::new(ApiKeyRegistry::new(config.keys.path.clone()));

    let server = NeuralicServer::new(config.server.clone(), orchestrator, keys);
    server.serve().await?;

    tracing::info!("Neuralic daemon stopped");
    Ok(())
}
