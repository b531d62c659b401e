use std::time::Duration;

use clap::Parser;
use neuralic::autonomy::{AutonomousLoop, AutonomyOptions};
use neuralic::chat::ChatOrchestrator;
use neuralic::config::AutonomyConfig;

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct AutopilotCommand {
    #[clap(long, short, help = "Owner whose memory the loop reads and writes")]
    pub owner: String,

    #[clap(long, short, help = "Prompt sent on every turn")]
    pub prompt: String,

    #[clap(long, help = "Seconds between turns (defaults to autonomy.interval_secs)")]
    pub interval_secs: Option<u64>,

    #[clap(long, help = "Stop after this many turns")]
    pub max_turns: Option<u64>,
}

impl AutopilotCommand {
    pub fn options(&self, config: &AutonomyConfig) -> AutonomyOptions {
        let mut options = AutonomyOptions::from_config(config);
        if let Some(secs) = self.interval_secs {
            options.interval = Duration::from_secs(secs);
        }
        options.max_turns = self.max_turns;
        options
    }

    /// Run until Ctrl+C or the turn limit, printing each reply
    pub async fn execute(
        &self,
        orchestrator: ChatOrchestrator,
        options: AutonomyOptions,
        format: OutputFormat,
    ) -> CliResult<()> {
        let (handle, mut replies) =
            AutonomousLoop::spawn(orchestrator, &self.owner, &self.prompt, options);

        if let OutputFormat::Table = format {
            println!("Autopilot running for {}. Press Ctrl+C to stop.", self.owner);
        }

        let mut turn = 0u64;
        loop {
            tokio::select! {
                reply = replies.recv() => {
                    let Some(reply) = reply else { break };
                    turn += 1;
                    match format {
                        OutputFormat::Json => println!("{}", serde_json::to_string(&reply)?),
                        OutputFormat::Table => {
                            println!("\n[{turn}] {}", reply.reply);
                            if !reply.memories_used.is_empty() {
                                println!("    ({} memories used)", reply.memories_used.len());
                            }
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Stopping autopilot");
                    break;
                }
            }
        }

        let summary = handle.stop().await?;

        if let OutputFormat::Table = format {
            println!(
                "\nAutopilot stopped after {} turns ({} failed).",
                summary.turns, summary.failures
            );
        }

        Ok(())
    }
}
