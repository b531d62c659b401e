use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use neuralic::memory::MemoryStore;

use crate::error::CliResult;
use crate::output::{OutputFormat, truncate_string};

#[derive(Parser)]
pub struct MemoryCommand {
    #[clap(subcommand)]
    pub command: MemorySubcommand,
}

#[derive(Subcommand)]
pub enum MemorySubcommand {
    #[clap(about = "Remember a text for an owner")]
    Store(StoreArgs),

    #[clap(about = "Find an owner's memories most similar to a text")]
    Query(QueryArgs),
}

#[derive(Parser)]
pub struct StoreArgs {
    #[clap(long, short, help = "Owner (user or conversation id)")]
    pub owner: String,

    #[clap(help = "Text to remember")]
    pub text: String,
}

#[derive(Parser)]
pub struct QueryArgs {
    #[clap(long, short, help = "Owner (user or conversation id)")]
    pub owner: String,

    #[clap(long, short = 'k', help = "Maximum number of results")]
    pub top_k: Option<usize>,

    #[clap(help = "Text to find context for")]
    pub text: String,
}

impl MemoryCommand {
    pub async fn execute(&self, store: &MemoryStore, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            MemorySubcommand::Store(args) => Self::store(store, args, format).await,
            MemorySubcommand::Query(args) => Self::query(store, args, format).await,
        }
    }

    async fn store(store: &MemoryStore, args: &StoreArgs, format: OutputFormat) -> CliResult<()> {
        let id = store.store(&args.owner, &args.text).await?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "id": id.to_string(),
                    "owner": args.owner,
                    "created": true,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Memory stored for {}.", args.owner);
                println!("ID: {id}");
            }
        }

        Ok(())
    }

    async fn query(store: &MemoryStore, args: &QueryArgs, format: OutputFormat) -> CliResult<()> {
        let top_k = args.top_k.unwrap_or_else(|| store.default_top_k());
        let matches = store.query_matches(&args.owner, &args.text, top_k).await?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&matches)?);
            }
            OutputFormat::Table => {
                if matches.is_empty() {
                    println!("No memories found.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["#", "Score", "Text", "ID"]);

                for (rank, m) in matches.iter().enumerate() {
                    table.add_row([
                        (rank + 1).to_string(),
                        format!("{:.4}", m.score),
                        truncate_string(&m.text, 60),
                        truncate_string(&m.id, 8),
                    ]);
                }

                println!("{table}");
                println!("\nTotal: {} memories", matches.len());
            }
        }

        Ok(())
    }
}
