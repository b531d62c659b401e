use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use neuralic::keys::ApiKeyRegistry;

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp};

#[derive(Parser)]
pub struct KeysCommand {
    #[clap(subcommand)]
    pub command: KeysSubcommand,
}

#[derive(Subcommand)]
pub enum KeysSubcommand {
    #[clap(about = "Issue a new developer API key")]
    Create(CreateArgs),

    #[clap(about = "List issued keys")]
    List,

    #[clap(about = "Revoke a key")]
    Revoke(KeyArgs),

    #[clap(about = "Check whether a key is valid")]
    Verify(KeyArgs),
}

#[derive(Parser)]
pub struct CreateArgs {
    #[clap(help = "Name of the key's owner")]
    pub owner: String,
}

#[derive(Parser)]
pub struct KeyArgs {
    #[clap(help = "API key")]
    pub key: String,
}

impl KeysCommand {
    pub async fn execute(&self, registry: &ApiKeyRegistry, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            KeysSubcommand::Create(args) => Self::create(registry, args, format).await,
            KeysSubcommand::List => Self::list(registry, format).await,
            KeysSubcommand::Revoke(args) => Self::revoke(registry, args, format).await,
            KeysSubcommand::Verify(args) => Self::verify(registry, args, format).await,
        }
    }

    async fn create(
        registry: &ApiKeyRegistry,
        args: &CreateArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let key = registry.create(&args.owner).await?;

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&key)?),
            OutputFormat::Table => {
                println!("API key created for {}.", key.owner);
                println!("Key: {}", key.key);
            }
        }

        Ok(())
    }

    async fn list(registry: &ApiKeyRegistry, format: OutputFormat) -> CliResult<()> {
        let keys = registry.list().await?;

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&keys)?),
            OutputFormat::Table => {
                if keys.is_empty() {
                    println!("No API keys found.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Key", "Owner", "Created"]);

                for key in &keys {
                    table.add_row([
                        key.key.clone(),
                        key.owner.clone(),
                        format_timestamp(&key.created_at),
                    ]);
                }

                println!("{table}");
                println!("\nTotal: {} keys", keys.len());
            }
        }

        Ok(())
    }

    async fn revoke(
        registry: &ApiKeyRegistry,
        args: &KeyArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let revoked = registry.revoke(&args.key).await?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "key": args.key,
                    "revoked": revoked,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if revoked {
                    println!("Key revoked.");
                } else {
                    println!("Key not found.");
                }
            }
        }

        Ok(())
    }

    async fn verify(
        registry: &ApiKeyRegistry,
        args: &KeyArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let valid = registry.verify(&args.key).await?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "key": args.key,
                    "valid": valid,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if valid {
                    println!("Key is valid.");
                } else {
                    println!("Key is not registered.");
                }
            }
        }

        Ok(())
    }
}
