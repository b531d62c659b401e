use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use neuralic::config::{Config, credential};
use neuralic::storage::{IndexDescription, PineconeControlPlane, provision_index};

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct IndexCommand {
    #[clap(subcommand)]
    pub command: IndexSubcommand,
}

#[derive(Subcommand)]
pub enum IndexSubcommand {
    #[clap(about = "Show the configured vector index")]
    Describe,

    #[clap(about = "Create the configured vector index if it does not exist")]
    Provision,
}

impl IndexCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> CliResult<()> {
        if !config.index.provider.eq_ignore_ascii_case("pinecone") {
            return Err(format!(
                "Index commands need the pinecone provider (configured: {})",
                config.index.provider
            )
            .into());
        }

        let api_key = credential(&config.index.api_key_env)?;

        match &self.command {
            IndexSubcommand::Describe => {
                let control = PineconeControlPlane::new(&config.index, api_key)?;
                match control.describe_index(&config.index.name).await? {
                    Some(description) => print_description(&description, None, format),
                    None => Err(format!(
                        "Index '{}' does not exist. Run `neuralic-cli index provision`.",
                        config.index.name
                    )
                    .into()),
                }
            }
            IndexSubcommand::Provision => {
                let (description, created) =
                    provision_index(&config.index, config.embedding.dimension, api_key).await?;
                print_description(&description, Some(created), format)
            }
        }
    }
}

fn print_description(
    description: &IndexDescription,
    created: Option<bool>,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let mut output = serde_json::to_value(description)?;
            if let (Some(created), Some(obj)) = (created, output.as_object_mut()) {
                obj.insert("created".to_string(), serde_json::Value::Bool(created));
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            match created {
                Some(true) => println!("Index '{}' created.", description.name),
                Some(false) => println!("Index '{}' already exists.", description.name),
                None => {}
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL_CONDENSED)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(["Property", "Value"]);

            table.add_row(["Name", description.name.as_str()]);
            table.add_row(["Dimension", &description.dimension.to_string()]);
            table.add_row(["Metric", description.metric.as_str()]);
            table.add_row(["Host", description.host.as_str()]);
            table.add_row(["Ready", if description.is_ready() { "yes" } else { "no" }]);

            println!("{table}");
        }
    }

    Ok(())
}
