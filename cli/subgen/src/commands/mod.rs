//! CLI commands.

mod generate;
mod inspect;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

/// subgen - Generate xray client configurations from a vmess subscription.
#[derive(Debug, Parser)]
#[command(name = "subgen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Log filter used when RUST_LOG and SUBGEN_LOG are unset.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate local and LAN configurations plus the mapping table.
    Generate(generate::GenerateCommand),

    /// Decode a subscription and list its nodes without writing anything.
    Inspect(inspect::InspectCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn log_json(&self) -> bool {
        self.log_json
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let format = match self.format.as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Table,
        };

        let ctx = CommandContext { format };

        match self.command {
            Commands::Generate(cmd) => cmd.run(ctx).await,
            Commands::Inspect(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("subgen {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_designated_flags_conflict() {
        let result = Cli::try_parse_from([
            "subgen",
            "generate",
            "--designated-node",
            "a",
            "--designated-pattern",
            "b",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["subgen", "inspect", "--format", "json"]).unwrap();
        assert_eq!(cli.format, "json");
        assert!(matches!(cli.command, Commands::Inspect(_)));
    }
}
