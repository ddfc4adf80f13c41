//! Inspect command.
//!
//! Decodes a subscription and lists what would be generated. Writes nothing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use subgen_subscription::{decode, Decoded, NodeRecord, SkippedEntry};
use tabled::Tabled;

use crate::client::{SubscriptionClient, DEFAULT_TIMEOUT_SECS};
use crate::config::DEFAULT_SUBSCRIPTION_FILE;
use crate::output::{print_info, print_output, print_single, OutputFormat};

use super::generate::read_subscription;
use super::CommandContext;

#[derive(Debug, Args)]
pub struct InspectCommand {
    /// Subscription URL. Takes precedence over --file.
    #[arg(short = 'u', long, env = "SUBGEN_URL")]
    url: Option<String>,

    /// Saved subscription file.
    #[arg(short = 'f', long, env = "SUBGEN_FILE", value_name = "PATH", default_value = DEFAULT_SUBSCRIPTION_FILE)]
    file: PathBuf,

    /// Download timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
}

impl InspectCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let raw = match &self.url {
            Some(url) => {
                SubscriptionClient::new(Duration::from_secs(self.timeout_secs))?
                    .fetch(url)
                    .await?
            }
            None => read_subscription(&self.file)?,
        };

        let decoded = decode(&raw)?;
        report(ctx.format, &decoded);
        Ok(())
    }
}

#[derive(Debug, Serialize, Tabled)]
struct NodeRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "ADDRESS")]
    address: String,
    #[tabled(rename = "PORT")]
    port: u16,
    #[tabled(rename = "NETWORK")]
    network: String,
    #[tabled(rename = "TLS")]
    tls: String,
}

impl NodeRow {
    fn new(position: usize, node: &NodeRecord) -> Self {
        Self {
            position,
            name: node.display_name.clone(),
            address: node.address.clone(),
            port: node.port,
            network: node.network.clone(),
            tls: node.tls_mode.clone(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct SkippedRow {
    #[tabled(rename = "LINE")]
    line: usize,
    #[tabled(rename = "REASON")]
    reason: String,
}

impl From<&SkippedEntry> for SkippedRow {
    fn from(entry: &SkippedEntry) -> Self {
        Self {
            line: entry.line,
            reason: entry.reason.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct InspectReport<'a> {
    entries: usize,
    nodes: &'a [NodeRecord],
    skipped: &'a [SkippedEntry],
}

fn report(format: OutputFormat, decoded: &Decoded) {
    match format {
        OutputFormat::Json => print_single(&InspectReport {
            entries: decoded.uris.len(),
            nodes: &decoded.nodes,
            skipped: &decoded.skipped,
        }),
        OutputFormat::Table => {
            let rows: Vec<NodeRow> = decoded
                .nodes
                .iter()
                .enumerate()
                .map(|(i, node)| NodeRow::new(i + 1, node))
                .collect();
            print_output(&rows, format);

            if !decoded.skipped.is_empty() {
                print_info(&format!("{} entry(ies) skipped:", decoded.skipped.len()));
                let skipped: Vec<SkippedRow> = decoded.skipped.iter().map(Into::into).collect();
                print_output(&skipped, format);
            }
        }
    }
}
