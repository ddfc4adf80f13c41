//! Generate command.
//!
//! Fetches (optionally) and decodes the subscription, builds both documents
//! and the mapping in memory, and only then writes every output file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::builder::NonEmptyStringValueParser;
use clap::Args;
use serde::Serialize;
use subgen_networking::{DEFAULT_HTTP_BASE, DEFAULT_SOCKS_BASE};
use subgen_subscription::SkippedEntry;
use subgen_xray::{generate, DesignatedNode, DocumentDigest, GenerateOptions, Generated};
use tabled::Tabled;
use tracing::info;

use crate::client::{SubscriptionClient, DEFAULT_TIMEOUT_SECS};
use crate::config::{
    OutputPaths, DEFAULT_MAP, DEFAULT_OUTPUT, DEFAULT_SUBSCRIPTION_FILE, DEFAULT_WORK_DIR,
};
use crate::error::CliError;
use crate::output::{
    mapping_csv, print_info, print_output, print_single, print_success, print_warning,
    write_all_atomic, write_atomic, OutputFormat,
};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct GenerateCommand {
    /// Subscription URL. When set, the body is downloaded and saved to --file.
    #[arg(short = 'u', long, env = "SUBGEN_URL")]
    url: Option<String>,

    /// Saved subscription file.
    #[arg(short = 'f', long, env = "SUBGEN_FILE", value_name = "PATH", default_value = DEFAULT_SUBSCRIPTION_FILE)]
    file: PathBuf,

    /// Base path of the generated documents (`_local`/`_lan` are appended).
    #[arg(short = 'o', long, env = "SUBGEN_OUTPUT", value_name = "PATH", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Mapping JSON path.
    #[arg(short = 'm', long, env = "SUBGEN_MAP", value_name = "PATH", default_value = DEFAULT_MAP)]
    map: PathBuf,

    /// Mapping CSV path. Defaults to the mapping path with a .csv extension.
    #[arg(long, env = "SUBGEN_MAP_CSV", value_name = "PATH")]
    map_csv: Option<PathBuf>,

    /// First SOCKS5 port.
    #[arg(long, env = "SUBGEN_SOCKS_PORT", default_value_t = DEFAULT_SOCKS_BASE)]
    socks_port: u16,

    /// First HTTP port.
    #[arg(long, env = "SUBGEN_HTTP_PORT", default_value_t = DEFAULT_HTTP_BASE)]
    http_port: u16,

    /// Route the designated domains through the node with exactly this name.
    /// Without this or --designated-pattern, the designated-domain rule is omitted.
    #[arg(
        long,
        env = "SUBGEN_DESIGNATED_NODE",
        conflicts_with = "designated_pattern",
        value_parser = NonEmptyStringValueParser::new()
    )]
    designated_node: Option<String>,

    /// Route the designated domains through the first node whose name contains this text.
    /// Without this or --designated-node, the designated-domain rule is omitted.
    #[arg(
        long,
        env = "SUBGEN_DESIGNATED_PATTERN",
        value_parser = NonEmptyStringValueParser::new()
    )]
    designated_pattern: Option<String>,

    /// Directory for diagnostic artifacts.
    #[arg(long, env = "SUBGEN_WORK_DIR", value_name = "DIR", default_value = DEFAULT_WORK_DIR)]
    work_dir: PathBuf,

    /// Skip the decoded-URL and parsed-detail artifacts.
    #[arg(long)]
    no_artifacts: bool,

    /// Download timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
}

impl GenerateCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let paths = self.paths();
        let options = self.options();

        let raw = match &self.url {
            Some(url) => {
                let client = SubscriptionClient::new(Duration::from_secs(self.timeout_secs))?;
                let body = client.fetch(url).await?;
                write_atomic(&paths.subscription_file, &body)?;
                body
            }
            None => read_subscription(&paths.subscription_file)?,
        };

        let generated = generate(&raw, &options)?;
        let files = write_outputs(&generated, &paths, !self.no_artifacts)?;

        info!(
            nodes = generated.nodes().len(),
            files = files.len(),
            "outputs written"
        );
        report(ctx.format, &generated, files);
        Ok(())
    }

    fn paths(&self) -> OutputPaths {
        OutputPaths::new(
            self.file.clone(),
            &self.output,
            self.map.clone(),
            self.map_csv.clone(),
            self.work_dir.clone(),
        )
    }

    fn options(&self) -> GenerateOptions {
        let designated = match (&self.designated_node, &self.designated_pattern) {
            (Some(tag), _) => DesignatedNode::Tag(tag.clone()),
            (None, Some(pattern)) => DesignatedNode::Pattern(pattern.clone()),
            (None, None) => DesignatedNode::None,
        };

        GenerateOptions {
            socks_base: self.socks_port,
            http_base: self.http_port,
            designated,
            ..Default::default()
        }
    }
}

pub(super) fn read_subscription(path: &Path) -> Result<Vec<u8>> {
    match std::fs::read(path) {
        Ok(raw) => Ok(raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::SubscriptionNotFound {
                path: path.to_path_buf(),
            }
            .into())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// One written file.
#[derive(Debug, Serialize, Tabled)]
struct WrittenFile {
    #[tabled(rename = "FILE")]
    kind: &'static str,

    #[tabled(rename = "PATH")]
    path: String,

    #[tabled(rename = "DIGEST")]
    digest: String,
}

impl WrittenFile {
    fn new(kind: &'static str, path: &Path, digest: Option<DocumentDigest>) -> Self {
        Self {
            kind,
            path: path.display().to_string(),
            digest: digest.map_or_else(|| "-".to_string(), |d| d.to_string()),
        }
    }
}

/// Serialize everything, then write all files as one unit.
fn write_outputs(
    generated: &Generated,
    paths: &OutputPaths,
    artifacts: bool,
) -> Result<Vec<WrittenFile>> {
    let local = generated.local.to_json_pretty()?;
    let lan = generated.lan.to_json_pretty()?;
    let mapping = serde_json::to_string_pretty(&generated.mapping)?;
    let csv = mapping_csv(&generated.mapping);

    let mut outputs: Vec<(&'static str, PathBuf, String, Option<DocumentDigest>)> = vec![
        (
            "config (local)",
            paths.local_config.clone(),
            local,
            Some(DocumentDigest::of(&generated.local)?),
        ),
        (
            "config (lan)",
            paths.lan_config.clone(),
            lan,
            Some(DocumentDigest::of(&generated.lan)?),
        ),
        (
            "mapping (json)",
            paths.map_json.clone(),
            mapping,
            Some(DocumentDigest::of(&generated.mapping)?),
        ),
        ("mapping (csv)", paths.map_csv.clone(), csv, None),
    ];

    if artifacts {
        outputs.push((
            "decoded urls",
            paths.decoded_urls(),
            generated.decoded.uris.join("\n\n"),
            None,
        ));
        outputs.push((
            "parsed details",
            paths.parsed_details(),
            parsed_details(generated)?,
            None,
        ));
    }

    let files: Vec<(&Path, &[u8])> = outputs
        .iter()
        .map(|(_, path, contents, _)| (path.as_path(), contents.as_bytes()))
        .collect();
    write_all_atomic(&files)?;

    Ok(outputs
        .into_iter()
        .map(|(kind, path, _, digest)| WrittenFile::new(kind, &path, digest))
        .collect())
}

fn parsed_details(generated: &Generated) -> Result<String> {
    let blocks = generated
        .decoded
        .payloads
        .iter()
        .map(serde_json::to_string_pretty)
        .collect::<serde_json::Result<Vec<_>>>()?;
    Ok(blocks.join("\n\n"))
}

#[derive(Debug, Serialize)]
struct GenerateSummary<'a> {
    nodes: usize,
    designated: Option<&'a str>,
    skipped: &'a [SkippedEntry],
    files: Vec<WrittenFile>,
}

fn report(format: OutputFormat, generated: &Generated, files: Vec<WrittenFile>) {
    match format {
        OutputFormat::Json => {
            let summary = GenerateSummary {
                nodes: generated.nodes().len(),
                designated: generated.designated.as_deref(),
                skipped: generated.skipped(),
                files,
            };
            print_single(&summary);
        }
        OutputFormat::Table => {
            print_success(&format!(
                "Generated configuration for {} node(s)",
                generated.nodes().len()
            ));
            if let Some(tag) = &generated.designated {
                print_info(&format!("designated domains route via: {}", tag));
            }
            for entry in generated.skipped() {
                print_warning(&format!("skipped line {}: {}", entry.line, entry.reason));
            }
            print_output(&files, format);
        }
    }
}
