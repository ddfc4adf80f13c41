//! Error handling and display for the CLI.

use std::path::PathBuf;

use colored::Colorize;
use subgen_networking::PortError;
use subgen_subscription::SubscriptionError;
use subgen_xray::PipelineError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Subscription file not found: {}", path.display())]
    SubscriptionNotFound { path: PathBuf },

    #[error("Subscription download failed: {url} returned HTTP {status}")]
    Download { url: String, status: u16 },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(hint) = hint(err) {
        eprintln!("\n{}", format!("Hint: {}", hint).yellow());
    }
}

fn hint(err: &anyhow::Error) -> Option<&'static str> {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return match cli_err {
            CliError::SubscriptionNotFound { .. } => {
                Some("Pass --url to download the subscription, or --file to point at a saved one.")
            }
            CliError::Download { status, .. } if *status == 401 || *status == 403 => {
                Some("The subscription link may have expired or been revoked.")
            }
            CliError::Download { .. } => None,
            CliError::Network(_) => {
                Some("Check your network connection or raise --timeout-secs.")
            }
        };
    }

    match err.downcast_ref::<PipelineError>()? {
        PipelineError::Subscription(SubscriptionError::Malformed { .. }) => {
            Some("The subscription must be base64-encoded text. Is this the right link?")
        }
        PipelineError::EmptyResult { skipped } if *skipped > 0 => {
            Some("Every vmess entry was rejected. Rerun with --log-level debug to see why.")
        }
        PipelineError::EmptyResult { .. } => {
            Some("The subscription contains no vmess:// entries.")
        }
        PipelineError::Ports(PortError::RangeCollision { .. }) => {
            Some("Move --socks-port or --http-port so the two ranges do not overlap.")
        }
        PipelineError::Ports(_) => Some("Choose a lower --socks-port or --http-port."),
        PipelineError::Assemble(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subgen_networking::{ListenerKind, PortRange};

    #[test]
    fn test_hint_for_collision() {
        let err = anyhow::Error::from(PipelineError::Ports(PortError::RangeCollision {
            socks: PortRange::new(ListenerKind::Socks, 50001, 5).unwrap(),
            http: PortRange::new(ListenerKind::Http, 50002, 5).unwrap(),
        }));
        assert!(hint(&err).unwrap().contains("--http-port"));
    }

    #[test]
    fn test_hint_survives_context() {
        let err = anyhow::Error::from(CliError::SubscriptionNotFound {
            path: "missing.txt".into(),
        })
        .context("reading subscription");
        assert!(hint(&err).unwrap().contains("--url"));
    }

    #[test]
    fn test_no_hint_for_plain_errors() {
        assert_eq!(hint(&anyhow::anyhow!("boom")), None);
    }
}
