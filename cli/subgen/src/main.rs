//! subgen - xray client configuration generator.
//!
//! Turns a vmess subscription into a pair of xray client configurations
//! (local and LAN) with one SOCKS5/HTTP listener pair per node.

use anyhow::Result;
use clap::Parser;

mod client;
mod commands;
mod config;
mod error;
mod logging;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level(), cli.log_json());

    if let Err(e) = cli.run().await {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
