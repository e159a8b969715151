//! `presence` command-line tool
//!
//! Simulate handshakes, inspect and manage the device anchor, and check
//! configuration.

use anyhow::Result;
use clap::{Parser, Subcommand};
use presence_cli::commands::{
    anchor::{handle_anchor_command, AnchorCommand},
    common::CliContext,
    config::{handle_config_command, ConfigCommand},
    handshake::{handle_handshake_command, HandshakeArgs},
};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "presence")]
#[command(about = "Presence handshake and device anchor tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = ".presence/config.toml")]
    config: PathBuf,

    /// Directory holding the device anchor (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Device fingerprint (derived from host attributes when omitted)
    #[arg(long, global = true)]
    device: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated handshake through the full agent
    Handshake(HandshakeArgs),

    /// Device anchor management
    #[command(subcommand)]
    Anchor(AnchorCommand),

    /// Configuration checks
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Config(cmd) => {
            let output = handle_config_command(cmd, &cli.config)?;
            println!("{output}");
        }
        Commands::Handshake(args) => {
            let ctx = CliContext::load(&cli.config, cli.data_dir, cli.device).await?;
            print_json(&handle_handshake_command(args, &ctx).await?)?;
        }
        Commands::Anchor(cmd) => {
            let ctx = CliContext::load(&cli.config, cli.data_dir, cli.device).await?;
            print_json(&handle_anchor_command(cmd, &ctx).await?)?;
        }
    }

    Ok(())
}
