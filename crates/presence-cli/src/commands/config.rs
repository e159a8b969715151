// Configuration commands

use crate::commands::common::load_config_with_vars;
use clap::Subcommand;
use presence_core::PresenceConfig;
use std::path::Path;

/// Configuration inspection.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Load, apply environment overrides, validate and print the effective configuration
    Check,
    /// Print the default configuration
    Defaults,
}

/// Run one `config` subcommand; returns the TOML to print.
pub fn handle_config_command(cmd: ConfigCommand, path: &Path) -> anyhow::Result<String> {
    let config = match cmd {
        ConfigCommand::Check => {
            let config = load_config_with_vars(path, std::env::vars())?;
            tracing::info!(path = %path.display(), "configuration valid");
            config
        }
        ConfigCommand::Defaults => PresenceConfig::default(),
    };
    Ok(config.to_toml_string()?)
}
