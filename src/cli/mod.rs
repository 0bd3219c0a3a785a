//! CLI entry point for Parley.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ParleyConfig;

/// Parley chat server
#[derive(Parser, Debug)]
#[command(name = "parley", version, about = "Parley — streaming chat server with tools")]
pub struct Cli {
    /// Address to listen on (overrides PARLEY_BIND and the config file)
    #[arg(short, long, global = true)]
    pub bind: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// List the selectable models
    Models,
}

impl Cli {
    /// Resolve the effective configuration; `--bind` wins over every layer.
    pub fn load_config(&self) -> crate::error::Result<ParleyConfig> {
        let mut config = ParleyConfig::load(self.config.as_deref())?;
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::parse_from(["parley", "--bind", "0.0.0.0:9000"]);
        assert_eq!(cli.command, None);
        assert_eq!(cli.bind.as_deref(), Some("0.0.0.0:9000"));
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::parse_from(["parley", "serve", "--config", "/tmp/parley.toml"]);
        assert_eq!(cli.command, Some(Commands::Serve));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/parley.toml")));
    }
}
