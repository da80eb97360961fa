//! CLI subcommands

pub mod check;
pub mod run;

use anyhow::{Context, Result};
use clap::Subcommand;
use dnsrw_core::Config;
use std::path::PathBuf;

use crate::args::Args;

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the tunnel and rewrite DNS answers until interrupted
    Run(run::RunArgs),
    /// Validate configuration and rules without starting the tunnel
    Check(check::CheckArgs),
}

/// Load the configuration: explicit path, else the platform config dir,
/// else built-in defaults
pub fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref path) = args.config {
        return Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    if let Some(path) = default_config_path() {
        if path.exists() {
            return Config::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()));
        }
    }

    Ok(Config::default())
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "dnsrw")
        .map(|dirs| dirs.config_dir().join("dnsrw.toml"))
}
