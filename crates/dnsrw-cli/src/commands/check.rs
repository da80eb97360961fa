//! Check command - validate configuration and rules offline

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use dnsrw_core::rules::{parse_rules, RuleSnapshot};
use std::path::PathBuf;

use crate::args::Args as GlobalArgs;
use crate::commands::load_config;

/// Check command arguments
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Rules file to validate (overrides the config)
    #[arg(short, long)]
    pub rules: Option<PathBuf>,
}

/// Execute the check command
pub fn execute(global: &GlobalArgs, args: &CheckArgs) -> Result<()> {
    let config = load_config(global)?;
    println!("{} configuration valid", "ok".green().bold());

    let rules_path = match args.rules.clone().or_else(|| {
        config.rules.file.as_ref().map(PathBuf::from)
    }) {
        Some(path) => path,
        None => {
            println!("no rules file configured, nothing more to check");
            return Ok(());
        }
    };

    let content = std::fs::read_to_string(&rules_path)
        .with_context(|| format!("Failed to read rules file {}", rules_path.display()))?;

    let rules = parse_rules(&content);
    let snapshot = RuleSnapshot::build(&rules);

    if snapshot.is_empty() {
        bail!(
            "{} contains no usable rules (expected `<address> <domain>` lines)",
            rules_path.display()
        );
    }

    println!(
        "{} {} active rules ({} exact, {} wildcard)",
        "ok".green().bold(),
        snapshot.len(),
        snapshot.exact_len(),
        snapshot.wildcard_len()
    );

    Ok(())
}
