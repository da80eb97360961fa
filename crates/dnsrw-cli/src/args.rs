//! Global command-line arguments

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

use crate::commands::Command;

/// Personal DNS-rewriting tunnel
#[derive(Parser, Debug)]
#[command(name = "dnsrw", version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Log file (in addition to stdout)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text
    Text,
    /// Structured JSON
    Json,
    /// Compact single-line text
    Compact,
}
