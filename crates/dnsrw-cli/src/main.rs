//! dnsrw CLI
//!
//! Command-line interface for the personal DNS-rewriting tunnel.

mod args;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use tracing::error;

use args::Args;

fn main() -> Result<()> {
    let args = Args::parse();

    logging::init(&args)?;

    print_banner();

    let result = run(args);

    if let Err(ref e) = result {
        error!("Fatal error: {:#}", e);
    }

    result
}

fn run(mut args: Args) -> Result<()> {
    let command = args.command.take();
    match command {
        Some(commands::Command::Run(run_args)) => commands::run::execute(&args, &run_args),
        Some(commands::Command::Check(check_args)) => {
            commands::check::execute(&args, &check_args)
        }
        None => commands::run::execute(&args, &commands::run::RunArgs::default()),
    }
}

fn print_banner() {
    use colored::Colorize;

    println!();
    println!("  {}", "dnsrw".green().bold());
    println!("  {}", "personal DNS-rewriting tunnel".white());
    println!();
}
