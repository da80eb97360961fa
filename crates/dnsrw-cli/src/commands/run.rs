//! Run command - start the tunnel engine

use anyhow::{Context, Result};
use clap::Args;
use dnsrw_core::config::NonIpv4Policy;
use dnsrw_core::observer::EventSink;
use dnsrw_core::rules::FileRuleSource;
use dnsrw_core::Controller;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::args::Args as GlobalArgs;
use crate::commands::load_config;

/// Run command arguments
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Rules file (overrides the config)
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// Tunnel device name (overrides the config)
    #[arg(long)]
    pub device: Option<String>,

    /// Drop non-IPv4 packets instead of forwarding them
    #[arg(long)]
    pub drop_non_ipv4: bool,
}

/// Sink that turns engine events into log lines
struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn state_changed(&self, running: bool) {
        info!(running, "Tunnel state changed");
    }

    fn event(&self, line: &str) {
        info!("{line}");
    }
}

/// Execute the run command
pub fn execute(global: &GlobalArgs, args: &RunArgs) -> Result<()> {
    let mut config = load_config(global)?;

    if let Some(ref rules) = args.rules {
        config.rules.file = Some(rules.display().to_string());
    }
    if let Some(ref device) = args.device {
        config.tunnel.name = device.clone();
    }
    if args.drop_non_ipv4 {
        config.policy.non_ipv4 = NonIpv4Policy::Drop;
    }

    let rules_file = config
        .rules
        .file
        .clone()
        .context("No rules file configured; pass --rules or set rules.file")?;

    let mut controller = Controller::new(
        config,
        Arc::new(FileRuleSource::new(&rules_file)),
        dnsrw_platform::default_provider(),
        Arc::new(ConsoleSink),
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down...");
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    controller.start().context("Failed to start the tunnel")?;
    info!(rules = %rules_file, "dnsrw running, press Ctrl-C to stop");

    while !interrupted.load(Ordering::SeqCst) && controller.is_running() {
        std::thread::sleep(Duration::from_millis(200));
    }

    controller.stop();

    let stats = controller.stats();
    info!(
        packets = stats.packets.load(Ordering::Relaxed),
        rewritten = stats.rewritten.load(Ordering::Relaxed),
        blocked = stats.blocked.load(Ordering::Relaxed),
        forwarded = stats.forwarded.load(Ordering::Relaxed),
        "dnsrw stopped"
    );

    Ok(())
}
