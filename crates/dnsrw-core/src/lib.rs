//! # dnsrw Core
//!
//! Platform-independent packet pipeline for a personal DNS-rewriting tunnel.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Packet classification and surgery** - Raw IPv4/UDP handling
//! - **DNS wire codec** - Question parsing and answer synthesis
//! - **Rule snapshots** - Immutable exact/wildcard domain maps
//! - **Tunnel engine** - The read-classify-rewrite-write loop and its
//!   lifecycle controller
//! - **Configuration** - TOML-based settings
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dnsrw_core::{Config, Controller};
//! use dnsrw_core::observer::NullSink;
//! use dnsrw_core::rules::FileRuleSource;
//!
//! # fn provider() -> Box<dyn dnsrw_core::device::DeviceProvider> { unimplemented!() }
//! let config = Config::load("dnsrw.toml")?;
//! let source = Arc::new(FileRuleSource::new("rules.txt"));
//! let mut controller = Controller::new(config, source, provider(), Arc::new(NullSink));
//!
//! controller.start()?;
//! // ... tunnel is running ...
//! controller.stop();
//! # Ok::<(), dnsrw_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod device;
pub mod dns;
pub mod engine;
pub mod error;
pub mod observer;
pub mod packet;
pub mod rules;

// Re-exports for convenience
pub use config::Config;
pub use engine::{Controller, LifecycleState, SessionStats};
pub use error::{Error, Result};
pub use rules::RuleSnapshot;
