//! Tunnel engine
//!
//! The packet loop ([`TunnelLoop`]) and its lifecycle controller
//! ([`Controller`]). The loop owns the tunnel device exclusively while it
//! runs; the controller owns everything else.

mod controller;
mod worker;

pub use controller::{Controller, LifecycleState};
pub use worker::{SessionStats, SharedSnapshot, TunnelLoop};
