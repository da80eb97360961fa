//! The tunnel packet loop
//!
//! Reads one packet at a time from the device into a reusable buffer and
//! drives classification, rule matching and response synthesis. Anything
//! that cannot be handled fails open: the original bytes are forwarded
//! unchanged.

use crate::config::{BlockedQtypePolicy, NonIpv4Policy, PolicyConfig};
use crate::device::TunnelDevice;
use crate::dns::{self, QueryType};
use crate::error::{Error, Result};
use crate::observer::EventSink;
use crate::packet::{self, Classification, MAX_PACKET_SIZE, UDP_HEADER_LEN};
use crate::rules::RuleSnapshot;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long one read waits before re-checking the running flag
pub(crate) const READ_TICK: Duration = Duration::from_millis(250);

/// The active rule snapshot, swapped wholesale on reload
///
/// The inner `Arc` is the unit of replacement: writers build a new
/// snapshot and swap the pointer, readers clone it once per packet and
/// never observe a half-updated rule set.
pub type SharedSnapshot = Arc<RwLock<Arc<RuleSnapshot>>>;

/// Per-session counters
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Total packets read from the tunnel
    pub packets: AtomicU64,
    /// DNS queries answered with a spoofed A record
    pub rewritten: AtomicU64,
    /// DNS queries answered with NXDOMAIN
    pub blocked: AtomicU64,
    /// Packets forwarded unchanged
    pub forwarded: AtomicU64,
    /// Packets dropped by policy
    pub dropped: AtomicU64,
    /// Failed writes to the tunnel
    pub write_errors: AtomicU64,
}

/// The packet loop
///
/// Runs on a dedicated thread while the running flag is set; the blocking
/// read tick is the sole suspension point.
pub struct TunnelLoop {
    device: Box<dyn TunnelDevice>,
    snapshot: SharedSnapshot,
    running: Arc<AtomicBool>,
    policy: PolicyConfig,
    sink: Arc<dyn EventSink>,
    stats: Arc<SessionStats>,
}

impl TunnelLoop {
    /// Assemble a loop around an open device
    pub fn new(
        device: Box<dyn TunnelDevice>,
        snapshot: SharedSnapshot,
        running: Arc<AtomicBool>,
        policy: PolicyConfig,
        sink: Arc<dyn EventSink>,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            device,
            snapshot,
            running,
            policy,
            sink,
            stats,
        }
    }

    /// Drive the loop until stopped or the device fails
    ///
    /// Consumes the loop; the device is closed when this returns.
    pub fn run(mut self) {
        info!("Tunnel loop started");
        let mut buf = vec![0u8; MAX_PACKET_SIZE];

        while self.running.load(Ordering::SeqCst) {
            match self.device.read_packet(&mut buf, READ_TICK) {
                Ok(None) | Ok(Some(0)) => continue,
                Ok(Some(len)) => {
                    let packet = &buf[..len];
                    self.stats.packets.fetch_add(1, Ordering::Relaxed);
                    match packet::classify(packet) {
                        Classification::NonIpv4 { version } => match self.policy.non_ipv4 {
                            NonIpv4Policy::Forward => {
                                debug!(version, len, "Forwarding non-IPv4 packet");
                                forward(&mut *self.device, &self.stats, packet);
                            }
                            NonIpv4Policy::Drop => {
                                debug!(version, len, "Dropping non-IPv4 packet");
                                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                            }
                        },
                        Classification::Ipv4 { protocol } => {
                            debug!(
                                protocol,
                                src = ?packet::source_ip(packet),
                                dst = ?packet::destination_ip(packet),
                                len,
                                "Forwarding non-DNS packet"
                            );
                            forward(&mut *self.device, &self.stats, packet);
                        }
                        Classification::DnsQuery { ip_header_len } => {
                            match handle_dns(
                                &mut *self.device,
                                &self.snapshot,
                                &self.policy,
                                &*self.sink,
                                &self.stats,
                                packet,
                                ip_header_len,
                            ) {
                                Ok(true) => {}
                                Ok(false) => forward(&mut *self.device, &self.stats, packet),
                                Err(e) => {
                                    debug!(error = %e, "DNS handling failed, forwarding unchanged");
                                    forward(&mut *self.device, &self.stats, packet);
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    // The designed shutdown path: a stop request closes or
                    // interrupts the device and the loop winds down here.
                    info!(error = %e, "Tunnel read ended, exiting loop");
                    break;
                }
            }
        }

        // A loop that died on its own (device error) must not look alive
        self.running.store(false, Ordering::SeqCst);

        info!(
            packets = self.stats.packets.load(Ordering::Relaxed),
            rewritten = self.stats.rewritten.load(Ordering::Relaxed),
            blocked = self.stats.blocked.load(Ordering::Relaxed),
            "Tunnel loop exited"
        );
    }
}

/// Handle a classified DNS query
///
/// `Ok(true)` means a response was written back; `Ok(false)` means the
/// query is not ours to answer and must be forwarded. Any error makes the
/// caller fail open with the original packet.
fn handle_dns(
    device: &mut dyn TunnelDevice,
    snapshot: &SharedSnapshot,
    policy: &PolicyConfig,
    sink: &dyn EventSink,
    stats: &SessionStats,
    packet: &[u8],
    ip_header_len: usize,
) -> Result<bool> {
    let dns_offset = ip_header_len + UDP_HEADER_LEN;
    let message = packet
        .get(dns_offset..)
        .ok_or_else(|| Error::dns_parse("missing UDP payload"))?;

    let id = dns::transaction_id(message)?;
    let question = dns::parse_question(message)?;

    let current = Arc::clone(&snapshot.read());
    let Some(address) = current.resolve(&question.name) else {
        debug!(domain = %question.name, qtype = %question.qtype, "No rule, forwarding query");
        return Ok(false);
    };

    match question.qtype {
        QueryType::A => {
            let answer = dns::build_answer(id, &question, address);
            let response = packet::build_dns_response(packet, ip_header_len, &answer)?;
            device.write_packet(&response)?;
            stats.rewritten.fetch_add(1, Ordering::Relaxed);
            sink.event(&format!("rewrite {} -> {}", question.name, address));
            Ok(true)
        }
        QueryType::Aaaa | QueryType::Https
            if policy.blocked_qtypes == BlockedQtypePolicy::Nxdomain =>
        {
            let answer = dns::build_nxdomain(id, &question);
            let response = packet::build_dns_response(packet, ip_header_len, &answer)?;
            device.write_packet(&response)?;
            stats.blocked.fetch_add(1, Ordering::Relaxed);
            sink.event(&format!("block ({}) {}", question.qtype, question.name));
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Forward the original bytes unchanged; write failures only log
fn forward(device: &mut dyn TunnelDevice, stats: &SessionStats, packet: &[u8]) {
    match device.write_packet(packet) {
        Ok(()) => {
            stats.forwarded.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            stats.write_errors.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Failed to forward packet");
        }
    }
}
