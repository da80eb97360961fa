//! Tunnel lifecycle controller
//!
//! Owns the session: loads rules, acquires the device, launches the packet
//! loop and tears it down again. All observable events flow through an
//! injected sink, with a bounded ring of recent lines kept for observers
//! that attach late.

use super::worker::{SessionStats, SharedSnapshot, TunnelLoop};
use crate::config::Config;
use crate::device::DeviceProvider;
use crate::error::Result;
use crate::observer::{timestamped, EventRing, EventSink};
use crate::rules::{RuleSnapshot, RuleSource};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// How long `stop` waits for the packet loop before detaching it
const THREAD_JOIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Lifecycle of the tunnel session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No session
    Stopped,
    /// Rules loading / device acquisition in progress
    Starting,
    /// Packet loop active
    Running,
    /// Teardown in progress
    Stopping,
}

/// Timestamps events, keeps the recent ring, then forwards to the outer sink
struct SessionSink {
    ring: EventRing,
    inner: Arc<dyn EventSink>,
}

impl SessionSink {
    fn new(inner: Arc<dyn EventSink>) -> Self {
        Self {
            ring: EventRing::new(),
            inner,
        }
    }
}

impl EventSink for SessionSink {
    fn state_changed(&self, running: bool) {
        self.inner.state_changed(running);
    }

    fn event(&self, line: &str) {
        let line = timestamped(line);
        self.ring.push(line.clone());
        self.inner.event(&line);
    }
}

/// Starts and stops the tunnel session
///
/// At most one session is alive at a time; a start request while a session
/// is active is a no-op.
pub struct Controller {
    config: Config,
    rule_source: Arc<dyn RuleSource>,
    provider: Box<dyn DeviceProvider>,
    sink: Arc<SessionSink>,
    state: Mutex<LifecycleState>,
    running: Arc<AtomicBool>,
    snapshot: SharedSnapshot,
    stats: Arc<SessionStats>,
    worker: Option<JoinHandle<()>>,
}

impl Controller {
    /// Create a controller; nothing runs until [`start`](Self::start)
    pub fn new(
        config: Config,
        rule_source: Arc<dyn RuleSource>,
        provider: Box<dyn DeviceProvider>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            rule_source,
            provider,
            sink: Arc::new(SessionSink::new(sink)),
            state: Mutex::new(LifecycleState::Stopped),
            running: Arc::new(AtomicBool::new(false)),
            snapshot: Arc::new(RwLock::new(Arc::new(RuleSnapshot::default()))),
            stats: Arc::new(SessionStats::default()),
            worker: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Whether the packet loop is (still) flagged to run
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Counters of the current (or last) session
    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }

    /// The most recent event lines, oldest first
    pub fn recent_events(&self) -> Vec<String> {
        self.sink.ring.snapshot()
    }

    /// Start the tunnel session
    ///
    /// Loads the active rules, acquires the device and launches the packet
    /// loop. A failure anywhere leaves the controller `Stopped` with the
    /// error surfaced both in the return value and on the sink.
    pub fn start(&mut self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != LifecycleState::Stopped {
                info!(state = ?*state, "Start requested while active, ignoring");
                return Ok(());
            }
            *state = LifecycleState::Starting;
        }

        match self.try_start() {
            Ok(()) => {
                *self.state.lock() = LifecycleState::Running;
                self.sink.state_changed(true);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                *self.state.lock() = LifecycleState::Stopped;
                self.sink.event(&format!("start failed: {e}"));
                Err(e)
            }
        }
    }

    fn try_start(&mut self) -> Result<()> {
        let rules = self.rule_source.active_rules()?;
        let snapshot = Arc::new(RuleSnapshot::build(&rules));
        self.sink.event(&format!(
            "tunnel starting: {} active rules ({} exact, {} wildcard)",
            snapshot.len(),
            snapshot.exact_len(),
            snapshot.wildcard_len()
        ));
        *self.snapshot.write() = snapshot;

        let device = self.provider.acquire(&self.config.tunnel)?;

        self.stats = Arc::new(SessionStats::default());
        self.running.store(true, Ordering::SeqCst);

        let tunnel_loop = TunnelLoop::new(
            device,
            Arc::clone(&self.snapshot),
            Arc::clone(&self.running),
            self.config.policy.clone(),
            Arc::clone(&self.sink) as Arc<dyn EventSink>,
            Arc::clone(&self.stats),
        );

        self.worker = Some(
            std::thread::Builder::new()
                .name("dnsrw-tunnel".to_string())
                .spawn(move || tunnel_loop.run())?,
        );

        Ok(())
    }

    /// Stop the tunnel session
    ///
    /// Clears the running flag and waits a bounded time for the loop to
    /// exit; the state becomes `Stopped` regardless so a hung device can
    /// never wedge teardown. The loop closes the device when it finishes.
    pub fn stop(&mut self) {
        {
            let mut state = self.state.lock();
            match *state {
                LifecycleState::Running | LifecycleState::Starting => {
                    *state = LifecycleState::Stopping;
                }
                _ => return,
            }
        }

        self.sink.event("tunnel stopping");
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.worker.take() {
            if !join_with_timeout(handle, THREAD_JOIN_TIMEOUT) {
                warn!(
                    timeout = ?THREAD_JOIN_TIMEOUT,
                    "Tunnel loop did not exit in time, detaching"
                );
            }
        }

        *self.state.lock() = LifecycleState::Stopped;
        self.sink.state_changed(false);
        self.sink.event("tunnel stopped");
    }

    /// Rebuild the rule snapshot from the source and swap it in
    ///
    /// The swap is a single pointer replacement; in-flight packets keep
    /// the snapshot they already resolved against.
    pub fn reload_rules(&self) -> Result<()> {
        let rules = self.rule_source.active_rules()?;
        let snapshot = Arc::new(RuleSnapshot::build(&rules));
        self.sink.event(&format!(
            "rules reloaded: {} active ({} exact, {} wildcard)",
            snapshot.len(),
            snapshot.exact_len(),
            snapshot.wildcard_len()
        ));
        *self.snapshot.write() = snapshot;
        Ok(())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Join a worker handle, giving up after `timeout`
///
/// Returns false if the thread was still alive when the deadline passed;
/// the handle is dropped and the thread left to finish on its own.
fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    handle.join().is_ok()
}
