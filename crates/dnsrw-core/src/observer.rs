//! Observer sink for engine events
//!
//! The engine reports running-state changes and human-readable event lines
//! to an injected sink. Delivery is best-effort and must never block the
//! packet loop; slow consumers should buffer on their side.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// How many event lines the in-memory ring keeps
pub const EVENT_RING_CAPACITY: usize = 100;

/// Receiver of engine events
pub trait EventSink: Send + Sync {
    /// The tunnel started or stopped
    fn state_changed(&self, running: bool);

    /// A human-readable, timestamped event line
    fn event(&self, line: &str);
}

/// Sink that discards everything
pub struct NullSink;

impl EventSink for NullSink {
    fn state_changed(&self, _running: bool) {}
    fn event(&self, _line: &str) {}
}

/// Bounded in-memory ring of recent event lines
///
/// Owned by the controller so observers attached late can catch up on the
/// last [`EVENT_RING_CAPACITY`] events.
#[derive(Default)]
pub struct EventRing {
    entries: Mutex<VecDeque<String>>,
}

impl EventRing {
    /// Create an empty ring
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line, evicting the oldest once full
    pub fn push(&self, line: String) {
        let mut entries = self.entries.lock();
        if entries.len() == EVENT_RING_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(line);
    }

    /// Snapshot of the buffered lines, oldest first
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Number of buffered lines
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the ring is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Prefix a line with a `[HH:MM:SS]` wall-clock timestamp
pub fn timestamped(line: &str) -> String {
    let secs_today = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() % 86_400)
        .unwrap_or(0);
    format!(
        "[{:02}:{:02}:{:02}] {line}",
        secs_today / 3600,
        secs_today % 3600 / 60,
        secs_today % 60
    )
}
