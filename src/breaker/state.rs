//! Per-connection failure bookkeeping.

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

/// Failure counter, suspension deadline, and suspension level for one
/// connection name.
///
/// All fields are atomics: overlapping failing calls from multiple threads
/// bump the counter with fetch-and-add and never under-count. The counters
/// reset only on a fully successful call (or an explicit [`resume`]) —
/// never on construction — so reconnect attempts do not erase backoff
/// history.
///
/// [`resume`]: Self::resume
#[derive(Debug)]
pub struct ConnectionState {
    name: String,
    /// Consecutive failures since the last success.
    failure_count: AtomicU32,
    /// Suspension deadline as epoch milliseconds; 0 means not suspended.
    suspended_until_ms: AtomicI64,
    /// Suspension episodes since the last full recovery.
    suspension_level: AtomicU32,
}

impl ConnectionState {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_count: AtomicU32::new(0),
            suspended_until_ms: AtomicI64::new(0),
            suspension_level: AtomicU32::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    pub fn suspension_level(&self) -> u32 {
        self.suspension_level.load(Ordering::SeqCst)
    }

    /// The suspension deadline, if one is set.
    pub fn suspended_until(&self) -> Option<DateTime<Utc>> {
        match self.suspended_until_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    /// Record one failed operation; returns the new consecutive count.
    pub(crate) fn record_failure(&self) -> u32 {
        self.failure_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record a successful operation: full recovery, both counters to zero.
    pub(crate) fn record_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
        self.suspension_level.store(0, Ordering::SeqCst);
        self.suspended_until_ms.store(0, Ordering::SeqCst);
    }

    /// Arm a suspension until `deadline` and bump the suspension level.
    pub(crate) fn suspend_until(&self, deadline: DateTime<Utc>) {
        self.suspended_until_ms
            .store(deadline.timestamp_millis(), Ordering::SeqCst);
        self.suspension_level.fetch_add(1, Ordering::SeqCst);
    }

    /// Clear the deadline on the lazy Open→Closed transition. The counters
    /// stay: only a successful call forgives the failure history.
    pub(crate) fn clear_suspension(&self) {
        self.suspended_until_ms.store(0, Ordering::SeqCst);
    }

    /// Operator-driven reset: clear the deadline and both counters.
    pub fn resume(&self) {
        self.record_success();
    }
}

/// Process-wide registry of connection states, keyed by connection name.
///
/// States are created lazily on first reference and survive the
/// recreation of connection objects; they go away only through
/// [`remove`](Self::remove) when a connection is permanently torn down.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    states: DashMap<String, Arc<ConnectionState>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state for `name`, created on first use.
    pub fn state(&self, name: &str) -> Arc<ConnectionState> {
        self.states
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ConnectionState::new(name)))
            .clone()
    }

    /// Drop the state for `name`; returns whether one existed.
    pub fn remove(&self, name: &str) -> bool {
        self.states.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
