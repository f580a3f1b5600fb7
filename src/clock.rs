//! Time and cancellation primitives.
//!
//! Lock expiry, suspension deadlines, and the retry sleep all go through the
//! [`Clock`] trait so tests can drive them without wall-clock waits. The
//! [`CancellationToken`] is the one interruption point the crate honors: a
//! cancelled token aborts the retry sleep of
//! [`LockCoordinator::try_acquire_with_retry`](crate::locks::LockCoordinator::try_acquire_with_retry)
//! and makes it report failure instead of retrying further.

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Source of current time plus a cancellable sleep.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Sleep for `duration` unless `cancel` fires first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if the sleep was
    /// interrupted by cancellation (including a token cancelled before the
    /// call).
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool;
}

/// Production clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        !cancel.wait_timeout(duration)
    }
}

/// Shared cancellation flag that wakes sleepers immediately on cancel.
///
/// Cloning produces another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation, waking every thread blocked in
    /// [`wait_timeout`](Self::wait_timeout).
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        *cancelled = true;
        self.inner.condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Block for up to `duration`, returning early if cancelled.
    ///
    /// Returns `true` when cancellation was requested (before or during the
    /// wait), `false` when the timeout elapsed normally.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let mut cancelled = self.inner.cancelled.lock();
        if *cancelled {
            return true;
        }
        self.inner.condvar.wait_for(&mut cancelled, duration);
        *cancelled
    }
}

/// Deterministic clock for tests: time only moves when advanced, and sleeps
/// advance it instead of blocking.
#[cfg(test)]
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub(crate) fn advance_ms(&self, ms: i64) {
        let mut now = self.now.lock();
        *now += chrono::Duration::milliseconds(ms);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        self.advance_ms(duration.as_millis() as i64);
        true
    }
}
