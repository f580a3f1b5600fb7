//! Concurrent lock registry with a background expiry sweeper.

use super::types::FileLock;
use crate::clock::Clock;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Default interval of the expired-lock sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(15);

/// Attempts made when releasing a lock's backing resource before giving up.
const RELEASE_ATTEMPTS: u32 = 3;

/// Registry of held locks, keyed by locked path.
///
/// All mutation goes through the map's own atomic primitives, so callers
/// never need locking of their own: [`acquire`](Self::acquire) is an atomic
/// insert-if-absent (exactly one concurrent caller per path wins), and both
/// [`release`](Self::release) and the sweeper use atomic removes, so a lock
/// is reclaimed by at most one of them.
///
/// A dedicated sweeper thread runs for the lifetime of the store, reclaiming
/// locks whose expiry has passed — the recovery path for holders that
/// crashed without releasing.
pub struct LockStore {
    locks: DashMap<String, FileLock>,
    clock: Arc<dyn Clock>,
    sweeper: Mutex<Option<Sweeper>>,
}

struct Sweeper {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl LockStore {
    /// Create a store and start its sweeper thread.
    ///
    /// The sweeper stops when [`release_all`](Self::release_all) runs or
    /// when the store is dropped (its signal channel disconnects).
    pub fn new(clock: Arc<dyn Clock>, sweep_interval: Duration) -> Arc<Self> {
        let store = Arc::new(Self {
            locks: DashMap::new(),
            clock,
            sweeper: Mutex::new(None),
        });

        let (stop_tx, stop_rx) = mpsc::channel();
        let weak = Arc::downgrade(&store);
        let handle = std::thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(sweep_interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
                let Some(store) = weak.upgrade() else { break };
                store.sweep();
            }
        });
        *store.sweeper.lock() = Some(Sweeper { stop_tx, handle });

        store
    }

    /// Insert `lock` under its path iff no lock is held there.
    ///
    /// Returns whether the insertion happened. Concurrent callers racing on
    /// one path are serialized by the map shard: exactly one observes
    /// `true`.
    pub fn acquire(&self, lock: FileLock) -> bool {
        match self.locks.entry(lock.path().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(lock);
                true
            }
        }
    }

    /// Remove and return the lock held for `path`, if any. Idempotent: a
    /// second call (or a call for a path never locked) returns `None`.
    pub fn release(&self, path: &str) -> Option<FileLock> {
        self.locks.remove(path).map(|(_, lock)| lock)
    }

    /// Release every held lock best-effort, then halt the sweeper.
    ///
    /// Used at shutdown. Each lock is removed with the store's atomic
    /// remove and its backing resource released with bounded retries;
    /// failures are logged, never raised.
    pub fn release_all(&self) {
        let paths: Vec<String> = self.locks.iter().map(|entry| entry.key().clone()).collect();
        for path in paths {
            if let Some((_, lock)) = self.locks.remove(&path) {
                release_with_retries(&lock);
            }
        }
        self.stop_sweeper();
    }

    /// Number of currently held locks.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Whether a lock is currently held for `path`.
    pub fn is_locked(&self, path: &str) -> bool {
        self.locks.contains_key(path)
    }

    /// One sweep pass: reclaim every lock whose expiry has passed.
    ///
    /// Works over a point-in-time snapshot of keys so the scan never holds
    /// the map against concurrent acquire/release; the conditional remove
    /// re-checks expiry, so a path released and re-acquired with a fresh
    /// expiry since the snapshot is left alone.
    pub(crate) fn sweep(&self) {
        let now = self.clock.now();
        let expired: Vec<String> = self
            .locks
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        for path in expired {
            if let Some((_, lock)) = self
                .locks
                .remove_if(&path, |_, held| held.is_expired(now))
            {
                warn!(
                    path = %path,
                    expired_at = %lock.expires_at(),
                    "reclaiming expired lock"
                );
                release_with_retries(&lock);
            }
        }
    }

    fn stop_sweeper(&self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            let _ = sweeper.stop_tx.send(());
            if sweeper.handle.join().is_err() {
                error!("lock sweeper thread panicked");
            }
        } else {
            debug!("lock sweeper already stopped");
        }
    }
}

/// Release a lock's backing resource with bounded retries.
///
/// Returns whether the release eventually succeeded. Never raises: losing a
/// marker file is logged and left for the expiry of whoever finds it next.
pub(crate) fn release_with_retries(lock: &FileLock) -> bool {
    for attempt in 1..=RELEASE_ATTEMPTS {
        match lock.release() {
            Ok(()) => return true,
            Err(e) if attempt < RELEASE_ATTEMPTS => {
                warn!(
                    path = %lock.path(),
                    attempt,
                    error = %e,
                    "lock release failed, retrying"
                );
            }
            Err(e) => {
                error!(
                    path = %lock.path(),
                    attempts = RELEASE_ATTEMPTS,
                    error = %e,
                    "giving up on lock release"
                );
            }
        }
    }
    false
}
