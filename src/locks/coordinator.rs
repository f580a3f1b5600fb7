//! Lock acquisition façade used by file-operation code.

use super::metadata::MarkerMetadata;
use super::store::LockStore;
use super::types::{FileLock, GlobalLock, LocalLock};
use crate::clock::{CancellationToken, Clock};
use crate::config::GuardConfig;
use crate::vfs::FileSystem;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Façade over the lock store: one-shot and retrying acquisition, release,
/// and bulk release.
///
/// The locking strategy — in-process only, or additionally backed by marker
/// files on the shared file system — is fixed at construction and never
/// changes for the coordinator's lifetime. Acquire and release never raise;
/// a lost acquisition must not crash a batch run, so failures surface as
/// booleans and log entries.
pub struct LockCoordinator {
    store: Arc<LockStore>,
    fs: Arc<dyn FileSystem>,
    cluster_locking: bool,
    clock: Arc<dyn Clock>,
}

impl LockCoordinator {
    pub fn new(
        store: Arc<LockStore>,
        fs: Arc<dyn FileSystem>,
        cluster_locking: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            fs,
            cluster_locking,
            clock,
        }
    }

    /// Build a coordinator (and its store) from configuration.
    pub fn from_config(
        config: &GuardConfig,
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = LockStore::new(clock.clone(), config.lock_sweep_interval());
        Self::new(store, fs, config.cluster_locking_enabled, clock)
    }

    /// Whether this coordinator also writes cluster-wide marker files.
    pub fn is_cluster_locking(&self) -> bool {
        self.cluster_locking
    }

    pub fn store(&self) -> &Arc<LockStore> {
        &self.store
    }

    /// One-shot acquisition attempt for `path`, expiring after
    /// `expires_in`.
    pub fn try_acquire(&self, path: &str, expires_in: Duration) -> bool {
        let expires_at = self.clock.now()
            + chrono::Duration::milliseconds(expires_in.as_millis() as i64);

        if self.cluster_locking {
            self.acquire_global(path, expires_at)
        } else {
            self.store
                .acquire(FileLock::Local(LocalLock::new(path, expires_at)))
        }
    }

    /// Acquisition with bounded retries: one initial attempt plus up to
    /// `max_retries` more, sleeping `retry_interval` before each retry.
    ///
    /// The sleep goes through the injected clock and honors `cancel`:
    /// cancellation aborts the loop and reports failure instead of retrying
    /// further. Returns `true` on the first successful attempt.
    pub fn try_acquire_with_retry(
        &self,
        path: &str,
        expires_in: Duration,
        max_retries: u32,
        retry_interval: Duration,
        cancel: &CancellationToken,
    ) -> bool {
        if self.try_acquire(path, expires_in) {
            return true;
        }

        for attempt in 1..=max_retries {
            if !self.clock.sleep(retry_interval, cancel) {
                debug!(path, attempt, "lock retry loop cancelled");
                return false;
            }
            if self.try_acquire(path, expires_in) {
                return true;
            }
        }
        false
    }

    /// Release the lock held for `path`.
    ///
    /// Errors are logged, never raised. Returns `true` when a held lock was
    /// fully released; `false` when nothing was held or the backing marker
    /// could not be deleted (the local entry is gone either way).
    pub fn release(&self, path: &str) -> bool {
        match self.store.release(path) {
            None => {
                debug!(path, "release ignored, no lock held");
                false
            }
            Some(lock) => match lock.release() {
                Ok(()) => true,
                Err(e) => {
                    error!(path, error = %e, "failed to release lock marker");
                    false
                }
            },
        }
    }

    /// Release every held lock best-effort and halt the sweeper. Used at
    /// shutdown.
    pub fn release_all(&self) {
        self.store.release_all();
    }

    /// Two-phase global acquisition: reserve the path in the local store
    /// first (so local threads never race to create one marker), then let
    /// the local winner create the marker file on the shared file system.
    fn acquire_global(&self, path: &str, expires_at: chrono::DateTime<chrono::Utc>) -> bool {
        let lock = match GlobalLock::new(path, expires_at, self.fs.clone()) {
            Ok(lock) => lock,
            Err(e) => {
                warn!(path, error = %e, "cannot build global lock");
                return false;
            }
        };
        let marker_path = lock.marker_path().to_string();

        if !self.store.acquire(FileLock::Global(lock)) {
            return false;
        }

        // Local reservation won; now claim the marker on the shared file
        // system. On any failure the reservation is rolled back so the path
        // stays acquirable.
        if let Err(e) = self.fs.create(&marker_path) {
            debug!(
                path,
                marker = %marker_path,
                error = %e,
                "marker creation failed, rolling back local reservation"
            );
            self.store.release(path);
            return false;
        }

        // Diagnostic metadata is best-effort: the lock is held by marker
        // presence alone.
        let metadata = MarkerMetadata::capture();
        if let Err(e) = self.fs.write(&marker_path, metadata.to_text().as_bytes()) {
            warn!(
                marker = %marker_path,
                error = %e,
                "failed to write marker metadata"
            );
        }

        true
    }
}
