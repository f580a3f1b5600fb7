//! File operations tying locks, the connection guard, and the backend
//! together.
//!
//! Each mutating operation follows the same choreography: acquire the file
//! lock (with the configured retry behavior), touch the target through the
//! guarded resolve so a suspended connection fails fast, perform the I/O,
//! and release the lock on every path out. A file that cannot be locked is
//! not an error — the batch caller is expected to skip or requeue it — so
//! those results come back as `None`/`false`.

use crate::breaker::ConnectionGuard;
use crate::clock::CancellationToken;
use crate::config::GuardConfig;
use crate::error::Result;
use crate::locks::LockCoordinator;
use crate::vfs::{FileSystem, Resource, SortKey, sort_resources};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Lock-and-guard-aware file operations for one connection.
pub struct FileOperations {
    coordinator: Arc<LockCoordinator>,
    guard: Arc<ConnectionGuard>,
    fs: Arc<dyn FileSystem>,
    lock_expires_in: Duration,
    lock_max_retries: u32,
    lock_retry_interval: Duration,
    cancel: CancellationToken,
}

impl FileOperations {
    pub fn new(
        coordinator: Arc<LockCoordinator>,
        guard: Arc<ConnectionGuard>,
        fs: Arc<dyn FileSystem>,
        config: &GuardConfig,
    ) -> Self {
        Self {
            coordinator,
            guard,
            fs,
            lock_expires_in: config.lock_expires_in(),
            lock_max_retries: config.lock_max_retries,
            lock_retry_interval: config.lock_retry_interval(),
            cancel: CancellationToken::new(),
        }
    }

    /// Token cancelling pending lock-retry sleeps; shared with
    /// [`shutdown`](Self::shutdown).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Read the file at `path`. `None` means the file lock could not be
    /// acquired and the caller should skip or requeue.
    pub fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.locked(path, || {
            self.guard.guarded_resolve(path)?;
            self.fs.read(path)
        })
    }

    /// Write `content` to `path`. `false` means the file lock could not be
    /// acquired.
    pub fn write(&self, path: &str, content: &[u8]) -> Result<bool> {
        let written = self.locked(path, || {
            self.guard.guarded_resolve(path)?;
            self.fs.write(path, content)
        })?;
        Ok(written.is_some())
    }

    /// Move the file at `from` to `to`, locking the source. `false` means
    /// the source lock could not be acquired.
    pub fn move_file(&self, from: &str, to: &str) -> Result<bool> {
        let moved = self.locked(from, || {
            self.guard.guarded_resolve(from)?;
            self.fs.rename(from, to)
        })?;
        Ok(moved.is_some())
    }

    /// List the directory at `path`, sorted by `sort_key`.
    ///
    /// Listing mutates nothing, so no lock is taken; the guarded resolve
    /// still applies so a suspended connection fails fast.
    pub fn list(&self, path: &str, sort_key: SortKey) -> Result<Vec<Resource>> {
        self.guard.guarded_resolve(path)?;
        let mut listing = self.fs.list(path)?;
        sort_resources(&mut listing, sort_key);
        Ok(listing)
    }

    /// Cancel pending retry sleeps and bulk-release every held lock.
    pub fn shutdown(&self) {
        debug!(connection = %self.guard.connection(), "shutting down file operations");
        self.cancel.cancel();
        self.coordinator.release_all();
    }

    /// Run `operation` under the file lock for `path`, releasing on every
    /// path out. `None` means the lock was not acquired.
    fn locked<T>(&self, path: &str, operation: impl FnOnce() -> Result<T>) -> Result<Option<T>> {
        let acquired = self.coordinator.try_acquire_with_retry(
            path,
            self.lock_expires_in,
            self.lock_max_retries,
            self.lock_retry_interval,
            &self.cancel,
        );
        if !acquired {
            debug!(path, "skipping file, lock not acquired");
            return Ok(None);
        }

        let result = operation();
        self.coordinator.release(path);
        result.map(Some)
    }
}
