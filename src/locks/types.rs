//! Lock variants and marker-path derivation.

use crate::error::{FileGuardError, Result};
use crate::vfs::FileSystem;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Fixed suffix appended to a file name to form its lock marker path.
pub const MARKER_SUFFIX: &str = ".lock";

/// Derive the marker-file path for a locked path: same parent directory,
/// original file name plus [`MARKER_SUFFIX`].
///
/// Paths are normalized identifiers using `/` separators; a path without a
/// separator (or with nothing after the last one) has no parent directory
/// to place a marker in and is rejected.
pub fn marker_path_for(path: &str) -> Result<String> {
    let separator = path.rfind('/').ok_or_else(|| {
        FileGuardError::LockConstruction(format!(
            "path '{}' has no parent directory to hold a lock marker",
            path
        ))
    })?;

    let (parent, file_name) = path.split_at(separator + 1);
    if file_name.is_empty() {
        return Err(FileGuardError::LockConstruction(format!(
            "path '{}' has an empty file name",
            path
        )));
    }

    Ok(format!("{}{}{}", parent, file_name, MARKER_SUFFIX))
}

/// An in-process lock: its entry in the store is the whole exclusion.
#[derive(Debug, Clone)]
pub struct LocalLock {
    path: String,
    expires_at: DateTime<Utc>,
}

impl LocalLock {
    pub fn new(path: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            expires_at,
        }
    }
}

/// A lock additionally backed by a marker file on the shared file system.
#[derive(Clone)]
pub struct GlobalLock {
    path: String,
    expires_at: DateTime<Utc>,
    marker_path: String,
    fs: Arc<dyn FileSystem>,
}

impl GlobalLock {
    /// Build a global lock for `path`, deriving its marker path.
    ///
    /// Fails for paths with no parent directory; the caller treats that as
    /// a failed acquisition, not a panic.
    pub fn new(
        path: impl Into<String>,
        expires_at: DateTime<Utc>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        let path = path.into();
        let marker_path = marker_path_for(&path)?;
        Ok(Self {
            path,
            expires_at,
            marker_path,
            fs,
        })
    }

    pub fn marker_path(&self) -> &str {
        &self.marker_path
    }
}

impl fmt::Debug for GlobalLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalLock")
            .field("path", &self.path)
            .field("expires_at", &self.expires_at)
            .field("marker_path", &self.marker_path)
            .finish()
    }
}

/// A held lock: local or global, sharing the {path, expiry, release}
/// contract. Immutable once constructed; the store only ever removes it.
#[derive(Debug, Clone)]
pub enum FileLock {
    Local(LocalLock),
    Global(GlobalLock),
}

impl FileLock {
    /// The locked path, which is also the store key.
    pub fn path(&self) -> &str {
        match self {
            FileLock::Local(lock) => &lock.path,
            FileLock::Global(lock) => &lock.path,
        }
    }

    /// Timestamp after which the lock counts as abandoned.
    pub fn expires_at(&self) -> DateTime<Utc> {
        match self {
            FileLock::Local(lock) => lock.expires_at,
            FileLock::Global(lock) => lock.expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    /// Release any backing resource held outside the store.
    ///
    /// Local locks have none, so their release always succeeds. Global
    /// locks delete their marker file; a marker already gone is fine
    /// (another process may have reclaimed an expired lock), but a delete
    /// failure is reported so callers can log and retry.
    pub fn release(&self) -> Result<()> {
        match self {
            FileLock::Local(_) => Ok(()),
            FileLock::Global(lock) => {
                if lock.fs.exists(&lock.marker_path)? {
                    lock.fs.delete(&lock.marker_path)?;
                }
                Ok(())
            }
        }
    }
}
