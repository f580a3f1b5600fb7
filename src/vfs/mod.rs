//! Virtual file system boundary.
//!
//! File operations reach local disks and remote servers (FTP/FTPS/SFTP/SMB)
//! through the [`FileSystem`] trait. Protocol session setup lives with the
//! implementations; this crate only depends on the operations below, and
//! ships [`LocalFileSystem`] for local-disk connections and as the reference
//! backend in tests.

mod local;

pub use local::LocalFileSystem;

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::io::Write;

/// Operations the lock and guard machinery needs from a file backend.
///
/// Implementations report failures as
/// [`FileGuardError::FileSystem`](crate::error::FileGuardError::FileSystem)
/// with the underlying cause attached where available; the connection guard
/// inspects that error chain when classifying refusals.
pub trait FileSystem: Send + Sync {
    /// Resolve a path into a [`Resource`], touching the backend.
    ///
    /// Resolution succeeds for paths that do not exist (the returned
    /// resource reports `exists: false`); it fails when the backend itself
    /// cannot be reached or queried.
    fn resolve(&self, path: &str) -> Result<Resource>;

    /// Create an empty file at `path`, failing if it already exists.
    ///
    /// This is the create-if-absent primitive global locks rely on; the
    /// backend's exclusive-create must be atomic for marker files to provide
    /// mutual exclusion across processes.
    fn create(&self, path: &str) -> Result<()>;

    /// Delete the file at `path`. Deleting a missing file is an error;
    /// callers that want idempotent deletes check [`exists`](Self::exists)
    /// first.
    fn delete(&self, path: &str) -> Result<()>;

    /// Whether a file exists at `path`.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Open a content stream writer for `path`, replacing existing content.
    fn writer(&self, path: &str) -> Result<Box<dyn Write + Send>>;

    /// Write `content` to `path` in one call, replacing existing content.
    ///
    /// Backends with stronger primitives (atomic replace, fsync) override
    /// this; the default streams through [`writer`](Self::writer).
    fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let mut writer = self.writer(path)?;
        writer.write_all(content).map_err(|e| {
            crate::error::FileGuardError::filesystem_io(
                format!("failed to write content to '{}'", path),
                e,
            )
        })?;
        writer.flush().map_err(|e| {
            crate::error::FileGuardError::filesystem_io(
                format!("failed to flush content to '{}'", path),
                e,
            )
        })
    }

    /// Read the full content of the file at `path`.
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Move the file at `from` to `to`, replacing any existing target.
    fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// List the children of the directory at `path`.
    fn list(&self, path: &str) -> Result<Vec<Resource>>;
}

/// A resolved file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Full path of the resource.
    pub path: String,

    /// File name component.
    pub name: String,

    /// Content size in bytes; 0 for directories and missing files.
    pub size: u64,

    /// Last modification time, if the backend reports one.
    pub modified: Option<DateTime<Utc>>,

    /// Whether the resource currently exists on the backend.
    pub exists: bool,

    /// Whether the resource is a directory.
    pub is_dir: bool,
}

/// Sort order for directory listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Ascending by file name.
    Name,
    /// Ascending by content size.
    Size,
    /// Oldest first by modification time; entries without one sort first.
    Modified,
}

/// Sort a listing in place by the given key.
pub fn sort_resources(resources: &mut [Resource], key: SortKey) {
    match key {
        SortKey::Name => resources.sort_by(|a, b| a.name.cmp(&b.name)),
        // Full-width three-way comparison; subtracting sizes and narrowing
        // the difference misorders very large files.
        SortKey::Size => resources.sort_by(|a, b| a.size.cmp(&b.size)),
        SortKey::Modified => resources.sort_by(|a, b| a.modified.cmp(&b.modified)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn resource(name: &str, size: u64, modified_secs: Option<i64>) -> Resource {
        Resource {
            path: format!("/data/{}", name),
            name: name.to_string(),
            size,
            modified: modified_secs.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            exists: true,
            is_dir: false,
        }
    }

    #[test]
    fn sort_by_name_is_lexicographic() {
        let mut listing = vec![
            resource("c.csv", 1, None),
            resource("a.csv", 2, None),
            resource("b.csv", 3, None),
        ];
        sort_resources(&mut listing, SortKey::Name);

        let names: Vec<&str> = listing.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a.csv", "b.csv", "c.csv"]);
    }

    #[test]
    fn sort_by_size_handles_full_width_values() {
        // A subtraction-based compare would truncate this difference.
        let mut listing = vec![
            resource("huge.bin", u64::MAX, None),
            resource("small.bin", 16, None),
            resource("large.bin", u64::MAX - 1, None),
        ];
        sort_resources(&mut listing, SortKey::Size);

        let names: Vec<&str> = listing.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["small.bin", "large.bin", "huge.bin"]);
    }

    #[test]
    fn sort_by_modified_puts_undated_entries_first() {
        let mut listing = vec![
            resource("new.csv", 1, Some(2_000)),
            resource("undated.csv", 1, None),
            resource("old.csv", 1, Some(1_000)),
        ];
        sort_resources(&mut listing, SortKey::Modified);

        let names: Vec<&str> = listing.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["undated.csv", "old.csv", "new.csv"]);
    }
}
