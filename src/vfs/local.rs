//! Local-disk implementation of the [`FileSystem`] trait.
//!
//! Whole-file writes follow the write-to-temp, fsync, atomic-rename pattern
//! so a crash never leaves a half-written file behind; renames fall back to
//! copy + delete when the OS reports a cross-device link (`EXDEV`), which
//! some mounts and container configs surface even for paths that look
//! local.

use super::{FileSystem, Resource};
use crate::error::{FileGuardError, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File backend over the local disk. Paths are used as OS paths verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFileSystem {
    fn resolve(&self, path: &str) -> Result<Resource> {
        let os_path = Path::new(path);
        let name = file_name(os_path);

        match fs::metadata(os_path) {
            Ok(meta) => Ok(Resource {
                path: path.to_string(),
                name,
                size: meta.len(),
                modified: modified_time(&meta),
                exists: true,
                is_dir: meta.is_dir(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Resource {
                path: path.to_string(),
                name,
                size: 0,
                modified: None,
                exists: false,
                is_dir: false,
            }),
            Err(e) => Err(FileGuardError::filesystem_io(
                format!("failed to resolve '{}'", path),
                e,
            )),
        }
    }

    fn create(&self, path: &str) -> Result<()> {
        let os_path = Path::new(path);
        ensure_parent_dir(os_path)?;

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(os_path)
            .map_err(|e| {
                FileGuardError::filesystem_io(format!("failed to create '{}'", path), e)
            })?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        fs::remove_file(path)
            .map_err(|e| FileGuardError::filesystem_io(format!("failed to delete '{}'", path), e))
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(Path::new(path).exists())
    }

    fn writer(&self, path: &str) -> Result<Box<dyn Write + Send>> {
        let os_path = Path::new(path);
        ensure_parent_dir(os_path)?;

        let file = File::create(os_path).map_err(|e| {
            FileGuardError::filesystem_io(format!("failed to open '{}' for writing", path), e)
        })?;
        Ok(Box::new(io::BufWriter::new(file)))
    }

    fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let os_path = Path::new(path);
        ensure_parent_dir(os_path)?;

        let temp_path = temp_path_for(os_path)?;
        write_and_sync(&temp_path, content)?;
        atomic_replace(&temp_path, os_path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        fs::read(path)
            .map_err(|e| FileGuardError::filesystem_io(format!("failed to read '{}'", path), e))
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let source = Path::new(from);
        let destination = Path::new(to);
        ensure_parent_dir(destination)?;

        match fs::rename(source, destination) {
            Ok(()) => Ok(()),
            Err(e) if is_cross_device_rename(&e) => {
                move_cross_device(source, destination, e)
            }
            Err(e) => Err(FileGuardError::filesystem_io(
                format!("failed to move '{}' to '{}'", from, to),
                e,
            )),
        }
    }

    fn list(&self, path: &str) -> Result<Vec<Resource>> {
        let entries = fs::read_dir(path).map_err(|e| {
            FileGuardError::filesystem_io(format!("failed to list directory '{}'", path), e)
        })?;

        let mut resources = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                FileGuardError::filesystem_io(
                    format!("failed to read directory entry in '{}'", path),
                    e,
                )
            })?;

            let meta = entry.metadata().map_err(|e| {
                FileGuardError::filesystem_io(
                    format!("failed to stat '{}'", entry.path().display()),
                    e,
                )
            })?;

            resources.push(Resource {
                path: entry.path().to_string_lossy().into_owned(),
                name: entry.file_name().to_string_lossy().into_owned(),
                size: meta.len(),
                modified: modified_time(&meta),
                exists: true,
                is_dir: meta.is_dir(),
            });
        }
        Ok(resources)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn modified_time(meta: &fs::Metadata) -> Option<DateTime<Utc>> {
    meta.modified().ok().map(DateTime::<Utc>::from)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            FileGuardError::filesystem_io(
                format!("failed to create parent directory '{}'", parent.display()),
                e,
            )
        })?;
    }
    Ok(())
}

/// Temp file path in the same directory as the target, so the final rename
/// stays on one filesystem.
fn temp_path_for(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            FileGuardError::filesystem(format!("invalid file path '{}'", target.display()))
        })?;
    Ok(parent.join(format!(".{}.tmp", filename)))
}

fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        FileGuardError::filesystem_io(
            format!("failed to create temporary file '{}'", path.display()),
            e,
        )
    })?;

    file.write_all(content).map_err(|e| {
        let _ = fs::remove_file(path);
        FileGuardError::filesystem_io("failed to write to temporary file", e)
    })?;

    file.sync_all().map_err(|e| {
        let _ = fs::remove_file(path);
        FileGuardError::filesystem_io("failed to sync temporary file to disk", e)
    })
}

fn atomic_replace(source: &Path, target: &Path) -> Result<()> {
    fs::rename(source, target).map_err(|e| {
        let _ = fs::remove_file(source);
        FileGuardError::filesystem_io(
            format!("failed to atomically replace '{}'", target.display()),
            e,
        )
    })?;

    // Persist the directory entry as well.
    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}

fn move_cross_device(source: &Path, destination: &Path, original_error: io::Error) -> Result<()> {
    let content = fs::read(source).map_err(|e| {
        FileGuardError::filesystem_io(
            format!(
                "failed to read '{}' for cross-device move (rename error: {})",
                source.display(),
                original_error
            ),
            e,
        )
    })?;

    let temp_path = temp_path_for(destination)?;
    write_and_sync(&temp_path, &content)?;
    atomic_replace(&temp_path, destination)?;

    fs::remove_file(source).map_err(|e| {
        FileGuardError::filesystem_io(
            format!(
                "moved '{}' across devices but failed to delete the source",
                source.display()
            ),
            e,
        )
    })
}

fn is_cross_device_rename(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices || err.raw_os_error() == Some(18)
}
