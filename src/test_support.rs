//! Shared test fixtures: a scriptable in-memory file system.

use crate::error::{FileGuardError, Result};
use crate::vfs::{FileSystem, Resource};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

type Files = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;

/// In-memory [`FileSystem`] with call counting and scriptable failures.
///
/// Used to drive the breaker and global-lock paths without a real backend:
/// tests can make resolution fail with a chosen message, make exclusive
/// create or delete fail, and assert how often the collaborator was
/// actually invoked.
#[derive(Default)]
pub(crate) struct MockFileSystem {
    files: Files,
    resolve_calls: AtomicUsize,
    create_calls: AtomicUsize,
    resolve_error: Mutex<Option<String>>,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
}

impl MockFileSystem {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_file(&self, path: &str, content: &[u8]) {
        self.files.lock().insert(path.to_string(), content.to_vec());
    }

    pub(crate) fn file_content(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().get(path).cloned()
    }

    pub(crate) fn has_file(&self, path: &str) -> bool {
        self.files.lock().contains_key(path)
    }

    /// Make every `resolve` call fail with the given message.
    pub(crate) fn set_resolve_error(&self, message: &str) {
        *self.resolve_error.lock() = Some(message.to_string());
    }

    pub(crate) fn clear_resolve_error(&self) {
        *self.resolve_error.lock() = None;
    }

    pub(crate) fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

impl FileSystem for MockFileSystem {
    fn resolve(&self, path: &str) -> Result<Resource> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.resolve_error.lock().clone() {
            return Err(FileGuardError::filesystem(message));
        }

        let files = self.files.lock();
        let (exists, size) = match files.get(path) {
            Some(content) => (true, content.len() as u64),
            None => (false, 0),
        };
        Ok(Resource {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            size,
            modified: None,
            exists,
            is_dir: false,
        })
    }

    fn create(&self, path: &str) -> Result<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_create.load(Ordering::SeqCst) {
            return Err(FileGuardError::filesystem(format!(
                "failed to create '{}': backend unavailable",
                path
            )));
        }

        let mut files = self.files.lock();
        if files.contains_key(path) {
            return Err(FileGuardError::filesystem(format!(
                "failed to create '{}': file already exists",
                path
            )));
        }
        files.insert(path.to_string(), Vec::new());
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(FileGuardError::filesystem(format!(
                "failed to delete '{}': permission denied",
                path
            )));
        }

        if self.files.lock().remove(path).is_none() {
            return Err(FileGuardError::filesystem(format!(
                "failed to delete '{}': no such file",
                path
            )));
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files.lock().contains_key(path))
    }

    fn writer(&self, path: &str) -> Result<Box<dyn Write + Send>> {
        Ok(Box::new(MockWriter {
            path: path.to_string(),
            buffer: Vec::new(),
            files: self.files.clone(),
        }))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.files.lock().get(path).cloned().ok_or_else(|| {
            FileGuardError::filesystem(format!("failed to read '{}': no such file", path))
        })
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut files = self.files.lock();
        let content = files.remove(from).ok_or_else(|| {
            FileGuardError::filesystem(format!("failed to move '{}': no such file", from))
        })?;
        files.insert(to.to_string(), content);
        Ok(())
    }

    fn list(&self, path: &str) -> Result<Vec<Resource>> {
        let prefix = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{}/", path)
        };

        let files = self.files.lock();
        Ok(files
            .iter()
            .filter(|(candidate, _)| {
                candidate.starts_with(&prefix) && !candidate[prefix.len()..].contains('/')
            })
            .map(|(candidate, content)| Resource {
                path: candidate.clone(),
                name: candidate.rsplit('/').next().unwrap_or(candidate).to_string(),
                size: content.len() as u64,
                modified: None,
                exists: true,
                is_dir: false,
            })
            .collect())
    }
}

/// Writer that commits its buffer into the shared map on flush.
struct MockWriter {
    path: String,
    buffer: Vec<u8>,
    files: Files,
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.files
            .lock()
            .insert(self.path.clone(), self.buffer.clone());
        Ok(())
    }
}

impl Drop for MockWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
