//! Error types for fileguard.
//!
//! Uses thiserror for derive macros. The lock paths never surface these as
//! errors to callers (failed acquisition is a boolean, failed release is
//! logged); the connection guard is the one place that raises the
//! suspension variants, so callers can apply a different retry policy for
//! "server backing off" than for ordinary I/O failures.

use thiserror::Error;

/// Main error type for fileguard operations.
#[derive(Error, Debug)]
pub enum FileGuardError {
    /// A lock object could not be built from the given path.
    #[error("lock construction failed: {0}")]
    LockConstruction(String),

    /// The connection is suspended and rejecting operations until its
    /// backoff deadline passes.
    #[error("connection '{connection}' is suspended for another {remaining_ms} ms")]
    Suspended {
        connection: String,
        remaining_ms: i64,
    },

    /// The remote server refused the connection; the connection has entered
    /// (or stayed in) suspension.
    #[error("server for connection '{connection}' is unavailable: {message}")]
    ServerUnavailable {
        connection: String,
        message: String,
    },

    /// Generic failure from the underlying file-system backend.
    #[error("file system error: {message}")]
    FileSystem {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Invalid configuration values or unparseable configuration input.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FileGuardError {
    /// Build a file-system error from a message alone.
    pub fn filesystem(message: impl Into<String>) -> Self {
        FileGuardError::FileSystem {
            message: message.into(),
            source: None,
        }
    }

    /// Build a file-system error wrapping an underlying I/O error.
    pub fn filesystem_io(message: impl Into<String>, source: std::io::Error) -> Self {
        FileGuardError::FileSystem {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Whether this error is one of the suspension signals raised by the
    /// connection guard.
    pub fn is_suspension(&self) -> bool {
        matches!(
            self,
            FileGuardError::Suspended { .. } | FileGuardError::ServerUnavailable { .. }
        )
    }
}

/// Result type alias for fileguard operations.
pub type Result<T> = std::result::Result<T, FileGuardError>;

/// Flatten an error and its source chain into one matchable string.
///
/// The connection guard classifies failures by inspecting this text, since
/// the interesting fragment ("connection refused") may live on the
/// underlying I/O error rather than the wrapping message.
pub fn chain_text(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspended_error_names_connection_and_remaining_time() {
        let err = FileGuardError::Suspended {
            connection: "ftp-archive".to_string(),
            remaining_ms: 4500,
        };
        let text = err.to_string();
        assert!(text.contains("ftp-archive"));
        assert!(text.contains("4500"));
    }

    #[test]
    fn filesystem_error_carries_io_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Connection refused");
        let err = FileGuardError::filesystem_io("resolve failed", io);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn chain_text_includes_source_messages() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Connection refused");
        let err = FileGuardError::filesystem_io("could not resolve '/in/a.csv'", io);
        let text = chain_text(&err);
        assert!(text.contains("could not resolve"));
        assert!(text.contains("Connection refused"));
    }

    #[test]
    fn suspension_variants_are_recognized() {
        assert!(
            FileGuardError::Suspended {
                connection: "c1".into(),
                remaining_ms: 1
            }
            .is_suspension()
        );
        assert!(
            FileGuardError::ServerUnavailable {
                connection: "c1".into(),
                message: "down".into()
            }
            .is_suspension()
        );
        assert!(!FileGuardError::filesystem("boom").is_suspension());
    }
}
