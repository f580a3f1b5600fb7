//! Fileguard: file-lock coordination and connection suspension for shared
//! file servers.
//!
//! A mediation engine processing batches of files against local or remote
//! file servers (FTP/FTPS/SFTP/SMB/local disk) needs two protections:
//! nobody may process the same logical file twice concurrently, and an
//! unreachable server must not be hammered by every worker in the engine.
//! This crate provides both:
//!
//! - [`locks::LockCoordinator`] hands out expiring file locks — in-process
//!   only, or additionally backed by marker files on the shared file system
//!   so cooperating processes on other hosts honor them. A background
//!   sweeper reclaims locks whose holder crashed.
//! - [`breaker::ConnectionGuard`] wraps remote path resolution per
//!   connection, counting consecutive failures and suspending the
//!   connection with geometrically growing, capped backoff once a threshold
//!   is crossed.
//! - [`ops::FileOperations`] ties both to the [`vfs::FileSystem`] backend
//!   boundary for the common read/write/move/list flows.
//!
//! Lock acquisition never raises: a file that cannot be locked is a normal
//! outcome for a batch run, reported as a boolean. The connection guard is
//! the only component that raises a distinguished error
//! ([`FileGuardError::Suspended`]), so callers can tell "server down,
//! backing off" apart from "file genuinely inaccessible".

pub mod breaker;
pub mod clock;
pub mod config;
pub mod error;
pub mod locks;
pub mod ops;
pub mod vfs;

#[cfg(test)]
mod test_support;

pub use breaker::{ConnectionGuard, ConnectionRegistry, ConnectionState, SuspensionPolicy};
pub use clock::{CancellationToken, Clock, SystemClock};
pub use config::GuardConfig;
pub use error::{FileGuardError, Result};
pub use locks::{FileLock, LockCoordinator, LockStore};
pub use ops::FileOperations;
pub use vfs::{FileSystem, LocalFileSystem, Resource, SortKey};
