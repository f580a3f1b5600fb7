//! Locking subsystem for fileguard.
//!
//! This module implements the lock model that keeps concurrent file
//! operations off the same logical file:
//! - Local locks, whose presence in the in-process [`LockStore`] is the
//!   entire exclusion
//! - Global locks, additionally backed by a marker file on the shared file
//!   system so cooperating processes on other hosts honor them
//!
//! # Marker Files
//!
//! Marker files sit next to the locked file (`<name>.lock` in the same
//! directory) and are created with exclusive-create semantics, so only one
//! process can hold a given global lock at a time. Their content is
//! diagnostic metadata (host name, host address, process id) and carries no
//! protocol meaning.
//!
//! # Expiry
//!
//! Every lock carries an expiry timestamp. A background sweeper reclaims
//! locks whose holder crashed without releasing, so an abandoned lock never
//! blocks a path forever.

mod coordinator;
mod metadata;
mod store;
mod types;


// Re-export public API
pub use coordinator::LockCoordinator;
pub use metadata::MarkerMetadata;
pub use store::{DEFAULT_SWEEP_INTERVAL, LockStore};
pub use types::{FileLock, GlobalLock, LocalLock, MARKER_SUFFIX, marker_path_for};
