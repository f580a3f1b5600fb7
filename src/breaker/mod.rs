//! Connection suspension (circuit breaking) for remote file servers.
//!
//! Remote operations flow through a [`ConnectionGuard`] that counts
//! consecutive failures per connection name and, past a configured
//! threshold, suspends the connection: further calls fail fast with a typed
//! error instead of hammering a server that is already down. Suspension
//! windows grow geometrically up to a ceiling and the connection resumes
//! lazily on the first call after the deadline.
//!
//! State lives in a [`ConnectionRegistry`] keyed by connection name, so
//! backoff history survives the recreation of individual connection
//! objects.

mod guard;
mod state;


// Re-export public API
pub use guard::{ConnectionGuard, SuspensionPolicy};
pub use state::{ConnectionRegistry, ConnectionState};
