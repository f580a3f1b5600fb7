//! The circuit breaker wrapping remote path resolution.

use super::state::{ConnectionRegistry, ConnectionState};
use crate::clock::Clock;
use crate::config::GuardConfig;
use crate::error::{FileGuardError, Result, chain_text};
use crate::vfs::{FileSystem, Resource};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Numeric knobs of the suspension behavior.
#[derive(Debug, Clone)]
pub struct SuspensionPolicy {
    /// Whether failures suspend the connection at all.
    pub enabled: bool,

    /// Consecutive failures tolerated before suspension triggers.
    pub retries_before_suspension: u32,

    /// First suspension window.
    pub initial_duration: Duration,

    /// Geometric growth factor applied per suspension level.
    pub progression_factor: f64,

    /// Hard ceiling on the window, regardless of level.
    pub maximum_duration: Duration,
}

impl SuspensionPolicy {
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            enabled: config.suspend_on_connection_failure,
            retries_before_suspension: config.retries_before_suspension,
            initial_duration: config.suspend_initial_duration(),
            progression_factor: config.suspend_progression_factor,
            maximum_duration: config.suspend_maximum_duration(),
        }
    }

    /// Suspension window for a given level:
    /// `min(initial * factor^level, maximum)`.
    pub fn duration_for_level(&self, level: u32) -> Duration {
        let scaled =
            self.initial_duration.as_millis() as f64 * self.progression_factor.powi(level as i32);
        let capped = scaled.min(self.maximum_duration.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Wraps remote path resolution for one connection, consulting and updating
/// its [`ConnectionState`] to allow, block, or let through each call.
///
/// Failure classification ("connection refused", "could not connect") is a
/// heuristic keyed on well-known message fragments — transports word their
/// errors differently, so the patterns are configuration, not contract.
pub struct ConnectionGuard {
    connection: String,
    fs: Arc<dyn FileSystem>,
    state: Arc<ConnectionState>,
    policy: SuspensionPolicy,
    refusal_matchers: Vec<Regex>,
    clock: Arc<dyn Clock>,
}

impl ConnectionGuard {
    pub fn new(
        connection: impl Into<String>,
        fs: Arc<dyn FileSystem>,
        registry: &ConnectionRegistry,
        policy: SuspensionPolicy,
        refusal_matchers: Vec<Regex>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let connection = connection.into();
        let state = registry.state(&connection);
        Self {
            connection,
            fs,
            state,
            policy,
            refusal_matchers,
            clock,
        }
    }

    /// Build a guard from configuration.
    pub fn from_config(
        connection: impl Into<String>,
        fs: Arc<dyn FileSystem>,
        registry: &ConnectionRegistry,
        config: &GuardConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self::new(
            connection,
            fs,
            registry,
            SuspensionPolicy::from_config(config),
            config.refusal_matchers()?,
            clock,
        ))
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }

    pub fn state(&self) -> &Arc<ConnectionState> {
        &self.state
    }

    /// Resolve `path` through the underlying backend, guarded by the
    /// connection's suspension state.
    ///
    /// While suspended, fails fast with
    /// [`FileGuardError::Suspended`] and never touches the backend. The
    /// first call after the deadline resumes the connection; a successful
    /// call is a full recovery (both counters back to zero); a failing call
    /// past the threshold arms the next, longer suspension window.
    pub fn guarded_resolve(&self, path: &str) -> Result<Resource> {
        let now = self.clock.now();

        if let Some(until) = self.state.suspended_until() {
            if now < until {
                return Err(FileGuardError::Suspended {
                    connection: self.connection.clone(),
                    remaining_ms: (until - now).num_milliseconds(),
                });
            }
            // Deadline passed: lazy transition back to closed. The failure
            // history stays until a call actually succeeds.
            self.state.clear_suspension();
            info!(
                connection = %self.connection,
                "connection resumed after suspension window"
            );
        }

        match self.fs.resolve(path) {
            Ok(resource) => {
                self.state.record_success();
                Ok(resource)
            }
            Err(err) => Err(self.handle_failure(err, now)),
        }
    }

    fn handle_failure(&self, err: FileGuardError, now: DateTime<Utc>) -> FileGuardError {
        let failures = self.state.record_failure();

        if !self.policy.enabled {
            return err;
        }

        if failures > self.policy.retries_before_suspension {
            let level = self.state.suspension_level();
            let duration = self.policy.duration_for_level(level);
            let until = now + chrono::Duration::milliseconds(duration.as_millis() as i64);
            self.state.suspend_until(until);
            warn!(
                connection = %self.connection,
                failures,
                level,
                duration_ms = duration.as_millis() as u64,
                "suspending connection after consecutive failures"
            );
        }

        if self.is_refusal(&err) {
            FileGuardError::ServerUnavailable {
                connection: self.connection.clone(),
                message: err.to_string(),
            }
        } else {
            err
        }
    }

    fn is_refusal(&self, err: &FileGuardError) -> bool {
        let text = chain_text(err);
        self.refusal_matchers
            .iter()
            .any(|matcher| matcher.is_match(&text))
    }
}
