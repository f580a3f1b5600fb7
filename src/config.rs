//! Configuration model for fileguard.
//!
//! [`GuardConfig`] holds the options a connection definition recognizes:
//! cluster locking, lock expiry and retry behavior, and the suspension
//! (circuit breaker) knobs. It supports forward-compatible YAML parsing
//! (unknown fields are ignored), sensible defaults for every field, and
//! validation of config values.

use crate::error::{FileGuardError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default refusal fragments matched against failure text when deciding
/// whether a remote error means "server unreachable".
pub fn default_refusal_patterns() -> Vec<String> {
    vec![
        "connection refused".to_string(),
        "could not connect".to_string(),
    ]
}

/// Configuration for one connection's locking and suspension behavior.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Whether locks are also backed by marker files on the shared file
    /// system, so cooperating processes on other hosts honor them.
    #[serde(default)]
    pub cluster_locking_enabled: bool,

    /// Milliseconds after which a held lock counts as abandoned and may be
    /// reclaimed by the sweeper.
    #[serde(default = "default_lock_expires_in_ms")]
    pub lock_expires_in_ms: u64,

    /// Retries after the initial attempt in the retrying acquire.
    #[serde(default = "default_lock_max_retries")]
    pub lock_max_retries: u32,

    /// Sleep between acquire attempts, in milliseconds.
    #[serde(default = "default_lock_retry_interval_ms")]
    pub lock_retry_interval_ms: u64,

    /// Interval of the expired-lock sweep, in milliseconds.
    #[serde(default = "default_lock_sweep_interval_ms")]
    pub lock_sweep_interval_ms: u64,

    // =========================================================================
    // Suspension settings
    // =========================================================================
    /// Whether consecutive remote failures suspend the connection at all.
    #[serde(default = "default_true")]
    pub suspend_on_connection_failure: bool,

    /// Consecutive failures tolerated before a suspension is triggered.
    #[serde(default = "default_retries_before_suspension")]
    pub retries_before_suspension: u32,

    /// First suspension window, in milliseconds.
    #[serde(default = "default_suspend_initial_duration_ms")]
    pub suspend_initial_duration_ms: u64,

    /// Geometric growth factor applied per suspension level.
    #[serde(default = "default_suspend_progression_factor")]
    pub suspend_progression_factor: f64,

    /// Hard ceiling on the suspension window, in milliseconds.
    #[serde(default = "default_suspend_maximum_duration_ms")]
    pub suspend_maximum_duration_ms: u64,

    /// Failure-text fragments classified as "server unreachable".
    /// Matched case-insensitively against the full error chain.
    #[serde(default = "default_refusal_patterns")]
    pub refusal_patterns: Vec<String>,
}

// Default value functions for serde
fn default_lock_expires_in_ms() -> u64 {
    600_000
}
fn default_lock_max_retries() -> u32 {
    3
}
fn default_lock_retry_interval_ms() -> u64 {
    1_000
}
fn default_lock_sweep_interval_ms() -> u64 {
    15_000
}
fn default_retries_before_suspension() -> u32 {
    3
}
fn default_suspend_initial_duration_ms() -> u64 {
    1_000
}
fn default_suspend_progression_factor() -> f64 {
    2.0
}
fn default_suspend_maximum_duration_ms() -> u64 {
    60_000
}
fn default_true() -> bool {
    true
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            cluster_locking_enabled: false,
            lock_expires_in_ms: default_lock_expires_in_ms(),
            lock_max_retries: default_lock_max_retries(),
            lock_retry_interval_ms: default_lock_retry_interval_ms(),
            lock_sweep_interval_ms: default_lock_sweep_interval_ms(),
            suspend_on_connection_failure: default_true(),
            retries_before_suspension: default_retries_before_suspension(),
            suspend_initial_duration_ms: default_suspend_initial_duration_ms(),
            suspend_progression_factor: default_suspend_progression_factor(),
            suspend_maximum_duration_ms: default_suspend_maximum_duration_ms(),
            refusal_patterns: default_refusal_patterns(),
        }
    }
}

impl GuardConfig {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            FileGuardError::filesystem_io(
                format!("failed to read config file '{}'", path.display()),
                e,
            )
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    ///
    /// Unknown fields in the YAML are silently ignored for forward
    /// compatibility.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GuardConfig = serde_yaml::from_str(yaml)
            .map_err(|e| FileGuardError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            FileGuardError::Config(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return an error on invalid values.
    ///
    /// Validation rules:
    /// - all durations must be positive
    /// - `suspend_progression_factor` must be at least 1.0
    /// - `suspend_maximum_duration_ms` must not undercut the initial duration
    /// - `refusal_patterns` entries must be non-empty valid patterns
    pub fn validate(&self) -> Result<()> {
        if self.lock_expires_in_ms == 0 {
            return Err(invalid("lock_expires_in_ms must be greater than 0"));
        }
        if self.lock_retry_interval_ms == 0 {
            return Err(invalid("lock_retry_interval_ms must be greater than 0"));
        }
        if self.lock_sweep_interval_ms == 0 {
            return Err(invalid("lock_sweep_interval_ms must be greater than 0"));
        }
        if self.suspend_initial_duration_ms == 0 {
            return Err(invalid("suspend_initial_duration_ms must be greater than 0"));
        }
        if self.suspend_progression_factor < 1.0 {
            return Err(invalid("suspend_progression_factor must be at least 1.0"));
        }
        if self.suspend_maximum_duration_ms < self.suspend_initial_duration_ms {
            return Err(invalid(
                "suspend_maximum_duration_ms must not be smaller than suspend_initial_duration_ms",
            ));
        }

        for pattern in &self.refusal_patterns {
            if pattern.is_empty() {
                return Err(invalid("refusal_patterns entries must be non-empty"));
            }
            if let Err(e) = Regex::new(pattern) {
                return Err(invalid(format!(
                    "refusal_patterns entry '{}' is not a valid pattern: {}",
                    pattern, e
                )));
            }
        }

        Ok(())
    }

    /// Compile the refusal patterns into case-insensitive matchers.
    pub fn refusal_matchers(&self) -> Result<Vec<Regex>> {
        self.refusal_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        invalid(format!(
                            "refusal_patterns entry '{}' is not a valid pattern: {}",
                            pattern, e
                        ))
                    })
            })
            .collect()
    }

    pub fn lock_expires_in(&self) -> Duration {
        Duration::from_millis(self.lock_expires_in_ms)
    }

    pub fn lock_retry_interval(&self) -> Duration {
        Duration::from_millis(self.lock_retry_interval_ms)
    }

    pub fn lock_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.lock_sweep_interval_ms)
    }

    pub fn suspend_initial_duration(&self) -> Duration {
        Duration::from_millis(self.suspend_initial_duration_ms)
    }

    pub fn suspend_maximum_duration(&self) -> Duration {
        Duration::from_millis(self.suspend_maximum_duration_ms)
    }
}

fn invalid(message: impl Into<String>) -> FileGuardError {
    FileGuardError::Config(format!("config validation failed: {}", message.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GuardConfig::default();

        assert!(!config.cluster_locking_enabled);
        assert_eq!(config.lock_expires_in_ms, 600_000);
        assert_eq!(config.lock_max_retries, 3);
        assert_eq!(config.lock_retry_interval_ms, 1_000);
        assert_eq!(config.lock_sweep_interval_ms, 15_000);
        assert!(config.suspend_on_connection_failure);
        assert_eq!(config.retries_before_suspension, 3);
        assert_eq!(config.suspend_initial_duration_ms, 1_000);
        assert_eq!(config.suspend_progression_factor, 2.0);
        assert_eq!(config.suspend_maximum_duration_ms, 60_000);
        assert_eq!(config.refusal_patterns.len(), 2);
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let config = GuardConfig::from_yaml("").unwrap();

        // Should use all defaults
        assert!(!config.cluster_locking_enabled);
        assert_eq!(config.lock_sweep_interval_ms, 15_000);
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
cluster_locking_enabled: true
retries_before_suspension: 2
"#;
        let config = GuardConfig::from_yaml(yaml).unwrap();

        assert!(config.cluster_locking_enabled);
        assert_eq!(config.retries_before_suspension, 2);

        // Unspecified values should use defaults
        assert_eq!(config.suspend_progression_factor, 2.0);
        assert_eq!(config.lock_max_retries, 3);
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
cluster_locking_enabled: true
lock_expires_in_ms: 5000
lock_max_retries: 5
lock_retry_interval_ms: 50
lock_sweep_interval_ms: 1000
suspend_on_connection_failure: false
retries_before_suspension: 2
suspend_initial_duration_ms: 1000
suspend_progression_factor: 2.0
suspend_maximum_duration_ms: 30000
refusal_patterns:
  - "connection refused"
  - "host unreachable"
"#;
        let config = GuardConfig::from_yaml(yaml).unwrap();

        assert!(config.cluster_locking_enabled);
        assert_eq!(config.lock_expires_in_ms, 5000);
        assert_eq!(config.lock_max_retries, 5);
        assert_eq!(config.lock_retry_interval_ms, 50);
        assert_eq!(config.lock_sweep_interval_ms, 1000);
        assert!(!config.suspend_on_connection_failure);
        assert_eq!(config.suspend_maximum_duration_ms, 30000);
        assert_eq!(
            config.refusal_patterns,
            vec!["connection refused", "host unreachable"]
        );
    }

    #[test]
    fn test_parse_yaml_with_unknown_fields() {
        // Unknown fields should be silently ignored for forward compatibility
        let yaml = r#"
retries_before_suspension: 4
unknown_field: "some value"
future_feature:
  nested: true
"#;
        let config = GuardConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.retries_before_suspension, 4);
        assert_eq!(config.lock_max_retries, 3);
    }

    #[test]
    fn test_validate_zero_expiry() {
        let result = GuardConfig::from_yaml("lock_expires_in_ms: 0");

        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("lock_expires_in_ms"));
    }

    #[test]
    fn test_validate_zero_sweep_interval() {
        let result = GuardConfig::from_yaml("lock_sweep_interval_ms: 0");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_progression_factor_below_one() {
        let result = GuardConfig::from_yaml("suspend_progression_factor: 0.5");

        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("suspend_progression_factor"));
    }

    #[test]
    fn test_validate_maximum_below_initial() {
        let yaml = r#"
suspend_initial_duration_ms: 5000
suspend_maximum_duration_ms: 1000
"#;
        let result = GuardConfig::from_yaml(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_empty_refusal_pattern() {
        let yaml = r#"
refusal_patterns:
  - "connection refused"
  - ""
"#;
        let result = GuardConfig::from_yaml(yaml);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("refusal_patterns")
        );
    }

    #[test]
    fn test_validate_malformed_refusal_pattern() {
        let yaml = r#"
refusal_patterns:
  - "connection refused ["
"#;
        let result = GuardConfig::from_yaml(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_refusal_matchers_are_case_insensitive() {
        let config = GuardConfig::default();
        let matchers = config.refusal_matchers().unwrap();

        assert!(matchers.iter().any(|m| m.is_match("Connection REFUSED")));
        assert!(matchers.iter().any(|m| m.is_match("could not connect")));
        assert!(!matchers.iter().any(|m| m.is_match("permission denied")));
    }

    #[test]
    fn test_duration_accessors() {
        let config = GuardConfig::default();
        assert_eq!(config.lock_sweep_interval(), Duration::from_secs(15));
        assert_eq!(config.suspend_initial_duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_to_yaml_round_trips() {
        let config = GuardConfig::default();
        let yaml = config.to_yaml().unwrap();

        let parsed = GuardConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.lock_expires_in_ms, config.lock_expires_in_ms);
        assert_eq!(parsed.refusal_patterns, config.refusal_patterns);
    }

    #[test]
    fn test_config_load_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "lock_max_retries: 7").unwrap();
        writeln!(file, "cluster_locking_enabled: true").unwrap();

        let config = GuardConfig::load(file.path()).unwrap();
        assert_eq!(config.lock_max_retries, 7);
        assert!(config.cluster_locking_enabled);
    }

    #[test]
    fn test_config_load_missing_file() {
        let result = GuardConfig::load("/nonexistent/path/connection.yaml");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("file system error"));
    }
}
