//! Consumer configuration.
//!
//! Loaded from a TOML file, then overridden by environment variables:
//!
//! | key                   | env                          | default   |
//! |-----------------------|------------------------------|-----------|
//! | `queue`               | `HOPPER_QUEUE`               | (none)    |
//! | `idle_timeout_secs`   | `HOPPER_IDLE_TIMEOUT_SECS`   | 30        |
//! | `memory_limit_mb`     | `HOPPER_MEMORY_LIMIT_MB`     | unlimited |
//! | `consumer_tag_prefix` | `HOPPER_CONSUMER_TAG_PREFIX` | `hopper`  |
//!
//! Loading only parses. `validate` runs when a consumer is built, so a file
//! may leave values to the environment.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::resource_guard::megabytes_to_bytes;

pub const ENV_QUEUE: &str = "HOPPER_QUEUE";
pub const ENV_IDLE_TIMEOUT_SECS: &str = "HOPPER_IDLE_TIMEOUT_SECS";
pub const ENV_MEMORY_LIMIT_MB: &str = "HOPPER_MEMORY_LIMIT_MB";
pub const ENV_CONSUMER_TAG_PREFIX: &str = "HOPPER_CONSUMER_TAG_PREFIX";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Queue to consume from.
    pub queue: String,

    /// Longest single wait for a delivery before the loop re-checks its stop conditions.
    pub idle_timeout_secs: u64,

    /// Stop consuming once resident memory reaches this many megabytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit_mb: Option<u64>,

    pub consumer_tag_prefix: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            queue: String::new(),
            idle_timeout_secs: 30,
            memory_limit_mb: None,
            consumer_tag_prefix: "hopper".to_string(),
        }
    }
}

impl ConsumerConfig {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Apply `HOPPER_*` environment variables.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key/value source (the environment, a test map, ...).
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(queue) = lookup(ENV_QUEUE) {
            self.queue = queue;
        }
        if let Some(raw) = lookup(ENV_IDLE_TIMEOUT_SECS) {
            self.idle_timeout_secs = parse_u64(ENV_IDLE_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MEMORY_LIMIT_MB) {
            // empty or "none" clears a limit set in the file
            self.memory_limit_mb = match raw.trim() {
                "" | "none" => None,
                value => Some(parse_u64(ENV_MEMORY_LIMIT_MB, value)?),
            };
        }
        if let Some(prefix) = lookup(ENV_CONSUMER_TAG_PREFIX) {
            self.consumer_tag_prefix = prefix;
        }
        Ok(self)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Memory ceiling in bytes, as compared against resident memory.
    pub fn memory_limit_bytes(&self) -> Result<Option<u64>, ConfigError> {
        self.memory_limit_mb
            .map(|mb| {
                megabytes_to_bytes(mb)
                    .ok_or_else(|| ConfigError::invalid("memory_limit_mb", mb, "too large"))
            })
            .transpose()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.trim().is_empty() {
            return Err(ConfigError::invalid("queue", &self.queue, "must not be empty"));
        }
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "idle_timeout_secs",
                self.idle_timeout_secs,
                "must be at least 1 second",
            ));
        }
        if self.memory_limit_mb == Some(0) {
            return Err(ConfigError::invalid(
                "memory_limit_mb",
                0,
                "must be positive; leave unset for no limit",
            ));
        }
        self.memory_limit_bytes()?;
        if self.consumer_tag_prefix.trim().is_empty() {
            return Err(ConfigError::invalid(
                "consumer_tag_prefix",
                &self.consumer_tag_prefix,
                "must not be empty",
            ));
        }
        Ok(())
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::invalid(key, raw, format!("not a non-negative integer: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parses_toml_with_defaults() {
        let config = ConsumerConfig::from_toml_str(
            r#"
            queue = "orders"
            memory_limit_mb = 256
            "#,
        )
        .unwrap();

        assert_eq!(config.queue, "orders");
        assert_eq!(config.idle_timeout_secs, 30);
        assert_eq!(config.memory_limit_mb, Some(256));
        assert_eq!(config.memory_limit_bytes().unwrap(), Some(256 * 1024 * 1024));
        assert_eq!(config.consumer_tag_prefix, "hopper");
        config.validate().unwrap();
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = ConsumerConfig::from_toml_str("memory_limit_mb = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = ConsumerConfig::from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn env_overrides_win() {
        let config = ConsumerConfig::new("orders")
            .with_overrides(overrides(&[
                (ENV_QUEUE, "invoices"),
                (ENV_IDLE_TIMEOUT_SECS, "5"),
                (ENV_MEMORY_LIMIT_MB, "64"),
                (ENV_CONSUMER_TAG_PREFIX, "billing"),
            ]))
            .unwrap();

        assert_eq!(config.queue, "invoices");
        assert_eq!(config.idle_timeout(), Duration::from_secs(5));
        assert_eq!(config.memory_limit_mb, Some(64));
        assert_eq!(config.consumer_tag_prefix, "billing");
    }

    #[test]
    fn env_can_clear_memory_limit() {
        let config = ConsumerConfig {
            memory_limit_mb: Some(64),
            ..ConsumerConfig::new("orders")
        }
        .with_overrides(overrides(&[(ENV_MEMORY_LIMIT_MB, "none")]))
        .unwrap();
        assert_eq!(config.memory_limit_mb, None);
    }

    #[rstest]
    #[case(ENV_IDLE_TIMEOUT_SECS, "soon")]
    #[case(ENV_MEMORY_LIMIT_MB, "-1")]
    #[case(ENV_MEMORY_LIMIT_MB, "1.5")]
    fn malformed_env_values_are_rejected(#[case] key: &str, #[case] value: &str) {
        let err = ConsumerConfig::new("orders")
            .with_overrides(overrides(&[(key, value)]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: k, .. } if k == key));
    }

    #[rstest]
    #[case(ConsumerConfig::new(""), "queue")]
    #[case(ConsumerConfig { idle_timeout_secs: 0, ..ConsumerConfig::new("q") }, "idle_timeout_secs")]
    #[case(ConsumerConfig { memory_limit_mb: Some(0), ..ConsumerConfig::new("q") }, "memory_limit_mb")]
    #[case(ConsumerConfig { memory_limit_mb: Some(u64::MAX), ..ConsumerConfig::new("q") }, "memory_limit_mb")]
    #[case(ConsumerConfig { consumer_tag_prefix: " ".into(), ..ConsumerConfig::new("q") }, "consumer_tag_prefix")]
    fn validation_names_the_bad_key(#[case] config: ConsumerConfig, #[case] expected: &str) {
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == expected));
    }
}
