//! Configuration management for the conference application.
//!
//! Loads configuration from environment variables with sensible defaults.
//! A `.env` file in the working directory is honored by the binary.

use conclave_runtime::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default tracing filter when neither `CONCLAVE_LOG` nor `RUST_LOG` is set.
pub const DEFAULT_LOG_FILTER: &str = "info,conclave_runtime=debug";

/// Errors from loading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        reason: String,
    },

    /// Individually valid values that contradict each other
    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Tracing filter directive (`CONCLAVE_LOG`, then `RUST_LOG`)
    pub log_filter: String,
    /// Backoff for aggregate writes
    pub retry: RetryConfig,
    /// Install the Prometheus recorder and print a scrape at the end of the demo
    pub metrics_enabled: bool,
    /// JSON seed with rooms, participants and events
    pub seed_file: Option<PathBuf>,
}

/// Retry configuration for aggregate writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries per write after the first attempt (default: 3)
    pub max_retries: u32,
    /// First backoff delay in milliseconds (default: 50)
    pub initial_delay_ms: u64,
    /// Backoff cap in milliseconds (default: 2000)
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// Runtime retry policy for these settings
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.max_retries)
            .initial_delay(Duration::from_millis(self.initial_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .build()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            retry: RetryConfig {
                max_retries: 3,
                initial_delay_ms: 50,
                max_delay_ms: 2000,
            },
            metrics_enabled: false,
            seed_file: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unparsable value or
    /// the retry delays contradict each other.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            log_filter: lookup("CONCLAVE_LOG")
                .or_else(|| lookup("RUST_LOG"))
                .filter(|filter| !filter.trim().is_empty())
                .unwrap_or(defaults.log_filter),
            retry: RetryConfig {
                max_retries: parse(&lookup, "CONCLAVE_RETRY_MAX")?
                    .unwrap_or(defaults.retry.max_retries),
                initial_delay_ms: parse(&lookup, "CONCLAVE_RETRY_INITIAL_MS")?
                    .unwrap_or(defaults.retry.initial_delay_ms),
                max_delay_ms: parse(&lookup, "CONCLAVE_RETRY_MAX_MS")?
                    .unwrap_or(defaults.retry.max_delay_ms),
            },
            metrics_enabled: parse_flag(&lookup, "CONCLAVE_METRICS_ENABLED")?
                .unwrap_or(defaults.metrics_enabled),
            seed_file: lookup("CONCLAVE_SEED_FILE")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
        };

        if config.retry.initial_delay_ms > config.retry.max_delay_ms {
            return Err(ConfigError::Inconsistent(format!(
                "CONCLAVE_RETRY_INITIAL_MS ({}) exceeds CONCLAVE_RETRY_MAX_MS ({})",
                config.retry.initial_delay_ms, config.retry.max_delay_ms
            )));
        }
        Ok(config)
    }
}

fn parse<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|value| {
            value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
                key,
                reason: err.to_string(),
                value,
            })
        })
        .transpose()
}

fn parse_flag<F>(lookup: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value,
                reason: "expected true or false".to_string(),
            }),
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.retry.policy(), RetryPolicy::default());
    }

    #[test]
    fn reads_every_key() {
        let config = Config::from_lookup(lookup(&[
            ("CONCLAVE_LOG", "warn"),
            ("RUST_LOG", "trace"),
            ("CONCLAVE_RETRY_MAX", "5"),
            ("CONCLAVE_RETRY_INITIAL_MS", "10"),
            ("CONCLAVE_RETRY_MAX_MS", " 100 "),
            ("CONCLAVE_METRICS_ENABLED", "yes"),
            ("CONCLAVE_SEED_FILE", "seed/demo.json"),
        ]))
        .unwrap();

        assert_eq!(config.log_filter, "warn");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.policy().max_delay, Duration::from_millis(100));
        assert!(config.metrics_enabled);
        assert_eq!(config.seed_file, Some(PathBuf::from("seed/demo.json")));
    }

    #[test]
    fn falls_back_to_rust_log() {
        let config = Config::from_lookup(lookup(&[("RUST_LOG", "debug")])).unwrap();
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn rejects_garbage_numbers_and_flags() {
        let err = Config::from_lookup(lookup(&[("CONCLAVE_RETRY_MAX", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CONCLAVE_RETRY_MAX", .. }));

        let err =
            Config::from_lookup(lookup(&[("CONCLAVE_METRICS_ENABLED", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CONCLAVE_METRICS_ENABLED", .. }));
    }

    #[test]
    fn rejects_inverted_delays() {
        let err = Config::from_lookup(lookup(&[
            ("CONCLAVE_RETRY_INITIAL_MS", "500"),
            ("CONCLAVE_RETRY_MAX_MS", "100"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Inconsistent(_)));
    }
}
