//! Configuration
//!
//! [`ConfigService`] is a snapshot of key/value settings, normally the
//! process environment; binaries may load a `.env` file first. [`AppConfig`]
//! is the typed view the application facade reads.

use crate::dispatch::DEFAULT_BODY_LIMIT;
use dashmap::DashMap;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const GLOBAL_PREFIX: &str = "TRELLIS_GLOBAL_PREFIX";
pub const HOST: &str = "TRELLIS_HOST";
pub const PORT: &str = "TRELLIS_PORT";
pub const BODY_LIMIT: &str = "TRELLIS_BODY_LIMIT";
pub const SHUTDOWN_TIMEOUT_SECS: &str = "TRELLIS_SHUTDOWN_TIMEOUT_SECS";

/// Configuration service
///
/// Cloning is cheap; clones share the same entries.
#[derive(Clone, Default, Debug)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Empty configuration, ignoring the environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment.
    pub fn from_env() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse `key`, falling back to `default` when absent or malformed.
    pub fn parse_or<T: FromStr>(&self, key: &str, default: T) -> T {
        let Some(raw) = self.get(key) else {
            return default;
        };
        match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Invalid configuration value, using default");
                default
            }
        }
    }

    pub fn set(&self, key: &str, value: &str) -> &Self {
        self.config.insert(key.to_string(), value.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.config.len()
    }

    pub fn is_empty(&self) -> bool {
        self.config.is_empty()
    }
}

/// Settings the application facade needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub global_prefix: String,
    pub host: String,
    pub port: u16,
    pub body_limit: usize,
    pub shutdown_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            global_prefix: String::new(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            body_limit: DEFAULT_BODY_LIMIT,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl AppConfig {
    pub fn from_service(config: &ConfigService) -> Self {
        let defaults = Self::default();
        Self {
            global_prefix: config.get_or(GLOBAL_PREFIX, &defaults.global_prefix),
            host: config.get_or(HOST, &defaults.host),
            port: config.parse_or(PORT, defaults.port),
            body_limit: config.parse_or(BODY_LIMIT, defaults.body_limit),
            shutdown_timeout: Duration::from_secs(
                config.parse_or(SHUTDOWN_TIMEOUT_SECS, defaults.shutdown_timeout.as_secs()),
            ),
        }
    }

    pub fn from_env() -> Self {
        Self::from_service(&ConfigService::from_env())
    }

    /// `host:port`, as handed to the listener.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_service(&ConfigService::new());
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.body_limit, 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let service = ConfigService::new();
        service
            .set(GLOBAL_PREFIX, "/api")
            .set(HOST, "127.0.0.1")
            .set(PORT, "8080")
            .set(BODY_LIMIT, "2048")
            .set(SHUTDOWN_TIMEOUT_SECS, "3");

        let config = AppConfig::from_service(&service);
        assert_eq!(config.global_prefix, "/api");
        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.body_limit, 2048);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let service = ConfigService::new();
        service.set(PORT, "eighty").set(BODY_LIMIT, "-1");

        let config = AppConfig::from_service(&service);
        assert_eq!(config.port, 3000);
        assert_eq!(config.body_limit, DEFAULT_BODY_LIMIT);
    }

    #[test]
    fn test_clones_share_entries() {
        let service = ConfigService::new();
        let clone = service.clone();
        clone.set("FEATURE", "on");
        assert_eq!(service.get("FEATURE").as_deref(), Some("on"));
        assert_eq!(service.len(), 1);
    }
}
