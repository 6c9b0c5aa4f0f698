//! # HTTP Server Settings
//!
//! The health and metrics listener is configured from the environment only,
//! so the same settings apply whichever controller config file is mounted:
//!
//! | Variable | Default |
//! |---|---|
//! | `METRICS_PORT` | 8080 |
//! | `SERVER_STARTUP_TIMEOUT_SECS` | 10 |
//! | `SERVER_POLL_INTERVAL_MS` | 50 |
//!
//! Unparseable values fall back to the default.

use crate::constants::{
    DEFAULT_METRICS_PORT, DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port serving `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Startup fails when the listener isn't bound within this time
    pub startup_timeout: Duration,
    /// Interval of the bind check during startup
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            metrics_port: parse_or(lookup("METRICS_PORT"), DEFAULT_METRICS_PORT),
            startup_timeout: Duration::from_secs(parse_or(
                lookup("SERVER_STARTUP_TIMEOUT_SECS"),
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            )),
            poll_interval: Duration::from_millis(parse_or(
                lookup("SERVER_POLL_INTERVAL_MS"),
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            )),
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
