//! Server configuration types for Flowcast.
//!
//! `ServerConfig` represents the `flowcast.toml` file that controls the bind
//! address, history size, broadcast gating, and generation cadence.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::flow::{DEFAULT_BROADCAST_THRESHOLD, MAX_CONVICTION_SCORE};

/// Top-level configuration for the Flowcast service.
///
/// All fields have sensible defaults, so an empty file is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind the HTTP/WebSocket listener on.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of recent events retained for the query endpoint.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Minimum conviction score for an event to be pushed to subscribers.
    #[serde(default = "default_broadcast_threshold")]
    pub broadcast_threshold: u8,

    /// Lower bound of the randomized generation interval.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Upper bound of the randomized generation interval.
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Per-connection delivery deadline; slower subscribers are dropped.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Seed for the flow simulator. Unset means seeded from OS entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_history_capacity() -> usize {
    50
}

fn default_broadcast_threshold() -> u8 {
    DEFAULT_BROADCAST_THRESHOLD
}

fn default_min_interval_ms() -> u64 {
    1_000
}

fn default_max_interval_ms() -> u64 {
    3_000
}

fn default_send_timeout_ms() -> u64 {
    5_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            history_capacity: default_history_capacity(),
            broadcast_threshold: default_broadcast_threshold(),
            min_interval_ms: default_min_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            seed: None,
        }
    }
}

impl ServerConfig {
    /// Reject combinations the driver and hub cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "min_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.min_interval_ms > self.max_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "min_interval_ms ({}) exceeds max_interval_ms ({})",
                self.min_interval_ms, self.max_interval_ms
            )));
        }
        if self.broadcast_threshold > MAX_CONVICTION_SCORE {
            return Err(ConfigError::Invalid(format!(
                "broadcast_threshold must be at most {MAX_CONVICTION_SCORE}"
            )));
        }
        if self.send_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "send_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}
