//! Dispatch worker configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Dispatch worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DispatchConfig {
    /// Sleep between drains of the command queue, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause after a failed send before the next attempt, in milliseconds
    #[serde(default = "default_reconnect_cooldown_ms")]
    pub reconnect_cooldown_ms: u64,

    /// How long to wait for the connection lock before failing the send, in milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_reconnect_cooldown_ms() -> u64 {
    1000
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            reconnect_cooldown_ms: default_reconnect_cooldown_ms(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl DispatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_cooldown(&self) -> Duration {
        Duration::from_millis(self.reconnect_cooldown_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
