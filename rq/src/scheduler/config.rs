//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchedulerConfig {
    /// Minimum time between two processed ticks, in milliseconds
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
}

fn default_update_interval_ms() -> u64 {
    1000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Get the update interval as a Duration
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// How often an external loop should call `tick`
    ///
    /// Half the update interval, so a wakeup that lands slightly early is
    /// followed by another one well before the next interval is due.
    pub fn driver_period(&self) -> Duration {
        (self.update_interval() / 2).max(Duration::from_millis(1))
    }
}
