//! Monitor configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::threshold::ThresholdTable;

/// Construction-time configuration for a [`PerfMonitor`](crate::PerfMonitor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorConfig {
    /// Per-category slow thresholds
    pub thresholds: ThresholdTable,
    /// Age in seconds after which completed records may be evicted (default: 1800 = 30 minutes)
    pub retention_secs: u64,
    /// Seconds between retention sweeps (default: 300 = 5 minutes)
    pub sweep_interval_secs: u64,
    /// Whether measurements are recorded at startup
    pub enabled: bool,
    /// Whether every completion is traced, not only slow ones
    pub detailed_tracing: bool,
    /// Buffer size of the long-task event channel
    pub long_task_channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdTable::default(),
            retention_secs: 1800,
            sweep_interval_secs: 300,
            enabled: true,
            detailed_tracing: false,
            long_task_channel_capacity: 256,
        }
    }
}

impl MonitorConfig {
    /// Set the threshold table.
    pub fn with_thresholds(mut self, thresholds: ThresholdTable) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the retention window in seconds.
    pub fn with_retention_secs(mut self, secs: u64) -> Self {
        self.retention_secs = secs;
        self
    }

    /// Set the sweep interval in seconds.
    pub fn with_sweep_interval_secs(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }

    /// Set the initial enabled and detailed-tracing flags.
    pub fn with_enabled(mut self, enabled: bool, detailed_tracing: bool) -> Self {
        self.enabled = enabled;
        self.detailed_tracing = detailed_tracing;
        self
    }

    /// Create a config that starts disabled.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Retention window as a duration.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Sweep interval as a duration. Never zero.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
