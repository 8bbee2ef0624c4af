//! Registry and status manager configuration
//!
//! TigerStyle: Explicit configuration with bounded values.

use roster_core::constants::{
    CLEANUP_INTERVAL_MS_DEFAULT, CLEANUP_INTERVAL_MS_MAX, CLEANUP_INTERVAL_MS_MIN,
    EVENT_CHANNEL_CAPACITY_DEFAULT, STALE_THRESHOLD_MS_DEFAULT, STATUS_HISTORY_LENGTH_MAX,
    STATUS_HISTORY_LENGTH_MAX_DEFAULT,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`crate::NodeRegistry`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Silence threshold before an online node is considered stale
    pub stale_threshold_ms: u64,
    /// Interval between stale-node sweeps
    pub cleanup_interval_ms: u64,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            stale_threshold_ms: STALE_THRESHOLD_MS_DEFAULT,
            cleanup_interval_ms: CLEANUP_INTERVAL_MS_DEFAULT,
            event_capacity: EVENT_CHANNEL_CAPACITY_DEFAULT,
        }
    }
}

impl RegistryConfig {
    /// Create a configuration with the given stale threshold
    ///
    /// The cleanup interval is clamped to its valid range.
    pub fn new(stale_threshold_ms: u64, cleanup_interval_ms: u64) -> Self {
        let cleanup_interval_ms =
            cleanup_interval_ms.clamp(CLEANUP_INTERVAL_MS_MIN, CLEANUP_INTERVAL_MS_MAX);

        Self {
            stale_threshold_ms,
            cleanup_interval_ms,
            event_capacity: EVENT_CHANNEL_CAPACITY_DEFAULT,
        }
    }

    /// Set the stale threshold
    pub fn with_stale_threshold(mut self, threshold_ms: u64) -> Self {
        self.stale_threshold_ms = threshold_ms;
        self
    }

    /// Set the sweep interval
    pub fn with_cleanup_interval(mut self, interval_ms: u64) -> Self {
        self.cleanup_interval_ms =
            interval_ms.clamp(CLEANUP_INTERVAL_MS_MIN, CLEANUP_INTERVAL_MS_MAX);
        self
    }

    /// Get the sweep interval as a Duration
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.stale_threshold_ms == 0 {
            return Err("stale threshold must be positive".into());
        }

        if self.cleanup_interval_ms == 0 {
            return Err("cleanup interval must be positive".into());
        }

        if self.event_capacity == 0 {
            return Err("event capacity must be positive".into());
        }

        Ok(())
    }

    /// Create configuration for testing with short timeouts
    pub fn for_testing() -> Self {
        Self {
            stale_threshold_ms: 500,
            cleanup_interval_ms: CLEANUP_INTERVAL_MS_MIN,
            event_capacity: 64,
        }
    }
}

/// Configuration for [`crate::StatusManager`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Cap on retained transitions per node (oldest dropped first)
    pub max_history_length: usize,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            max_history_length: STATUS_HISTORY_LENGTH_MAX_DEFAULT,
            event_capacity: EVENT_CHANNEL_CAPACITY_DEFAULT,
        }
    }
}

impl StatusConfig {
    /// Create a configuration with the given history cap
    ///
    /// The cap is clamped to [1, STATUS_HISTORY_LENGTH_MAX].
    pub fn new(max_history_length: usize) -> Self {
        Self {
            max_history_length: max_history_length.clamp(1, STATUS_HISTORY_LENGTH_MAX),
            event_capacity: EVENT_CHANNEL_CAPACITY_DEFAULT,
        }
    }

    /// Set the history cap
    pub fn with_max_history(mut self, max_history_length: usize) -> Self {
        self.max_history_length = max_history_length.clamp(1, STATUS_HISTORY_LENGTH_MAX);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_history_length == 0 {
            return Err("history length must be positive".into());
        }

        if self.event_capacity == 0 {
            return Err("event capacity must be positive".into());
        }

        Ok(())
    }

    /// Create configuration for testing with a small history cap
    pub fn for_testing() -> Self {
        Self {
            max_history_length: 5,
            event_capacity: 64,
        }
    }
}
