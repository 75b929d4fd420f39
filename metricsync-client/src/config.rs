//! Sync engine configuration.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the metric sync engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the metrics service (e.g., "http://localhost:8089").
    pub api_base_url: String,

    /// Flush cadence for batched state updates, in milliseconds.
    pub flush_interval_ms: u64,

    /// Number of entries retained by the debug log.
    pub debug_log_capacity: usize,

    /// Timeout for the snapshot request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8089".to_string(),
            flush_interval_ms: 16, // one frame at 60 Hz
            debug_log_capacity: 20,
            request_timeout_secs: 30,
        }
    }
}

impl SyncConfig {
    /// Creates a config pointed at `api_base_url` with default tuning.
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(SyncError::Config("api_base_url must not be empty".to_string()));
        }
        if self.flush_interval_ms == 0 {
            return Err(SyncError::Config("flush_interval_ms must be positive".to_string()));
        }
        if self.debug_log_capacity == 0 {
            return Err(SyncError::Config("debug_log_capacity must be positive".to_string()));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base URL without a trailing slash, for joining endpoint paths.
    pub(crate) fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}
