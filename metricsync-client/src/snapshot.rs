//! One-shot snapshot load that seeds the metric table.
//!
//! A failed load is not fatal: it is logged and an empty table is returned,
//! leaving the event stream to populate state incrementally. A reading that
//! cannot be decoded is skipped with a warning; its metric still loads.

use crate::api_client::MetricsApiClient;
use crate::debug_log::DebugLog;
use crate::error::SyncResult;
use crate::table::MetricTable;
use std::sync::Arc;
use tracing::warn;

/// Loads all metrics with their reading histories.
pub struct SnapshotLoader {
    api: Arc<MetricsApiClient>,
    log: DebugLog,
}

impl SnapshotLoader {
    pub fn new(api: Arc<MetricsApiClient>, log: DebugLog) -> Self {
        Self { api, log }
    }

    /// Fetches the snapshot. Never fails; returns an empty table on error.
    pub async fn load(&self) -> MetricTable {
        self.log.info("Fetching initial metrics state...");

        match self.fetch().await {
            Ok(table) => {
                self.log.success(format!(
                    "Loaded {} metric(s) with existing readings",
                    table.len()
                ));
                table
            }
            Err(e) => {
                self.log.error(format!("Error fetching initial state: {e}"));
                MetricTable::new()
            }
        }
    }

    async fn fetch(&self) -> SyncResult<MetricTable> {
        let dtos = self.api.fetch_metrics_with_readings().await?;

        let mut table = MetricTable::new();
        for dto in dtos {
            let id = dto.id.clone();
            let (metric, skipped) = dto.into_metric();
            for e in skipped {
                self.log
                    .warning(format!("Skipping invalid reading of metric {id} in snapshot: {e}"));
            }
            if !table.insert_if_absent(metric) {
                warn!("snapshot listed metric {id} twice, keeping the first entry");
            }
        }
        Ok(table)
    }
}
