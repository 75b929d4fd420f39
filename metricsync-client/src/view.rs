//! Read-only view of engine state for rendering.

use crate::debug_log::DebugEntry;
use crate::health::ConnectionStatus;
use crate::table::MetricTable;
use metricsync_types::Metric;
use std::sync::Arc;

/// Everything a dashboard needs to render one frame.
#[derive(Clone, Debug)]
pub struct DashboardView {
    pub table: Arc<MetricTable>,
    pub status: ConnectionStatus,
    pub debug_entries: Vec<DebugEntry>,
    /// Connected and no error entries in the debug log.
    pub healthy: bool,
}

impl DashboardView {
    /// Metrics in creation order.
    pub fn metrics(&self) -> Vec<Arc<Metric>> {
        self.table.iter().cloned().collect()
    }

    /// Whether the diagnostics panel should be shown.
    ///
    /// Hidden only when healthy and the log holds no warnings or errors.
    pub fn show_diagnostics(&self) -> bool {
        !self.healthy || self.debug_entries.iter().any(|e| e.severity.is_problem())
    }
}
