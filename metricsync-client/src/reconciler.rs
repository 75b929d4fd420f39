//! Merges stream events into the canonical metric table.
//!
//! Rules:
//! - **UpsertMetric**: first writer wins. A metric that already exists (from
//!   the snapshot or an earlier event) is never replaced, so its readings
//!   survive redundant creation events.
//! - **AppendReading**: readings for unknown metrics are dropped as orphans.
//!   A reading id already present is a no-op. Otherwise the reading is
//!   appended when in order, or inserted and re-sorted when late.
//!
//! Mutations are queued in the [`UpdateBatcher`] and applied on the next
//! flush, never directly to the published table.

use crate::batcher::{FlushReport, UpdateBatcher};
use crate::debug_log::DebugLog;
use crate::error::{SyncError, SyncResult};
use crate::table::MetricTable;
use chrono::{DateTime, Utc};
use metricsync_types::wire::{
    METRIC_CREATED_EVENT, MetricCreatedPayload, READING_CREATED_EVENT, ReadingCreatedPayload,
};
use metricsync_types::{Metric, MetricId, Reading, ReadingId, ReadingInsert};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// A queued change to the metric table.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    UpsertMetric {
        id: MetricId,
        name: String,
        input_frequency: Option<Duration>,
    },
    AppendReading {
        metric_id: MetricId,
        reading: Reading,
    },
}

/// What applying a [`Mutation`] did to the table.
#[derive(Clone, Debug, PartialEq)]
pub enum MutationOutcome {
    MetricCreated { id: MetricId, name: String },
    /// Redundant creation event; existing metric kept.
    MetricExists { id: MetricId },
    ReadingAdded {
        metric_id: MetricId,
        reading_id: ReadingId,
        value: f64,
        /// True when the reading arrived out of order and forced a re-sort.
        reordered: bool,
    },
    DuplicateReading {
        metric_id: MetricId,
        reading_id: ReadingId,
    },
    /// Reading for a metric that has not been observed. Dropped, not replayed.
    OrphanReading {
        metric_id: MetricId,
        reading_id: ReadingId,
    },
}

impl MetricTable {
    /// Applies one mutation under the insert/merge/dedup rules.
    pub(crate) fn apply(&mut self, mutation: Mutation) -> MutationOutcome {
        match mutation {
            Mutation::UpsertMetric {
                id,
                name,
                input_frequency,
            } => {
                let metric = Metric::new(id.clone(), name.clone(), input_frequency);
                if self.insert_if_absent(metric) {
                    MutationOutcome::MetricCreated { id, name }
                } else {
                    MutationOutcome::MetricExists { id }
                }
            }
            Mutation::AppendReading { metric_id, reading } => {
                let Some(metric) = self.metric_mut(&metric_id) else {
                    return MutationOutcome::OrphanReading {
                        metric_id,
                        reading_id: reading.id,
                    };
                };

                let reading_id = reading.id.clone();
                let value = reading.value;
                match metric.insert_reading(reading) {
                    ReadingInsert::Duplicate => MutationOutcome::DuplicateReading {
                        metric_id,
                        reading_id,
                    },
                    insert => MutationOutcome::ReadingAdded {
                        metric_id,
                        reading_id,
                        value,
                        reordered: insert == ReadingInsert::Reordered,
                    },
                }
            }
        }
    }
}

/// Owns the canonical metric table through its [`UpdateBatcher`].
pub struct StreamReconciler {
    batcher: UpdateBatcher,
    log: DebugLog,
}

impl StreamReconciler {
    pub fn new(log: DebugLog) -> Self {
        Self {
            batcher: UpdateBatcher::new(MetricTable::new()),
            log,
        }
    }

    /// Replaces the table with a freshly loaded snapshot and publishes it.
    pub fn seed(&mut self, snapshot: MetricTable) {
        self.batcher.replace(snapshot);
    }

    /// Queues creation of a metric (no-op at flush if it already exists).
    pub fn upsert_metric(
        &mut self,
        id: impl Into<MetricId>,
        name: impl Into<String>,
        input_frequency: Option<Duration>,
    ) {
        self.batcher.push(Mutation::UpsertMetric {
            id: id.into(),
            name: name.into(),
            input_frequency,
        });
    }

    /// Queues a reading for `metric_id`.
    pub fn append_reading(
        &mut self,
        metric_id: impl Into<MetricId>,
        reading_id: impl Into<ReadingId>,
        value: f64,
        timestamp: DateTime<Utc>,
    ) {
        self.batcher.push(Mutation::AppendReading {
            metric_id: metric_id.into(),
            reading: Reading::new(reading_id, value, timestamp),
        });
    }

    /// Parses a named stream event and queues the resulting mutation.
    ///
    /// Returns `Ok(false)` for event names this reconciler does not handle.
    pub fn handle_event(&mut self, event: &str, data: &str) -> SyncResult<bool> {
        match event {
            METRIC_CREATED_EVENT => {
                let payload: MetricCreatedPayload = serde_json::from_str(data)
                    .map_err(|e| SyncError::event_parse(event, e))?;
                self.upsert_metric(payload.id, payload.name, payload.input_frequency);
                Ok(true)
            }
            READING_CREATED_EVENT => {
                let payload: ReadingCreatedPayload = serde_json::from_str(data)
                    .map_err(|e| SyncError::event_parse(event, e))?;
                payload
                    .validate()
                    .map_err(|e| SyncError::event_parse(event, e))?;
                self.batcher.push(Mutation::AppendReading {
                    reading: payload.to_reading(),
                    metric_id: payload.metric_id,
                });
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Applies every queued mutation and publishes the result, if any were queued.
    pub fn flush(&mut self) -> Option<FlushReport> {
        let report = self.batcher.flush()?;
        for outcome in &report.outcomes {
            self.record(outcome);
        }
        Some(report)
    }

    /// Drops queued mutations without applying them. Returns how many were dropped.
    pub fn discard_pending(&mut self) -> usize {
        self.batcher.discard_pending()
    }

    pub fn pending_count(&self) -> usize {
        self.batcher.pending_count()
    }

    /// The most recently published table.
    pub fn current(&self) -> Arc<MetricTable> {
        self.batcher.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<MetricTable>> {
        self.batcher.subscribe()
    }

    fn record(&self, outcome: &MutationOutcome) {
        match outcome {
            MutationOutcome::MetricCreated { id, name } => {
                self.log
                    .success(format!("Metric created: {name} ({})", id.short()));
            }
            MutationOutcome::MetricExists { id } => {
                debug!("metric {id} already known, keeping existing readings");
            }
            MutationOutcome::ReadingAdded {
                metric_id,
                value,
                reordered,
                ..
            } => {
                if *reordered {
                    debug!("late reading for metric {metric_id}, re-sorted");
                }
                self.log
                    .success(format!("Reading added: {value} for metric {}", metric_id.short()));
            }
            MutationOutcome::DuplicateReading {
                metric_id,
                reading_id,
            } => {
                debug!("duplicate reading {reading_id} for metric {metric_id} suppressed");
            }
            MutationOutcome::OrphanReading { metric_id, .. } => {
                self.log
                    .warning(format!("Received reading for unknown metric: {metric_id}"));
            }
        }
    }
}
