//! Rate-bounded publishing of reconciled state.
//!
//! Mutations are buffered as they arrive and applied together on the next
//! flush tick, so consumers see at most one new table per tick no matter how
//! fast events arrive:
//! - **Idle ticks**: nothing queued, nothing published
//! - **Busy ticks**: all queued mutations applied in enqueue order to a copy
//!   of the current table, which is then published as a single update

use crate::reconciler::{Mutation, MutationOutcome};
use crate::table::MetricTable;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Result of a flush that published a new table.
#[derive(Clone, Debug)]
pub struct FlushReport {
    /// Number of mutations applied.
    pub applied: usize,
    /// Outcome of each mutation, in enqueue order.
    pub outcomes: Vec<MutationOutcome>,
    /// Generation of the table that was published.
    pub generation: u64,
}

/// Buffers mutations and publishes copy-on-flush tables.
pub struct UpdateBatcher {
    pending: Vec<Mutation>,
    current: Arc<MetricTable>,
    publisher: watch::Sender<Arc<MetricTable>>,
}

impl UpdateBatcher {
    pub fn new(initial: MetricTable) -> Self {
        let current = Arc::new(initial);
        let (publisher, _) = watch::channel(current.clone());
        Self {
            pending: Vec::new(),
            current,
            publisher,
        }
    }

    /// Queues a mutation for the next flush.
    pub fn push(&mut self, mutation: Mutation) {
        self.pending.push(mutation);
    }

    /// Returns true if the next tick should publish.
    pub fn should_flush(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Applies all queued mutations to a copy of the current table and
    /// publishes it. Returns `None` when nothing was queued.
    pub fn flush(&mut self) -> Option<FlushReport> {
        if !self.should_flush() {
            return None;
        }

        let mutations = std::mem::take(&mut self.pending);
        let mut next = MetricTable::clone(&self.current);
        let outcomes: Vec<MutationOutcome> = mutations
            .into_iter()
            .map(|mutation| next.apply(mutation))
            .collect();
        next.bump_generation(self.current.generation());

        let report = FlushReport {
            applied: outcomes.len(),
            outcomes,
            generation: next.generation(),
        };
        self.publish(next);

        debug!(
            "flushed {} mutation(s), published generation {}",
            report.applied, report.generation
        );
        Some(report)
    }

    /// Publishes `table` as-is, replacing the current state.
    ///
    /// Queued mutations are kept and apply on top of the new table.
    pub fn replace(&mut self, mut table: MetricTable) {
        table.bump_generation(self.current.generation());
        self.publish(table);
    }

    /// Drops queued mutations without publishing. Returns how many were dropped.
    pub fn discard_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The most recently published table.
    pub fn current(&self) -> Arc<MetricTable> {
        self.current.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<MetricTable>> {
        self.publisher.subscribe()
    }

    fn publish(&mut self, table: MetricTable) {
        self.current = Arc::new(table);
        // No receivers is fine; `current` still holds the state.
        self.publisher.send_replace(self.current.clone());
    }
}
