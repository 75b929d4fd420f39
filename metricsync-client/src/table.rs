//! Insertion-ordered metric state table.

use indexmap::IndexMap;
use metricsync_types::{Metric, MetricId};
use std::sync::Arc;

/// Mapping from metric id to metric, iterated in creation order.
///
/// Metrics are held behind `Arc` so that cloning the table for a flush only
/// copies pointers; a metric is deep-copied the first time a flush mutates it.
/// Tables handed to consumers are read-only.
#[derive(Clone, Debug, Default)]
pub struct MetricTable {
    metrics: IndexMap<MetricId, Arc<Metric>>,
    generation: u64,
}

impl MetricTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn contains(&self, id: &MetricId) -> bool {
        self.metrics.contains_key(id)
    }

    pub fn get(&self, id: &MetricId) -> Option<&Arc<Metric>> {
        self.metrics.get(id)
    }

    /// Iterates metrics in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Metric>> {
        self.metrics.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &MetricId> {
        self.metrics.keys()
    }

    /// Number of publishes that produced this table; 0 for a fresh table.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Inserts `metric` unless its id is already present. Returns true if inserted.
    pub(crate) fn insert_if_absent(&mut self, metric: Metric) -> bool {
        if self.metrics.contains_key(&metric.id) {
            return false;
        }
        self.metrics.insert(metric.id.clone(), Arc::new(metric));
        true
    }

    /// Mutable access to one metric, copying it first if a published table shares it.
    pub(crate) fn metric_mut(&mut self, id: &MetricId) -> Option<&mut Metric> {
        self.metrics.get_mut(id).map(Arc::make_mut)
    }

    pub(crate) fn bump_generation(&mut self, previous: u64) {
        self.generation = previous + 1;
    }
}

/// Collects metrics in iteration order; a repeated id keeps the first metric.
impl FromIterator<Metric> for MetricTable {
    fn from_iter<I: IntoIterator<Item = Metric>>(iter: I) -> Self {
        let mut table = MetricTable::new();
        for metric in iter {
            table.insert_if_absent(metric);
        }
        table
    }
}
