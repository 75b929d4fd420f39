//! Metric time series and their readings.

use crate::ids::{MetricId, ReadingId};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;

/// One timestamped sample belonging to a metric.
#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    pub id: ReadingId,
    pub value: f64,
    /// Service clock, UTC.
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(id: impl Into<ReadingId>, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            value,
            timestamp,
        }
    }
}

/// Outcome of [`Metric::insert_reading`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadingInsert {
    /// Timestamp was at or after the last reading; pushed to the end.
    Appended,
    /// Arrived out of order; the sequence was re-sorted.
    Reordered,
    /// A reading with the same id already exists; nothing changed.
    Duplicate,
}

impl ReadingInsert {
    pub fn is_admitted(self) -> bool {
        !matches!(self, ReadingInsert::Duplicate)
    }
}

/// A named, independently tracked time series.
///
/// Readings are kept in non-decreasing timestamp order with ties in arrival
/// order, and no two readings share an id. Admitted readings are never
/// edited or removed.
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    pub id: MetricId,
    pub name: String,
    pub input_frequency: Option<Duration>,
    readings: Vec<Reading>,
    reading_ids: HashSet<ReadingId>,
}

impl Metric {
    /// Creates a metric with no readings.
    pub fn new(id: impl Into<MetricId>, name: impl Into<String>, input_frequency: Option<Duration>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input_frequency,
            readings: Vec::new(),
            reading_ids: HashSet::new(),
        }
    }

    /// Creates a metric from a full reading history.
    ///
    /// Readings are stably sorted by timestamp; a repeated id keeps its first
    /// occurrence.
    pub fn with_readings(
        id: impl Into<MetricId>,
        name: impl Into<String>,
        input_frequency: Option<Duration>,
        readings: impl IntoIterator<Item = Reading>,
    ) -> Self {
        let mut metric = Self::new(id, name, input_frequency);
        for reading in readings {
            if metric.reading_ids.insert(reading.id.clone()) {
                metric.readings.push(reading);
            }
        }
        metric.readings.sort_by_key(|r| r.timestamp);
        metric
    }

    /// Admits a reading unless its id is already present.
    pub fn insert_reading(&mut self, reading: Reading) -> ReadingInsert {
        if self.reading_ids.contains(&reading.id) {
            return ReadingInsert::Duplicate;
        }
        self.reading_ids.insert(reading.id.clone());

        let in_order = self
            .readings
            .last()
            .is_none_or(|last| reading.timestamp >= last.timestamp);

        self.readings.push(reading);
        if in_order {
            ReadingInsert::Appended
        } else {
            // sort_by_key is stable: equal timestamps keep arrival order
            self.readings.sort_by_key(|r| r.timestamp);
            ReadingInsert::Reordered
        }
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn contains_reading(&self, id: &ReadingId) -> bool {
        self.reading_ids.contains(id)
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.last()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}
