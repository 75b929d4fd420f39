//! Core types for metricsync.
//!
//! - [`MetricId`] / [`ReadingId`]: opaque identifiers issued by the metrics service
//! - [`Metric`] / [`Reading`]: the per-metric time series held by the client
//! - [`wire`]: JSON payloads of the snapshot endpoint and the event stream

mod error;
mod ids;
mod metric;
pub mod wire;

pub use error::{PayloadError, PayloadResult};
pub use ids::{MetricId, ReadingId};
pub use metric::{Metric, Reading, ReadingInsert};
