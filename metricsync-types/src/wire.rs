//! JSON payloads exchanged with the metrics service.
//!
//! The snapshot endpoint returns `Vec<MetricDto>`; the event stream carries
//! [`MetricCreatedPayload`] and [`ReadingCreatedPayload`] as event data.

use crate::error::{PayloadError, PayloadResult};
use crate::ids::{MetricId, ReadingId};
use crate::metric::{Metric, Reading};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Named SSE event announcing a new metric.
pub const METRIC_CREATED_EVENT: &str = "metric_created";
/// Named SSE event announcing a new reading.
pub const READING_CREATED_EVENT: &str = "metric_reading_created";

/// A metric as returned by `GET /metrics?with_readings=true`.
#[derive(Clone, Debug, Deserialize)]
pub struct MetricDto {
    pub id: MetricId,
    pub name: String,
    #[serde(default, with = "nanos")]
    pub input_frequency: Option<Duration>,
    /// The service sends `null` for metrics without readings.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub readings: Vec<SnapshotReading>,
}

/// One entry of a snapshot reading history.
///
/// A reading that fails to decode is kept as `Undecodable` so the rest of
/// its metric still loads.
#[derive(Clone, Debug, PartialEq)]
pub enum SnapshotReading {
    Valid(ReadingDto),
    Undecodable(String),
}

impl<'de> Deserialize<'de> for SnapshotReading {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match ReadingDto::deserialize(value) {
            Ok(dto) => SnapshotReading::Valid(dto),
            Err(e) => SnapshotReading::Undecodable(e.to_string()),
        })
    }
}

/// A reading nested in a [`MetricDto`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadingDto {
    pub id: ReadingId,
    pub value: f64,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Data of a `metric_created` event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricCreatedPayload {
    pub id: MetricId,
    pub name: String,
    #[serde(default, with = "nanos")]
    pub input_frequency: Option<Duration>,
}

/// Data of a `metric_reading_created` event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReadingCreatedPayload {
    pub id: ReadingId,
    pub metric_id: MetricId,
    pub value: f64,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl ReadingDto {
    pub fn into_reading(self) -> PayloadResult<Reading> {
        if !self.value.is_finite() {
            return Err(PayloadError::NonFiniteValue(self.id.to_string()));
        }
        Ok(Reading::new(self.id, self.value, self.timestamp))
    }
}

impl SnapshotReading {
    pub fn into_reading(self) -> PayloadResult<Reading> {
        match self {
            SnapshotReading::Valid(dto) => dto.into_reading(),
            SnapshotReading::Undecodable(reason) => Err(PayloadError::UndecodableReading(reason)),
        }
    }
}

impl MetricDto {
    /// Builds the metric with its readings sorted by timestamp.
    ///
    /// Invalid readings are left out and returned alongside the metric.
    pub fn into_metric(self) -> (Metric, Vec<PayloadError>) {
        let mut readings = Vec::with_capacity(self.readings.len());
        let mut skipped = Vec::new();
        for entry in self.readings {
            match entry.into_reading() {
                Ok(reading) => readings.push(reading),
                Err(e) => skipped.push(e),
            }
        }
        let metric = Metric::with_readings(self.id, self.name, self.input_frequency, readings);
        (metric, skipped)
    }
}

impl ReadingCreatedPayload {
    pub fn validate(&self) -> PayloadResult<()> {
        if !self.value.is_finite() {
            return Err(PayloadError::NonFiniteValue(self.id.to_string()));
        }
        Ok(())
    }

    pub fn to_reading(&self) -> Reading {
        Reading::new(self.id.clone(), self.value, self.timestamp)
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Optional durations encoded as integer nanoseconds.
///
/// `null`, a missing field and `0` all mean "no expected frequency".
pub mod nanos {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<i64>::deserialize(deserializer)? {
            None | Some(0) => Ok(None),
            Some(ns) if ns < 0 => Err(de::Error::custom(format!(
                "input_frequency must be non-negative, got {ns}"
            ))),
            Some(ns) => Ok(Some(Duration::from_nanos(ns as u64))),
        }
    }
}

/// Timestamps encoded as RFC 3339 strings or integer epoch milliseconds.
pub mod timestamp {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserializer, Serializer, de};
    use std::fmt;

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TimestampVisitor;

        impl<'de> de::Visitor<'de> for TimestampVisitor {
            type Value = DateTime<Utc>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an RFC 3339 timestamp or epoch milliseconds")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                DateTime::parse_from_rfc3339(v.trim())
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| E::custom(format!("invalid timestamp {v:?}: {e}")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Utc.timestamp_millis_opt(v)
                    .single()
                    .ok_or_else(|| E::custom(format!("epoch millis out of range: {v}")))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                let v = i64::try_from(v)
                    .map_err(|_| E::custom(format!("epoch millis out of range: {v}")))?;
                self.visit_i64(v)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                if !v.is_finite() {
                    return Err(E::custom("epoch millis must be finite"));
                }
                self.visit_i64(v.trunc() as i64)
            }
        }

        deserializer.deserialize_any(TimestampVisitor)
    }
}
