use chrono::{TimeZone, Utc};
use metricsync_types::PayloadError;
use metricsync_types::wire::*;
use pretty_assertions::assert_eq;
use std::time::Duration;

#[test]
fn metric_dto_decodes_snapshot_entry() {
    let dto: MetricDto = serde_json::from_value(serde_json::json!({
        "id": "m-1",
        "name": "cpu",
        "input_frequency": 5_000_000_000i64,
        "readings": [
            { "id": "r2", "value": 2.5, "timestamp": "2025-01-01T00:00:02Z" },
            { "id": "r1", "value": 1.5, "timestamp": "2025-01-01T00:00:01Z" }
        ]
    }))
    .unwrap();

    assert_eq!(dto.input_frequency, Some(Duration::from_secs(5)));
    let (metric, skipped) = dto.into_metric();
    assert!(skipped.is_empty());
    let ids: Vec<_> = metric.readings().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "r2"]);
}

#[test]
fn null_readings_decode_as_empty() {
    let dto: MetricDto =
        serde_json::from_str(r#"{"id":"m-1","name":"cpu","readings":null}"#).unwrap();
    assert!(dto.readings.is_empty());
    assert!(dto.input_frequency.is_none());
}

#[test]
fn missing_readings_decode_as_empty() {
    let dto: MetricDto = serde_json::from_str(r#"{"id":"m-1","name":"cpu"}"#).unwrap();
    assert!(dto.readings.is_empty());
}

#[test]
fn zero_input_frequency_means_unset() {
    let payload: MetricCreatedPayload =
        serde_json::from_str(r#"{"id":"m-1","name":"cpu","input_frequency":0}"#).unwrap();
    assert!(payload.input_frequency.is_none());
}

#[test]
fn negative_input_frequency_is_rejected() {
    let result: Result<MetricCreatedPayload, _> =
        serde_json::from_str(r#"{"id":"m-1","name":"cpu","input_frequency":-1}"#);
    assert!(result.is_err());
}

#[test]
fn timestamp_accepts_rfc3339_with_offset() {
    let payload: ReadingCreatedPayload = serde_json::from_str(
        r#"{"id":"r1","metric_id":"m-1","value":1.0,"timestamp":"2025-01-01T02:00:00+02:00"}"#,
    )
    .unwrap();
    assert_eq!(payload.timestamp, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
}

#[test]
fn timestamp_accepts_epoch_millis() {
    let payload: ReadingCreatedPayload = serde_json::from_str(
        r#"{"id":"r1","metric_id":"m-1","value":1.0,"timestamp":1735689600000}"#,
    )
    .unwrap();
    assert_eq!(payload.timestamp, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
}

#[test]
fn timestamp_rejects_garbage() {
    let result: Result<ReadingCreatedPayload, _> = serde_json::from_str(
        r#"{"id":"r1","metric_id":"m-1","value":1.0,"timestamp":"yesterday"}"#,
    );
    assert!(result.is_err());
}

#[test]
fn empty_ids_are_accepted_verbatim() {
    let payload: ReadingCreatedPayload = serde_json::from_str(
        r#"{"id":"","metric_id":"","value":1.0,"timestamp":"2025-01-01T00:00:00Z"}"#,
    )
    .unwrap();
    assert_eq!(payload.validate(), Ok(()));
    assert_eq!(payload.to_reading().id.as_str(), "");
}

#[test]
fn undecodable_reading_is_skipped_and_metric_kept() {
    let dto: MetricDto = serde_json::from_value(serde_json::json!({
        "id": "m-1",
        "name": "cpu",
        "readings": [
            { "id": "r1", "value": 1.0, "timestamp": "2025-01-01T00:00:01Z" },
            { "id": "r2", "value": 2.0, "timestamp": "yesterday" },
            { "id": "", "value": 2.5, "timestamp": "2025-01-01T00:00:02Z" },
            { "id": "r3", "value": 3.0, "timestamp": "2025-01-01T00:00:03Z" }
        ]
    }))
    .unwrap();

    assert!(matches!(dto.readings[1], SnapshotReading::Undecodable(_)));
    let (metric, skipped) = dto.into_metric();
    let ids: Vec<_> = metric.readings().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "", "r3"]);
    assert_eq!(skipped.len(), 1);
    assert!(matches!(skipped[0], PayloadError::UndecodableReading(_)));
}

#[test]
fn input_frequency_serializes_as_nanos() {
    let payload = MetricCreatedPayload {
        id: "m-1".into(),
        name: "cpu".into(),
        input_frequency: Some(Duration::from_millis(250)),
    };
    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json["input_frequency"], serde_json::json!(250_000_000u64));
}

#[test]
fn payload_error_display() {
    assert_eq!(
        PayloadError::NonFiniteValue("r1".into()).to_string(),
        "non-finite reading value for reading r1"
    );
}
