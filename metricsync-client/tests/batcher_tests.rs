use chrono::{TimeZone, Utc};
use metricsync_client::batcher::UpdateBatcher;
use metricsync_client::reconciler::{Mutation, MutationOutcome};
use metricsync_client::table::MetricTable;
use metricsync_types::{Metric, Reading};

fn upsert(id: &str) -> Mutation {
    Mutation::UpsertMetric {
        id: id.into(),
        name: id.to_uppercase(),
        input_frequency: None,
    }
}

fn append(metric_id: &str, reading_id: &str, secs: i64) -> Mutation {
    Mutation::AppendReading {
        metric_id: metric_id.into(),
        reading: Reading::new(
            reading_id,
            secs as f64,
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        ),
    }
}

#[test]
fn new_batcher_is_idle() {
    let batcher = UpdateBatcher::new(MetricTable::new());
    assert!(batcher.is_empty());
    assert!(!batcher.should_flush());
    assert_eq!(batcher.current().generation(), 0);
}

#[test]
fn idle_flush_publishes_nothing() {
    let mut batcher = UpdateBatcher::new(MetricTable::new());
    let rx = batcher.subscribe();
    assert!(batcher.flush().is_none());
    assert!(!rx.has_changed().unwrap());
}

#[test]
fn push_defers_application() {
    let mut batcher = UpdateBatcher::new(MetricTable::new());
    batcher.push(upsert("m-1"));
    assert_eq!(batcher.pending_count(), 1);
    assert!(batcher.current().is_empty());
}

#[test]
fn n_mutations_publish_exactly_once() {
    let mut batcher = UpdateBatcher::new(MetricTable::new());
    let mut rx = batcher.subscribe();

    batcher.push(upsert("m-1"));
    for i in 0..99 {
        batcher.push(append("m-1", &format!("r{i}"), i));
    }

    let report = batcher.flush().unwrap();
    assert_eq!(report.applied, 100);
    assert_eq!(report.generation, 1);

    assert!(rx.has_changed().unwrap());
    let table = rx.borrow_and_update().clone();
    assert_eq!(table.generation(), 1);
    assert_eq!(table.get(&"m-1".into()).unwrap().len(), 99);
    assert!(!rx.has_changed().unwrap());

    assert!(batcher.flush().is_none());
    assert!(!rx.has_changed().unwrap());
}

#[test]
fn mutations_apply_in_enqueue_order() {
    let mut batcher = UpdateBatcher::new(MetricTable::new());
    // Reading before its metric: orphan. Same reading after: admitted.
    batcher.push(append("m-1", "r1", 1));
    batcher.push(upsert("m-1"));
    batcher.push(append("m-1", "r1", 1));

    let report = batcher.flush().unwrap();
    assert!(matches!(report.outcomes[0], MutationOutcome::OrphanReading { .. }));
    assert!(matches!(report.outcomes[1], MutationOutcome::MetricCreated { .. }));
    assert!(matches!(report.outcomes[2], MutationOutcome::ReadingAdded { .. }));
}

#[test]
fn flush_clears_queue() {
    let mut batcher = UpdateBatcher::new(MetricTable::new());
    batcher.push(upsert("m-1"));
    batcher.flush();
    assert!(batcher.is_empty());
    assert_eq!(batcher.pending_count(), 0);
}

#[test]
fn generations_increase_per_publish() {
    let mut batcher = UpdateBatcher::new(MetricTable::new());
    batcher.push(upsert("a"));
    batcher.flush();
    batcher.push(upsert("b"));
    batcher.flush();
    assert_eq!(batcher.current().generation(), 2);
}

#[test]
fn discard_pending_drops_without_publishing() {
    let mut batcher = UpdateBatcher::new(MetricTable::new());
    let rx = batcher.subscribe();
    batcher.push(upsert("a"));
    batcher.push(upsert("b"));

    assert_eq!(batcher.discard_pending(), 2);
    assert!(batcher.flush().is_none());
    assert!(!rx.has_changed().unwrap());
    assert!(batcher.current().is_empty());
}

#[test]
fn replace_publishes_and_keeps_queue() {
    let mut batcher = UpdateBatcher::new(MetricTable::new());
    batcher.push(append("m-1", "r1", 1));
    batcher.replace(MetricTable::from_iter([Metric::new("m-1", "cpu", None)]));
    assert_eq!(batcher.current().generation(), 1);
    assert_eq!(batcher.pending_count(), 1);

    batcher.flush();
    assert_eq!(batcher.current().get(&"m-1".into()).unwrap().len(), 1);
}

#[test]
fn previously_published_table_is_immutable() {
    let mut batcher = UpdateBatcher::new(MetricTable::new());
    batcher.push(upsert("m-1"));
    batcher.flush();
    let snapshot = batcher.current();

    batcher.push(append("m-1", "r1", 1));
    batcher.flush();

    assert!(snapshot.get(&"m-1".into()).unwrap().is_empty());
    assert_eq!(batcher.current().get(&"m-1".into()).unwrap().len(), 1);
}
