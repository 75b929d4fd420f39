use metricsync_client::{DebugLog, Severity};
use pretty_assertions::assert_eq;

fn messages(log: &DebugLog) -> Vec<String> {
    log.entries().into_iter().map(|e| e.message).collect()
}

#[test]
fn new_log_is_empty() {
    let log = DebugLog::new(20);
    assert!(log.is_empty());
    assert_eq!(log.len(), 0);
    assert!(!log.has_errors());
}

#[test]
fn entries_keep_insertion_order() {
    let log = DebugLog::new(5);
    log.info("one");
    log.success("two");
    log.warning("three");
    assert_eq!(messages(&log), vec!["one", "two", "three"]);
}

#[test]
fn full_ring_evicts_oldest_first() {
    let log = DebugLog::new(3);
    for i in 0..5 {
        log.info(format!("entry {i}"));
    }
    assert_eq!(log.len(), 3);
    assert_eq!(messages(&log), vec!["entry 2", "entry 3", "entry 4"]);
}

#[test]
fn zero_capacity_is_clamped_to_one() {
    let log = DebugLog::new(0);
    log.info("a");
    log.info("b");
    assert_eq!(messages(&log), vec!["b"]);
}

#[test]
fn counts_by_severity() {
    let log = DebugLog::new(10);
    log.error("e1");
    log.warning("w1");
    log.error("e2");
    log.success("s1");
    assert_eq!(log.count(Severity::Error), 2);
    assert_eq!(log.count(Severity::Warning), 1);
    assert_eq!(log.count(Severity::Info), 0);
    assert!(log.has_errors());
}

#[test]
fn evicted_error_no_longer_counts() {
    let log = DebugLog::new(2);
    log.error("boom");
    log.info("a");
    assert!(log.has_errors());
    log.info("b");
    assert!(!log.has_errors());
}

#[test]
fn clones_share_the_same_ring() {
    let log = DebugLog::new(4);
    let other = log.clone();
    other.warning("from clone");
    assert_eq!(messages(&log), vec!["from clone"]);
    assert_eq!(log.entries()[0].severity, Severity::Warning);
}

#[test]
fn severity_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Severity::Success).unwrap(), "\"success\"");
    assert_eq!(Severity::Warning.to_string(), "warning");
}

#[test]
fn warnings_and_errors_are_problems() {
    assert!(Severity::Warning.is_problem());
    assert!(Severity::Error.is_problem());
    assert!(!Severity::Info.is_problem());
    assert!(!Severity::Success.is_problem());
}
