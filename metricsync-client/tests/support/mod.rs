//! Shared helpers for engine, snapshot and stream tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use futures::stream;
use metricsync_client::api_client::MetricsApiClient;
use metricsync_client::stream::{SignalStream, StreamConnector, StreamMessage, TransportSignal};
use metricsync_client::{MetricTable, SyncConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Routes engine logs to the test writer. Set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("metricsync=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Config against a mock server with a short flush cadence.
pub fn test_config(server: &MockServer) -> SyncConfig {
    SyncConfig {
        api_base_url: server.uri(),
        flush_interval_ms: 5,
        debug_log_capacity: 20,
        request_timeout_secs: 5,
    }
}

pub fn test_api(server: &MockServer) -> Arc<MetricsApiClient> {
    Arc::new(MetricsApiClient::new(test_config(server)).expect("valid test config"))
}

/// Serves `body` from the snapshot endpoint.
pub async fn mount_snapshot(server: &MockServer, body: serde_json::Value) {
    mount_snapshot_response(server, ResponseTemplate::new(200).set_body_json(body)).await;
}

pub async fn mount_snapshot_response(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .and(query_param("with_readings", "true"))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Stream connector fed from a channel the test holds.
pub struct ChannelConnector {
    rx: Mutex<Option<UnboundedReceiver<TransportSignal>>>,
    connects: AtomicUsize,
}

impl ChannelConnector {
    pub fn new() -> (Arc<Self>, UnboundedSender<TransportSignal>) {
        let (tx, rx) = unbounded();
        let connector = Arc::new(Self {
            rx: Mutex::new(Some(rx)),
            connects: AtomicUsize::new(0),
        });
        (connector, tx)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamConnector for ChannelConnector {
    async fn connect(&self, _last_event_id: Option<String>) -> SignalStream {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.rx.lock().unwrap().take() {
            Some(rx) => rx.boxed(),
            None => stream::empty().boxed(),
        }
    }
}

pub fn metric_created(id: &str, name: &str) -> TransportSignal {
    TransportSignal::Message(StreamMessage::named(
        "metric_created",
        serde_json::json!({ "id": id, "name": name, "input_frequency": 1_000_000_000u64 })
            .to_string(),
    ))
}

pub fn reading_created(id: &str, metric_id: &str, value: f64, timestamp: &str) -> TransportSignal {
    TransportSignal::Message(StreamMessage::named(
        "metric_reading_created",
        serde_json::json!({
            "id": id,
            "metric_id": metric_id,
            "value": value,
            "timestamp": timestamp,
        })
        .to_string(),
    ))
}

pub fn control(data: &str) -> TransportSignal {
    TransportSignal::Message(StreamMessage::unnamed(data))
}

/// Waits until a published table satisfies `pred`.
pub async fn wait_for_table(
    rx: &mut watch::Receiver<Arc<MetricTable>>,
    pred: impl FnMut(&Arc<MetricTable>) -> bool,
) -> Arc<MetricTable> {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for table")
        .expect("engine dropped publisher")
        .clone()
}

/// Polls `cond` until it holds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub fn reading_ids(table: &MetricTable, metric_id: &str) -> Vec<String> {
    table
        .get(&metric_id.into())
        .map(|m| m.readings().iter().map(|r| r.id.to_string()).collect())
        .unwrap_or_default()
}
