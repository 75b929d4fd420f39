//! HTTP client for the metrics service.
//!
//! Covers the two endpoints the engine consumes: the one-shot snapshot of
//! all metrics with readings, and the long-lived `text/event-stream` watch.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use metricsync_types::wire::MetricDto;
use reqwest::{Client, Response, header};
use tracing::debug;

const METRICS_PATH: &str = "/metrics?with_readings=true";
const WATCH_PATH: &str = "/events/watch";

/// HTTP client for the metrics service.
#[derive(Clone)]
pub struct MetricsApiClient {
    /// Request/response calls, bounded by the configured timeout.
    client: Client,
    /// Event stream; no overall timeout since the body never ends.
    stream_client: Client,
    config: SyncConfig,
}

impl MetricsApiClient {
    pub fn new(config: SyncConfig) -> SyncResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;

        let stream_client = Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build stream client: {e}")))?;

        Ok(Self {
            client,
            stream_client,
            config,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn metrics_url(&self) -> String {
        format!("{}{}", self.config.base_url(), METRICS_PATH)
    }

    pub fn watch_url(&self) -> String {
        format!("{}{}", self.config.base_url(), WATCH_PATH)
    }

    // ── Snapshot ──

    /// Fetches every metric with its full reading history.
    pub async fn fetch_metrics_with_readings(&self) -> SyncResult<Vec<MetricDto>> {
        let url = self.metrics_url();
        debug!("GET {url}");

        let resp = self.client.get(&url).send().await?;
        let resp = ensure_success(resp, &url)?;

        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    // ── Event stream ──

    /// Opens the event stream, resuming after `last_event_id` if given.
    ///
    /// Returns the response once headers arrive; the body is the stream.
    pub async fn open_event_stream(&self, last_event_id: Option<&str>) -> SyncResult<Response> {
        let url = self.watch_url();
        debug!("GET {url} (last event id: {last_event_id:?})");

        let mut req = self
            .stream_client
            .get(&url)
            .header(header::ACCEPT, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache");
        if let Some(id) = last_event_id.filter(|id| !id.is_empty()) {
            req = req.header("Last-Event-ID", id);
        }

        let resp = req.send().await?;
        ensure_success(resp, &url)
    }
}

fn ensure_success(resp: Response, url: &str) -> SyncResult<Response> {
    let status = resp.status();
    if !status.is_success() {
        return Err(SyncError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(resp)
}
