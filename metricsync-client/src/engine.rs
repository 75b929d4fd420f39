//! Metric sync engine: startup sequencing and the main event loop.
//!
//! Startup is strictly ordered: the snapshot load finishes (successfully or
//! not) before the event stream is opened, so a late snapshot can never
//! overwrite metrics created by the stream.
//!
//! The loop then runs on a single task and coordinates:
//! - Command processing (stop, force flush)
//! - Flush ticks at the configured cadence
//! - Transport signals, in delivery order
//!
//! Callers keep a cloneable [`MetricSyncHandle`] and spawn
//! [`MetricSyncEngine::run`].

use crate::api_client::MetricsApiClient;
use crate::config::SyncConfig;
use crate::debug_log::DebugLog;
use crate::error::{SyncError, SyncResult};
use crate::health::{ConnectionStatus, ControlMessage, HealthMonitor, LifecycleSignal, is_healthy};
use crate::reconciler::StreamReconciler;
use crate::snapshot::SnapshotLoader;
use crate::stream::{SignalStream, SseConnector, StreamConnector, StreamMessage, TransportSignal};
use crate::table::MetricTable;
use crate::view::DashboardView;

use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Commands sent to the sync engine.
#[derive(Debug)]
pub enum EngineCommand {
    Stop,
    ForceFlush,
}

/// Handle for controlling and observing a running engine.
#[derive(Clone)]
pub struct MetricSyncHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    shutdown: Arc<AtomicBool>,
    metrics_rx: watch::Receiver<Arc<MetricTable>>,
    status_rx: watch::Receiver<ConnectionStatus>,
    last_event_id_rx: watch::Receiver<Option<String>>,
    log: DebugLog,
}

impl MetricSyncHandle {
    /// Begins shutdown.
    ///
    /// The shutdown flag is raised before the command is sent, so an
    /// in-flight snapshot load or stream event is suppressed even if the
    /// engine has not yet read the command.
    pub async fn stop(&self) -> SyncResult<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.command_tx
            .send(EngineCommand::Stop)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    /// Flushes queued mutations without waiting for the next tick.
    pub async fn force_flush(&self) -> SyncResult<()> {
        self.command_tx
            .send(EngineCommand::ForceFlush)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    pub fn is_stopping(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Receives every published table.
    pub fn subscribe_metrics(&self) -> watch::Receiver<Arc<MetricTable>> {
        self.metrics_rx.clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// The most recently published table.
    pub fn metrics(&self) -> Arc<MetricTable> {
        self.metrics_rx.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// The `id:` of the last stream event that carried one.
    pub fn last_event_id(&self) -> Option<String> {
        self.last_event_id_rx.borrow().clone()
    }

    pub fn debug_log(&self) -> &DebugLog {
        &self.log
    }

    pub fn is_healthy(&self) -> bool {
        is_healthy(self.status(), &self.log)
    }

    pub fn view(&self) -> DashboardView {
        let status = self.status();
        DashboardView {
            table: self.metrics(),
            status,
            debug_entries: self.log.entries(),
            healthy: is_healthy(status, &self.log),
        }
    }
}

/// The sync engine. Run it with [`MetricSyncEngine::run`].
pub struct MetricSyncEngine {
    config: SyncConfig,
    loader: SnapshotLoader,
    connector: Arc<dyn StreamConnector>,
    reconciler: StreamReconciler,
    health: HealthMonitor,
    log: DebugLog,
    command_rx: mpsc::Receiver<EngineCommand>,
    shutdown: Arc<AtomicBool>,
    last_event_id: watch::Sender<Option<String>>,
}

/// Creates an engine and its handle.
///
/// `api` serves the snapshot; `connector` opens the event stream.
pub fn create_metric_sync_engine(
    api: Arc<MetricsApiClient>,
    connector: Arc<dyn StreamConnector>,
) -> (MetricSyncHandle, MetricSyncEngine) {
    let config = api.config().clone();
    let (command_tx, command_rx) = mpsc::channel(64);
    let (last_event_id, last_event_id_rx) = watch::channel(None);
    let shutdown = Arc::new(AtomicBool::new(false));

    let log = DebugLog::new(config.debug_log_capacity);
    let reconciler = StreamReconciler::new(log.clone());
    let health = HealthMonitor::new(log.clone());

    let handle = MetricSyncHandle {
        command_tx,
        shutdown: shutdown.clone(),
        metrics_rx: reconciler.subscribe(),
        status_rx: health.subscribe(),
        last_event_id_rx,
        log: log.clone(),
    };

    let engine = MetricSyncEngine {
        config,
        loader: SnapshotLoader::new(api, log.clone()),
        connector,
        reconciler,
        health,
        log,
        command_rx,
        shutdown,
        last_event_id,
    };

    (handle, engine)
}

/// Creates an engine that streams from the service's SSE endpoint.
pub fn create_sse_sync_engine(config: SyncConfig) -> SyncResult<(MetricSyncHandle, MetricSyncEngine)> {
    let api = Arc::new(MetricsApiClient::new(config)?);
    let connector = Arc::new(SseConnector::new(api.clone()));
    Ok(create_metric_sync_engine(api, connector))
}

impl MetricSyncEngine {
    /// Runs startup and the event loop until stopped.
    pub async fn run(mut self) {
        info!("metric sync engine starting against {}", self.config.api_base_url);

        let snapshot = tokio::select! {
            table = self.loader.load() => table,
            _ = wait_for_stop(&mut self.command_rx) => {
                info!("stopped during snapshot load");
                return self.finish();
            }
        };

        if self.is_stopping() {
            info!("shutdown requested during snapshot load, discarding snapshot");
            return self.finish();
        }
        self.reconciler.seed(snapshot);

        let last_event_id = self.last_event_id.borrow().clone();
        let stream = tokio::select! {
            stream = self.connector.connect(last_event_id) => stream,
            _ = wait_for_stop(&mut self.command_rx) => {
                info!("stopped while connecting to event stream");
                return self.finish();
            }
        };

        self.event_loop(stream).await;
        self.finish();
    }

    async fn event_loop(&mut self, stream: SignalStream) {
        let mut stream = Some(stream);
        let mut flush_tick = tokio::time::interval(self.config.flush_interval());
        flush_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip first immediate tick
        flush_tick.tick().await;

        loop {
            tokio::select! {
                biased;

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(EngineCommand::Stop) => {
                            info!("metric sync engine stopping");
                            break;
                        }
                        Some(EngineCommand::ForceFlush) => self.flush(),
                        None => {
                            info!("command channel closed, stopping metric sync engine");
                            break;
                        }
                    }
                }
                _ = flush_tick.tick() => self.flush(),
                signal = next_signal(&mut stream) => {
                    match signal {
                        Some(signal) => self.handle_signal(signal),
                        None => {
                            debug!("event stream finished");
                            stream = None;
                        }
                    }
                }
            }
        }
        // `stream` drops here, closing the connection.
    }

    /// Publishes queued mutations unless shutdown has begun.
    fn flush(&mut self) {
        if self.is_stopping() {
            return;
        }
        self.reconciler.flush();
    }

    fn handle_signal(&mut self, signal: TransportSignal) {
        if self.is_stopping() {
            return;
        }

        match signal {
            TransportSignal::Open => {
                self.health.observe(LifecycleSignal::Open);
            }
            TransportSignal::Error { state, reason } => {
                debug!("event stream error ({state:?}): {reason}");
                self.health.observe(LifecycleSignal::Error(state));
            }
            TransportSignal::Message(message) => self.handle_message(message),
        }
    }

    fn handle_message(&mut self, message: StreamMessage) {
        if let Some(id) = &message.id {
            self.last_event_id.send_replace(Some(id.clone()));
        }

        if message.is_default() {
            match ControlMessage::parse(&message.data) {
                Some(control) => {
                    self.health.observe(LifecycleSignal::Control(control));
                }
                None => self
                    .log
                    .info(format!("Unexpected stream message: {}", message.data)),
            }
            return;
        }

        match self.reconciler.handle_event(&message.event, &message.data) {
            Ok(true) => {}
            Ok(false) => debug!("ignoring unhandled event type {}", message.event),
            Err(e) => self.log.error(e.to_string()),
        }
    }

    /// Cancels the pending flush and marks the connection down.
    fn finish(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let dropped = self.reconciler.discard_pending();
        if dropped > 0 {
            debug!("discarded {dropped} unflushed mutation(s) on shutdown");
        }
        self.health.mark_disconnected();
        info!("metric sync engine stopped");
    }

    fn is_stopping(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Resolves on a stop command or when every handle is gone.
async fn wait_for_stop(command_rx: &mut mpsc::Receiver<EngineCommand>) {
    loop {
        match command_rx.recv().await {
            Some(EngineCommand::Stop) | None => return,
            Some(cmd) => debug!("ignoring {cmd:?} before the event stream starts"),
        }
    }
}

/// Next signal from the stream; pends forever once the stream is gone.
async fn next_signal(stream: &mut Option<SignalStream>) -> Option<TransportSignal> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
