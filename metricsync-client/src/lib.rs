//! Client-side sync engine for the metricsync dashboard.
//!
//! Keeps an in-memory table of metrics and readings current by combining:
//! - A one-shot snapshot of every metric with its reading history
//! - A push event stream of metric and reading creations
//! - Rate-bounded publishing of copy-on-flush state tables
//! - A connection health state machine with a bounded diagnostic log
//!
//! ```no_run
//! # async fn demo() -> metricsync_client::SyncResult<()> {
//! use metricsync_client::{SyncConfig, create_sse_sync_engine};
//!
//! let (handle, engine) = create_sse_sync_engine(SyncConfig::default())?;
//! tokio::spawn(engine.run());
//!
//! let mut tables = handle.subscribe_metrics();
//! while tables.changed().await.is_ok() {
//!     let view = handle.view();
//!     println!("{} metric(s), {}", view.table.len(), view.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api_client;
pub mod batcher;
pub mod config;
pub mod debug_log;
pub mod engine;
pub mod error;
pub mod health;
pub mod reconciler;
pub mod snapshot;
pub mod stream;
pub mod table;
pub mod view;

pub use config::SyncConfig;
pub use debug_log::{DebugEntry, DebugLog, Severity};
pub use engine::{
    EngineCommand, MetricSyncEngine, MetricSyncHandle, create_metric_sync_engine,
    create_sse_sync_engine,
};
pub use error::{SyncError, SyncResult};
pub use health::{ConnectionStatus, ControlMessage, HealthMonitor, LifecycleSignal, ReadyState};
pub use table::MetricTable;
pub use view::DashboardView;
