//! Sync engine error types.

use thiserror::Error;

/// Result type for sync engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while loading or streaming metric state.
///
/// None of these are fatal to the engine: each is logged to the debug log
/// and the engine keeps running with consistent state.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid payload: {0}")]
    Payload(#[from] metricsync_types::PayloadError),

    #[error("failed to parse {event} event: {reason}")]
    EventParse { event: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("sync engine not running")]
    ChannelClosed,
}

impl SyncError {
    pub(crate) fn event_parse(event: &str, reason: impl std::fmt::Display) -> Self {
        SyncError::EventParse {
            event: event.to_string(),
            reason: reason.to_string(),
        }
    }
}
