//! Event stream transport.
//!
//! The engine consumes a stream of [`TransportSignal`]s and never talks to
//! the network directly. [`SseConnector`] produces those signals from the
//! service's `text/event-stream` endpoint:
//! - headers received with a 2xx status → `Open`
//! - each decoded event → `Message`
//! - framing or UTF-8 errors → `Error { state: Open }` (stream continues)
//! - transport errors, end of body, failed connects → `Error { state: Closed }`
//!   (stream ends)
//!
//! Reconnecting is left to the caller; the connector opens exactly one
//! connection per `connect` call.

use crate::api_client::MetricsApiClient;
use crate::health::ReadyState;
use async_trait::async_trait;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// One decoded server-sent event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamMessage {
    /// Event name; `message` for unnamed events.
    pub event: String,
    pub data: String,
    /// The `id:` field, if the server sent one.
    pub id: Option<String>,
}

impl StreamMessage {
    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
        }
    }

    /// An unnamed (default) message.
    pub fn unnamed(data: impl Into<String>) -> Self {
        Self::named(DEFAULT_EVENT, data)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// True for events sent without an `event:` field.
    pub fn is_default(&self) -> bool {
        self.event.is_empty() || self.event == DEFAULT_EVENT
    }
}

const DEFAULT_EVENT: &str = "message";

impl From<eventsource_stream::Event> for StreamMessage {
    fn from(event: eventsource_stream::Event) -> Self {
        Self {
            event: event.event,
            data: event.data,
            id: Some(event.id).filter(|id| !id.is_empty()),
        }
    }
}

/// Lifecycle and payload signals from the transport, in delivery order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportSignal {
    Open,
    Message(StreamMessage),
    Error { state: ReadyState, reason: String },
}

impl TransportSignal {
    pub fn closed(reason: impl Into<String>) -> Self {
        TransportSignal::Error {
            state: ReadyState::Closed,
            reason: reason.into(),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        TransportSignal::Error {
            state: ReadyState::Open,
            reason: reason.into(),
        }
    }
}

pub type SignalStream = BoxStream<'static, TransportSignal>;

/// Opens event stream connections.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Opens one connection. Failures are reported in-band as a closed error signal.
    async fn connect(&self, last_event_id: Option<String>) -> SignalStream;
}

/// Connects to the service's SSE endpoint.
pub struct SseConnector {
    api: Arc<MetricsApiClient>,
}

impl SseConnector {
    pub fn new(api: Arc<MetricsApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl StreamConnector for SseConnector {
    async fn connect(&self, last_event_id: Option<String>) -> SignalStream {
        let resp = match self.api.open_event_stream(last_event_id.as_deref()).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("event stream connect failed: {e}");
                return stream::once(async move { TransportSignal::closed(e.to_string()) }).boxed();
            }
        };

        debug!("event stream open at {}", self.api.watch_url());
        let events = Box::pin(resp.bytes_stream().eventsource());

        let signals = stream::unfold(Some(events), |state| async move {
            let mut events = state?;
            let signal = match events.next().await {
                Some(Ok(event)) => TransportSignal::Message(event.into()),
                Some(Err(EventStreamError::Transport(e))) => {
                    return Some((TransportSignal::closed(e.to_string()), None));
                }
                Some(Err(e)) => TransportSignal::transient(e.to_string()),
                None => return Some((TransportSignal::closed("event stream ended"), None)),
            };
            Some((signal, Some(events)))
        });

        stream::once(async { TransportSignal::Open })
            .chain(signals)
            .boxed()
    }
}
