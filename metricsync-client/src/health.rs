//! Connection health monitor.
//!
//! A finite-state machine over stream lifecycle signals. The push transport
//! reports errors even during benign reconnect attempts, so an error only
//! counts as an outage when the transport says it is closed, or when the
//! payload itself carries a `disconnected` control message.
//!
//! | status       | signal              | next         | log     |
//! |--------------|---------------------|--------------|---------|
//! | any          | open                | connected    | success |
//! | connected    | error (closed)      | error        | error   |
//! | any          | error (open)        | connected    | -       |
//! | other        | error (connecting)  | unchanged    | -       |
//! | not connected| error (closed)      | unchanged    | -       |
//! | any          | control `connected` | connected    | success |
//! | any          | control `disconnected` | disconnected | warning |

use crate::debug_log::{DebugLog, Severity};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;
use tracing::debug;

/// Coarse connection status shown to consumers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Error => "Connection Error",
        })
    }
}

/// Connection phase reported by the transport alongside an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closed,
}

/// Control messages carried as plain `data:` payloads on the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlMessage {
    Connected,
    Disconnected,
}

impl ControlMessage {
    /// Parses a default-event body. Returns `None` for anything else.
    pub fn parse(data: &str) -> Option<Self> {
        match data.trim() {
            "connected" => Some(ControlMessage::Connected),
            "disconnected" => Some(ControlMessage::Disconnected),
            _ => None,
        }
    }
}

/// Input to the health state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleSignal {
    Open,
    Error(ReadyState),
    Control(ControlMessage),
}

/// A state change produced by [`HealthMonitor::observe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionStatus,
    pub to: ConnectionStatus,
}

/// Computes the next status and the entry to log, if any.
fn step(
    status: ConnectionStatus,
    signal: LifecycleSignal,
) -> (ConnectionStatus, Option<(Severity, &'static str)>) {
    use ConnectionStatus::*;

    match signal {
        LifecycleSignal::Open => (
            Connected,
            Some((Severity::Success, "Event stream connection opened")),
        ),
        LifecycleSignal::Error(ReadyState::Closed) if status == Connected => (
            Error,
            Some((Severity::Error, "Event stream connection closed unexpectedly")),
        ),
        LifecycleSignal::Error(ReadyState::Open) => (Connected, None),
        LifecycleSignal::Error(_) => (status, None),
        LifecycleSignal::Control(ControlMessage::Connected) => (
            Connected,
            Some((Severity::Success, "Event stream connection confirmed")),
        ),
        LifecycleSignal::Control(ControlMessage::Disconnected) => (
            Disconnected,
            Some((Severity::Warning, "Event stream disconnected")),
        ),
    }
}

/// Tracks connection status and reports transitions to the debug log.
pub struct HealthMonitor {
    status_tx: watch::Sender<ConnectionStatus>,
    log: DebugLog,
}

impl HealthMonitor {
    pub fn new(log: DebugLog) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self { status_tx, log }
    }

    /// Feeds a lifecycle signal. Returns the transition if the status changed.
    pub fn observe(&mut self, signal: LifecycleSignal) -> Option<Transition> {
        let from = self.status();
        let (to, entry) = step(from, signal);
        if let Some((severity, message)) = entry {
            self.log.push(severity, message);
        }

        if from == to {
            return None;
        }
        debug!("connection status {} -> {} on {signal:?}", from.as_str(), to.as_str());
        self.status_tx.send_replace(to);
        Some(Transition { from, to })
    }

    /// Forces `disconnected` without logging, for shutdown.
    pub fn mark_disconnected(&mut self) {
        self.status_tx.send_replace(ConnectionStatus::Disconnected);
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    /// True iff connected and the debug log holds no error entries.
    pub fn is_healthy(&self) -> bool {
        is_healthy(self.status(), &self.log)
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }
}

pub(crate) fn is_healthy(status: ConnectionStatus, log: &DebugLog) -> bool {
    status == ConnectionStatus::Connected && !log.has_errors()
}
