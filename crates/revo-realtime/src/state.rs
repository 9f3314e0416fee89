//! Connection lifecycle states and events.

use std::fmt;

/// Lifecycle of a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Idle. Initial state, and the state after `disconnect()` or a clean
    /// server close.
    #[default]
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Transport open; heartbeat running, sends go straight out.
    Connected,
    /// Waiting out a backoff delay before the next attempt.
    Reconnecting,
    /// Retry budget exhausted. Only an explicit `connect()` leaves this state.
    Failed,
}

impl ConnectionState {
    /// Stable lowercase name, used in logs and status strings.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }

    /// Whether a driver task is working on this connection.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notifications delivered to `on_event` listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The state machine moved.
    StateChanged {
        /// Previous state.
        from: ConnectionState,
        /// New state.
        to: ConnectionState,
    },
    /// A transport error occurred. Informational; the manager handles
    /// recovery itself.
    Error {
        /// Human-readable description.
        message: String,
    },
    /// The retry budget ran out and the manager entered `Failed`.
    MaxAttemptsReached {
        /// Reconnect attempts made.
        attempts: u32,
    },
}
