//! Transport error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by a [`Connector`](crate::Connector) or its frame
/// sink/stream. The manager handles these internally; they reach
/// application code only as [`ConnectionEvent::Error`](crate::ConnectionEvent).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport could not be opened.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Opening the transport took longer than the configured timeout.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// The peer closed the connection.
    #[error("connection closed with code {code}: {reason}")]
    Closed {
        /// WebSocket close code.
        code: u16,
        /// Close reason sent by the peer.
        reason: String,
    },
}
