//! # revo-realtime
//!
//! One resilient real-time connection per endpoint:
//!
//! - **Lifecycle**: `Disconnected → Connecting → Connected`, with
//!   `Reconnecting` on unexpected closes and `Failed` once the retry budget
//!   is spent
//! - **Backoff**: `base_delay * factor^(attempt-1)`, capped
//! - **Heartbeat**: fire-and-forget `ping` envelope while connected
//! - **Pub/sub**: channel, type, and wildcard (`"*"`) subscribers with
//!   disposer-based unsubscription
//! - **Queueing**: bounded drop-oldest FIFO for sends issued while not
//!   connected, flushed on the next `Connected` transition
//!
//! The transport sits behind the [`Connector`] trait; [`WsConnector`] uses
//! `tokio-tungstenite`, [`mock::MockConnector`] runs in memory.

#![deny(unsafe_code)]

pub mod backoff;
pub mod bus;
pub mod config;
pub mod errors;
pub mod manager;
pub mod mock;
pub mod queue;
pub mod state;
pub mod transport;

pub use backoff::Backoff;
pub use bus::{Disposer, Listeners, Topics};
pub use config::RealtimeConfig;
pub use errors::TransportError;
pub use manager::{ConnectionManager, WeakConnectionManager};
pub use queue::MessageQueue;
pub use state::{ConnectionEvent, ConnectionState};
pub use transport::{Connector, Frame, WsConnector};
