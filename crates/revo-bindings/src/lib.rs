//! # revo-bindings
//!
//! Observable state for a dashboard, fed by the REST client and the
//! real-time connection. Every container publishes through a
//! `tokio::sync::watch` channel and stops its feed when dropped.
//!
//! - [`Poller`]: periodic fetch, keeps the last good value on failure
//! - [`ChannelBinding`]: folds a real-time topic into state with a reducer
//! - [`ConnectionStatus`]: connection state as an indicator string

#![deny(unsafe_code)]

pub mod channel;
pub mod dashboard;
pub mod poller;
pub mod status;

pub use channel::{ChannelBinding, agent_statuses, live_metrics};
pub use dashboard::{agents_poller, health_poller, metrics_poller};
pub use poller::{Loadable, Poller};
pub use status::{ConnectionStatus, StatusSnapshot};
