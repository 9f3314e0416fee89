//! # revo-core
//!
//! Shared vocabulary for the Revo client crates:
//!
//! - **Envelope**: the JSON frame exchanged over the real-time transport
//! - **Message kinds**: well-known `type` values (`ping`, `subscribe`, ...)
//! - **Branded IDs**: `MessageId`, `AgentId` as newtypes for type safety
//! - **Models**: agent, metrics, and health payloads the dashboard consumes

#![deny(unsafe_code)]

pub mod envelope;
pub mod ids;
pub mod models;

pub use envelope::{Envelope, WILDCARD, kinds};
pub use ids::{AgentId, MessageId};
pub use models::{Agent, AgentStatus, AgentStatusUpdate, HealthStatus, SystemMetrics};
