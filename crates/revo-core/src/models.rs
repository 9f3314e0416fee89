//! Dashboard payload models.
//!
//! Field names are camelCase on the wire. These shapes are shared by the
//! REST responses and the real-time push payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

/// Lifecycle status of an agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Registered but not working.
    #[default]
    Idle,
    /// Executing a task.
    Running,
    /// Suspended by an operator.
    Paused,
    /// Last task failed.
    Error,
    /// Not reachable by the platform.
    Offline,
}

impl AgentStatus {
    /// Short label for terminal output.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Error => "error",
            Self::Offline => "offline",
        }
    }
}

/// An agent as listed by the platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Agent identifier.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Current status.
    #[serde(default)]
    pub status: AgentStatus,
    /// Advertised capabilities.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Last time the agent reported activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
    /// Number of completed tasks.
    #[serde(default)]
    pub tasks_completed: u64,
}

/// Payload of an `agent_status_update` push.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusUpdate {
    /// Agent whose status changed.
    pub agent_id: AgentId,
    /// New status.
    pub status: AgentStatus,
    /// Optional human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Payload of `GET /metrics` and `metrics_update` pushes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemMetrics {
    /// CPU utilisation, 0-100.
    pub cpu_percent: f64,
    /// Memory utilisation, 0-100.
    pub memory_percent: f64,
    /// Agents currently running.
    pub active_agents: u32,
    /// Request throughput.
    pub requests_per_minute: f64,
}

/// Payload of `GET /health`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// `"ok"`/`"healthy"` when the backend is up.
    pub status: String,
    /// Backend version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl HealthStatus {
    /// Whether the reported status means the backend is serving.
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.to_ascii_lowercase().as_str(), "ok" | "healthy" | "up")
    }
}
