//! Typed wrappers for the dashboard endpoints.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use revo_core::{Agent, AgentId, HealthStatus, SystemMetrics};
use serde_json::json;

use crate::client::ApiClient;
use crate::errors::ApiError;

/// Dashboard API surface over an [`ApiClient`].
#[derive(Clone, Debug)]
pub struct DashboardApi {
    client: ApiClient,
}

impl DashboardApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.client.get("/health").await
    }

    /// `GET /agents`
    pub async fn agents(&self) -> Result<Vec<Agent>, ApiError> {
        self.client.get("/agents").await
    }

    /// `GET /agents/{id}`
    pub async fn agent(&self, id: &AgentId) -> Result<Agent, ApiError> {
        self.client.get(&agent_path(id, None)).await
    }

    /// `POST /agents/{id}/start`
    pub async fn start_agent(&self, id: &AgentId) -> Result<Agent, ApiError> {
        self.client.post(&agent_path(id, Some("start")), &json!({})).await
    }

    /// `POST /agents/{id}/stop`
    pub async fn stop_agent(&self, id: &AgentId) -> Result<Agent, ApiError> {
        self.client.post(&agent_path(id, Some("stop")), &json!({})).await
    }

    /// `GET /metrics`
    pub async fn metrics(&self) -> Result<SystemMetrics, ApiError> {
        self.client.get("/metrics").await
    }
}

/// Characters escaped in a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn agent_path(id: &AgentId, action: Option<&str>) -> String {
    let id = utf8_percent_encode(id.as_str(), SEGMENT);
    match action {
        Some(action) => format!("/agents/{id}/{action}"),
        None => format!("/agents/{id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_paths() {
        let id = AgentId::from("agent-1");
        assert_eq!(agent_path(&id, None), "/agents/agent-1");
        assert_eq!(agent_path(&id, Some("stop")), "/agents/agent-1/stop");
    }

    #[test]
    fn agent_path_escapes_separators() {
        let id = AgentId::from("a/b?c");
        assert_eq!(agent_path(&id, None), "/agents/a%2Fb%3Fc");
    }
}
