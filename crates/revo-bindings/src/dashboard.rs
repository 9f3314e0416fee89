//! Pollers over the dashboard REST endpoints.

use std::time::Duration;

use revo_core::{Agent, HealthStatus, SystemMetrics};
use revo_http::DashboardApi;

use crate::poller::Poller;

/// Agent list refreshed every `interval`.
pub fn agents_poller(api: &DashboardApi, interval: Duration) -> Poller<Vec<Agent>> {
    let api = api.clone();
    Poller::spawn("agents", interval, move || {
        let api = api.clone();
        async move { api.agents().await }
    })
}

/// System metrics refreshed every `interval`.
pub fn metrics_poller(api: &DashboardApi, interval: Duration) -> Poller<SystemMetrics> {
    let api = api.clone();
    Poller::spawn("metrics", interval, move || {
        let api = api.clone();
        async move { api.metrics().await }
    })
}

/// Backend health refreshed every `interval`.
pub fn health_poller(api: &DashboardApi, interval: Duration) -> Poller<HealthStatus> {
    let api = api.clone();
    Poller::spawn("health", interval, move || {
        let api = api.clone();
        async move { api.health().await }
    })
}
