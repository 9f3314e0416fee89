//! `ApiClient` against a wiremock server.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use revo_core::{Agent, AgentId, AgentStatus};
use revo_http::{
    ApiClient, ApiConfig, ApiError, DashboardApi, MemoryTokenStore, Method, RequestOptions,
    TokenStore,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn config(server: &MockServer) -> ApiConfig {
    ApiConfig::new(format!("{}/api", server.uri()))
        .with_retry_attempts(3)
        .with_retry_delay(Duration::from_millis(10))
        .with_timeout(Duration::from_secs(5))
}

fn agent_json(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "name": format!("agent {id}"),
        "status": status,
        "capabilities": ["search"],
        "tasksCompleted": 7
    })
}

/// Base URL on a port nothing listens on.
fn dead_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/api")
}

// ── Success path ──

#[tokio::test]
async fn get_decodes_json_and_sends_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/agents"))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/json"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([agent_json("a1", "running"), agent_json("a2", "idle")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(config(&server).with_token("tok-1"));
    let agents: Vec<Agent> = client.get("/agents").await.unwrap();

    assert_eq!(agents.len(), 2);
    assert_eq!(agents[0].id, AgentId::from("a1"));
    assert_eq!(agents[0].status, AgentStatus::Running);
    assert_eq!(agents[1].tasks_completed, 7);
    assert!(client.is_reachable());
}

#[tokio::test]
async fn no_authorization_header_without_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .and(|req: &Request| !req.headers.contains_key("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(config(&server));
    let health: Value = client.get("health").await.unwrap();
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn token_store_is_read_per_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .and(header("authorization", "Bearer second"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new(Some("first".into())));
    let client = ApiClient::new(config(&server)).with_token_store(store.clone());
    store.set_token("second").unwrap();

    let _: Value = client.get("/me").await.unwrap();
}

#[tokio::test]
async fn post_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tasks"))
        .and(body_json(json!({"prompt": "summarize", "priority": 2})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "t1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(config(&server));
    let created: Value = client
        .post("/tasks", &json!({"prompt": "summarize", "priority": 2}))
        .await
        .unwrap();
    assert_eq!(created["id"], "t1");
}

#[tokio::test]
async fn request_with_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/agents"))
        .and(query_param("status", "running"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(config(&server));
    let agents: Vec<Agent> = client
        .request(
            Method::GET,
            "/agents",
            RequestOptions::default().with_query("status", "running"),
        )
        .await
        .unwrap();
    assert!(agents.is_empty());
}

#[tokio::test]
async fn no_content_decodes_as_null() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/agents/a1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = ApiClient::new(config(&server));
    client.delete::<()>("/agents/a1").await.unwrap();
    let nothing: Option<Agent> = client.delete("/agents/a1").await.unwrap();
    assert!(nothing.is_none());
}

#[tokio::test]
async fn invalid_user_agent_falls_back_to_default_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .and(header("authorization", "Bearer tok-ua"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server).with_token("tok-ua");
    config.user_agent = "revo\nbroken".into();
    let client = ApiClient::new(config);

    let health: Value = client.get("/health").await.unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(client.config().user_agent, "revo\nbroken");
}

// ── Error taxonomy ──

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/agents/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "agent not found"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(config(&server));
    let err = client.get::<Agent>("/agents/missing").await.unwrap_err();

    assert_matches!(
        err,
        ApiError::Client { status: 404, ref message, body: Some(_) } if message == "agent not found"
    );
    assert!(client.is_reachable());
}

#[tokio::test]
async fn server_error_is_retried_then_raised() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/metrics"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .expect(3)
        .mount(&server)
        .await;

    let client = ApiClient::new(config(&server));
    let err = client.get::<Value>("/metrics").await.unwrap_err();

    assert_matches!(
        err,
        ApiError::Server { status: 500, ref message, body: None } if message == "database unavailable"
    );
    assert_eq!(err.status(), Some(500));
    assert!(client.is_reachable());
}

#[tokio::test]
async fn transient_server_error_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(config(&server));
    let health: Value = client.get("/health").await.unwrap();
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn single_attempt_config_does_not_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(config(&server).with_retry_attempts(0));
    let err = client.get::<Value>("/x").await.unwrap_err();
    assert_matches!(err, ApiError::Server { status: 502, ref message, .. } if message == "Bad Gateway");
}

#[tokio::test]
async fn malformed_success_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(config(&server));
    assert_matches!(client.get::<Vec<Agent>>("/agents").await, Err(ApiError::Decode(_)));
}

#[tokio::test]
async fn timeout_is_retried_and_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = ApiClient::new(
        config(&server)
            .with_retry_attempts(2)
            .with_timeout(Duration::from_millis(50)),
    );
    let err = client.get::<Value>("/slow").await.unwrap_err();
    assert_matches!(err, ApiError::Timeout(d) if d == Duration::from_millis(50));
    assert!(!client.is_reachable());
}

// ── Reachability ──

#[tokio::test]
async fn network_failure_flips_reachability() {
    let client = ApiClient::new(
        ApiConfig::new(dead_base_url())
            .with_retry_attempts(2)
            .with_retry_delay(Duration::from_millis(5)),
    );
    let mut reachability = client.reachability();
    assert!(client.is_reachable());

    let err = client.get::<Value>("/health").await.unwrap_err();
    assert_matches!(err, ApiError::Network(_));
    assert!(err.is_offline());
    assert!(!client.is_reachable());
    assert!(reachability.has_changed().unwrap());
    assert!(!*reachability.borrow_and_update());
}

#[tokio::test]
async fn reachability_recovers_on_next_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let offline = ApiClient::new(ApiConfig::new(dead_base_url()).with_retry_attempts(1));
    let _ = offline.get::<Value>("/health").await.unwrap_err();
    assert!(!offline.is_reachable());

    let client = ApiClient::new(config(&server));
    let _: Value = client.get("/health").await.unwrap();
    assert!(client.is_reachable());
}

// ── Dashboard wrappers ──

#[tokio::test]
async fn dashboard_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "healthy", "version": "1.4.0"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/agents/a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(agent_json("a1", "paused")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/agents/a1/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(agent_json("a1", "running")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/agents/a1/stop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(agent_json("a1", "idle")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cpuPercent": 41.5,
            "memoryPercent": 63.0,
            "activeAgents": 3,
            "requestsPerMinute": 120.0
        })))
        .mount(&server)
        .await;

    let api = DashboardApi::new(ApiClient::new(config(&server)));
    let id = AgentId::from("a1");

    let health = api.health().await.unwrap();
    assert!(health.is_healthy());
    assert_eq!(health.version.as_deref(), Some("1.4.0"));

    assert_eq!(api.agent(&id).await.unwrap().status, AgentStatus::Paused);
    assert_eq!(api.start_agent(&id).await.unwrap().status, AgentStatus::Running);
    assert_eq!(api.stop_agent(&id).await.unwrap().status, AgentStatus::Idle);

    let metrics = api.metrics().await.unwrap();
    assert_eq!(metrics.active_agents, 3);
    assert!((metrics.cpu_percent - 41.5).abs() < f64::EPSILON);
}
