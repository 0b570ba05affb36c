//! Integration tests for Integration Health Agent

use axum::body::Body;
use axum::http::{Request, StatusCode};
use integration_health::client::{ClientError, IntegrationHealthClient};
use integration_health::contracts::*;
use integration_health::handler::{create_router, AppState};
use integration_health::telemetry::TelemetryConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use synapse_core::{MitigationConfig, SystemStatus, TelemetrySample};
use tokio_test::assert_ok;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn quiet_telemetry() -> TelemetryConfig {
    TelemetryConfig::builder().emit_signals(false).build()
}

fn test_router() -> axum::Router {
    let state = AppState::new(MitigationConfig::default(), quiet_telemetry()).unwrap();
    create_router(Arc::new(state))
}

async fn call(router: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn failing_sample(component_id: &str) -> Value {
    json!({
        "component_id": component_id,
        "cpu_usage": 50.0,
        "memory_usage": 50.0,
        "error_rate": 0.3
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let router = test_router();
    let (status, body) = call(&router, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["agent_id"], MitigationSignal::AGENT_ID);
    assert_eq!(body["components"], 0);
}

#[tokio::test]
async fn test_register_and_fetch_component() {
    let router = test_router();
    let (status, body) = call(
        &router,
        "POST",
        "/api/v1/components",
        Some(json!({ "component_id": "imu", "project_id": "rover", "kind": "hardware" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "active");
    assert_eq!(body["data"]["throttle_level"], 1.0);

    let (status, body) = call(&router, "GET", "/api/v1/components/imu", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["project_id"], "rover");

    let (status, body) = call(&router, "GET", "/api/v1/components/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "UnknownComponent");
}

#[tokio::test]
async fn test_empty_component_id_is_rejected() {
    let router = test_router();
    let (status, body) = call(
        &router,
        "POST",
        "/api/v1/components",
        Some(json!({ "component_id": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidInput");
}

#[tokio::test]
async fn test_debt_update_reports_severity() {
    let router = test_router();
    call(&router, "POST", "/api/v1/components", Some(json!({ "component_id": "fpga" }))).await;

    let (status, body) = call(
        &router,
        "PUT",
        "/api/v1/components/fpga/debt",
        Some(json!({ "days_since_integration": 8, "lines_changed": 1000, "dependency_count": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["value"], 8.0);
    assert_eq!(body["data"]["severity"], "critical");
}

#[tokio::test]
async fn test_failing_telemetry_quarantines_component() {
    let router = test_router();
    call(&router, "POST", "/api/v1/components", Some(json!({ "component_id": "radio" }))).await;

    let (status, body) = call(&router, "POST", "/api/v1/telemetry", Some(failing_sample("radio"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quarantined"], true);
    assert_eq!(body["data"]["throttle_level"], 0.0);
    assert_eq!(body["data"]["decision"]["action"], "quarantine");

    let (_, health) = call(&router, "GET", "/api/v1/system/health", None).await;
    assert_eq!(health["data"]["status"], "critical");
    assert_eq!(health["data"]["quarantined_components"], 1);

    let (status, _) = call(&router, "POST", "/api/v1/telemetry", Some(failing_sample("ghost"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint_after_ingest() {
    let router = test_router();
    call(&router, "POST", "/api/v1/components", Some(json!({ "component_id": "mcu" }))).await;
    call(
        &router,
        "POST",
        "/api/v1/telemetry",
        Some(json!({ "component_id": "mcu", "cpu_usage": 40.0, "memory_usage": 30.0 })),
    )
    .await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("synapse_telemetry_samples_total{component=\"mcu\"} 1"));
}

#[tokio::test]
async fn test_commit_check_refused_under_hard_lock() {
    let router = test_router();
    call(
        &router,
        "POST",
        "/api/v1/components",
        Some(json!({
            "component_id": "fpga",
            "project_id": "rover",
            "days_since_integration": 8,
            "lines_changed": 1000,
            "dependency_count": 10
        })),
    )
    .await;

    let request = CommitCheckRequest::new("rover", "abc123")
        .with_message("feat: add mode")
        .touching("fpga");
    let (status, body) = call(
        &router,
        "POST",
        "/api/v1/gates/commit",
        Some(serde_json::to_value(&request).unwrap()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["allowed"], false);
    assert_eq!(body["data"]["lock"]["lock_level"], "hard");
    assert!(body["data"]["verdict"]["blocking_failures"]
        .as_array()
        .unwrap()
        .contains(&json!("integration_debt")));
}

#[tokio::test]
async fn test_deployment_uses_reported_metrics() {
    let router = test_router();
    call(
        &router,
        "POST",
        "/api/v1/components",
        Some(json!({ "component_id": "gps", "project_id": "rover" })),
    )
    .await;

    let (_, ack) = call(
        &router,
        "POST",
        "/api/v1/metrics",
        Some(json!({ "project_id": "rover", "metrics": { "critical_high_vulns": 2.0 } })),
    )
    .await;
    assert_eq!(ack["data"]["accepted"], 1);

    let request = json!({ "project_id": "rover" });
    let (_, body) = call(&router, "POST", "/api/v1/gates/deployment", Some(request.clone())).await;
    assert_eq!(body["data"]["allowed"], false);
    assert_eq!(body["data"]["blocking_failures"], json!(["security_vulnerabilities"]));

    call(
        &router,
        "POST",
        "/api/v1/metrics",
        Some(json!({ "project_id": "rover", "metrics": { "critical_high_vulns": 0.0 } })),
    )
    .await;
    let (_, body) = call(&router, "POST", "/api/v1/gates/deployment", Some(request)).await;
    assert_eq!(body["data"]["allowed"], true);
}

#[tokio::test]
async fn test_gate_lookup_and_evaluation() {
    let router = test_router();

    let (status, body) = call(&router, "GET", "/api/v1/gates", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["data"].as_array().unwrap().is_empty());

    let (status, body) = call(
        &router,
        "POST",
        "/api/v1/gates/integration_debt/evaluate",
        Some(json!({ "actual_value": 3.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["passed"], true);

    let (_, body) = call(&router, "GET", "/api/v1/gates/integration_debt", None).await;
    assert_eq!(body["data"]["last_passed"], true);

    let (status, body) = call(
        &router,
        "POST",
        "/api/v1/gates/missing/evaluate",
        Some(json!({ "actual_value": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "UnknownGate");
}

#[tokio::test]
async fn test_signals_forwarded_to_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/signals"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let telemetry = TelemetryConfig::builder()
        .webhook(format!("{}/signals", server.uri()))
        .build();
    let state = AppState::new(MitigationConfig::default(), telemetry).unwrap();
    let router = create_router(Arc::new(state));
    call(&router, "POST", "/api/v1/components", Some(json!({ "component_id": "lidar" }))).await;

    let mut received = Vec::new();
    for _ in 0..50 {
        received = server.received_requests().await.unwrap_or_default();
        if !received.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(!received.is_empty());
    let signal: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(signal["signal_type"], MitigationSignal::SIGNAL_TYPE);
    assert_eq!(signal["channel"], "idi:update");
}

#[tokio::test]
async fn test_client_against_running_agent() {
    let state = AppState::new(MitigationConfig::default(), quiet_telemetry()).unwrap();
    let state = Arc::new(state);
    state
        .engine
        .mitigation()
        .register(synapse_core::ComponentRegistration::new("cam", "rover"))
        .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });

    let client = IntegrationHealthClient::new(format!("http://{}/", addr))
        .with_timeout(Duration::from_secs(5));

    let sample = TelemetrySample {
        cpu_usage: 40.0,
        memory_usage: 30.0,
        ..TelemetrySample::new("cam")
    };
    let response = client.ingest(&sample).await.unwrap();
    assert!(response.success);
    assert!(!response.data.quarantined);

    assert!(assert_ok!(client.can_proceed_with_deployment("rover").await));

    let health = assert_ok!(client.system_health().await);
    assert_eq!(health.total_components, 1);
    assert_eq!(health.status, SystemStatus::Healthy);

    let err = client
        .ingest(&TelemetrySample::new("ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Server { status: 404, .. }));

    server.abort();
}

#[tokio::test]
async fn test_client_surfaces_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/gates/commit"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "InternalError",
            "message": "lock poisoned",
            "request_id": null
        })))
        .mount(&server)
        .await;

    let client = IntegrationHealthClient::new(server.uri());
    let err = client
        .can_proceed_with_commit(&CommitCheckRequest::new("rover", "abc"))
        .await
        .unwrap_err();

    match err {
        ClientError::Server { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "lock poisoned");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_client_network_failure() {
    let client = IntegrationHealthClient::new("http://127.0.0.1:9")
        .with_timeout(Duration::from_millis(200));
    let err = client.system_health().await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
}
