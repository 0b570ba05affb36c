//! HTTP handler for the Integration Health Agent
//!
//! Edge function entry point for Cloud Run deployment.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use synapse_core::{
    ComponentRegistration, ComponentSnapshot, CoreError, DebtScore, EvaluationOutcome,
    GateStatus, GateVerdict, MitigationConfig, PolicyGateResult, SystemHealth, TelemetrySample,
};

use crate::contracts::*;
use crate::engine::IntegrationHealthEngine;
use crate::telemetry::{MitigationMetricsRegistry, SignalEmitter, TelemetryConfig};

/// Application state
pub struct AppState {
    pub engine: IntegrationHealthEngine,
    pub metrics: MitigationMetricsRegistry,
    pub emitter: Arc<SignalEmitter>,
}

impl AppState {
    /// Build the state and start forwarding engine events as signals.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: MitigationConfig, telemetry: TelemetryConfig) -> anyhow::Result<Self> {
        let engine = IntegrationHealthEngine::new(config)?;
        let metrics = MitigationMetricsRegistry::new()?;
        let emitter = Arc::new(SignalEmitter::new(telemetry));
        emitter.attach(engine.mitigation().events());

        Ok(Self {
            engine,
            metrics,
            emitter,
        })
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/v1/components", post(register_component))
        .route(
            "/api/v1/components/:id",
            get(get_component).delete(remove_component),
        )
        .route("/api/v1/components/:id/debt", put(update_debt))
        .route("/api/v1/components/:id/health", put(update_health))
        .route("/api/v1/telemetry", post(ingest_telemetry))
        .route("/api/v1/system/health", get(system_health))
        .route("/api/v1/metrics", post(report_metrics))
        .route("/api/v1/gates", get(list_gates))
        .route("/api/v1/gates/commit", post(check_commit))
        .route("/api/v1/gates/deployment", post(check_deployment))
        .route("/api/v1/gates/:id", get(get_gate))
        .route("/api/v1/gates/:id/evaluate", post(evaluate_gate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type HandlerResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiError>)>;

fn ok<T>(data: T) -> HandlerResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        data,
        request_id: Uuid::new_v4(),
    }))
}

/// Map an engine error onto a status code and JSON body
fn error_response(err: CoreError) -> (StatusCode, Json<ApiError>) {
    let (status, kind) = match &err {
        CoreError::UnknownComponent(_) => (StatusCode::NOT_FOUND, "UnknownComponent"),
        CoreError::UnknownGate(_) => (StatusCode::NOT_FOUND, "UnknownGate"),
        CoreError::Config(_) => (StatusCode::BAD_REQUEST, "InvalidInput"),
        CoreError::Parse(_) => (StatusCode::BAD_REQUEST, "ParseError"),
        CoreError::LockPoisoned(_) | CoreError::Io(_) => {
            tracing::error!(error = %err, "Internal engine failure");
            (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
        }
    };
    (
        status,
        Json(ApiError {
            error: kind.to_string(),
            message: err.to_string(),
            request_id: Some(Uuid::new_v4()),
        }),
    )
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        agent_id: MitigationSignal::AGENT_ID.to_string(),
        agent_version: MitigationSignal::AGENT_VERSION.to_string(),
        components: state
            .engine
            .mitigation()
            .component_ids()
            .map(|ids| ids.len())
            .unwrap_or(0),
    })
}

/// Prometheus scrape endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                e.to_string(),
            )
        }
    }
}

async fn register_component(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ComponentRegistration>,
) -> HandlerResult<ComponentSnapshot> {
    let snapshot = state
        .engine
        .mitigation()
        .register(request)
        .map_err(error_response)?;
    state
        .metrics
        .mitigation()
        .set_debt_score(&snapshot.component_id, snapshot.debt_score.value);
    ok(snapshot)
}

async fn get_component(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> HandlerResult<ComponentSnapshot> {
    ok(state.engine.mitigation().snapshot(&id).map_err(error_response)?)
}

async fn remove_component(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> HandlerResult<ComponentRemoved> {
    state.engine.mitigation().remove(&id).map_err(error_response)?;
    state.metrics.mitigation().forget_component(&id);
    ok(ComponentRemoved { component_id: id })
}

async fn update_debt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateDebtRequest>,
) -> HandlerResult<DebtScore> {
    let score = state
        .engine
        .mitigation()
        .update_debt_inputs(
            &id,
            request.days_since_integration,
            request.lines_changed,
            request.dependency_count,
        )
        .map_err(error_response)?;
    state.metrics.mitigation().set_debt_score(&id, score.value);
    ok(score)
}

async fn update_health(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateHealthRequest>,
) -> HandlerResult<ComponentSnapshot> {
    let engine = state.engine.mitigation();
    engine
        .update_health(&id, request.health_score)
        .map_err(error_response)?;
    ok(engine.snapshot(&id).map_err(error_response)?)
}

/// Run one evaluation cycle for the sample's component
async fn ingest_telemetry(
    State(state): State<Arc<AppState>>,
    Json(sample): Json<TelemetrySample>,
) -> HandlerResult<EvaluationOutcome> {
    let metrics = state.metrics.mitigation();
    let outcome = {
        let _timer = metrics.start_timer();
        state
            .engine
            .mitigation()
            .process_telemetry(&sample)
            .map_err(error_response)?
    };
    metrics.record_outcome(&outcome);
    ok(outcome)
}

async fn system_health(State(state): State<Arc<AppState>>) -> HandlerResult<SystemHealth> {
    ok(state
        .engine
        .mitigation()
        .publish_system_health()
        .map_err(error_response)?)
}

async fn report_metrics(
    State(state): State<Arc<AppState>>,
    Json(report): Json<MetricReport>,
) -> HandlerResult<MetricReportAck> {
    ok(state.engine.report_metrics(&report).map_err(error_response)?)
}

async fn list_gates(State(state): State<Arc<AppState>>) -> HandlerResult<Vec<GateStatus>> {
    ok(state.engine.gates().statuses().map_err(error_response)?)
}

async fn get_gate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> HandlerResult<GateStatus> {
    ok(state.engine.gates().status(&id).map_err(error_response)?)
}

async fn evaluate_gate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<EvaluateGateRequest>,
) -> HandlerResult<PolicyGateResult> {
    if !request.actual_value.is_finite() {
        return Err(error_response(CoreError::config(
            "actual_value must be a finite number",
        )));
    }
    let result = state
        .engine
        .gates()
        .evaluate(&id, request.actual_value)
        .map_err(error_response)?;
    state.metrics.mitigation().record_gate_result(&result);
    ok(result)
}

async fn check_commit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommitCheckRequest>,
) -> HandlerResult<CommitCheckResponse> {
    let response = state.engine.check_commit(&request).map_err(error_response)?;
    state
        .metrics
        .mitigation()
        .record_gate_results(&response.verdict.results);
    Ok(Json(ApiResponse {
        success: response.allowed,
        data: response,
        request_id: Uuid::new_v4(),
    }))
}

async fn check_deployment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeploymentCheckRequest>,
) -> HandlerResult<GateVerdict> {
    let verdict = state
        .engine
        .check_deployment(&request.project_id)
        .map_err(error_response)?;
    state.metrics.mitigation().record_gate_results(&verdict.results);
    Ok(Json(ApiResponse {
        success: verdict.allowed,
        data: verdict,
        request_id: Uuid::new_v4(),
    }))
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub agent_id: String,
    pub agent_version: String,
    pub components: usize,
}

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub request_id: Uuid,
}

/// API error
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    pub request_id: Option<Uuid>,
}
