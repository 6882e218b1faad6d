//! # Ticket-Keeper HTTP Service
//!
//! HTTP endpoints through which conversational agents and the follow-up
//! scheduler drive the lifecycle tracker.
//!
//! This service provides:
//! - `/submit` to raise a ticket
//! - `/advance-status` for scheduled and manual transitions
//! - `/status` lookups with SLA breach evaluation
//! - `/admin/follow-ups` to re-submit pending follow-up transitions
//! - health, readiness and Prometheus metrics endpoints
//!
//! Agent-facing endpoints always answer `200 OK` with a JSON body describing
//! the outcome, and parse bodies leniently. `OPTIONS` requests on any route
//! are answered by the permissive CORS layer with an empty JSON object.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod requests;
pub mod responses;

pub use config::{
    ConfigLoader, EventsBackend, SchedulerBackend, ServiceConfig, StorageBackend,
    CONFIG_FILE_ENV, ENV_PREFIX, PLATFORM_VARIABLES,
};
pub use errors::{ConfigError, ServiceError};
pub use metrics::ServiceMetrics;
pub use responses::{
    AdvanceResponse, FollowUpResponse, HealthResponse, ReadinessResponse, SlaBody,
    StatusResponse, SubmitResponse, TicketStatusBody,
};

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use std::{collections::HashMap, sync::Arc, time::Duration};
use ticket_keeper_core::{LifecycleTracker, TicketId, Timestamp};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Lifecycle tracker with its collaborators wired in
    pub tracker: Arc<LifecycleTracker>,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        tracker: Arc<LifecycleTracker>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            config,
            tracker,
            metrics,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let agent_routes = Router::new()
        .route("/submit", post(handle_submit))
        .route("/advance-status", post(handle_advance_status))
        .route("/status", get(handle_status_query).post(handle_status_body));

    let admin_routes = Router::new().route("/admin/follow-ups", post(handle_follow_ups));

    let health_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/ready", get(handle_readiness_check));

    let observability_routes = Router::new().route("/metrics", get(metrics_endpoint));

    Router::new()
        .merge(agent_routes)
        .merge(admin_routes)
        .merge(health_routes)
        .merge(observability_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(middleware::from_fn(preflight_body_middleware))
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
///
/// Runs until SIGINT or SIGTERM, then lets in-flight requests finish.
pub async fn start_server(
    config: ServiceConfig,
    tracker: Arc<LifecycleTracker>,
) -> Result<(), ServiceError> {
    let metrics = ServiceMetrics::new().map_err(|e| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: format!("Failed to initialize metrics: {}", e),
        })
    })?;

    let addr = config.bind_address()?;
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);

    let state = AppState::new(config, tracker, metrics);
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: addr.to_string(),
                message: e.to_string(),
            })?;

    info!("Starting HTTP server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_timeout))
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
///
/// A handler that cannot be installed never resolves, leaving the other
/// signal in charge.
async fn shutdown_signal(shutdown_timeout: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
        },
    }
}

// ============================================================================
// Agent Handlers
// ============================================================================

/// Raise a ticket
#[instrument(skip(state, body))]
async fn handle_submit(State(state): State<AppState>, body: Bytes) -> Json<SubmitResponse> {
    let fields = requests::parse_fields(&body);
    let submission = requests::new_ticket(&fields);

    let result = state.tracker.create_ticket(submission).await;
    state.metrics.record_submission(&result);

    match &result {
        Ok(created) => info!(
            ticket_id = %created.ticket.id,
            lifecycle = %created.ticket.lifecycle,
            priority = %created.ticket.priority,
            "Ticket submitted"
        ),
        Err(e) => warn!(error = %e, "Ticket submission failed"),
    }

    Json(SubmitResponse::from_result(&result))
}

/// Apply a scheduled or manual transition
#[instrument(skip(state, body))]
async fn handle_advance_status(
    State(state): State<AppState>,
    body: Bytes,
) -> Json<AdvanceResponse> {
    let request = requests::advance_request(&requests::parse_fields(&body));

    let (raw_id, status) = match (request.id, request.status) {
        (Some(id), Some(status)) => (id, status),
        (None, _) => return Json(AdvanceResponse::failed("Field 'id' is required")),
        (_, None) => return Json(AdvanceResponse::failed("Field 'status' is required")),
    };

    let id = match TicketId::new(raw_id) {
        Ok(id) => id,
        Err(e) => return Json(AdvanceResponse::failed(e.to_string())),
    };

    let result = state
        .tracker
        .advance_status(&id, &status, request.source)
        .await;
    state
        .metrics
        .record_transition(request.source.as_str(), &result);

    if let Err(e) = &result {
        warn!(ticket_id = %id, requested = %status, error = %e, "Status advance failed");
    }

    Json(AdvanceResponse::from_result(&result))
}

/// `GET /status?id=`
async fn handle_status_query(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<StatusResponse> {
    let fields = params
        .into_iter()
        .map(|(key, value)| (key, serde_json::Value::String(value)))
        .collect();
    lookup_status(&state, &fields).await
}

/// `POST /status {id}`
async fn handle_status_body(State(state): State<AppState>, body: Bytes) -> Json<StatusResponse> {
    lookup_status(&state, &requests::parse_fields(&body)).await
}

#[instrument(skip_all)]
async fn lookup_status(state: &AppState, fields: &requests::Fields) -> Json<StatusResponse> {
    let id = match requests::ticket_id(fields).map(TicketId::new) {
        Some(Ok(id)) => id,
        _ => return Json(StatusResponse::failed()),
    };

    let result = state.tracker.get_ticket(&id).await;
    if let Err(e) = &result {
        warn!(ticket_id = %id, error = %e, "Status lookup failed");
    }

    Json(StatusResponse::from_result(&result))
}

// ============================================================================
// Admin Handlers
// ============================================================================

/// Re-submit follow-up transitions still ahead of a ticket
#[instrument(skip(state, body))]
async fn handle_follow_ups(State(state): State<AppState>, body: Bytes) -> Json<FollowUpResponse> {
    let id = match requests::ticket_id(&requests::parse_fields(&body)).map(TicketId::new) {
        Some(Ok(id)) => id,
        Some(Err(e)) => return Json(FollowUpResponse::failed(e.to_string())),
        None => return Json(FollowUpResponse::failed("Field 'id' is required")),
    };

    let result = state.tracker.reschedule_follow_ups(&id).await;
    match &result {
        Ok(report) => {
            for _ in &report.failed {
                state.metrics.record_side_effect_failure("scheduler");
            }
            info!(
                ticket_id = %id,
                scheduled = report.scheduled.len(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                "Follow-ups re-submitted"
            );
        }
        Err(e) => warn!(ticket_id = %id, error = %e, "Follow-up re-submission failed"),
    }

    Json(FollowUpResponse::from_result(&result))
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Liveness check
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Timestamp::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check; 503 while the store is unhealthy
#[instrument(skip(state))]
async fn handle_readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    match state.tracker.store().health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                ready: true,
                timestamp: Timestamp::now(),
                store_error: None,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Ticket store is not ready");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    ready: false,
                    timestamp: Timestamp::now(),
                    store_error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.encode().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Gives CORS preflight answers a `{}` JSON body
async fn preflight_body_middleware(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let is_options = *request.method() == Method::OPTIONS;
    let response = next.run(request).await;

    if !is_options || response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from("{}"))
}

/// Request logging middleware
///
/// Reads or generates an `x-correlation-id`, records it on the request span
/// and echoes it in the response headers.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    info!(
        correlation_id = %correlation_id,
        method = %method,
        uri = %uri,
        "Request started"
    );

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();

    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

/// Metrics collection middleware
async fn metrics_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let start = std::time::Instant::now();
    let method = request.method().to_string();
    let path = normalize_path_for_metrics(request.uri().path());

    let response = next.run(request).await;

    state.metrics.record_http_request(
        &method,
        path,
        response.status().as_u16(),
        start.elapsed(),
    );

    response
}

/// Known route or `other`, keeping label cardinality bounded
fn normalize_path_for_metrics(path: &str) -> &'static str {
    match path {
        "/submit" => "/submit",
        "/advance-status" => "/advance-status",
        "/status" => "/status",
        "/admin/follow-ups" => "/admin/follow-ups",
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        _ => "other",
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
