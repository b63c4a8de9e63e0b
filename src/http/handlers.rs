use super::state::AppState;
use crate::catalog::{Session, SessionId};
use crate::error::{CaptureError, FlowError};
use crate::orchestrator::{FlowPhase, FlowStatus, Orchestrator};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListSessionsQuery {
    /// Only sessions with a completed analysis
    #[serde(default)]
    pub analyzed: bool,
}

#[derive(Debug, Serialize)]
pub struct FlowResponse {
    pub phase: FlowPhase,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzedResponse {
    pub phase: FlowPhase,
    /// The selected session with its analysis attached
    pub session: Option<Session>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub total: usize,
    pub analyzed: usize,
    pub pending: usize,
    pub abandoned: usize,
    pub average_confidence: Option<f64>,
    pub average_clarity: Option<f64>,
    pub average_pacing: Option<f64>,
    pub average_nervousness: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub session_id: String,
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealthResponse {
    pub reachable: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Whether `POST /session/retry` may succeed
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

fn flow_error_response(e: FlowError) -> Response {
    let status = match &e {
        FlowError::Capture(CaptureError::PermissionDenied) => StatusCode::FORBIDDEN,
        FlowError::Capture(CaptureError::DeviceError(_)) => StatusCode::SERVICE_UNAVAILABLE,
        FlowError::Capture(CaptureError::AlreadyRecording) => StatusCode::CONFLICT,
        FlowError::Analysis { .. } => StatusCode::BAD_GATEWAY,
        FlowError::Busy | FlowError::InvalidTransition { .. } => StatusCode::CONFLICT,
        FlowError::SessionNotFound(_) => StatusCode::NOT_FOUND,
    };

    let session_id = match &e {
        FlowError::Analysis { session_id, .. } => Some(session_id.to_string()),
        _ => None,
    };

    if status.is_server_error() {
        error!("Flow error: {}", e);
    }

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            retryable: e.is_retryable(),
            session_id,
        }),
    )
        .into_response()
}

fn not_found(session_id: &SessionId) -> Response {
    flow_error_response(FlowError::SessionNotFound(session_id.clone()))
}

/// Take the orchestrator, or answer 409 if another request holds it
fn acquire(state: &AppState) -> Result<OwnedMutexGuard<Orchestrator>, Response> {
    Arc::clone(&state.orchestrator)
        .try_lock_owned()
        .map_err(|_| flow_error_response(FlowError::Busy))
}

/// Run a flow operation on its own task; it completes even if the client
/// disconnects, and the orchestrator is released when it does.
async fn detached<F>(work: F) -> Response
where
    F: Future<Output = Response> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(response) => response,
        Err(e) => {
            error!("Flow task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn flow_response(orchestrator: &Orchestrator, message: &str) -> Response {
    (
        StatusCode::OK,
        Json(FlowResponse {
            phase: orchestrator.phase(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

async fn analyzed_response(orchestrator: &Orchestrator) -> Response {
    let session = orchestrator.selected_session().await;
    (
        StatusCode::OK,
        Json(AnalyzedResponse {
            phase: orchestrator.phase(),
            session,
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/start
/// Start capturing a new take
pub async fn start_session(State(state): State<AppState>) -> Response {
    let mut orchestrator = match acquire(&state) {
        Ok(orchestrator) => orchestrator,
        Err(busy) => return busy,
    };

    match orchestrator.start().await {
        Ok(()) => {
            info!("Capture started via API");
            flow_response(&orchestrator, "Recording started")
        }
        Err(e) => flow_error_response(e),
    }
}

/// POST /session/stop
/// Stop capturing and analyze the take (waits for the analysis)
pub async fn stop_session(State(state): State<AppState>) -> Response {
    let mut orchestrator = match acquire(&state) {
        Ok(orchestrator) => orchestrator,
        Err(busy) => return busy,
    };

    detached(async move {
        match orchestrator.stop().await {
            Ok(Some(_)) => analyzed_response(&orchestrator).await,
            Ok(None) => flow_response(&orchestrator, "Nothing was captured"),
            Err(e) => flow_error_response(e),
        }
    })
    .await
}

/// POST /session/cancel
/// Discard the take in progress
pub async fn cancel_session(State(state): State<AppState>) -> Response {
    let mut orchestrator = match acquire(&state) {
        Ok(orchestrator) => orchestrator,
        Err(busy) => return busy,
    };

    match orchestrator.cancel().await {
        Ok(()) => flow_response(&orchestrator, "Recording discarded"),
        Err(e) => flow_error_response(e),
    }
}

/// POST /session/retry
/// Re-submit the failed take
pub async fn retry_analysis(State(state): State<AppState>) -> Response {
    let mut orchestrator = match acquire(&state) {
        Ok(orchestrator) => orchestrator,
        Err(busy) => return busy,
    };

    detached(async move {
        match orchestrator.retry().await {
            Ok(_) => analyzed_response(&orchestrator).await,
            Err(e) => flow_error_response(e),
        }
    })
    .await
}

/// POST /session/dismiss
/// Give up on the failed take
pub async fn dismiss_failure(State(state): State<AppState>) -> Response {
    let mut orchestrator = match acquire(&state) {
        Ok(orchestrator) => orchestrator,
        Err(busy) => return busy,
    };

    match orchestrator.dismiss().await {
        Ok(()) => flow_response(&orchestrator, "Analysis dismissed"),
        Err(e) => flow_error_response(e),
    }
}

/// GET /session/status
/// Current flow status; never waits on an analysis in flight
pub async fn get_status(State(state): State<AppState>) -> Json<FlowStatus> {
    Json(state.status.borrow().clone())
}

/// GET /sessions
/// List sessions, newest first
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Json<Vec<Session>> {
    if query.analyzed {
        Json(state.catalog.analyzed().await)
    } else {
        Json(state.catalog.all().await)
    }
}

/// GET /sessions/summary
/// Counts and average scores
pub async fn get_summary(State(state): State<AppState>) -> Json<SummaryResponse> {
    let summary = state.catalog.summary().await;
    let avg = summary.average_scores;

    Json(SummaryResponse {
        total: summary.total,
        analyzed: summary.analyzed,
        pending: summary.pending,
        abandoned: summary.abandoned,
        average_confidence: avg.map(|s| s.confidence),
        average_clarity: avg.map(|s| s.clarity),
        average_pacing: avg.map(|s| s.pacing),
        average_nervousness: avg.map(|s| s.nervousness),
    })
}

/// GET /sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let session_id = SessionId::from(session_id);

    match state.catalog.get(&session_id).await {
        Some(session) => (StatusCode::OK, Json(session)).into_response(),
        None => not_found(&session_id),
    }
}

/// DELETE /sessions/:session_id
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let session_id = SessionId::from(session_id);
    let mut orchestrator = match acquire(&state) {
        Ok(orchestrator) => orchestrator,
        Err(busy) => return busy,
    };

    match orchestrator.delete(&session_id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(DeleteResponse {
                session_id: session_id.to_string(),
                deleted: true,
            }),
        )
            .into_response(),
        Ok(false) => not_found(&session_id),
        Err(e) => flow_error_response(e),
    }
}

/// POST /sessions/:session_id/analyze
/// Analyze a catalogued session again
pub async fn reanalyze_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let session_id = SessionId::from(session_id);
    let mut orchestrator = match acquire(&state) {
        Ok(orchestrator) => orchestrator,
        Err(busy) => return busy,
    };

    detached(async move {
        match orchestrator.reanalyze(&session_id).await {
            Ok(_) => analyzed_response(&orchestrator).await,
            Err(e) => flow_error_response(e),
        }
    })
    .await
}

/// POST /sessions/:session_id/select
pub async fn select_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let session_id = SessionId::from(session_id);
    let mut orchestrator = match acquire(&state) {
        Ok(orchestrator) => orchestrator,
        Err(busy) => return busy,
    };

    match orchestrator.select(&session_id).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(e) => flow_error_response(e),
    }
}

/// GET /service/health
/// Whether the analysis service answers
pub async fn service_health(State(state): State<AppState>) -> Json<ServiceHealthResponse> {
    Json(ServiceHealthResponse {
        reachable: state.analysis.health_check().await,
    })
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
