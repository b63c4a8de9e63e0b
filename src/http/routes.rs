use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health checks
        .route("/health", get(handlers::health_check))
        .route("/service/health", get(handlers::service_health))
        // Flow control
        .route("/session/start", post(handlers::start_session))
        .route("/session/stop", post(handlers::stop_session))
        .route("/session/cancel", post(handlers::cancel_session))
        .route("/session/retry", post(handlers::retry_analysis))
        .route("/session/dismiss", post(handlers::dismiss_failure))
        .route("/session/status", get(handlers::get_status))
        // History
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/summary", get(handlers::get_summary))
        .route(
            "/sessions/:session_id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route(
            "/sessions/:session_id/analyze",
            post(handlers::reanalyze_session),
        )
        .route(
            "/sessions/:session_id/select",
            post(handlers::select_session),
        )
        // Local UI shells call from another origin
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
