//! HTTP control API for a presentation shell
//!
//! This module provides a REST API driving one session flow:
//! - POST /session/start | stop | cancel | retry | dismiss - Flow control
//! - GET /session/status - Current phase and selection
//! - GET /sessions - History (`?analyzed=true` for completed only)
//! - GET /sessions/summary - Counts and average scores
//! - GET|DELETE /sessions/:id - Inspect or delete a session
//! - POST /sessions/:id/analyze | select - Re-analyze or select
//! - GET /health, GET /service/health - Local and upstream health

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
