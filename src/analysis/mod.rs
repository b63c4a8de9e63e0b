//! Analysis service boundary
//!
//! - `AnalysisResult` and friends: the service's JSON result shape
//! - `AnalysisService`: one upload/response exchange, no internal retry
//! - `HttpAnalysisClient`: multipart HTTP implementation

mod client;
mod types;

pub use client::{AnalysisClientConfig, AnalysisService, HttpAnalysisClient, ANALYZE_PATH};
pub use types::{
    AnalysisResult, AnalysisScores, FillerWord, MarkerCategory, ProsodyMetrics, Severity,
    TimelineMarker, MAX_SCORE,
};

#[cfg(test)]
pub(crate) use types::fixtures;
