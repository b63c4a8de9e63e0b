use thiserror::Error;

use crate::catalog::SessionId;
use crate::orchestrator::FlowPhase;

/// Failures acquiring or finalizing the capture device
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("capture device error: {0}")]
    DeviceError(String),

    #[error("a capture is already in progress")]
    AlreadyRecording,
}

/// Failures of a single analysis exchange
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("analysis service unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("analysis service rejected the request ({status}): {message}")]
    ServerRejected { status: u16, message: String },

    #[error("malformed analysis response: {0}")]
    MalformedResponse(String),

    #[error("recorded media unavailable: {0}")]
    MediaUnavailable(String),
}

/// Persistence failures. Never surfaced past the catalog.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::StorageUnavailable(e.to_string())
    }
}

/// Errors surfaced by the orchestrator to its caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("analysis of session {session_id} failed: {source}")]
    Analysis {
        session_id: SessionId,
        source: AnalysisError,
    },

    #[error("another session operation is in flight")]
    Busy,

    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        phase: FlowPhase,
        action: &'static str,
    },

    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
}

impl FlowError {
    /// Whether the caller should offer a retry for this failure
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Analysis { .. })
    }
}
