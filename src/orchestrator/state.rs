use serde::Serialize;
use std::fmt;

use crate::catalog::SessionId;
use crate::error::AnalysisError;
use crate::media::MediaHandle;

/// Coarse phase of the session flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowPhase {
    Idle,
    Capturing,
    Finalizing,
    Analyzing,
    Analyzed,
    Failed,
}

impl fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Capturing => "capturing",
            Self::Finalizing => "finalizing",
            Self::Analyzing => "analyzing",
            Self::Analyzed => "analyzed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Full flow state. `Failed` keeps what a retry needs.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    Idle,
    Capturing,
    Finalizing,
    Analyzing {
        session_id: SessionId,
        media: MediaHandle,
    },
    Analyzed {
        session_id: SessionId,
    },
    Failed {
        session_id: SessionId,
        media: MediaHandle,
        error: AnalysisError,
    },
}

impl FlowState {
    pub fn phase(&self) -> FlowPhase {
        match self {
            Self::Idle => FlowPhase::Idle,
            Self::Capturing => FlowPhase::Capturing,
            Self::Finalizing => FlowPhase::Finalizing,
            Self::Analyzing { .. } => FlowPhase::Analyzing,
            Self::Analyzed { .. } => FlowPhase::Analyzed,
            Self::Failed { .. } => FlowPhase::Failed,
        }
    }

    /// Session the flow is working on, if any
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Analyzing { session_id, .. }
            | Self::Analyzed { session_id }
            | Self::Failed { session_id, .. } => Some(session_id),
            _ => None,
        }
    }
}

/// Published view of the orchestrator, readable without owning it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowStatus {
    pub phase: FlowPhase,
    pub selected: Option<SessionId>,
    pub is_analyzing: bool,
    /// Message of the last analysis failure while `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FlowStatus {
    pub(crate) fn from_state(state: &FlowState, selected: Option<&SessionId>) -> Self {
        Self {
            phase: state.phase(),
            selected: selected.cloned(),
            is_analyzing: matches!(state, FlowState::Analyzing { .. }),
            error: match state {
                FlowState::Failed { error, .. } => Some(error.to_string()),
                _ => None,
            },
        }
    }
}
