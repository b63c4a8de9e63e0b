//! Session flow orchestration
//!
//! `Idle → Capturing → Finalizing → Analyzing → Analyzed`, or
//! `Analyzing → Failed → (Analyzing | Idle)`.

mod orchestrator;
mod state;

pub use orchestrator::Orchestrator;
pub use state::{FlowPhase, FlowState, FlowStatus};
