use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use super::state::{FlowPhase, FlowState, FlowStatus};
use crate::analysis::{AnalysisResult, AnalysisService};
use crate::capture::{CaptureController, DurationUpdates};
use crate::catalog::{Catalog, Session, SessionId};
use crate::error::FlowError;
use crate::media::MediaHandle;

/// Sequences capture → registration → analysis → retry/selection
///
/// Every operation takes `&mut self`, so at most one analysis exchange is in
/// flight per orchestrator. Shared owners must not wait on it while an
/// analysis runs; the HTTP layer answers [`FlowError::Busy`] instead. A call
/// dropped mid-analysis leaves the flow `Analyzing`, and later calls report
/// `Busy` too. Observers follow progress through
/// [`Orchestrator::subscribe_status`] without holding the orchestrator.
pub struct Orchestrator {
    capture: CaptureController,
    analysis: Arc<dyn AnalysisService>,
    catalog: Catalog,
    state: FlowState,
    selected: Option<SessionId>,
    status: watch::Sender<FlowStatus>,
}

impl Orchestrator {
    /// Build an orchestrator over an opened catalog.
    ///
    /// Sessions left pending by an earlier process can no longer be resumed
    /// and are marked abandoned.
    pub async fn new(
        capture: CaptureController,
        analysis: Arc<dyn AnalysisService>,
        catalog: Catalog,
    ) -> Self {
        let recovered = catalog.abandon_pending().await;
        if recovered > 0 {
            info!("Marked {} interrupted sessions as abandoned", recovered);
        }

        let state = FlowState::Idle;
        let (status, _) = watch::channel(FlowStatus::from_state(&state, None));

        Self {
            capture,
            analysis,
            catalog,
            state,
            selected: None,
            status,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn phase(&self) -> FlowPhase {
        self.state.phase()
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self.state, FlowState::Analyzing { .. })
    }

    pub fn selected(&self) -> Option<&SessionId> {
        self.selected.as_ref()
    }

    /// Current copy of the selected session
    pub async fn selected_session(&self) -> Option<Session> {
        match &self.selected {
            Some(id) => self.catalog.get(id).await,
            None => None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn status(&self) -> FlowStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<FlowStatus> {
        self.status.subscribe()
    }

    /// Elapsed-time updates of the capture in progress
    pub fn duration_updates(&self) -> Option<DurationUpdates> {
        self.capture.subscribe()
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.capture.elapsed_millis()
    }

    pub async fn health_check(&self) -> bool {
        self.analysis.health_check().await
    }

    /// Begin a new flow. Clears any previous selection.
    pub async fn start(&mut self) -> Result<(), FlowError> {
        match &self.state {
            FlowState::Idle | FlowState::Analyzed { .. } => {}
            FlowState::Analyzing { .. } => return Err(FlowError::Busy),
            other => return Err(invalid(other, "start")),
        }

        self.selected = None;
        self.set_state(FlowState::Idle);

        self.capture.start().await?;
        self.set_state(FlowState::Capturing);
        Ok(())
    }

    /// Stop capturing, register the session and analyze it.
    ///
    /// `Ok(None)` means the capture produced nothing and the flow is back to
    /// idle. An analysis failure leaves the flow `Failed`, ready for
    /// [`retry`](Self::retry) or [`dismiss`](Self::dismiss).
    pub async fn stop(&mut self) -> Result<Option<AnalysisResult>, FlowError> {
        if self.state != FlowState::Capturing {
            return Err(invalid(&self.state, "stop"));
        }

        self.set_state(FlowState::Finalizing);

        let finished = match self.capture.stop().await {
            Ok(Some(finished)) => finished,
            Ok(None) => {
                info!("Nothing captured; back to idle");
                self.set_state(FlowState::Idle);
                return Ok(None);
            }
            Err(e) => {
                self.set_state(FlowState::Idle);
                return Err(e.into());
            }
        };

        let session = Session::new(finished.media.clone(), finished.duration_millis);
        let session_id = session.id().clone();
        self.catalog.insert(session).await;
        self.selected = Some(session_id.clone());

        info!(
            "Registered session {} ({} ms)",
            session_id, finished.duration_millis
        );

        self.run_analysis(session_id, finished.media).await.map(Some)
    }

    /// Re-submit the failed session's recording. No new session is created.
    pub async fn retry(&mut self) -> Result<AnalysisResult, FlowError> {
        let FlowState::Failed {
            session_id, media, ..
        } = &self.state
        else {
            return Err(invalid(&self.state, "retry"));
        };

        let (session_id, media) = (session_id.clone(), media.clone());
        info!("Retrying analysis of session {}", session_id);
        self.run_analysis(session_id, media).await
    }

    /// Give up on the failed session. It stays in the catalog as abandoned.
    pub async fn dismiss(&mut self) -> Result<(), FlowError> {
        let FlowState::Failed { session_id, .. } = &self.state else {
            return Err(invalid(&self.state, "dismiss"));
        };

        let session_id = session_id.clone();
        self.catalog.mark_abandoned(&session_id).await;
        info!("Dismissed failed analysis of session {}", session_id);

        self.selected = None;
        self.set_state(FlowState::Idle);
        Ok(())
    }

    /// Abort the capture in progress without registering anything
    pub async fn cancel(&mut self) -> Result<(), FlowError> {
        if self.state != FlowState::Capturing {
            return Err(invalid(&self.state, "cancel"));
        }

        self.capture.cancel().await;
        self.set_state(FlowState::Idle);
        Ok(())
    }

    /// Analyze an existing session again, replacing any previous result
    pub async fn reanalyze(&mut self, id: &SessionId) -> Result<AnalysisResult, FlowError> {
        match &self.state {
            FlowState::Idle | FlowState::Analyzed { .. } => {}
            FlowState::Analyzing { .. } => return Err(FlowError::Busy),
            other => return Err(invalid(other, "reanalyze")),
        }

        let session = self
            .catalog
            .get(id)
            .await
            .ok_or_else(|| FlowError::SessionNotFound(id.clone()))?;

        self.catalog.mark_pending(id).await;
        self.selected = Some(id.clone());
        self.run_analysis(id.clone(), session.media().clone()).await
    }

    /// Point the selection at a catalogued session
    pub async fn select(&mut self, id: &SessionId) -> Result<Session, FlowError> {
        self.ensure_settled("select")?;

        let session = self
            .catalog
            .get(id)
            .await
            .ok_or_else(|| FlowError::SessionNotFound(id.clone()))?;

        self.selected = Some(id.clone());
        self.publish();
        Ok(session)
    }

    pub fn clear_selection(&mut self) -> Result<(), FlowError> {
        self.ensure_settled("clear selection")?;
        self.selected = None;
        self.publish();
        Ok(())
    }

    /// Delete a session. A flow parked on it returns to idle.
    pub async fn delete(&mut self, id: &SessionId) -> Result<bool, FlowError> {
        if self.is_analyzing() && self.state.session_id() == Some(id) {
            return Err(FlowError::Busy);
        }

        let removed = self.catalog.remove(id).await;

        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        if self.state.session_id() == Some(id) {
            self.state = FlowState::Idle;
        }
        self.publish();

        if removed {
            info!("Deleted session {}", id);
        }
        Ok(removed)
    }

    /// Release the device and flush the catalog before exit
    pub async fn shutdown(&mut self) {
        self.capture.shutdown().await;
        if matches!(self.state, FlowState::Capturing | FlowState::Finalizing) {
            self.set_state(FlowState::Idle);
        }
        self.catalog.flush().await;
        info!("Orchestrator shut down");
    }

    async fn run_analysis(
        &mut self,
        session_id: SessionId,
        media: MediaHandle,
    ) -> Result<AnalysisResult, FlowError> {
        self.set_state(FlowState::Analyzing {
            session_id: session_id.clone(),
            media: media.clone(),
        });

        match self.analysis.analyze(&media).await {
            Ok(result) => {
                self.catalog
                    .attach_analysis(&session_id, result.clone())
                    .await;
                info!("Session {} analyzed", session_id);
                self.set_state(FlowState::Analyzed { session_id });
                Ok(result)
            }
            Err(error) => {
                warn!("Analysis of session {} failed: {}", session_id, error);
                self.set_state(FlowState::Failed {
                    session_id: session_id.clone(),
                    media,
                    error: error.clone(),
                });
                Err(FlowError::Analysis {
                    session_id,
                    source: error,
                })
            }
        }
    }

    fn ensure_settled(&self, action: &'static str) -> Result<(), FlowError> {
        match &self.state {
            FlowState::Idle | FlowState::Analyzed { .. } => Ok(()),
            FlowState::Analyzing { .. } => Err(FlowError::Busy),
            other => Err(invalid(other, action)),
        }
    }

    fn set_state(&mut self, state: FlowState) {
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.status
            .send_replace(FlowStatus::from_state(&self.state, self.selected.as_ref()));
    }
}

fn invalid(state: &FlowState, action: &'static str) -> FlowError {
    FlowError::InvalidTransition {
        phase: state.phase(),
        action,
    }
}
