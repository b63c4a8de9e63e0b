use crate::analysis::AnalysisService;
use crate::catalog::Catalog;
use crate::orchestrator::{FlowStatus, Orchestrator};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The one session flow this service drives
    pub orchestrator: Arc<Mutex<Orchestrator>>,

    /// Read side of the catalog, usable while a flow holds the orchestrator
    pub catalog: Catalog,

    /// Latest flow status, readable without the orchestrator lock
    pub status: watch::Receiver<FlowStatus>,

    /// For health checks that must not wait on an analysis in flight
    pub analysis: Arc<dyn AnalysisService>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, analysis: Arc<dyn AnalysisService>) -> Self {
        let catalog = orchestrator.catalog().clone();
        let status = orchestrator.subscribe_status();

        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            catalog,
            status,
            analysis,
        }
    }
}
