use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};

use super::session::{AnalysisStatus, Session, SessionId};
use super::store::{KeyValueStore, MemoryStore};
use crate::analysis::{AnalysisResult, AnalysisScores};

/// Storage key holding the serialized session list
pub const CATALOG_KEY: &str = "recordings";

enum WriteCommand {
    /// A snapshot is waiting in the pending slot
    Save,
    Flush(oneshot::Sender<()>),
}

/// Latest unsaved snapshot. Newer mutations overwrite it, so a slow store
/// holds at most one snapshot in memory.
type PendingSave = Arc<Mutex<Option<String>>>;

/// Durable, newest-first collection of every recorded session
///
/// Cheap to clone; clones share the same sessions. Mutations apply in memory
/// before the call returns and hand the newest snapshot to a single writer
/// task. Snapshots superseded before the writer gets to them are skipped, so
/// the store only ever moves forward. A failed save is logged and otherwise
/// ignored.
#[derive(Clone)]
pub struct Catalog {
    sessions: Arc<RwLock<Vec<Session>>>,
    pending: PendingSave,
    writer: mpsc::UnboundedSender<WriteCommand>,
}

/// Aggregate view over the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSummary {
    pub total: usize,
    pub analyzed: usize,
    pub pending: usize,
    pub abandoned: usize,
    /// Mean scores over analyzed sessions
    pub average_scores: Option<AnalysisScores>,
}

impl Catalog {
    /// Load the last saved catalog from `store` and start its writer task.
    ///
    /// Absent, unreadable or corrupt data yields an empty catalog.
    pub async fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let sessions = load(store.as_ref()).await;
        info!("Catalog loaded: {} sessions", sessions.len());

        let pending = PendingSave::default();
        let (writer, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(store, Arc::clone(&pending), rx));

        Self {
            sessions: Arc::new(RwLock::new(sessions)),
            pending,
            writer,
        }
    }

    /// Empty catalog backed by a volatile store
    pub async fn in_memory() -> Self {
        Self::open(Arc::new(MemoryStore::new())).await
    }

    /// Prepend `session`. Returns `false` (and changes nothing) if its id is
    /// already present.
    pub async fn insert(&self, session: Session) -> bool {
        self.mutate(|sessions| {
            if sessions.iter().any(|s| s.id() == session.id()) {
                debug!("Session {} already catalogued", session.id());
                return false;
            }
            sessions.insert(0, session);
            true
        })
        .await
    }

    /// Replace the analysis of `id`. Returns `false` if the session is gone.
    pub async fn attach_analysis(&self, id: &SessionId, result: AnalysisResult) -> bool {
        self.mutate(|sessions| match find_mut(sessions, id) {
            Some(session) => {
                session.set_analysis(AnalysisStatus::Completed(result));
                true
            }
            None => {
                debug!("Dropping analysis for removed session {}", id);
                false
            }
        })
        .await
    }

    /// Pending → Abandoned
    pub async fn mark_abandoned(&self, id: &SessionId) -> bool {
        self.transition(id, AnalysisStatus::Pending, AnalysisStatus::Abandoned)
            .await
    }

    /// Abandoned → Pending
    pub async fn mark_pending(&self, id: &SessionId) -> bool {
        self.transition(id, AnalysisStatus::Abandoned, AnalysisStatus::Pending)
            .await
    }

    /// Mark every Pending session Abandoned; returns how many changed
    pub async fn abandon_pending(&self) -> usize {
        let mut count = 0;
        self.mutate(|sessions| {
            for session in sessions.iter_mut() {
                if *session.analysis() == AnalysisStatus::Pending {
                    session.set_analysis(AnalysisStatus::Abandoned);
                    count += 1;
                }
            }
            count > 0
        })
        .await;
        count
    }

    /// Delete `id`. Returns `false` if it was not present.
    pub async fn remove(&self, id: &SessionId) -> bool {
        self.mutate(|sessions| {
            let before = sessions.len();
            sessions.retain(|s| s.id() != id);
            sessions.len() != before
        })
        .await
    }

    pub async fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions
            .read()
            .await
            .iter()
            .find(|s| s.id() == id)
            .cloned()
    }

    /// Snapshot of every session, newest first
    pub async fn all(&self) -> Vec<Session> {
        self.sessions.read().await.clone()
    }

    /// Snapshot of sessions with a completed analysis, newest first
    pub async fn analyzed(&self) -> Vec<Session> {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|s| s.analysis().is_completed())
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn summary(&self) -> CatalogSummary {
        let sessions = self.sessions.read().await;

        let mut summary = CatalogSummary {
            total: sessions.len(),
            analyzed: 0,
            pending: 0,
            abandoned: 0,
            average_scores: None,
        };
        let mut sum = AnalysisScores {
            confidence: 0.0,
            clarity: 0.0,
            pacing: 0.0,
            nervousness: 0.0,
        };

        for session in sessions.iter() {
            match session.analysis() {
                AnalysisStatus::Completed(result) => {
                    summary.analyzed += 1;
                    sum.confidence += result.scores.confidence;
                    sum.clarity += result.scores.clarity;
                    sum.pacing += result.scores.pacing;
                    sum.nervousness += result.scores.nervousness;
                }
                AnalysisStatus::Pending => summary.pending += 1,
                AnalysisStatus::Abandoned => summary.abandoned += 1,
            }
        }

        if summary.analyzed > 0 {
            let n = summary.analyzed as f64;
            summary.average_scores = Some(AnalysisScores {
                confidence: sum.confidence / n,
                clarity: sum.clarity / n,
                pacing: sum.pacing / n,
                nervousness: sum.nervousness / n,
            });
        }

        summary
    }

    /// Wait until every save queued so far has been attempted
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.writer.send(WriteCommand::Flush(ack)).is_err() {
            warn!("Catalog writer stopped; nothing to flush");
            return;
        }
        let _ = done.await;
    }

    async fn transition(&self, id: &SessionId, from: AnalysisStatus, to: AnalysisStatus) -> bool {
        self.mutate(|sessions| match find_mut(sessions, id) {
            Some(session) if *session.analysis() == from => {
                session.set_analysis(to);
                true
            }
            _ => false,
        })
        .await
    }

    async fn mutate<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Vec<Session>) -> bool,
    {
        let mut sessions = self.sessions.write().await;
        let changed = f(&mut sessions);
        if changed {
            // Enqueued under the write lock so save order matches mutation order
            self.persist(&sessions);
        }
        changed
    }

    fn persist(&self, sessions: &[Session]) {
        let json = match serde_json::to_string(sessions) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize catalog: {}", e);
                return;
            }
        };

        // A queued Save already covers a snapshot left in the slot
        let superseded = lock_pending(&self.pending).replace(json).is_some();
        if !superseded && self.writer.send(WriteCommand::Save).is_err() {
            warn!("Catalog writer stopped; change kept in memory only");
        }
    }
}

fn find_mut<'a>(sessions: &'a mut [Session], id: &SessionId) -> Option<&'a mut Session> {
    sessions.iter_mut().find(|s| s.id() == id)
}

async fn load(store: &dyn KeyValueStore) -> Vec<Session> {
    let json = match store.read(CATALOG_KEY).await {
        Ok(Some(json)) => json,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("Catalog storage unreadable, starting empty: {}", e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<Session>>(&json) {
        Ok(sessions) => {
            let mut seen = HashSet::new();
            sessions
                .into_iter()
                .filter(|s| seen.insert(s.id().clone()))
                .collect()
        }
        Err(e) => {
            warn!("Saved catalog is corrupt, starting empty: {}", e);
            Vec::new()
        }
    }
}

fn lock_pending(pending: &PendingSave) -> MutexGuard<'_, Option<String>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn write_loop(
    store: Arc<dyn KeyValueStore>,
    pending: PendingSave,
    mut rx: mpsc::UnboundedReceiver<WriteCommand>,
) {
    while let Some(command) = rx.recv().await {
        // Either way, whatever is waiting is the newest state
        let json = lock_pending(&pending).take();
        if let Some(json) = json {
            if let Err(e) = store.write(CATALOG_KEY, &json).await {
                warn!("Catalog save failed: {}", e);
            }
        }

        if let WriteCommand::Flush(ack) = command {
            let _ = ack.send(());
        }
    }
    debug!("Catalog writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::sample_result;
    use crate::media::MediaHandle;

    fn session(id: &str) -> Session {
        Session::with_id(
            SessionId::from(id),
            MediaHandle::new(format!("/tmp/{}.wav", id)),
            1000,
            chrono::Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_insert_prepends() {
        let catalog = Catalog::in_memory().await;
        assert!(catalog.insert(session("a")).await);
        assert!(catalog.insert(session("b")).await);

        let ids: Vec<_> = catalog
            .all()
            .await
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_mark_pending_only_from_abandoned() {
        let catalog = Catalog::in_memory().await;
        catalog.insert(session("a")).await;

        assert!(!catalog.mark_pending(&"a".into()).await);
        assert!(catalog.mark_abandoned(&"a".into()).await);
        assert!(catalog.mark_pending(&"a".into()).await);

        catalog
            .attach_analysis(&"a".into(), sample_result(5.0, 5.0, 5.0, 5.0))
            .await;
        assert!(!catalog.mark_abandoned(&"a".into()).await);
        assert!(catalog.get(&"a".into()).await.unwrap().result().is_some());
    }

    #[tokio::test]
    async fn test_summary_averages_completed_only() {
        let catalog = Catalog::in_memory().await;
        for id in ["a", "b", "c", "d"] {
            catalog.insert(session(id)).await;
        }
        catalog
            .attach_analysis(&"a".into(), sample_result(8.0, 6.0, 4.0, 2.0))
            .await;
        catalog
            .attach_analysis(&"b".into(), sample_result(6.0, 8.0, 6.0, 4.0))
            .await;
        catalog.mark_abandoned(&"c".into()).await;

        let summary = catalog.summary().await;
        assert_eq!(summary.total, 4);
        assert_eq!(summary.analyzed, 2);
        assert_eq!(summary.abandoned, 1);
        assert_eq!(summary.pending, 1);

        let avg = summary.average_scores.unwrap();
        assert_eq!(avg.confidence, 7.0);
        assert_eq!(avg.clarity, 7.0);
        assert_eq!(avg.pacing, 5.0);
        assert_eq!(avg.nervousness, 3.0);
    }

    #[tokio::test]
    async fn test_abandon_pending() {
        let catalog = Catalog::in_memory().await;
        catalog.insert(session("a")).await;
        catalog.insert(session("b")).await;
        catalog
            .attach_analysis(&"b".into(), sample_result(5.0, 5.0, 5.0, 5.0))
            .await;

        assert_eq!(catalog.abandon_pending().await, 1);
        assert_eq!(
            catalog.get(&"a".into()).await.unwrap().analysis(),
            &AnalysisStatus::Abandoned
        );
        assert_eq!(catalog.abandon_pending().await, 0);
    }
}
