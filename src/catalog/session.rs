use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::AnalysisResult;
use crate::media::MediaHandle;

/// Opaque, unique session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a session stands with respect to analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "lowercase")]
pub enum AnalysisStatus {
    /// Registered; an analysis is expected
    #[default]
    Pending,
    /// Analysis succeeded. Replaced wholesale on re-analysis.
    Completed(AnalysisResult),
    /// A failed analysis was dismissed by the user
    Abandoned,
}

impl AnalysisStatus {
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            Self::Completed(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// One completed recording, with or without an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    id: SessionId,
    media: MediaHandle,
    duration_millis: u64,
    created_at: DateTime<Utc>,
    #[serde(default)]
    analysis: AnalysisStatus,
}

impl Session {
    /// Register a freshly captured recording
    pub fn new(media: MediaHandle, duration_millis: u64) -> Self {
        Self::with_id(SessionId::generate(), media, duration_millis, Utc::now())
    }

    pub fn with_id(
        id: SessionId,
        media: MediaHandle,
        duration_millis: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            media,
            duration_millis,
            created_at,
            analysis: AnalysisStatus::Pending,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn media(&self) -> &MediaHandle {
        &self.media
    }

    pub fn duration_millis(&self) -> u64 {
        self.duration_millis
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn analysis(&self) -> &AnalysisStatus {
        &self.analysis
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.analysis.result()
    }

    pub(crate) fn set_analysis(&mut self, status: AnalysisStatus) {
        self.analysis = status;
    }
}

/// Format milliseconds as `M:SS`
pub fn format_duration(millis: u64) -> String {
    let total_secs = millis / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::sample_result;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(31_000), "0:31");
        assert_eq!(format_duration(61_999), "1:01");
        assert_eq!(format_duration(600_000), "10:00");
    }

    #[test]
    fn test_new_session_is_pending() {
        let session = Session::new(MediaHandle::new("/tmp/take.wav"), 4200);
        assert_eq!(session.analysis(), &AnalysisStatus::Pending);
        assert!(session.result().is_none());
        assert_eq!(session.duration_millis(), 4200);
    }

    #[test]
    fn test_status_serialization_shape() {
        let pending = serde_json::to_value(AnalysisStatus::Pending).unwrap();
        assert_eq!(pending, serde_json::json!({ "status": "pending" }));

        let abandoned = serde_json::to_value(AnalysisStatus::Abandoned).unwrap();
        assert_eq!(abandoned, serde_json::json!({ "status": "abandoned" }));

        let completed =
            serde_json::to_value(AnalysisStatus::Completed(sample_result(8.0, 7.0, 6.0, 3.0)))
                .unwrap();
        assert_eq!(completed["status"], "completed");
        assert_eq!(completed["result"]["scores"]["confidence"], 8.0);
    }

    #[test]
    fn test_session_without_analysis_field_loads_as_pending() {
        let json = r#"{
            "id": "abc",
            "media": "/tmp/take.m4a",
            "durationMillis": 1000,
            "createdAt": "2026-10-16T09:00:00Z"
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.id().as_str(), "abc");
        assert_eq!(session.analysis(), &AnalysisStatus::Pending);
    }
}
