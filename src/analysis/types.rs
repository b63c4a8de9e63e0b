use serde::{Deserialize, Serialize};

/// Upper bound of every score on the 0-10 scale
pub const MAX_SCORE: f64 = 10.0;

/// Structured output of the remote scoring service
///
/// Field names follow the service's camelCase JSON so a result round-trips
/// unchanged through the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub scores: AnalysisScores,
    pub timeline_markers: Vec<TimelineMarker>,
    pub filler_words: Vec<FillerWord>,
    pub prosody_metrics: ProsodyMetrics,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
    /// Analyzed audio length in seconds
    #[serde(rename = "duration")]
    pub duration_seconds: f64,
    /// Server timestamp, kept verbatim
    pub analyzed_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisScores {
    pub confidence: f64,
    pub clarity: f64,
    pub pacing: f64,
    pub nervousness: f64,
}

impl AnalysisScores {
    fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("confidence", self.confidence),
            ("clarity", self.clarity),
            ("pacing", self.pacing),
            ("nervousness", self.nervousness),
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerCategory {
    Filler,
    Pause,
    Fast,
    Slow,
    Confident,
    Nervous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A highlighted span of the recording, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineMarker {
    pub start: f64,
    pub end: f64,
    #[serde(rename = "type")]
    pub category: MarkerCategory,
    pub severity: Severity,
    pub color: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillerWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProsodyMetrics {
    pub pitch_mean: f64,
    pub pitch_std: f64,
    pub tempo_bpm: f64,
    pub pause_count: u32,
    /// Pause timestamps in seconds
    pub pause_locations: Vec<f64>,
    pub energy_variance: f64,
    pub speech_rate_wpm: u32,
}

impl AnalysisResult {
    /// Check the invariants a decoded response must satisfy.
    ///
    /// Scores lie in `[0, 10]`, every marker has `start <= end`, and markers
    /// are ordered by `start`.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in self.scores.iter() {
            if !(0.0..=MAX_SCORE).contains(&value) {
                return Err(format!("{} score {} outside [0, {}]", name, value, MAX_SCORE));
            }
        }

        for (i, marker) in self.timeline_markers.iter().enumerate() {
            if marker.start > marker.end {
                return Err(format!(
                    "timeline marker {} ends before it starts ({} > {})",
                    i, marker.start, marker.end
                ));
            }
        }

        if let Some(pos) = self
            .timeline_markers
            .windows(2)
            .position(|pair| pair[0].start > pair[1].start)
        {
            return Err(format!("timeline markers out of order at index {}", pos + 1));
        }

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_result;
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(sample_result(8.0, 7.0, 6.0, 3.0)).unwrap();

        assert!(json.get("timelineMarkers").is_some());
        assert!(json.get("fillerWords").is_some());
        assert!(json.get("analyzedAt").is_some());
        assert_eq!(json["duration"], 31.0);
        assert_eq!(json["prosodyMetrics"]["speechRateWpm"], 138);
        assert_eq!(json["timelineMarkers"][0]["type"], "filler");
        assert_eq!(json["timelineMarkers"][0]["severity"], "medium");
        assert!(json["timelineMarkers"][0].get("reason").is_none());
    }

    #[test]
    fn test_decodes_service_payload() {
        let body = r#"{
            "scores": {"confidence": 8, "clarity": 7.5, "pacing": 6, "nervousness": 3},
            "timelineMarkers": [
                {"start": 0.4, "end": 0.9, "type": "nervous", "severity": "high",
                 "color": "hsl(0, 84%, 60%)", "label": "Voz temblorosa"}
            ],
            "fillerWords": [],
            "prosodyMetrics": {"pitchMean": 190.2, "pitchStd": 30.1, "tempoBpm": 120.0,
                               "pauseCount": 0, "pauseLocations": [], "energyVariance": 0.02,
                               "speechRateWpm": 150},
            "recommendations": ["Respira antes de empezar"],
            "duration": 12.5,
            "analyzedAt": "2026-10-16T09:30:00"
        }"#;

        let result: AnalysisResult = serde_json::from_str(body).unwrap();

        assert_eq!(result.scores.confidence, 8.0);
        assert_eq!(result.timeline_markers[0].category, MarkerCategory::Nervous);
        assert_eq!(result.transcription, None);
        assert!(result.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_score() {
        let result = sample_result(11.0, 7.0, 6.0, 3.0);
        let err = result.validate().unwrap_err();
        assert!(err.contains("confidence"));
    }

    #[test]
    fn test_validate_rejects_inverted_marker() {
        let mut result = sample_result(8.0, 7.0, 6.0, 3.0);
        result.timeline_markers[1].end = 9.0;
        assert!(result.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unordered_markers() {
        let mut result = sample_result(8.0, 7.0, 6.0, 3.0);
        result.timeline_markers.reverse();
        let err = result.validate().unwrap_err();
        assert!(err.contains("out of order"));
    }
}
