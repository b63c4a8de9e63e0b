use anyhow::{Context, Result};
use reqwest::{multipart, Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::AnalysisResult;
use crate::error::AnalysisError;
use crate::media::MediaHandle;

/// Path of the analysis endpoint, relative to the service base URL
pub const ANALYZE_PATH: &str = "/api/analyze";

/// Remote scoring service
///
/// One call is one exchange. Implementations never retry internally; the
/// orchestrator decides when to try again.
#[async_trait::async_trait]
pub trait AnalysisService: Send + Sync {
    /// Upload a finalized recording and return its analysis
    async fn analyze(&self, media: &MediaHandle) -> Result<AnalysisResult, AnalysisError>;

    /// Best-effort reachability check. Never fails.
    async fn health_check(&self) -> bool;
}

/// Configuration for the HTTP analysis client
#[derive(Debug, Clone)]
pub struct AnalysisClientConfig {
    /// Service root, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Transport timeout; `None` leaves the exchange unbounded
    pub timeout: Option<Duration>,
}

impl Default for AnalysisClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: None,
        }
    }
}

/// Analysis client speaking multipart HTTP to the scoring service
pub struct HttpAnalysisClient {
    config: AnalysisClientConfig,
    client: Client,
}

impl HttpAnalysisClient {
    pub fn new(config: AnalysisClientConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        info!("Analysis client targeting {}", config.base_url);

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn build_form(media: &MediaHandle) -> Result<multipart::Form, AnalysisError> {
        let bytes = tokio::fs::read(media.path())
            .await
            .map_err(|e| AnalysisError::MediaUnavailable(format!("{}: {}", media, e)))?;

        debug!("Uploading {} ({} bytes, {})", media, bytes.len(), media.mime_type());

        let part = multipart::Part::bytes(bytes)
            .file_name(media.upload_file_name())
            .mime_str(media.mime_type())
            .map_err(|e| AnalysisError::MediaUnavailable(e.to_string()))?;

        Ok(multipart::Form::new().part("file", part))
    }
}

#[async_trait::async_trait]
impl AnalysisService for HttpAnalysisClient {
    async fn analyze(&self, media: &MediaHandle) -> Result<AnalysisResult, AnalysisError> {
        let form = Self::build_form(media).await?;
        let url = self.url(ANALYZE_PATH);

        info!("Submitting {} to {}", media, url);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AnalysisError::NetworkUnreachable(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AnalysisError::NetworkUnreachable(e.to_string()))?;

        if !status.is_success() {
            let message = rejection_message(status, &body);
            warn!("Analysis rejected ({}): {}", status, message);
            return Err(AnalysisError::ServerRejected {
                status: status.as_u16(),
                message,
            });
        }

        let result: AnalysisResult = serde_json::from_slice(&body)
            .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;
        result.validate().map_err(AnalysisError::MalformedResponse)?;

        info!(
            "Analysis complete: confidence={}, clarity={}, {} markers",
            result.scores.confidence,
            result.scores.clarity,
            result.timeline_markers.len()
        );

        Ok(result)
    }

    async fn health_check(&self) -> bool {
        match self.client.get(self.url("/")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Health check failed: {}", e);
                false
            }
        }
    }
}

/// Message for a non-success response: the JSON `detail` field if the
/// server sent one, else the raw body, else the status reason.
fn rejection_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            Some(detail) => return detail.to_string(),
            None => {}
        }
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    if !text.is_empty() {
        return text;
    }

    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
