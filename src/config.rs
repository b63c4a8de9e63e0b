use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::analysis::AnalysisClientConfig;
use crate::audio::AudioSource;
use crate::capture::CaptureConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub capture: CaptureSettings,
    pub analysis: AnalysisSettings,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "speakeasy-coach".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub recordings_path: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_rate: u32,
    pub container: String,
    /// Cadence of elapsed-time updates
    pub tick_interval_ms: u64,
    /// WAV file replayed in place of a microphone
    pub replay_source: Option<String>,
    /// Pace replay in real time
    pub realtime: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        let defaults = CaptureConfig::default();
        Self {
            recordings_path: "data/recordings".to_string(),
            sample_rate: defaults.sample_rate,
            channels: defaults.channels,
            bit_rate: defaults.bit_rate,
            container: defaults.container,
            tick_interval_ms: 100,
            replay_source: None,
            realtime: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub base_url: String,
    /// Transport timeout; unset means unbounded
    pub timeout_secs: Option<u64>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_path: "data".to_string(),
        }
    }
}

impl Config {
    /// Load `path` (any extension the `config` crate knows) layered under
    /// `SPEAKEASY__SECTION__KEY` environment overrides. A missing file falls
    /// back to defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("SPEAKEASY").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config {}", path))?;

        Ok(settings.try_deserialize()?)
    }
}

impl CaptureSettings {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bit_rate: self.bit_rate,
            container: self.container.clone(),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn audio_source(&self) -> AudioSource {
        match &self.replay_source {
            Some(path) => AudioSource::File {
                path: PathBuf::from(path),
                realtime: self.realtime,
            },
            None => AudioSource::Microphone,
        }
    }
}

impl AnalysisSettings {
    pub fn client_config(&self) -> AnalysisClientConfig {
        AnalysisClientConfig {
            base_url: self.base_url.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}
