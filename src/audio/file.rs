use anyhow::{bail, Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

        let spec = reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            bail!("WAV file has an empty format: {}", path.display());
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split into frames of `frame_ms`, timestamped from zero
    pub fn frames(&self, frame_ms: u64) -> Vec<AudioFrame> {
        let per_frame = (self.sample_rate as u64 * self.channels as u64 * frame_ms.max(1) / 1000)
            .max(self.channels as u64) as usize;
        // Keep frames aligned to whole interleaved sample groups
        let per_frame = per_frame - per_frame % self.channels as usize;

        self.samples
            .chunks(per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * frame_ms,
            })
            .collect()
    }
}

/// Backend replaying a WAV file as a live source
///
/// Stands in for a microphone on hosts without one and in tests.
pub struct FileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
    realtime: bool,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn open(path: impl Into<PathBuf>, config: AudioBackendConfig, realtime: bool) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            bail!("Replay source not found: {}", path.display());
        }

        Ok(Self {
            path,
            config,
            realtime,
            task: None,
        })
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.task.is_some() {
            bail!("Already capturing");
        }

        let audio = AudioFile::open(&self.path)?;
        if audio.sample_rate != self.config.target_sample_rate
            || audio.channels != self.config.target_channels
        {
            warn!(
                "Replay source is {}Hz/{}ch, capture asked for {}Hz/{}ch; passing through unchanged",
                audio.sample_rate, audio.channels,
                self.config.target_sample_rate, self.config.target_channels
            );
        }

        let frame_ms = self.config.buffer_duration_ms;
        let frames = audio.frames(frame_ms);
        let realtime = self.realtime;
        let (tx, rx) = mpsc::channel(100);

        let total_ms: u64 = frames.iter().map(AudioFrame::duration_ms).sum();
        info!(
            "Replaying {} ({} frames, {} ms, realtime={})",
            audio.path,
            frames.len(),
            total_ms,
            realtime
        );

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(frame_ms.max(1)));
            for frame in frames {
                if realtime {
                    ticker.tick().await;
                }
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        "WAV file replay"
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
