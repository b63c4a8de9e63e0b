use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::device::{CaptureConfig, CaptureDevice, CaptureHandle, FinishedCapture, Permission};
use crate::audio::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource, TakeWriter};
use crate::error::CaptureError;
use crate::media::MediaHandle;

/// Capture device recording an audio backend's frames into WAV takes
///
/// Always writes `.wav`, whatever container the config asks for.
pub struct WavCaptureDevice {
    source: AudioSource,
    recordings_dir: PathBuf,
    buffer_duration_ms: u64,
}

impl WavCaptureDevice {
    pub fn new(source: AudioSource, recordings_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            recordings_dir: recordings_dir.into(),
            buffer_duration_ms: 100,
        }
    }
}

#[async_trait::async_trait]
impl CaptureDevice for WavCaptureDevice {
    async fn request_permission(&self) -> Permission {
        // File replay reads no hardware; nothing to grant
        Permission::Granted
    }

    async fn start(&self, config: &CaptureConfig) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        tokio::fs::create_dir_all(&self.recordings_dir)
            .await
            .map_err(|e| CaptureError::DeviceError(format!("recordings directory: {}", e)))?;

        let backend_config = AudioBackendConfig {
            target_sample_rate: config.sample_rate,
            target_channels: config.channels,
            buffer_duration_ms: self.buffer_duration_ms,
        };

        let mut backend = AudioBackendFactory::create(self.source.clone(), backend_config)
            .map_err(|e| CaptureError::DeviceError(format!("{:#}", e)))?;

        let frames = backend
            .start()
            .await
            .map_err(|e| CaptureError::DeviceError(format!("{:#}", e)))?;

        let path = self
            .recordings_dir
            .join(format!("take-{}.wav", uuid::Uuid::new_v4()));
        let (elapsed_tx, elapsed_rx) = watch::channel(0);
        let (stop_tx, stop_rx) = oneshot::channel();

        info!("Recording {} from {}", path.display(), backend.name());

        let task = tokio::spawn(record_take(backend, frames, path, elapsed_tx, stop_rx));

        Ok(Box::new(WavCaptureHandle {
            elapsed: elapsed_rx,
            stop_tx: Some(stop_tx),
            task: Some(task),
        }))
    }

    fn name(&self) -> &str {
        "WAV capture"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopMode {
    Finalize,
    Discard,
}

struct WavCaptureHandle {
    elapsed: watch::Receiver<u64>,
    stop_tx: Option<oneshot::Sender<StopMode>>,
    task: Option<JoinHandle<Result<Option<FinishedCapture>>>>,
}

impl WavCaptureHandle {
    async fn finish(&mut self, mode: StopMode) -> Result<Option<FinishedCapture>, CaptureError> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(mode);
        }

        let Some(task) = self.task.take() else {
            return Ok(None);
        };

        match task.await {
            Ok(Ok(finished)) => Ok(finished),
            Ok(Err(e)) => Err(CaptureError::DeviceError(format!("{:#}", e))),
            Err(e) => Err(CaptureError::DeviceError(format!("recorder task failed: {}", e))),
        }
    }
}

#[async_trait::async_trait]
impl CaptureHandle for WavCaptureHandle {
    fn elapsed(&self) -> watch::Receiver<u64> {
        self.elapsed.clone()
    }

    async fn stop(&mut self) -> Result<Option<FinishedCapture>, CaptureError> {
        self.finish(StopMode::Finalize).await
    }

    async fn discard(&mut self) -> Result<(), CaptureError> {
        self.finish(StopMode::Discard).await.map(|_| ())
    }
}

// Dropping the handle drops `stop_tx`; the recorder task reads that as a
// discard, stops the backend and removes the partial file.

async fn record_take(
    mut backend: Box<dyn AudioBackend>,
    frames: mpsc::Receiver<AudioFrame>,
    path: PathBuf,
    elapsed: watch::Sender<u64>,
    stop_rx: oneshot::Receiver<StopMode>,
) -> Result<Option<FinishedCapture>> {
    let pumped = pump(frames, &path, &elapsed, stop_rx).await;

    if let Err(e) = backend.stop().await {
        error!("Failed to stop audio backend: {}", e);
    }

    let (mode, writer) = match pumped {
        Ok(done) => done,
        Err(e) => {
            remove_partial(&path).await;
            return Err(e);
        }
    };

    match (mode, writer) {
        (StopMode::Finalize, Some(writer)) => {
            let media = MediaHandle::new(writer.path());
            let duration_millis = writer.finish()?;
            Ok(Some(FinishedCapture {
                media,
                duration_millis,
            }))
        }
        (StopMode::Finalize, None) => Ok(None),
        (StopMode::Discard, writer) => {
            drop(writer);
            remove_partial(&path).await;
            Ok(None)
        }
    }
}

/// Write frames until told to stop. The writer is created on the first frame
/// so the file takes the source's native format.
async fn pump(
    mut frames: mpsc::Receiver<AudioFrame>,
    path: &Path,
    elapsed: &watch::Sender<u64>,
    mut stop_rx: oneshot::Receiver<StopMode>,
) -> Result<(StopMode, Option<TakeWriter>)> {
    let mut writer: Option<TakeWriter> = None;

    loop {
        tokio::select! {
            mode = &mut stop_rx => {
                return Ok((mode.unwrap_or(StopMode::Discard), writer));
            }
            frame = frames.recv() => match frame {
                Some(frame) => {
                    if writer.is_none() {
                        writer = Some(
                            TakeWriter::create(path, frame.sample_rate, frame.channels)
                                .context("Failed to open take file")?,
                        );
                    }
                    if let Some(w) = writer.as_mut() {
                        w.write_frame(&frame)?;
                        elapsed.send_replace(w.elapsed_ms());
                    }
                }
                None => {
                    // Source exhausted; hold the take until stopped
                    let mode = (&mut stop_rx).await.unwrap_or(StopMode::Discard);
                    return Ok((mode, writer));
                }
            },
        }
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!("Discarded {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
