use futures::stream::Stream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::device::{CaptureConfig, CaptureDevice, CaptureHandle, FinishedCapture, Permission};
use crate::error::CaptureError;
use crate::media::MediaHandle;

/// Default cadence of duration updates
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    Recording,
    Stopped,
}

/// Snapshot of the controller's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureState {
    pub phase: CapturePhase,
    pub elapsed_millis: u64,
    /// Present only once a capture has been cleanly stopped
    pub media: Option<MediaHandle>,
}

/// Elapsed-time updates for one capture
///
/// Ends when that capture stops or is cancelled.
pub struct DurationUpdates {
    rx: broadcast::Receiver<u64>,
}

impl DurationUpdates {
    /// Next elapsed value in milliseconds; `None` once the capture is over
    pub async fn next(&mut self) -> Option<u64> {
        loop {
            match self.rx.recv().await {
                Ok(ms) => return Some(ms),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Duration subscriber lagged by {} ticks", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = u64> {
        futures::stream::unfold(self, |mut updates| async move {
            updates.next().await.map(|ms| (ms, updates))
        })
    }
}

/// A capture in progress. Dropping it stops the ticker and releases the device.
struct ActiveCapture {
    handle: Box<dyn CaptureHandle>,
    elapsed: watch::Receiver<u64>,
    /// Largest elapsed value seen; shared with the ticker
    peak: Arc<AtomicU64>,
    updates: broadcast::Sender<u64>,
    ticker: JoinHandle<()>,
}

impl ActiveCapture {
    fn elapsed_millis(&self) -> u64 {
        observe(&self.peak, &self.elapsed)
    }
}

impl Drop for ActiveCapture {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

/// Owns the capture device for one recording at a time
pub struct CaptureController {
    device: Arc<dyn CaptureDevice>,
    config: CaptureConfig,
    tick: Duration,
    active: Option<ActiveCapture>,
    phase: CapturePhase,
    elapsed_millis: u64,
    media: Option<MediaHandle>,
}

impl CaptureController {
    pub fn new(device: Arc<dyn CaptureDevice>, config: CaptureConfig) -> Self {
        Self {
            device,
            config,
            tick: DEFAULT_TICK,
            active: None,
            phase: CapturePhase::Idle,
            elapsed_millis: 0,
            media: None,
        }
    }

    /// Override the duration update cadence
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn elapsed_millis(&self) -> u64 {
        match &self.active {
            Some(active) => active.elapsed_millis(),
            None => self.elapsed_millis,
        }
    }

    pub fn state(&self) -> CaptureState {
        CaptureState {
            phase: self.phase,
            elapsed_millis: self.elapsed_millis(),
            media: self.media.clone(),
        }
    }

    /// Subscribe to the current capture's duration updates
    pub fn subscribe(&self) -> Option<DurationUpdates> {
        self.active.as_ref().map(|active| DurationUpdates {
            rx: active.updates.subscribe(),
        })
    }

    /// Acquire the device and start recording
    pub async fn start(&mut self) -> Result<(), CaptureError> {
        if self.active.is_some() {
            warn!("Capture already in progress");
            return Err(CaptureError::AlreadyRecording);
        }

        if self.device.request_permission().await == Permission::Denied {
            warn!("Microphone permission denied");
            return Err(CaptureError::PermissionDenied);
        }

        let handle = self.device.start(&self.config).await.map_err(|e| {
            warn!("Failed to start {}: {}", self.device.name(), e);
            e
        })?;

        let elapsed = handle.elapsed();
        let (updates, _) = broadcast::channel(64);
        let peak = Arc::new(AtomicU64::new(0));
        let ticker = spawn_ticker(
            elapsed.clone(),
            Arc::clone(&peak),
            updates.clone(),
            self.tick,
        );

        self.active = Some(ActiveCapture {
            handle,
            elapsed,
            peak,
            updates,
            ticker,
        });
        self.phase = CapturePhase::Recording;
        self.elapsed_millis = 0;
        self.media = None;

        info!("Capture started on {}", self.device.name());
        Ok(())
    }

    /// Finalize the current recording.
    ///
    /// Returns `Ok(None)` when not recording or when the device produced
    /// nothing. The device is released on every path.
    pub async fn stop(&mut self) -> Result<Option<FinishedCapture>, CaptureError> {
        let Some(mut active) = self.active.take() else {
            return Ok(None);
        };

        active.ticker.abort();
        let last_elapsed = active.elapsed_millis();
        let outcome = active.handle.stop().await;
        drop(active);

        match outcome {
            Ok(Some(finished)) => {
                info!(
                    "Capture stopped: {} ({} ms)",
                    finished.media, finished.duration_millis
                );
                self.phase = CapturePhase::Stopped;
                self.elapsed_millis = finished.duration_millis;
                self.media = Some(finished.media.clone());
                Ok(Some(finished))
            }
            Ok(None) => {
                info!("Capture stopped with no audio");
                self.phase = CapturePhase::Idle;
                self.elapsed_millis = last_elapsed;
                Ok(None)
            }
            Err(e) => {
                warn!("Capture failed to finalize: {}", e);
                self.phase = CapturePhase::Idle;
                self.elapsed_millis = last_elapsed;
                Err(e)
            }
        }
    }

    /// Discard the current recording. Returns `false` if nothing was recording.
    pub async fn cancel(&mut self) -> bool {
        let Some(mut active) = self.active.take() else {
            return false;
        };

        active.ticker.abort();
        self.elapsed_millis = active.elapsed_millis();
        if let Err(e) = active.handle.discard().await {
            warn!("Failed to discard capture cleanly: {}", e);
        }
        drop(active);

        self.phase = CapturePhase::Idle;
        self.media = None;
        info!("Capture cancelled");
        true
    }

    /// Release the device ahead of process exit
    pub async fn shutdown(&mut self) {
        if self.cancel().await {
            info!("Capture discarded on shutdown");
        }
    }
}

/// Elapsed time never goes backwards, even if the device reports it does
fn observe(peak: &AtomicU64, elapsed: &watch::Receiver<u64>) -> u64 {
    let now = *elapsed.borrow();
    peak.fetch_max(now, Ordering::Relaxed).max(now)
}

fn spawn_ticker(
    elapsed: watch::Receiver<u64>,
    peak: Arc<AtomicU64>,
    updates: broadcast::Sender<u64>,
    tick: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            // No subscribers is fine
            let _ = updates.send(observe(&peak, &elapsed));
        }
    })
}
