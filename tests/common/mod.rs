// Shared fakes for integration tests
//
// FakeCaptureDevice counts device acquisitions and releases so tests can
// assert the device is never leaked. ScriptedAnalysis replays queued
// responses and records which media it was asked to analyze.

#![allow(dead_code)]

use speakeasy_coach::analysis::{
    AnalysisResult, AnalysisScores, FillerWord, MarkerCategory, ProsodyMetrics, Severity,
    TimelineMarker,
};
use speakeasy_coach::capture::{
    CaptureConfig, CaptureController, CaptureDevice, CaptureHandle, FinishedCapture, Permission,
};
use speakeasy_coach::{AnalysisError, AnalysisService, CaptureError, Catalog, MediaHandle, Orchestrator};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

pub const TEST_TICK: Duration = Duration::from_millis(10);

#[derive(Default)]
struct DeviceState {
    acquired: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
    deny_permission: AtomicBool,
    fail_start: AtomicBool,
    produce_nothing: AtomicBool,
    elapsed: Mutex<Option<watch::Sender<u64>>>,
}

impl DeviceState {
    fn release(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed = None;
        }
    }
}

/// In-memory capture device
#[derive(Clone, Default)]
pub struct FakeCaptureDevice {
    state: Arc<DeviceState>,
}

impl FakeCaptureDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_permission(&self) {
        self.state.deny_permission.store(true, Ordering::SeqCst);
    }

    pub fn fail_start(&self, fail: bool) {
        self.state.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn produce_nothing(&self, nothing: bool) {
        self.state.produce_nothing.store(nothing, Ordering::SeqCst);
    }

    /// Advance the elapsed time of the capture in progress
    pub fn set_elapsed(&self, millis: u64) {
        if let Some(tx) = self.state.elapsed.lock().unwrap().as_ref() {
            tx.send_replace(millis);
        }
    }

    pub fn acquired(&self) -> usize {
        self.state.acquired.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.state.max_live.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CaptureDevice for FakeCaptureDevice {
    async fn request_permission(&self) -> Permission {
        if self.state.deny_permission.load(Ordering::SeqCst) {
            Permission::Denied
        } else {
            Permission::Granted
        }
    }

    async fn start(&self, config: &CaptureConfig) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        if self.state.fail_start.load(Ordering::SeqCst) {
            return Err(CaptureError::DeviceError("fake device busy".to_string()));
        }

        let n = self.state.acquired.fetch_add(1, Ordering::SeqCst) + 1;
        let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_live.fetch_max(live, Ordering::SeqCst);

        let (tx, rx) = watch::channel(0);
        *self.state.elapsed.lock().unwrap() = Some(tx);

        Ok(Box::new(FakeHandle {
            state: Arc::clone(&self.state),
            elapsed: rx,
            media: MediaHandle::new(format!("/tmp/fake/take-{}.{}", n, config.container)),
            released: false,
        }))
    }

    fn name(&self) -> &str {
        "fake device"
    }
}

struct FakeHandle {
    state: Arc<DeviceState>,
    elapsed: watch::Receiver<u64>,
    media: MediaHandle,
    released: bool,
}

impl FakeHandle {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.state.release();
        }
    }
}

#[async_trait::async_trait]
impl CaptureHandle for FakeHandle {
    fn elapsed(&self) -> watch::Receiver<u64> {
        self.elapsed.clone()
    }

    async fn stop(&mut self) -> Result<Option<FinishedCapture>, CaptureError> {
        let duration_millis = *self.elapsed.borrow();
        self.release();

        if self.state.produce_nothing.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(FinishedCapture {
            media: self.media.clone(),
            duration_millis,
        }))
    }

    async fn discard(&mut self) -> Result<(), CaptureError> {
        self.release();
        Ok(())
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Analysis service answering from a queue of canned responses
#[derive(Default)]
pub struct ScriptedAnalysis {
    script: Mutex<VecDeque<Result<AnalysisResult, AnalysisError>>>,
    seen: Mutex<Vec<MediaHandle>>,
    unhealthy: AtomicBool,
    delay: Mutex<Duration>,
}

impl ScriptedAnalysis {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: Result<AnalysisResult, AnalysisError>) {
        self.script.lock().unwrap().push_back(response);
    }

    /// Make every analysis take `delay` before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn media_seen(&self) -> Vec<MediaHandle> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AnalysisService for ScriptedAnalysis {
    async fn analyze(&self, media: &MediaHandle) -> Result<AnalysisResult, AnalysisError> {
        self.seen.lock().unwrap().push(media.clone());
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AnalysisError::NetworkUnreachable("no scripted response".to_string())))
    }

    async fn health_check(&self) -> bool {
        !self.unhealthy.load(Ordering::SeqCst)
    }
}

pub fn controller(device: &FakeCaptureDevice) -> CaptureController {
    CaptureController::new(Arc::new(device.clone()), CaptureConfig::default()).with_tick(TEST_TICK)
}

pub async fn orchestrator(device: &FakeCaptureDevice, analysis: Arc<ScriptedAnalysis>) -> Orchestrator {
    Orchestrator::new(controller(device), analysis, Catalog::in_memory().await).await
}

pub fn unreachable() -> AnalysisError {
    AnalysisError::NetworkUnreachable("connection refused".to_string())
}

/// A valid result with the given scores
pub fn sample_result(confidence: f64, clarity: f64, pacing: f64, nervousness: f64) -> AnalysisResult {
    AnalysisResult {
        scores: AnalysisScores {
            confidence,
            clarity,
            pacing,
            nervousness,
        },
        timeline_markers: vec![
            TimelineMarker {
                start: 2.0,
                end: 2.4,
                category: MarkerCategory::Filler,
                severity: Severity::Medium,
                color: "hsl(38, 92%, 50%)".to_string(),
                label: "Muletilla: 'este'".to_string(),
                reason: None,
            },
            TimelineMarker {
                start: 14.0,
                end: 16.5,
                category: MarkerCategory::Pause,
                severity: Severity::High,
                color: "hsl(0, 84%, 60%)".to_string(),
                label: "Pausa larga".to_string(),
                reason: Some("2.5s de silencio".to_string()),
            },
        ],
        filler_words: vec![FillerWord {
            word: "este".to_string(),
            start: 2.0,
            end: 2.4,
            confidence: 0.88,
        }],
        prosody_metrics: ProsodyMetrics {
            pitch_mean: 176.0,
            pitch_std: 18.2,
            tempo_bpm: 104.0,
            pause_count: 1,
            pause_locations: vec![14.0],
            energy_variance: 0.02,
            speech_rate_wpm: 131,
        },
        recommendations: vec!["Haz pausas mas cortas".to_string()],
        transcription: None,
        duration_seconds: 31.0,
        analyzed_at: "2026-10-16T10:00:00.000001".to_string(),
    }
}

/// Write a mono 16-bit WAV of `millis` of a quiet tone
pub fn write_wav(path: &std::path::Path, sample_rate: u32, millis: u64) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let total = sample_rate as u64 * millis / 1000;
    for i in 0..total {
        let t = i as f64 / sample_rate as f64;
        let sample = (t * 220.0 * std::f64::consts::TAU).sin() * 2000.0;
        writer.write_sample(sample as i16).unwrap();
    }
    writer.finalize().unwrap();
}
