use tokio::sync::watch;

use crate::error::CaptureError;
use crate::media::MediaHandle;

/// Outcome of a microphone permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Recording format requested from the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Encoder bit rate for compressed containers
    pub bit_rate: u32,
    /// Container extension, e.g. `m4a`
    pub container: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
            bit_rate: 128_000,
            container: "m4a".to_string(),
        }
    }
}

/// A finalized recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedCapture {
    pub media: MediaHandle,
    pub duration_millis: u64,
}

/// Audio capture capability
#[async_trait::async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn request_permission(&self) -> Permission;

    /// Acquire the device and begin recording
    async fn start(&self, config: &CaptureConfig) -> Result<Box<dyn CaptureHandle>, CaptureError>;

    fn name(&self) -> &str;
}

/// An acquired device mid-recording
///
/// Dropping a handle must release the device even if neither `stop` nor
/// `discard` was called.
#[async_trait::async_trait]
pub trait CaptureHandle: Send + Sync {
    /// Elapsed recording time in milliseconds, updated by the device
    fn elapsed(&self) -> watch::Receiver<u64>;

    /// Finalize the payload and release the device. `None` if nothing was
    /// recorded.
    async fn stop(&mut self) -> Result<Option<FinishedCapture>, CaptureError>;

    /// Throw the payload away and release the device
    async fn discard(&mut self) -> Result<(), CaptureError>;
}
