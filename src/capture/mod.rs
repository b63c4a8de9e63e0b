//! Capture controller and devices
//!
//! - `CaptureDevice` / `CaptureHandle`: the device capability boundary
//! - `CaptureController`: one recording at a time, elapsed-time updates,
//!   device release on every exit path
//! - `WavCaptureDevice`: records an audio backend's frames to WAV takes

mod controller;
mod device;
mod wav;

pub use controller::{CaptureController, CapturePhase, CaptureState, DurationUpdates, DEFAULT_TICK};
pub use device::{CaptureConfig, CaptureDevice, CaptureHandle, FinishedCapture, Permission};
pub use wav::WavCaptureDevice;
