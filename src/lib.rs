pub mod analysis;
pub mod audio;
pub mod capture;
pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod media;
pub mod orchestrator;

pub use analysis::{AnalysisClientConfig, AnalysisResult, AnalysisService, HttpAnalysisClient};
pub use audio::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame, AudioSource};
pub use capture::{CaptureConfig, CaptureController, CaptureDevice, CaptureHandle, WavCaptureDevice};
pub use catalog::{AnalysisStatus, Catalog, FileStore, KeyValueStore, MemoryStore, Session, SessionId};
pub use config::Config;
pub use error::{AnalysisError, CaptureError, FlowError, StorageError};
pub use http::{create_router, AppState};
pub use media::MediaHandle;
pub use orchestrator::{FlowPhase, FlowState, FlowStatus, Orchestrator};
