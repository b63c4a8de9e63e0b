pub mod backend;
pub mod file;
pub mod writer;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use file::{AudioFile, FileBackend};
pub use writer::TakeWriter;
