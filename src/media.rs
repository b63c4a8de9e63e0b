use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Reference to a finalized recording on disk
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaHandle(PathBuf);

impl MediaHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Lowercased container extension, if any
    pub fn extension(&self) -> Option<String> {
        self.0
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    /// MIME type sent with the upload
    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("m4a") | Some("mp4") => "audio/mp4",
            Some("wav") => "audio/wav",
            Some("webm") => "audio/webm",
            Some("mp3") => "audio/mpeg",
            Some("ogg") => "audio/ogg",
            _ => "application/octet-stream",
        }
    }

    /// File name used for the multipart upload (`recording.<ext>`)
    pub fn upload_file_name(&self) -> String {
        match self.extension() {
            Some(ext) => format!("recording.{}", ext),
            None => "recording".to_string(),
        }
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_from_extension() {
        assert_eq!(MediaHandle::new("/tmp/a.m4a").mime_type(), "audio/mp4");
        assert_eq!(MediaHandle::new("/tmp/a.WAV").mime_type(), "audio/wav");
        assert_eq!(MediaHandle::new("/tmp/a.webm").mime_type(), "audio/webm");
        assert_eq!(
            MediaHandle::new("/tmp/a").mime_type(),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_upload_file_name() {
        assert_eq!(
            MediaHandle::new("/data/take-1234.wav").upload_file_name(),
            "recording.wav"
        );
        assert_eq!(MediaHandle::new("/data/take").upload_file_name(), "recording");
    }
}
