use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::backend::AudioFrame;

/// Writes one take to disk as a 16-bit PCM WAV file
pub struct TakeWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    path: PathBuf,
    sample_rate: u32,
    channels: u16,
    sample_count: u64,
}

impl TakeWriter {
    pub fn create(path: impl Into<PathBuf>, sample_rate: u32, channels: u16) -> Result<Self> {
        let path = path.into();
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

        Ok(Self {
            writer: Some(writer),
            path,
            sample_rate,
            channels,
            sample_count: 0,
        })
    }

    pub fn write_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        if frame.sample_rate != self.sample_rate || frame.channels != self.channels {
            bail!(
                "Frame format changed mid-take: {}Hz/{}ch, expected {}Hz/{}ch",
                frame.sample_rate, frame.channels, self.sample_rate, self.channels
            );
        }

        if let Some(writer) = &mut self.writer {
            for &sample in &frame.samples {
                writer.write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            self.sample_count += frame.samples.len() as u64;
        }

        Ok(())
    }

    /// Audio written so far, in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.sample_count * 1000 / (self.sample_rate as u64 * self.channels as u64)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Finalize the file and return its duration in milliseconds
    pub fn finish(mut self) -> Result<u64> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()
                .context("Failed to finalize WAV file")?;
        }

        Ok(self.elapsed_ms())
    }
}

impl Drop for TakeWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
