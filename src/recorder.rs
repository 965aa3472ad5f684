//! Monitor recording: tap frames appended to a WAV file.

use crate::error::RecordError;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Writes successive time-domain tap frames to a 16-bit mono WAV.
///
/// This captures what the tap observes at the cadence the caller reads
/// it, a monitor feed for later inspection rather than a sample-exact
/// copy of the engine output.
pub struct MonitorRecorder {
    writer: Option<WavWriter<BufWriter<File>>>,
    frames: u64,
}

impl MonitorRecorder {
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self, RecordError> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        Ok(Self {
            writer: Some(WavWriter::create(path, spec)?),
            frames: 0,
        })
    }

    /// Append one frame of samples in the -1..1 range.
    pub fn write_frame(&mut self, frame: &[f32]) -> Result<(), RecordError> {
        if let Some(writer) = self.writer.as_mut() {
            for &sample in frame {
                let clamped = sample.clamp(-1.0, 1.0);
                writer.write_sample((clamped * i16::MAX as f32) as i16)?;
            }
            self.frames += 1;
        }
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    /// Flush headers and close the file.
    pub fn finalize(mut self) -> Result<(), RecordError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

impl Drop for MonitorRecorder {
    fn drop(&mut self) {
        // Best-effort header fixup for recorders dropped mid-session.
        if let Some(writer) = self.writer.take() {
            let _ = writer.finalize();
        }
    }
}
