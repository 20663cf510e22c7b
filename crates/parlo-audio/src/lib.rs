//! Microphone capture and level metering for parlo.
//!
//! Capture is exposed behind the [`AudioCapture`]/[`CaptureHandle`] traits so
//! the session controller can be exercised without a real device. The cpal
//! implementation lives in [`capture`].

mod capture;
mod meter;

use std::time::Duration;

pub use capture::Recorder;
pub use meter::{FRAME, LevelProbe, VolumeMeter, smooth_level};
use thiserror::Error;

/// Errors that can occur while acquiring or ending a capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The OS refused access to the microphone
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),
    /// No input device available, or the device went away
    #[error("no input device available")]
    DeviceUnavailable,
    /// The capture ended without collecting any audio frames
    #[error("recording produced no audio data")]
    EmptyCapture,
    /// Sample format not supported
    #[error("sample format not supported: {0}")]
    SampleFormatNotSupported(String),
    /// generic anyhow error
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Result type for capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Source of microphone recordings.
///
/// `begin` acquires an exclusive hold on the device; the returned handle
/// releases it on every exit path, including drop.
pub trait AudioCapture: Send + Sync {
    /// Start capturing. The probe receives the live amplitude of each audio
    /// buffer for the volume meter.
    fn begin(&self, probe: LevelProbe) -> Result<Box<dyn CaptureHandle>>;
}

/// Handle to an active capture. Ending it stops the stream, releases the
/// device and returns the encoded audio.
pub trait CaptureHandle: Send {
    fn end(&mut self) -> Result<Recording>;
}

/// An encoded recording ready for submission.
#[derive(Debug, Clone)]
pub struct Recording {
    data: Vec<u8>,
    mime_type: &'static str,
    sample_rate: u32,
    channels: u16,
    samples: usize,
}

impl Recording {
    pub fn new(
        data: Vec<u8>,
        mime_type: &'static str,
        sample_rate: u32,
        channels: u16,
        samples: usize,
    ) -> Self {
        Self {
            data,
            mime_type,
            sample_rate,
            channels,
            samples,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Declared container format of `data`.
    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Total samples written across all channels.
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples as f64 / self.channels as f64;
        Duration::from_secs_f64(frames / self.sample_rate as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_duration() {
        let recording = Recording::new(vec![0; 4], "audio/wav", 16_000, 1, 16_000);
        assert_eq!(recording.duration(), Duration::from_secs(1));

        let stereo = Recording::new(vec![0; 4], "audio/wav", 16_000, 2, 16_000);
        assert_eq!(stereo.duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_recording_duration_degenerate() {
        let recording = Recording::new(vec![], "audio/wav", 0, 0, 0);
        assert_eq!(recording.duration(), Duration::ZERO);
    }
}
