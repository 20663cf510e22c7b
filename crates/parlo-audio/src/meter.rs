//! Live input level metering.
//!
//! The stream callback publishes the peak of each audio buffer into a
//! [`LevelProbe`]; a [`VolumeMeter`] task samples the probe at display
//! cadence, smooths it, and writes a `0..=255` scalar for the UI. Purely
//! advisory for rendering.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Cadence at which the meter publishes the level scalar.
pub const FRAME: Duration = Duration::from_millis(16);

/// Shared slot for the most recent buffer peak, written from the audio
/// stream callback and read from the meter task.
#[derive(Debug, Clone, Default)]
pub struct LevelProbe {
    raw: Arc<AtomicU32>,
}

impl LevelProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the peak amplitude of the latest buffer, in `[0, 1]`.
    pub fn set_peak(&self, peak: f32) {
        self.raw
            .store(peak.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn peak(&self) -> f32 {
        f32::from_bits(self.raw.load(Ordering::Relaxed))
    }
}

/// Periodic sampling task tied to the lifetime of one recording cycle.
///
/// Stopping the meter cancels the task and resets the published scalar to 0
/// so a torn-down cycle never leaves a stale level behind.
pub struct VolumeMeter {
    task: JoinHandle<()>,
    scalar: Arc<AtomicU8>,
}

impl VolumeMeter {
    /// Spawn the sampling loop. `scalar` is the published `0..=255` level.
    pub fn start(probe: LevelProbe, scalar: Arc<AtomicU8>) -> Self {
        let published = scalar.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(FRAME);
            let mut smoothed = 0.0f32;
            loop {
                interval.tick().await;
                smoothed = smooth_level(smoothed, probe.peak(), FRAME);
                published.store(level_to_byte(smoothed), Ordering::Relaxed);
            }
        });
        Self { task, scalar }
    }

    /// Cancel the sampling loop and zero the published scalar.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for VolumeMeter {
    fn drop(&mut self) {
        self.task.abort();
        self.scalar.store(0, Ordering::Relaxed);
    }
}

fn level_to_byte(level: f32) -> u8 {
    (level.clamp(0.0, 1.0) * 255.0) as u8
}

/// Exponential smoothing with a 150ms time constant.
pub fn smooth_level(prev: f32, next: f32, dt: Duration) -> f32 {
    let tau = 0.15f32;
    let alpha = 1.0 - (-dt.as_secs_f32() / tau).exp();
    prev + (next - prev) * alpha
}
