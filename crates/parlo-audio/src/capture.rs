//! Module for managing audio recording. There can only be one active
//! recording at a time and storage/processes are not managed by this module.
//!
//! The cpal stream is not `Send`, so each capture runs on a dedicated thread
//! that owns the stream for its whole lifetime. `begin` waits for the thread
//! to report the stream is live; `end` signals it to stop, joins it, and
//! receives the finalized WAV bytes.

use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SupportedStreamConfig};
use hound::WavWriter;
use parking_lot::Mutex;
use tracing::{error, info};

use crate::meter::LevelProbe;
use crate::{AudioCapture, CaptureError, CaptureHandle, Recording, Result};

/// Container format of finished recordings.
const WAV_MIME: &str = "audio/wav";

/// Sample formats to try, most preferred first. The device default is the
/// baseline when none of these are supported.
const PREFERRED_FORMATS: &[SampleFormat] =
    &[SampleFormat::F32, SampleFormat::I16, SampleFormat::I32];

/// How long to wait for the capture thread to bring the stream up.
const READY_TIMEOUT: Duration = Duration::from_secs(3);

/// How long to wait for the capture thread to deliver the finished audio.
const FINISH_TIMEOUT: Duration = Duration::from_secs(5);

type WavWriterHandle = Arc<Mutex<Option<WavWriter<MemoryWriter>>>>;

/// A cheaply cloneable handle to the inner data that is being recorded. The
/// finalize method for the wav writer does not return the inner data, so we
/// store it behind an Arc<Mutex> to allow for cheap cloning and access to the
/// inner data.
#[derive(Debug, Clone)]
struct MemoryWriter {
    inner: Arc<Mutex<Cursor<Vec<u8>>>>,
}

impl MemoryWriter {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Cursor::new(Vec::with_capacity(8 * 1024)))),
        }
    }

    fn try_into_inner(self) -> Result<Vec<u8>> {
        // Attempt to own the inner arc
        let owned = Arc::try_unwrap(self.inner).map_err(|_| {
            CaptureError::Anyhow(anyhow!("Failed to unwrap inner Arc in MemoryWriter"))
        })?;
        // Extract the cursor, then the Vec
        let cursor = owned.into_inner();
        Ok(cursor.into_inner())
    }
}

impl Seek for MemoryWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.lock().seek(pos)
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// cpal-backed implementation of [`AudioCapture`].
#[derive(Debug, Default)]
pub struct Recorder;

impl Recorder {
    pub fn new() -> Self {
        Self
    }
}

impl AudioCapture for Recorder {
    fn begin(&self, probe: LevelProbe) -> Result<Box<dyn CaptureHandle>> {
        let (stop_tx, stop_rx) = channel::<()>();
        let (ready_tx, ready_rx) = channel::<Result<()>>();
        let (done_tx, done_rx) = channel::<Result<Recording>>();

        let thread = std::thread::spawn(move || {
            capture_thread(probe, stop_rx, ready_tx, done_tx);
        });

        match ready_rx.recv_timeout(READY_TIMEOUT) {
            Ok(Ok(())) => Ok(Box::new(RecordingHandle {
                stop_tx,
                done_rx,
                thread: Some(thread),
                finished: false,
            })),
            Ok(Err(e)) => {
                thread.join().ok();
                Err(e)
            }
            Err(_) => {
                // Thread wedged during device setup; signal it and give up.
                stop_tx.send(()).ok();
                Err(CaptureError::Anyhow(anyhow!(
                    "timed out waiting for the input stream to start"
                )))
            }
        }
    }
}

/// Handle to the active recording. `end` must be called to receive the data;
/// dropping the handle stops the stream and releases the device regardless.
struct RecordingHandle {
    stop_tx: Sender<()>,
    done_rx: Receiver<Result<Recording>>,
    thread: Option<JoinHandle<()>>,
    finished: bool,
}

impl CaptureHandle for RecordingHandle {
    fn end(&mut self) -> Result<Recording> {
        self.finished = true;
        self.stop_tx.send(()).ok();

        let result = match self.done_rx.recv_timeout(FINISH_TIMEOUT) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(CaptureError::Anyhow(anyhow!(
                "capture thread did not deliver audio in time"
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::Anyhow(anyhow!(
                "capture thread ended without delivering audio"
            ))),
        };

        if let Some(thread) = self.thread.take() {
            thread.join().ok();
        }

        let recording = result?;
        if recording.samples() == 0 {
            return Err(CaptureError::EmptyCapture);
        }
        Ok(recording)
    }
}

impl Drop for RecordingHandle {
    fn drop(&mut self) {
        if !self.finished {
            self.stop_tx.send(()).ok();
            if let Some(thread) = self.thread.take() {
                thread.join().ok();
            }
        }
    }
}

/// Body of the dedicated capture thread: owns the device and stream, writes
/// samples until stopped, then finalizes the WAV container.
fn capture_thread(
    probe: LevelProbe,
    stop_rx: Receiver<()>,
    ready_tx: Sender<Result<()>>,
    done_tx: Sender<Result<Recording>>,
) {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(device) => device,
        None => {
            ready_tx.send(Err(CaptureError::DeviceUnavailable)).ok();
            return;
        }
    };

    let config = match select_input_config(&device) {
        Ok(config) => config,
        Err(e) => {
            ready_tx.send(Err(e)).ok();
            return;
        }
    };

    info!(
        device_name = %device.name().unwrap_or_else(|_| "<unknown>".into()),
        sample_format = ?config.sample_format(),
        "Recording from device"
    );

    let spec = wav_spec_from_config(&config);
    let sample_rate = config.sample_rate().0;
    let channels = config.channels();

    let buffer = MemoryWriter::new();
    let writer = match WavWriter::new(buffer.clone(), spec) {
        Ok(writer) => Arc::new(Mutex::new(Some(writer))),
        Err(e) => {
            ready_tx.send(Err(CaptureError::Anyhow(e.into()))).ok();
            return;
        }
    };

    let writer_2 = writer.clone();

    let err_fn = move |err| {
        error!("an error occurred on stream: {}", err);
    };

    let stream = match config.sample_format() {
        SampleFormat::F32 => device.build_input_stream(
            &config.into(),
            move |data: &[f32], _: &_| write_input_data::<f32, f32>(data, &writer_2, &probe),
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config.into(),
            move |data: &[i16], _: &_| write_input_data::<i16, i16>(data, &writer_2, &probe),
            err_fn,
            None,
        ),
        SampleFormat::I32 => device.build_input_stream(
            &config.into(),
            move |data: &[i32], _: &_| write_input_data::<i32, i32>(data, &writer_2, &probe),
            err_fn,
            None,
        ),
        sample_format => {
            ready_tx
                .send(Err(CaptureError::SampleFormatNotSupported(format!(
                    "{:?}",
                    sample_format
                ))))
                .ok();
            return;
        }
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            ready_tx.send(Err(map_build_error(e))).ok();
            return;
        }
    };

    if let Err(e) = stream.play() {
        ready_tx
            .send(Err(CaptureError::Anyhow(anyhow!(
                "failed to play stream: {e}"
            ))))
            .ok();
        return;
    }

    ready_tx.send(Ok(())).ok();

    // Capture until the handle asks us to stop (or is dropped).
    stop_rx.recv().ok();

    // Release the device before finalizing so the hold never outlives this
    // function, even if finalization fails.
    drop(stream);

    done_tx
        .send(finalize(writer, buffer, sample_rate, channels))
        .ok();
}

fn finalize(
    writer: WavWriterHandle,
    buffer: MemoryWriter,
    sample_rate: u32,
    channels: u16,
) -> Result<Recording> {
    let writer = writer
        .lock()
        .take()
        .ok_or_else(|| CaptureError::Anyhow(anyhow!("writer already finalized")))?;
    let samples = writer.len() as usize;
    // Finalize the writer so it writes the proper framing information.
    writer
        .finalize()
        .map_err(|e| CaptureError::Anyhow(anyhow!("Failed to finalize writer: {}", e)))?;
    let data = buffer.try_into_inner()?;
    Ok(Recording::new(data, WAV_MIME, sample_rate, channels, samples))
}

/// Pick an input config from the preferred sample formats, falling back to
/// whatever the device reports as its default.
fn select_input_config(device: &Device) -> Result<SupportedStreamConfig> {
    let default = device
        .default_input_config()
        .map_err(|_| CaptureError::DeviceUnavailable)?;

    for &format in PREFERRED_FORMATS {
        if default.sample_format() == format {
            return Ok(default);
        }
        if let Ok(mut supported) = device.supported_input_configs() {
            if let Some(range) = supported.find(|range| range.sample_format() == format) {
                return Ok(range.with_max_sample_rate());
            }
        }
    }

    Ok(default)
}

fn map_build_error(e: cpal::BuildStreamError) -> CaptureError {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
        // OS-level microphone refusals surface as backend-specific errors.
        cpal::BuildStreamError::BackendSpecific { err } => {
            CaptureError::PermissionDenied(err.description)
        }
        e => CaptureError::Anyhow(anyhow!(e)),
    }
}

fn wav_spec_from_config(config: &SupportedStreamConfig) -> hound::WavSpec {
    hound::WavSpec {
        channels: config.channels(),
        sample_rate: config.sample_rate().0,
        bits_per_sample: (config.sample_format().sample_size() * 8) as _,
        sample_format: sample_format(config.sample_format()),
    }
}

fn sample_format(format: SampleFormat) -> hound::SampleFormat {
    if format.is_float() {
        hound::SampleFormat::Float
    } else {
        hound::SampleFormat::Int
    }
}

fn write_input_data<T, U>(input: &[T], writer: &WavWriterHandle, probe: &LevelProbe)
where
    T: Sample,
    U: Sample + hound::Sample + FromSample<T>,
    f32: FromSample<T>,
{
    let mut peak = 0.0f32;
    for &sample in input.iter() {
        let value = f32::from_sample(sample).abs();
        if value > peak {
            peak = value;
        }
    }
    probe.set_peak(peak);

    if let Some(mut guard) = writer.try_lock() {
        if let Some(writer) = guard.as_mut() {
            for &sample in input.iter() {
                let sample: U = U::from_sample(sample);
                writer.write_sample(sample).ok();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_writer_round_trip() {
        let buffer = MemoryWriter::new();
        let mut clone = buffer.clone();
        clone.write_all(b"abc").unwrap();
        clone.flush().unwrap();
        drop(clone);

        assert_eq!(buffer.try_into_inner().unwrap(), b"abc");
    }

    #[test]
    fn test_memory_writer_outstanding_clone() {
        let buffer = MemoryWriter::new();
        let clone = buffer.clone();
        assert!(buffer.try_into_inner().is_err());
        drop(clone);
    }

    #[test]
    fn test_wav_finalize_counts_samples() {
        let buffer = MemoryWriter::new();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let writer = Arc::new(Mutex::new(Some(WavWriter::new(buffer.clone(), spec).unwrap())));

        let probe = LevelProbe::new();
        write_input_data::<f32, f32>(&[0.0, 0.5, -0.25], &writer, &probe);

        let recording = finalize(writer, buffer, 16_000, 1).unwrap();
        assert_eq!(recording.samples(), 3);
        assert_eq!(recording.mime_type(), "audio/wav");
        assert!(!recording.data().is_empty());
        assert!(probe.peak() > 0.4);
    }

    #[test]
    fn test_finalize_empty_capture() {
        let buffer = MemoryWriter::new();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let writer = Arc::new(Mutex::new(Some(WavWriter::new(buffer.clone(), spec).unwrap())));

        let recording = finalize(writer, buffer, 16_000, 1).unwrap();
        assert_eq!(recording.samples(), 0);
    }
}
