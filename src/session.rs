//! The session controller: owns the recording state machine and the
//! conversation transcript, and coordinates capture and translation.
//!
//! All transcript mutation goes through this type. Recording cycles are
//! serialized by state (`Idle -> Recording -> Processing -> Idle`); text
//! submissions run independently of the recorder and of each other, each
//! resolving its own placeholder by id.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use parlo_audio::{AudioCapture, CaptureHandle, LevelProbe, VolumeMeter};
use parlo_core::{RecorderState, SessionEvent, Transcript, TranscriptItem};
use parlo_translate::{TranslateInput, Translator};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

/// Shown when the service stays rate limited after retries.
pub const BUSY_TEXT: &str = "Service busy, try again.";

/// Shown when translation fails for any other reason.
pub const ERROR_TEXT: &str = "Error during translation.";

struct Cycle {
    handle: Box<dyn CaptureHandle>,
    meter: VolumeMeter,
}

struct Inner {
    state: RecorderState,
    transcript: Transcript,
    cycle: Option<Cycle>,
}

/// Coordinates microphone capture and translation over one shared session.
///
/// Cheap to clone; all clones share the same state and transcript.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Mutex<Inner>>,
    capture: Arc<dyn AudioCapture>,
    translator: Arc<dyn Translator>,
    events: UnboundedSender<SessionEvent>,
    volume: Arc<AtomicU8>,
}

impl SessionController {
    /// Create a controller and the event stream the renderer consumes.
    pub fn new(
        capture: Arc<dyn AudioCapture>,
        translator: Arc<dyn Translator>,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            inner: Arc::new(Mutex::new(Inner {
                state: RecorderState::Idle,
                transcript: Transcript::new(),
                cycle: None,
            })),
            capture,
            translator,
            events,
            volume: Arc::new(AtomicU8::new(0)),
        };
        (controller, receiver)
    }

    /// Current recorder state.
    pub fn state(&self) -> RecorderState {
        self.inner.lock().state
    }

    /// Current meter level, 0 when no recording cycle is active.
    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::Relaxed)
    }

    /// Snapshot of the conversation for rendering.
    pub fn transcript(&self) -> Vec<TranscriptItem> {
        self.inner.lock().transcript.items().to_vec()
    }

    /// Begin a recording cycle. A no-op while already recording or
    /// processing; a capture failure latches the Error state and leaves the
    /// transcript untouched.
    pub fn start_recording(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            RecorderState::Recording | RecorderState::Processing => {
                debug!(state = ?inner.state, "mic toggle ignored");
                return;
            }
            RecorderState::Idle | RecorderState::Error => {}
        }

        let probe = LevelProbe::new();
        match self.capture.begin(probe.clone()) {
            Ok(handle) => {
                let meter = VolumeMeter::start(probe, self.volume.clone());
                inner.cycle = Some(Cycle { handle, meter });
                self.set_state(&mut inner, RecorderState::Recording);
            }
            Err(e) => {
                error!(error = %e, "Failed to start recording");
                self.set_state(&mut inner, RecorderState::Error);
            }
        }
    }

    /// End the active recording cycle: encode the captured audio, submit it
    /// for translation, and resolve the resulting transcript item.
    ///
    /// The transition to Processing happens before the first suspension
    /// point; capture resources are released exactly once per cycle, on
    /// every path out of this function.
    pub async fn stop_recording(&self) {
        let cycle = {
            let mut inner = self.inner.lock();
            if inner.state != RecorderState::Recording {
                debug!(state = ?inner.state, "stop ignored, not recording");
                return;
            }
            self.set_state(&mut inner, RecorderState::Processing);
            inner.cycle.take()
        };

        let Some(Cycle { mut handle, meter }) = cycle else {
            warn!("recording state without an active capture");
            self.set_state(&mut self.inner.lock(), RecorderState::Error);
            return;
        };

        let outcome = match handle.end() {
            Ok(recording) => {
                info!(
                    bytes = recording.data().len(),
                    length_seconds = recording.duration().as_secs_f64(),
                    "audio captured"
                );
                let placeholder = {
                    let mut inner = self.inner.lock();
                    let item = inner.transcript.push_placeholder();
                    self.events.send(SessionEvent::ItemAdded(item.clone())).ok();
                    item
                };
                let result = self
                    .translator
                    .translate(TranslateInput::Audio {
                        mime_type: recording.mime_type().to_owned(),
                        data: recording.into_data(),
                    })
                    .await;
                Some((placeholder.id, result))
            }
            Err(e) => {
                error!(error = %e, "Failed to finish recording");
                None
            }
        };

        // Release the cycle's resources: stop the meter (zeroing the level)
        // and drop the capture handle (releasing the device).
        meter.stop();
        drop(handle);

        let mut inner = self.inner.lock();
        match outcome {
            Some((id, result)) => {
                let text = resolution_text(result);
                if inner.transcript.resolve(id, text.clone()) {
                    self.events.send(SessionEvent::ItemResolved { id, text }).ok();
                }
                // Stays latched if an error condition set in the meantime.
                if inner.state == RecorderState::Processing {
                    self.set_state(&mut inner, RecorderState::Idle);
                }
            }
            None => self.set_state(&mut inner, RecorderState::Error),
        }
    }

    /// Translate a typed utterance. Independent of the recorder state; any
    /// number of submissions may be in flight, each resolving its own
    /// placeholder.
    pub async fn submit_text(&self, text: impl Into<String>) {
        let text = text.into();
        let placeholder = {
            let mut inner = self.inner.lock();
            let source = inner.transcript.push_source(text.clone());
            self.events.send(SessionEvent::ItemAdded(source)).ok();
            let item = inner.transcript.push_placeholder();
            self.events.send(SessionEvent::ItemAdded(item.clone())).ok();
            item
        };

        let result = self.translator.translate(TranslateInput::Text(text)).await;

        let text = resolution_text(result);
        let mut inner = self.inner.lock();
        if inner.transcript.resolve(placeholder.id, text.clone()) {
            self.events
                .send(SessionEvent::ItemResolved {
                    id: placeholder.id,
                    text,
                })
                .ok();
        }
    }

    /// Empty the conversation history. Clearing an empty transcript is a
    /// no-op.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        if inner.transcript.is_empty() {
            return;
        }
        inner.transcript.clear();
        self.events.send(SessionEvent::TranscriptCleared).ok();
    }

    fn set_state(&self, inner: &mut Inner, state: RecorderState) {
        if inner.state == state {
            return;
        }
        info!(from = ?inner.state, to = ?state, "session state");
        inner.state = state;
        self.events.send(SessionEvent::StateChanged(state)).ok();
    }
}

/// User-facing text a settled translation resolves to.
fn resolution_text(result: parlo_translate::Result<String>) -> String {
    match result {
        Ok(text) => text,
        Err(e) if e.is_rate_limited() => {
            warn!("translation rate limited after retries");
            BUSY_TEXT.to_owned()
        }
        Err(e) => {
            error!(error = %e, "translation failed");
            ERROR_TEXT.to_owned()
        }
    }
}
