//! Recording session state types.

/// The current state of the recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    /// Idle, not recording
    #[default]
    Idle,
    /// Actively recording audio
    Recording,
    /// Processing recorded audio (waiting on translation)
    Processing,
    /// A capture failure latched; cleared by starting a new recording
    Error,
}
