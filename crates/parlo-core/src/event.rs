//! Event types for the translation session.
//!
//! These events are emitted by the session controller to communicate state
//! and transcript changes without depending on any specific UI framework.

use crate::{ItemId, RecorderState, TranscriptItem};

/// Events emitted by the session controller.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The recording state has changed
    StateChanged(RecorderState),
    /// A transcript item was appended
    ItemAdded(TranscriptItem),
    /// A pending transcript item received its final text
    ItemResolved { id: ItemId, text: String },
    /// The conversation history was cleared
    TranscriptCleared,
}
