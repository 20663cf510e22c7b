//! Conversation transcript model.
//!
//! The transcript is an append-only sequence of items. Translation items are
//! created as placeholders and resolved in place exactly once; insertion
//! order is display order.

use std::time::SystemTime;

use tracing::warn;

/// Text shown for a translation item that has not resolved yet.
pub const PENDING_TEXT: &str = "…";

/// Unique token identifying a transcript item for in-place resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

/// Which side of the conversation an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Original-language input (spoken or typed)
    Source,
    /// Translated output
    Translation,
}

/// A single entry in the conversation.
#[derive(Debug, Clone)]
pub struct TranscriptItem {
    pub id: ItemId,
    pub text: String,
    pub origin: Origin,
    pub created_at: SystemTime,
    resolved: bool,
}

impl TranscriptItem {
    /// Whether this item still shows its placeholder text.
    pub fn is_pending(&self) -> bool {
        self.origin == Origin::Translation && !self.resolved
    }
}

/// Ordered, append-only transcript owned by the session.
#[derive(Debug, Default)]
pub struct Transcript {
    items: Vec<TranscriptItem>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a source-language item with its final text.
    pub fn push_source(&mut self, text: impl Into<String>) -> TranscriptItem {
        let id = self.next_id();
        let item = TranscriptItem {
            id,
            text: text.into(),
            origin: Origin::Source,
            created_at: SystemTime::now(),
            resolved: true,
        };
        self.items.push(item.clone());
        item
    }

    /// Append a pending translation item. The returned id is the only way to
    /// resolve it later.
    pub fn push_placeholder(&mut self) -> TranscriptItem {
        let id = self.next_id();
        let item = TranscriptItem {
            id,
            text: PENDING_TEXT.to_owned(),
            origin: Origin::Translation,
            created_at: SystemTime::now(),
            resolved: false,
        };
        self.items.push(item.clone());
        item
    }

    /// Replace a placeholder's text with its final value. Returns false if
    /// the id is unknown or the item was already resolved; the text is never
    /// mutated twice.
    pub fn resolve(&mut self, id: ItemId, text: impl Into<String>) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            warn!(id = ?id, "resolve for unknown transcript item");
            return false;
        };
        if item.resolved {
            warn!(id = ?id, "transcript item already resolved");
            return false;
        }
        item.text = text.into();
        item.resolved = true;
        true
    }

    /// Empty the transcript. Clearing an empty transcript is a no-op.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[TranscriptItem] {
        &self.items
    }

    pub fn get(&self, id: ItemId) -> Option<&TranscriptItem> {
        self.items.iter().find(|i| i.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_display_order() {
        let mut transcript = Transcript::new();
        let a = transcript.push_source("hola");
        let b = transcript.push_placeholder();
        let c = transcript.push_source("adios");

        let ids: Vec<_> = transcript.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[test]
    fn test_placeholder_starts_pending() {
        let mut transcript = Transcript::new();
        let item = transcript.push_placeholder();
        assert!(transcript.get(item.id).unwrap().is_pending());
        assert_eq!(transcript.get(item.id).unwrap().text, PENDING_TEXT);
    }

    #[test]
    fn test_resolve_mutates_exactly_once() {
        let mut transcript = Transcript::new();
        let item = transcript.push_placeholder();

        assert!(transcript.resolve(item.id, "hello"));
        assert_eq!(transcript.get(item.id).unwrap().text, "hello");
        assert!(!transcript.get(item.id).unwrap().is_pending());

        // Second resolve is rejected and leaves the text untouched.
        assert!(!transcript.resolve(item.id, "other"));
        assert_eq!(transcript.get(item.id).unwrap().text, "hello");
    }

    #[test]
    fn test_resolve_matches_by_id_not_position() {
        let mut transcript = Transcript::new();
        let a = transcript.push_placeholder();
        let b = transcript.push_placeholder();

        // Resolve the later item first.
        assert!(transcript.resolve(b.id, "second"));
        assert!(transcript.resolve(a.id, "first"));

        assert_eq!(transcript.get(a.id).unwrap().text, "first");
        assert_eq!(transcript.get(b.id).unwrap().text, "second");
    }

    #[test]
    fn test_resolve_unknown_id() {
        let mut transcript = Transcript::new();
        let item = transcript.push_placeholder();
        transcript.clear();
        assert!(!transcript.resolve(item.id, "late"));
    }

    #[test]
    fn test_clear() {
        let mut transcript = Transcript::new();
        transcript.push_source("uno");
        transcript.push_placeholder();
        assert!(!transcript.is_empty());

        transcript.clear();
        assert!(transcript.is_empty());

        // Clearing again is a no-op.
        transcript.clear();
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_ids_stay_unique_across_clear() {
        let mut transcript = Transcript::new();
        let a = transcript.push_source("uno");
        transcript.clear();
        let b = transcript.push_source("dos");
        assert_ne!(a.id, b.id);
    }
}
