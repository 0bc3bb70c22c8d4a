use std::fmt;

use chrono::{DateTime, Local};
use unicode_segmentation::UnicodeSegmentation;

use crate::core::message::Message;

/// Saved conversations kept in memory. Oldest entries beyond this are evicted.
pub const HISTORY_CAPACITY: usize = 20;

/// Title length limit, counted in grapheme clusters.
pub const TITLE_MAX_GRAPHEMES: usize = 50;

/// Title used when a conversation has no user message yet.
pub const DEFAULT_TITLE: &str = "New Chat";

/// An archived snapshot of a past conversation. The messages are copied out
/// of the live transcript, never aliased to it.
#[derive(Debug, Clone)]
pub struct SavedConversation {
    pub title: String,
    pub messages: Vec<Message>,
    pub saved_at: DateTime<Local>,
}

#[derive(Debug)]
pub enum HistoryError {
    IndexOutOfRange { index: usize, len: usize },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::IndexOutOfRange { index, len } => {
                write!(f, "history index {index} out of range (saved chats: {len})")
            }
        }
    }
}

impl std::error::Error for HistoryError {}

/// Most-recent-first list of saved conversations.
///
/// Invariants held after every operation: at most [`HISTORY_CAPACITY`]
/// entries, and no two entries whose messages compare element-wise equal.
#[derive(Default)]
pub struct ConversationHistory {
    entries: Vec<SavedConversation>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SavedConversation] {
        &self.entries
    }

    /// Whether a snapshot with the same message sequence is already saved.
    /// Compares message content, not identity; timestamps are ignored.
    pub fn contains(&self, messages: &[Message]) -> bool {
        self.entries.iter().any(|entry| entry.messages == messages)
    }

    /// Snapshot a transcript into the history.
    ///
    /// Empty and already-saved transcripts are left out and `None` is
    /// returned with the history unchanged. Otherwise the snapshot is
    /// inserted at the front, the tail is evicted past capacity, and the
    /// inserted index is returned.
    pub fn archive(&mut self, transcript: &[Message]) -> Option<usize> {
        if transcript.is_empty() || self.contains(transcript) {
            return None;
        }

        self.entries.insert(
            0,
            SavedConversation {
                title: derive_title(transcript),
                messages: transcript.to_vec(),
                saved_at: Local::now(),
            },
        );
        self.entries.truncate(HISTORY_CAPACITY);

        Some(0)
    }

    /// Pure lookup; does not mutate.
    pub fn get(&self, index: usize) -> Result<&SavedConversation, HistoryError> {
        self.entries.get(index).ok_or(HistoryError::IndexOutOfRange {
            index,
            len: self.entries.len(),
        })
    }

    /// Remove and return the entry at `index`. Later entries shift down by
    /// one. An out-of-range index leaves the history unchanged.
    pub fn remove(&mut self, index: usize) -> Result<SavedConversation, HistoryError> {
        if index >= self.entries.len() {
            return Err(HistoryError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }

        Ok(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Derive a title from the first non-empty user message: up to 50 graphemes,
/// with `...` appended when truncated. Falls back to [`DEFAULT_TITLE`].
pub fn derive_title(messages: &[Message]) -> String {
    for msg in messages {
        if msg.is_user() && !msg.content.trim().is_empty() {
            let first = msg.content.trim();
            let graphemes: Vec<&str> = first.graphemes(true).collect();
            if graphemes.len() > TITLE_MAX_GRAPHEMES {
                let mut title: String = graphemes[..TITLE_MAX_GRAPHEMES].concat();
                title.push_str("...");
                return title;
            }
            return first.to_string();
        }
    }

    DEFAULT_TITLE.to_string()
}
