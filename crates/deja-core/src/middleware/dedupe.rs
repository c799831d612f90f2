//! Built-in deduplication stage

use super::Middleware;
use crate::history::{ChatHistory, Message};
use tracing::debug;

/// Write-side stage that suppresses redundant cache writes.
///
/// A write is vetoed when the outgoing content already appears verbatim in
/// the history the stage is shown. The engine hands the pre-append snapshot
/// to the new-response fold, so two consecutive turns producing the same
/// `(window, response)` pair persist at most one backend row.
///
/// Appended automatically as the last stage of the chain when the engine is
/// configured with `dedupe` on (the default).
#[derive(Debug, Default, Clone, Copy)]
pub struct Deduper;

impl Deduper {
    /// Create a new deduplication stage
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for Deduper {
    fn pre_cache_save(&self, message: Message, history: &ChatHistory) -> Option<Message> {
        let duplicate = history.iter().any(|m| m.content == message.content);
        if duplicate {
            debug!(content_len = message.content.len(), "duplicate content, skipping cache write");
            return None;
        }
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vetoes_content_already_in_history() {
        let mut history = ChatHistory::new();
        history.add_user_message("Hi");
        history.add_assistant_message("Hello");

        let deduper = Deduper::new();
        assert!(deduper
            .pre_cache_save(Message::assistant("Hello"), &history)
            .is_none());
    }

    #[test]
    fn passes_unseen_content() {
        let mut history = ChatHistory::new();
        history.add_user_message("Hi");

        let deduper = Deduper::new();
        let out = deduper.pre_cache_save(Message::assistant("Hello"), &history);
        assert_eq!(out, Some(Message::assistant("Hello")));
    }

    #[test]
    fn empty_history_never_vetoes() {
        let deduper = Deduper::new();
        let history = ChatHistory::new();
        assert!(deduper
            .pre_cache_save(Message::assistant("anything"), &history)
            .is_some());
    }

    #[test]
    fn read_side_is_identity() {
        let mut history = ChatHistory::new();
        history.add_assistant_message("Hello");
        let deduper = Deduper::new();
        let out = deduper.post_cache_retrieval(Message::assistant("Hello"), &history);
        assert!(out.is_some());
    }
}
