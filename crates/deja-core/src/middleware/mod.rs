//! Middleware pipeline applied around cache writes and reads
//!
//! A middleware is an ordered transformation/veto stage with two extension
//! points: `pre_cache_save` runs before a message is used to build a cache
//! write, `post_cache_retrieval` runs on a message retrieved from the
//! backend. Returning `None` is the veto: the rest of the chain is skipped
//! and the calling code abandons the write or treats the lookup as a miss.

mod dedupe;
mod replacer;

pub use dedupe::Deduper;
pub use replacer::{Replacement, Replacer};

use crate::history::{ChatHistory, Message};
use std::sync::Arc;

/// A pluggable transformation/veto stage.
///
/// Both methods default to the identity so a middleware only implements the
/// capability it needs. Stages must be idempotent-safe: the engine re-applies
/// the write-side transform to the full history before every lookup, so a
/// stage sees its own earlier output.
pub trait Middleware: Send + Sync {
    /// Write-side hook. Return the (possibly transformed) message, or `None`
    /// to veto persisting the current item.
    fn pre_cache_save(&self, message: Message, history: &ChatHistory) -> Option<Message> {
        let _ = history;
        Some(message)
    }

    /// Read-side hook. Return the (possibly transformed) message, or `None`
    /// to downgrade the lookup to a miss.
    fn post_cache_retrieval(&self, message: Message, history: &ChatHistory) -> Option<Message> {
        let _ = history;
        Some(message)
    }
}

/// An ordered middleware chain.
///
/// Order is caller-specified and significant: later stages see the output of
/// earlier stages, and a veto by any stage short-circuits the remainder.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    stages: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a chain from an ordered list of stages
    pub fn new(stages: Vec<Arc<dyn Middleware>>) -> Self {
        Self { stages }
    }

    /// Append a stage to the end of the chain
    pub fn push(&mut self, stage: Arc<dyn Middleware>) {
        self.stages.push(stage);
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Check whether the chain has no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Fold a message through the write-side hooks in order.
    pub fn apply_pre_cache_save(
        &self,
        message: Message,
        history: &ChatHistory,
    ) -> Option<Message> {
        let mut current = message;
        for stage in &self.stages {
            current = stage.pre_cache_save(current, history)?;
        }
        Some(current)
    }

    /// Fold a message through the read-side hooks in order.
    pub fn apply_post_cache_retrieval(
        &self,
        message: Message,
        history: &ChatHistory,
    ) -> Option<Message> {
        let mut current = message;
        for stage in &self.stages {
            current = stage.post_cache_retrieval(current, history)?;
        }
        Some(current)
    }

    /// Re-apply the write-side hooks to every message of `history` in place.
    ///
    /// A stage veto leaves that message untransformed and moves on to the
    /// next one; the history itself is never shortened here.
    pub fn apply_pre_cache_to_history(&self, history: &mut ChatHistory) {
        for index in 0..history.len() {
            let original = history[index].clone();
            if let Some(transformed) = self.apply_pre_cache_save(original, history) {
                history.replace_message(index, transformed);
            }
        }
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("stages", &self.stages.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Appends a tag to the content so ordering is observable.
    struct Tagger(&'static str);

    impl Middleware for Tagger {
        fn pre_cache_save(&self, message: Message, _history: &ChatHistory) -> Option<Message> {
            let content = format!("{}{}", message.content, self.0);
            Some(message.with_content(content))
        }
    }

    /// Vetoes everything and counts how often it was consulted.
    struct Veto(AtomicUsize);

    impl Middleware for Veto {
        fn pre_cache_save(&self, _message: Message, _history: &ChatHistory) -> Option<Message> {
            self.0.fetch_add(1, Ordering::SeqCst);
            None
        }

        fn post_cache_retrieval(&self, _message: Message, _history: &ChatHistory) -> Option<Message> {
            self.0.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    #[test]
    fn stages_run_in_configured_order() {
        let chain = MiddlewareChain::new(vec![
            Arc::new(Tagger("-a")) as Arc<dyn Middleware>,
            Arc::new(Tagger("-b")),
        ]);
        let history = ChatHistory::new();
        let out = chain
            .apply_pre_cache_save(Message::assistant("x"), &history)
            .unwrap();
        assert_eq!(out.content, "x-a-b");
    }

    #[test]
    fn veto_short_circuits_later_stages() {
        let counter = Arc::new(Veto(AtomicUsize::new(0)));
        let after = Arc::new(Veto(AtomicUsize::new(0)));
        let chain = MiddlewareChain::new(vec![
            counter.clone() as Arc<dyn Middleware>,
            after.clone(),
        ]);
        let history = ChatHistory::new();

        assert!(chain
            .apply_pre_cache_save(Message::assistant("x"), &history)
            .is_none());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(after.0.load(Ordering::SeqCst), 0);

        assert!(chain
            .apply_post_cache_retrieval(Message::assistant("x"), &history)
            .is_none());
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
        assert_eq!(after.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn history_reapplication_keeps_vetoed_messages() {
        let chain = MiddlewareChain::new(vec![Arc::new(Veto(AtomicUsize::new(0))) as Arc<dyn Middleware>]);
        let mut history = ChatHistory::new();
        history.add_user_message("keep me");
        chain.apply_pre_cache_to_history(&mut history);
        assert_eq!(history[0].content, "keep me");
    }

    #[test]
    fn empty_chain_is_identity() {
        let chain = MiddlewareChain::default();
        let history = ChatHistory::new();
        let message = Message::assistant("unchanged");
        assert_eq!(
            chain.apply_pre_cache_save(message.clone(), &history),
            Some(message)
        );
    }
}
