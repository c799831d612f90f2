//! Orchestration engine: the per-turn caching decision machine
//!
//! One [`CacheEngine`] drives one logical conversation. Per turn the caller
//! replaces or extends the history, asks [`CacheEngine::get_cache`] whether a
//! sufficiently similar exchange already produced a response, and on a miss
//! invokes the underlying completion service itself, handing the result to
//! [`CacheEngine::add_assistant_message`], which persists it in the
//! background without blocking the conversation.

mod persist;

use crate::backend::CacheBackend;
use crate::config::EngineConfig;
use crate::error::{DejaError, DejaResult};
use crate::history::{ChatHistory, Message};
use crate::middleware::{Deduper, Middleware, MiddlewareChain};
use persist::{PersistJob, PersistWorker};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// The caching decision engine.
///
/// Owns the conversation history and the middleware chain; talks to the
/// similarity store through the [`CacheBackend`] contract. Not designed for
/// concurrent mutation from multiple callers; wrap it in a lock when shared.
pub struct CacheEngine {
    history: ChatHistory,
    backend: Arc<dyn CacheBackend>,
    chain: MiddlewareChain,
    config: EngineConfig,
    persist_tx: mpsc::Sender<PersistJob>,
    worker: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
    disposed: bool,
}

impl CacheEngine {
    /// Create an engine over a backend.
    ///
    /// Validates the configuration, connects the backend (a failure here is
    /// fatal), appends the built-in dedup stage when enabled, and spawns the
    /// bounded persistence worker.
    pub async fn new(
        backend: Arc<dyn CacheBackend>,
        middlewares: Vec<Arc<dyn Middleware>>,
        config: EngineConfig,
    ) -> DejaResult<Self> {
        config.validate()?;
        backend
            .connect()
            .await
            .map_err(|e| DejaError::backend(format!("failed to connect to cache backend: {e}")))?;
        info!("connected to the cache backend");

        let mut chain = MiddlewareChain::new(middlewares);
        if config.dedupe {
            chain.push(Arc::new(Deduper::new()));
        }

        let (persist_tx, persist_rx) = mpsc::channel(config.persist_queue_depth);
        let shutdown = CancellationToken::new();
        let worker = PersistWorker::new(
            backend.clone(),
            chain.clone(),
            config.window_size,
            config.max_backend_rows,
        );
        let handle = tokio::spawn(worker.run(persist_rx, shutdown.clone()));

        if config.dispose_on_interrupt {
            let backend = backend.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, disposing cache resources");
                    shutdown.cancel();
                    backend.disconnect().await;
                }
            });
        }

        Ok(Self {
            history: ChatHistory::new(),
            backend,
            chain,
            config,
            persist_tx,
            worker: Some(handle),
            shutdown,
            disposed: false,
        })
    }

    /// Replace the conversation history for the current turn.
    pub fn set_history(&mut self, messages: Vec<Message>) {
        self.history.set_messages(messages);
    }

    /// Append a user message to the history.
    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.history.add_user_message(content);
    }

    /// Borrow the conversation history.
    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// Borrow the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Look up a cached response for the current window.
    ///
    /// Re-applies the write-side pipeline to the entire history first
    /// (middleware transforms may depend on content added earlier in the
    /// same turn), then queries the backend at the configured threshold.
    /// A found value still has to survive the read-side pipeline: any veto
    /// downgrades it to a miss. On a genuine hit the content is appended to
    /// the history as an assistant message and returned; the underlying
    /// service is never involved. Backend errors degrade to a miss.
    #[instrument(skip(self), level = "debug")]
    pub async fn get_cache(&mut self) -> Option<String> {
        self.chain.apply_pre_cache_to_history(&mut self.history);
        let window = self.history.window_texts(self.config.window_size);

        let found = match self
            .backend
            .find(&window, self.config.distance_threshold)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "cache lookup failed, treating as miss");
                return None;
            }
        };
        let response = found?;

        let retrieved = match self
            .chain
            .apply_post_cache_retrieval(Message::assistant(response), &self.history)
        {
            Some(message) => message,
            None => {
                debug!("cached response vetoed by middleware, treating as miss");
                return None;
            }
        };

        debug!("cache hit");
        self.history.add_assistant_message(retrieved.content.clone());
        Some(retrieved.content)
    }

    /// Record the assistant's response and schedule its persistence.
    ///
    /// The history append is synchronous so the in-memory conversation state
    /// is immediately consistent; the backend write happens on the worker
    /// against a snapshot taken before the append, so a response is never
    /// part of its own lookup key. A full queue drops the write with a
    /// warning rather than blocking the conversation.
    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        let message = Message::assistant(content.into());
        let snapshot = self.history.clone();
        self.history.push(message.clone());

        match self.persist_tx.try_send(PersistJob::Save { snapshot, message }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("persistence queue full, dropping cache write");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("persistence worker stopped, dropping cache write");
            }
        }
    }

    /// Wait until every previously scheduled persistence job has been
    /// processed. Resolves immediately once the worker is gone.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .persist_tx
            .send(PersistJob::Flush(ack_tx))
            .await
            .is_err()
        {
            return;
        }
        let _ = ack_rx.await;
    }

    /// Dispose of the engine: drain pending writes, stop the worker, and
    /// disconnect the backend. Idempotent.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        self.flush().await;
        self.shutdown.cancel();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
        self.backend.disconnect().await;
        info!("disconnected from the cache backend");
    }

    /// Whether the engine has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockCacheBackend;

    #[tokio::test]
    async fn construction_fails_when_backend_connect_fails() {
        let mut backend = MockCacheBackend::new();
        backend
            .expect_connect()
            .times(1)
            .returning(|| Err(DejaError::backend("refused")));

        let result =
            CacheEngine::new(Arc::new(backend), Vec::new(), EngineConfig::default()).await;
        assert!(matches!(result, Err(DejaError::Backend(_))));
    }

    #[tokio::test]
    async fn invalid_config_fails_before_touching_the_backend() {
        let mut backend = MockCacheBackend::new();
        backend.expect_connect().times(0);

        let config = EngineConfig::new().with_distance_threshold(1.5);
        let result = CacheEngine::new(Arc::new(backend), Vec::new(), config).await;
        assert!(matches!(result, Err(DejaError::Config(_))));
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let mut backend = MockCacheBackend::new();
        backend.expect_connect().times(1).returning(|| Ok(()));
        backend.expect_disconnect().times(1).returning(|| ());

        let mut engine =
            CacheEngine::new(Arc::new(backend), Vec::new(), EngineConfig::default())
                .await
                .unwrap();
        engine.dispose().await;
        engine.dispose().await;
        assert!(engine.is_disposed());
    }
}
