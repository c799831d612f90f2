//! Background persistence worker
//!
//! Writes are offloaded to one worker task fed by a bounded channel so a
//! bursty conversation cannot pile up unbounded concurrent backend writes.
//! Every failure in here is caught and logged; nothing surfaces to the
//! conversation.

use crate::backend::CacheBackend;
use crate::history::{ChatHistory, Message};
use crate::middleware::MiddlewareChain;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

/// Unit of work submitted by the engine.
pub(crate) enum PersistJob {
    /// Persist one assistant response against the pre-append history snapshot
    Save {
        snapshot: ChatHistory,
        message: Message,
    },
    /// Barrier: acknowledged once every previously submitted job is done
    Flush(oneshot::Sender<()>),
}

pub(crate) struct PersistWorker {
    backend: Arc<dyn CacheBackend>,
    chain: MiddlewareChain,
    window_size: usize,
    max_backend_rows: usize,
}

impl PersistWorker {
    pub(crate) fn new(
        backend: Arc<dyn CacheBackend>,
        chain: MiddlewareChain,
        window_size: usize,
        max_backend_rows: usize,
    ) -> Self {
        Self {
            backend,
            chain,
            window_size,
            max_backend_rows,
        }
    }

    /// Drain jobs until the channel closes or shutdown is signalled.
    pub(crate) async fn run(self, mut rx: mpsc::Receiver<PersistJob>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("persistence worker stopping");
                    break;
                }
                job = rx.recv() => match job {
                    Some(PersistJob::Save { snapshot, message }) => {
                        self.save(snapshot, message).await;
                    }
                    Some(PersistJob::Flush(ack)) => {
                        let _ = ack.send(());
                    }
                    None => break,
                },
            }
        }
    }

    /// Persist one response: row ceiling, write-side pipeline over the
    /// snapshot, window, write-side pipeline over the new message, write.
    #[instrument(skip(self, snapshot, message), level = "debug")]
    async fn save(&self, mut snapshot: ChatHistory, message: Message) {
        if self.max_backend_rows > 0 {
            match self.backend.size().await {
                Ok(rows) if rows >= self.max_backend_rows => {
                    warn!(
                        rows,
                        limit = self.max_backend_rows,
                        "backend row ceiling reached, skipping cache write"
                    );
                    return;
                }
                Err(e) => {
                    error!(error = %e, "failed to read backend size, skipping cache write");
                    return;
                }
                Ok(_) => {}
            }
        }

        self.chain.apply_pre_cache_to_history(&mut snapshot);
        let window = snapshot.window_texts(self.window_size);

        let Some(outgoing) = self.chain.apply_pre_cache_save(message, &snapshot) else {
            debug!("cache write vetoed by middleware");
            return;
        };

        if let Err(e) = self.backend.write(&window, &outgoing.content).await {
            error!(error = %e, "failed to write to cache backend");
        }
    }
}
