//! Cache-aware completion client decorator

use crate::client::{ChatCompletion, ChatCompletions, ChatRequest, CompletionChunk, CompletionStream};
use deja_core::engine::CacheEngine;
use deja_core::error::DejaResult;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Decorator that consults the cache engine before calling through to a real
/// completion client.
///
/// On a hit the inner client is never invoked and a completion is
/// synthesized from the stored content; on a miss the inner result is handed
/// to the engine for background persistence before being returned. Both the
/// streaming and non-streaming paths return the same types as the inner
/// client, so callers cannot tell the difference.
pub struct CachedCompletions<T> {
    inner: T,
    engine: Arc<Mutex<CacheEngine>>,
}

impl<T> CachedCompletions<T> {
    /// Wrap a completion client with a cache engine
    pub fn new(inner: T, engine: CacheEngine) -> Self {
        Self {
            inner,
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    /// Borrow the inner client
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Wait until every scheduled cache write has been processed
    pub async fn flush(&self) {
        self.engine.lock().await.flush().await;
    }

    /// Dispose of the cache engine; the inner client stays usable
    pub async fn dispose(&self) {
        self.engine.lock().await.dispose().await;
    }

    fn synthesize(model: &str, content: String) -> ChatCompletion {
        ChatCompletion {
            id: uuid::Uuid::new_v4().to_string(),
            model: model.to_string(),
            content,
            finish_reason: Some("stop".to_string()),
            created: chrono::Utc::now().timestamp(),
        }
    }

    /// Replace the engine's conversation with the request and look up the
    /// window. Returns the cached content, if any survived the pipeline.
    async fn consult_cache(&self, request: &ChatRequest) -> Option<String> {
        let mut engine = self.engine.lock().await;
        engine.set_history(request.messages.clone());
        engine.get_cache().await
    }
}

#[async_trait::async_trait]
impl<T: ChatCompletions> ChatCompletions for CachedCompletions<T> {
    async fn create(&self, request: ChatRequest) -> DejaResult<ChatCompletion> {
        if let Some(content) = self.consult_cache(&request).await {
            info!("serving completion from cache");
            return Ok(Self::synthesize(&request.model, content));
        }

        debug!("cache miss, calling the completion service");
        let completion = self.inner.create(request).await?;
        self.engine
            .lock()
            .await
            .add_assistant_message(completion.content.clone());
        Ok(completion)
    }

    async fn create_stream(&self, request: ChatRequest) -> DejaResult<CompletionStream> {
        if let Some(content) = self.consult_cache(&request).await {
            info!("serving streaming completion from cache");
            let chunks = vec![
                Ok(CompletionChunk::content(content)),
                Ok(CompletionChunk::final_chunk(Some("stop".to_string()))),
            ];
            return Ok(Box::pin(futures::stream::iter(chunks)));
        }

        debug!("cache miss, streaming from the completion service");
        let inner_stream = self.inner.create_stream(request).await?;
        let state = PassThrough {
            inner: inner_stream,
            engine: self.engine.clone(),
            buffer: String::new(),
        };

        // Pass chunks through while accumulating the content; the full text
        // is handed to the engine when the inner stream ends.
        let stream = futures::stream::unfold(state, |mut state| async move {
            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    if let Some(delta) = &chunk.content {
                        state.buffer.push_str(delta);
                    }
                    Some((Ok(chunk), state))
                }
                Some(Err(e)) => Some((Err(e), state)),
                None => {
                    if !state.buffer.is_empty() {
                        let content = std::mem::take(&mut state.buffer);
                        state.engine.lock().await.add_assistant_message(content);
                    }
                    None
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

struct PassThrough {
    inner: CompletionStream,
    engine: Arc<Mutex<CacheEngine>>,
    buffer: String,
}
