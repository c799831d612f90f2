//! Completion capability interface and wire types
//!
//! The cache integrates with completion services through an explicit
//! interface rather than by patching a vendor SDK: anything that can create
//! a completion, streaming or not, implements [`ChatCompletions`], and the
//! [`CachedCompletions`](crate::cached::CachedCompletions) decorator wraps
//! any such implementation.

use deja_core::error::DejaResult;
use deja_core::history::Message;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model name/ID
    pub model: String,
    /// Conversation messages, oldest first
    pub messages: Vec<Message>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Create a request for a model over a message list
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the token ceiling
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A complete (non-streaming) chat completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Completion ID; synthesized (uuid v4) for cache hits
    pub id: String,
    /// Model that produced the response
    pub model: String,
    /// Response content
    pub content: String,
    /// Finish reason, `"stop"` for cache hits
    pub finish_reason: Option<String>,
    /// Unix timestamp of creation
    pub created: i64,
}

/// One increment of a streaming completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChunk {
    /// Incremental content, if any
    pub content: Option<String>,
    /// Whether this is the final chunk
    pub is_final: bool,
    /// Finish reason (only on the final chunk)
    pub finish_reason: Option<String>,
}

impl CompletionChunk {
    /// Create a content chunk
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            is_final: false,
            finish_reason: None,
        }
    }

    /// Create a final chunk
    pub fn final_chunk(finish_reason: Option<String>) -> Self {
        Self {
            content: None,
            is_final: true,
            finish_reason,
        }
    }
}

/// Stream of completion chunks, uniform across cache hits and misses
pub type CompletionStream = Pin<Box<dyn Stream<Item = DejaResult<CompletionChunk>> + Send>>;

/// Capability to create a chat completion, streaming or not.
#[async_trait::async_trait]
pub trait ChatCompletions: Send + Sync {
    /// Create a complete response
    async fn create(&self, request: ChatRequest) -> DejaResult<ChatCompletion>;

    /// Create a streaming response
    async fn create_stream(&self, request: ChatRequest) -> DejaResult<CompletionStream>;
}

/// Collect a stream into a complete completion, accumulating content.
pub async fn collect_stream(
    model: impl Into<String>,
    mut stream: CompletionStream,
) -> DejaResult<ChatCompletion> {
    use futures::StreamExt;

    let mut content = String::new();
    let mut finish_reason = None;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if let Some(delta) = chunk.content {
            content.push_str(&delta);
        }
        if chunk.is_final {
            finish_reason = chunk.finish_reason;
        }
    }

    Ok(ChatCompletion {
        id: uuid::Uuid::new_v4().to_string(),
        model: model.into(),
        content,
        finish_reason,
        created: chrono::Utc::now().timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn collect_stream_accumulates_content() {
        let chunks = vec![
            Ok(CompletionChunk::content("Hel")),
            Ok(CompletionChunk::content("lo")),
            Ok(CompletionChunk::final_chunk(Some("stop".to_string()))),
        ];
        let stream: CompletionStream = Box::pin(stream::iter(chunks));
        let completion = collect_stream("gpt-4o", stream).await.unwrap();
        assert_eq!(completion.content, "Hello");
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
    }
}
