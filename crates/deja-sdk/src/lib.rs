//! deja SDK
//!
//! Integration surface between the deja caching engine and completion
//! services: the [`ChatCompletions`] capability trait, the
//! [`CachedCompletions`] decorator that consults the cache before calling
//! through, and an [`OpenAiClient`] for OpenAI-compatible endpoints.
//!
//! ```no_run
//! use deja_core::{CacheEngine, EngineConfig, HashingVectorizer, MemoryBackend};
//! use deja_sdk::{CachedCompletions, ChatCompletions, ChatRequest, OpenAiClient};
//! use deja_core::Message;
//! use std::sync::Arc;
//!
//! # async fn example() -> deja_core::DejaResult<()> {
//! let backend = Arc::new(MemoryBackend::new(Arc::new(HashingVectorizer::default())));
//! let engine = CacheEngine::new(backend, Vec::new(), EngineConfig::default()).await?;
//! let client = CachedCompletions::new(OpenAiClient::new("sk-..."), engine);
//!
//! let request = ChatRequest::new("gpt-4o", vec![Message::user("What is a borrow?")]);
//! let completion = client.create(request).await?;
//! println!("{}", completion.content);
//! # Ok(())
//! # }
//! ```

pub mod cached;
pub mod client;
pub mod openai;

// Re-export commonly used types
pub use cached::CachedCompletions;
pub use client::{
    ChatCompletion, ChatCompletions, ChatRequest, CompletionChunk, CompletionStream,
    collect_stream,
};
pub use openai::OpenAiClient;
