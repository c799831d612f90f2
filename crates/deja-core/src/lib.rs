//! deja core library
//!
//! This crate provides the caching decision engine for deja: the
//! conversation/window model, the middleware pipeline applied around cache
//! writes and reads, the deduplication stage, the backend and vectorizer
//! contracts, and the orchestration that ties lookup, underlying call, and
//! non-blocking write-back together.

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod middleware;
pub mod vectorizer;

// Re-export commonly used types
pub use backend::{CacheBackend, MemoryBackend};
pub use config::EngineConfig;
pub use engine::CacheEngine;
pub use error::{DejaError, DejaResult};
pub use history::{ChatHistory, Message, Role};
pub use middleware::{Deduper, Middleware, MiddlewareChain, Replacement, Replacer};
pub use vectorizer::{HashingVectorizer, Vectorizer};
