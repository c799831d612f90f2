//! Cache backend contract
//!
//! The engine talks to similarity-search storage exclusively through this
//! trait. Implementations are external collaborators (vector stores,
//! key-value stores with semantic indexes); the crate ships one embedded
//! reference implementation, [`MemoryBackend`].

mod memory;

pub use memory::MemoryBackend;

use crate::error::DejaResult;
use async_trait::async_trait;

/// Contract every cache backend satisfies.
///
/// `threshold` is the engine-validated scalar in `[0, 1]` and is interpreted
/// here as a cosine *distance*: lower means stricter matching. Backends that
/// think in similarities must convert (`similarity >= 1 - threshold`).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Establish the connection. Must be called before first use; a failure
    /// aborts engine construction.
    async fn connect(&self) -> DejaResult<()>;

    /// Release resources. Idempotent; called by engine disposal.
    async fn disconnect(&self);

    /// Persist one `(window, response)` row. Best-effort: the engine logs
    /// failures and never propagates them to the caller.
    async fn write(&self, window: &[String], response: &str) -> DejaResult<()>;

    /// Return the single most relevant stored response for `window` within
    /// `threshold`, or `None`. Pure query; no ordering guarantee beyond
    /// "most relevant match".
    async fn find(&self, window: &[String], threshold: f32) -> DejaResult<Option<String>>;

    /// Count of stored rows. Consulted only when a row ceiling is configured.
    async fn size(&self) -> DejaResult<usize>;
}
