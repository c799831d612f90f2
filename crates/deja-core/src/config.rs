//! Engine configuration

use crate::error::{DejaError, DejaResult};
use serde::{Deserialize, Serialize};

/// Configuration for [`CacheEngine`](crate::engine::CacheEngine).
///
/// Validated at construction; violations fail fast with
/// [`DejaError::Config`] and are never silently coerced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of recent messages forming the cache lookup/write key.
    /// `0` keys on the entire history.
    pub window_size: usize,
    /// Match threshold handed to the backend, in `[0, 1]`. Interpreted as a
    /// cosine distance by the bundled backend: lower means stricter.
    pub distance_threshold: f32,
    /// Append the built-in [`Deduper`](crate::middleware::Deduper) stage
    pub dedupe: bool,
    /// Backend row ceiling checked at write time; `0` means unlimited.
    /// Advisory, not transactional.
    pub max_backend_rows: usize,
    /// Capacity of the bounded persistence queue. A full queue drops the
    /// write (logged) rather than blocking the conversation.
    pub persist_queue_depth: usize,
    /// Dispose shared resources when the process receives an interrupt
    /// signal. Convenience hook; hosts with their own lifecycle management
    /// should call [`dispose`](crate::engine::CacheEngine::dispose) instead.
    pub dispose_on_interrupt: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: 3,
            distance_threshold: 0.4,
            dedupe: true,
            max_backend_rows: 0,
            persist_queue_depth: 32,
            dispose_on_interrupt: false,
        }
    }
}

impl EngineConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window size
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Set the distance threshold
    pub fn with_distance_threshold(mut self, threshold: f32) -> Self {
        self.distance_threshold = threshold;
        self
    }

    /// Enable or disable the built-in dedup stage
    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    /// Set the backend row ceiling (`0` = unlimited)
    pub fn with_max_backend_rows(mut self, max_backend_rows: usize) -> Self {
        self.max_backend_rows = max_backend_rows;
        self
    }

    /// Set the persistence queue depth
    pub fn with_persist_queue_depth(mut self, depth: usize) -> Self {
        self.persist_queue_depth = depth;
        self
    }

    /// Enable disposal on interrupt
    pub fn with_dispose_on_interrupt(mut self, enabled: bool) -> Self {
        self.dispose_on_interrupt = enabled;
        self
    }

    /// Validate the configuration.
    ///
    /// The window size is a `usize`, so the non-negativity constraint is
    /// enforced by the type; only the threshold range and queue depth need
    /// runtime checks.
    pub fn validate(&self) -> DejaResult<()> {
        if !(0.0..=1.0).contains(&self.distance_threshold) {
            return Err(DejaError::config(format!(
                "distance threshold must be between 0 and 1, got {}",
                self.distance_threshold
            )));
        }
        if self.persist_queue_depth == 0 {
            return Err(DejaError::config("persist queue depth must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn threshold_boundaries_are_accepted() {
        EngineConfig::new()
            .with_distance_threshold(0.0)
            .validate()
            .unwrap();
        EngineConfig::new()
            .with_distance_threshold(1.0)
            .validate()
            .unwrap();
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        assert!(EngineConfig::new()
            .with_distance_threshold(1.01)
            .validate()
            .is_err());
        assert!(EngineConfig::new()
            .with_distance_threshold(-0.01)
            .validate()
            .is_err());
        assert!(EngineConfig::new()
            .with_distance_threshold(f32::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn zero_queue_depth_is_rejected() {
        assert!(EngineConfig::new()
            .with_persist_queue_depth(0)
            .validate()
            .is_err());
    }

    #[test]
    fn zero_window_size_is_allowed() {
        EngineConfig::new().with_window_size(0).validate().unwrap();
    }
}
