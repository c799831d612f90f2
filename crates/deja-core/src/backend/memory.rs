//! Embedded in-memory reference backend

use super::CacheBackend;
use crate::error::{DejaError, DejaResult};
use crate::vectorizer::Vectorizer;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// One stored exchange
#[derive(Debug, Clone)]
struct Row {
    prompt: String,
    response: String,
    embedding: Vec<f32>,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

/// In-memory similarity-search backend.
///
/// Rows live in a process-local vector guarded by a read-write lock; ranking
/// is brute-force cosine over the configured [`Vectorizer`]'s embeddings.
/// Meant for tests, demos, and single-process deployments that do not need
/// durability; production setups plug in an external store behind the same
/// [`CacheBackend`] contract.
pub struct MemoryBackend {
    vectorizer: Arc<dyn Vectorizer>,
    rows: RwLock<Vec<Row>>,
    connected: AtomicBool,
}

impl MemoryBackend {
    /// Create a backend over the given vectorizer
    pub fn new(vectorizer: Arc<dyn Vectorizer>) -> Self {
        Self {
            vectorizer,
            rows: RwLock::new(Vec::new()),
            connected: AtomicBool::new(false),
        }
    }

    fn ensure_connected(&self) -> DejaResult<()> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(DejaError::backend("memory backend is not connected"));
        }
        Ok(())
    }

    /// Windows are keyed by their space-joined canonical forms.
    fn join_window(window: &[String]) -> String {
        window.join(" ")
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn connect(&self) -> DejaResult<()> {
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    async fn write(&self, window: &[String], response: &str) -> DejaResult<()> {
        self.ensure_connected()?;
        let prompt = Self::join_window(window);
        let embedding = self.vectorizer.embed(&prompt).await?;
        self.rows.write().push(Row {
            prompt,
            response: response.to_string(),
            embedding,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn find(&self, window: &[String], threshold: f32) -> DejaResult<Option<String>> {
        self.ensure_connected()?;
        let prompt = Self::join_window(window);
        let embedding = self.vectorizer.embed(&prompt).await?;

        let rows = self.rows.read();
        let best = rows
            .iter()
            .map(|row| (Self::cosine_similarity(&embedding, &row.embedding), row))
            .max_by(|(a, _), (b, _)| a.total_cmp(b));

        match best {
            Some((similarity, row)) if 1.0 - similarity <= threshold => {
                debug!(
                    distance = 1.0 - similarity,
                    prompt = %row.prompt,
                    "memory backend hit"
                );
                Ok(Some(row.response.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn size(&self) -> DejaResult<usize> {
        self.ensure_connected()?;
        Ok(self.rows.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorizer::HashingVectorizer;

    fn backend() -> MemoryBackend {
        MemoryBackend::new(Arc::new(HashingVectorizer::default()))
    }

    fn window(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn exact_window_matches_at_zero_threshold() {
        let backend = backend();
        backend.connect().await.unwrap();
        backend
            .write(&window(&["user: Hi"]), "Hello")
            .await
            .unwrap();

        let found = backend.find(&window(&["user: Hi"]), 0.0).await.unwrap();
        assert_eq!(found, Some("Hello".to_string()));
    }

    #[tokio::test]
    async fn dissimilar_window_misses_under_strict_threshold() {
        let backend = backend();
        backend.connect().await.unwrap();
        backend
            .write(&window(&["user: how do I sort a vector"]), "Use sort()")
            .await
            .unwrap();

        let found = backend
            .find(&window(&["user: pasta recipe with garlic"]), 0.1)
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn returns_the_most_relevant_row() {
        let backend = backend();
        backend.connect().await.unwrap();
        backend
            .write(&window(&["user: tell me about rust lifetimes"]), "lifetimes")
            .await
            .unwrap();
        backend
            .write(&window(&["user: tell me about rust traits"]), "traits")
            .await
            .unwrap();

        let found = backend
            .find(&window(&["user: tell me about rust traits"]), 0.2)
            .await
            .unwrap();
        assert_eq!(found, Some("traits".to_string()));
    }

    #[tokio::test]
    async fn size_counts_rows() {
        let backend = backend();
        backend.connect().await.unwrap();
        assert_eq!(backend.size().await.unwrap(), 0);
        backend.write(&window(&["user: a"]), "1").await.unwrap();
        backend.write(&window(&["user: b"]), "2").await.unwrap();
        assert_eq!(backend.size().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn operations_fail_after_disconnect() {
        let backend = backend();
        backend.connect().await.unwrap();
        backend.disconnect().await;
        assert!(backend.write(&window(&["user: a"]), "1").await.is_err());
        assert!(backend.find(&window(&["user: a"]), 0.5).await.is_err());
        // Disconnect is idempotent.
        backend.disconnect().await;
    }

    #[tokio::test]
    async fn empty_store_always_misses() {
        let backend = backend();
        backend.connect().await.unwrap();
        assert_eq!(backend.find(&window(&["user: a"]), 1.0).await.unwrap(), None);
    }
}
