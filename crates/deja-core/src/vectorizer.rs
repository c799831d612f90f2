//! Text embedding contract consumed by similarity-search backends

use crate::error::DejaResult;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Trait for embedding providers.
///
/// Backends that rank by vector similarity consume this; the engine itself
/// never calls it. Implementations wrap whatever embedding service or local
/// model the deployment uses.
#[async_trait]
pub trait Vectorizer: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> DejaResult<Vec<f32>>;

    /// Embed a batch of texts
    async fn embed_many(&self, texts: &[String]) -> DejaResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Embedding dimensionality
    fn dimensions(&self) -> usize;
}

/// Deterministic feature-hashed bag-of-words embedder.
///
/// No model downloads, no network: words are lowercased, hashed into a fixed
/// number of buckets, and the counts are L2-normalized. Quality is far below
/// a real embedding model, but overlap-heavy texts land close together,
/// which is enough for the in-memory backend and for tests.
#[derive(Debug, Clone)]
pub struct HashingVectorizer {
    dimensions: usize,
}

impl HashingVectorizer {
    /// Create a vectorizer with the given number of hash buckets
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() % self.dimensions as u64) as usize
    }
}

impl Default for HashingVectorizer {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Vectorizer for HashingVectorizer {
    async fn embed(&self, text: &str) -> DejaResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            vector[self.bucket(&token.to_lowercase())] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn embedding_is_deterministic() {
        let vectorizer = HashingVectorizer::default();
        let a = vectorizer.embed("check if an object is an instance").await.unwrap();
        let b = vectorizer.embed("check if an object is an instance").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn overlapping_texts_are_closer_than_disjoint_ones() {
        let vectorizer = HashingVectorizer::default();
        let base = vectorizer.embed("how do I check the type of an object").await.unwrap();
        let near = vectorizer.embed("how do I check an object type").await.unwrap();
        let far = vectorizer.embed("pasta recipe with garlic butter").await.unwrap();
        assert!(cosine(&base, &near) > cosine(&base, &far));
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() {
        let vectorizer = HashingVectorizer::new(16);
        let v = vectorizer.embed("").await.unwrap();
        assert_eq!(v.len(), 16);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn embed_many_maps_embed() {
        let vectorizer = HashingVectorizer::default();
        let texts = vec!["one".to_string(), "two".to_string()];
        let batch = vectorizer.embed_many(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], vectorizer.embed("one").await.unwrap());
    }
}
