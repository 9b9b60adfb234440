//! Embedding provider seam.
//!
//! The engine treats embeddings as optional: without a provider, search
//! degrades to substring matching and relation inference is a no-op.

use crate::error::Result;
use async_trait::async_trait;

/// Text to fixed-length float vector, async and pluggable.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn dimension(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Default dimension for the zero-config provider
pub const DEFAULT_DIMENSION: usize = 384;

/// Zero-config, deterministic embedding provider.
///
/// Hashes tokens into signed buckets and L2-normalizes. No network and no
/// model downloads, which makes it the test substrate for everything that
/// needs similarity scores; it does not approach the semantic quality of a
/// learned model.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimension: usize,
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl HashEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash as usize) % self.dimension;
            // High bit decides sign so unrelated tokens can cancel out
            // instead of every text drifting toward the same octant.
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::cosine_similarity;

    #[tokio::test]
    async fn identical_text_embeds_identically() {
        let provider = HashEmbeddingProvider::new(64);
        let vectors = provider
            .embed(&["the cache is stale".into(), "the cache is stale".into()])
            .await
            .unwrap();
        assert_eq!(vectors[0], vectors[1]);
        assert!((cosine_similarity(&vectors[0], &vectors[1]) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn empty_text_yields_zero_vector() {
        let provider = HashEmbeddingProvider::new(16);
        let vectors = provider.embed(&["   ".into()]).await.unwrap();
        assert!(vectors[0].iter().all(|v| *v == 0.0));
    }
}
