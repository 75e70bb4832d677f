//! Embedding provider contract and the deterministic test embedder.

use async_trait::async_trait;

use ce_domain::error::Result;

/// Converts an utterance into a fixed-dimension vector.
///
/// Callers wrap invocations in a timeout; implementations map transport
/// failures onto `ProviderTimeout` / `ProviderUnavailable` so the
/// orchestrator can degrade gracefully instead of failing the turn.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimension of every vector this provider produces.
    fn dimension(&self) -> usize;
}

/// Deterministic embedder for tests and offline runs.
///
/// Hashes word tokens into buckets and L2-normalizes, so identical texts
/// embed identically and token overlap drives similarity.  Not a semantic
/// model — good enough to exercise loop detection and retrieval plumbing.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn bucket(&self, token: &str) -> usize {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimension
    }

    /// Synchronous embed, shared with the async trait impl.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0f32; self.dimension];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            vec[self.bucket(token)] += 1.0;
        }

        let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
