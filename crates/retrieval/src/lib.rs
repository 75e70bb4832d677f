//! `ce-retrieval` — embedding provider contracts and persona-scoped
//! knowledge retrieval.
//!
//! The engine never builds a retrieval index itself; it consumes the
//! [`KnowledgeRetriever`] contract.  This crate ships an in-memory
//! cosine-similarity [`VectorIndex`] implementation plus two embedding
//! providers: a REST client for an OpenAI-compatible endpoint and a
//! deterministic hash embedder for tests and offline runs.

pub mod embedder;
pub mod index;
pub mod rest;

pub use embedder::{EmbeddingProvider, HashEmbedder};
pub use index::{cosine_similarity, Snippet, VectorIndex};
pub use rest::RestEmbeddingClient;

use async_trait::async_trait;

use ce_domain::error::Result;

/// Persona-scoped top-k retrieval over a knowledge corpus.
///
/// Implementations are read-only at query time.  An empty corpus or an
/// unavailable backend yields an empty result, never an error — "no
/// knowledge found" is a normal condition downstream.
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    /// Top-`k` snippets visible to `persona_id`, descending score.
    /// Snippets outside the persona's allowed subset are never returned.
    async fn retrieve(&self, query: &[f32], persona_id: &str, k: usize) -> Result<Vec<Snippet>>;
}
