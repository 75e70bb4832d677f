//! In-memory persona-scoped vector index.
//!
//! Each snippet carries the set of persona ids allowed to see it; a query
//! never crosses that boundary.  Search is brute-force cosine over the
//! corpus — corpora here are small (hundreds of chunks), so no ANN index
//! is warranted.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use ce_domain::error::{Error, Result};

use crate::KnowledgeRetriever;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snippet
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One retrieval result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snippet {
    pub snippet_id: String,
    pub text: String,
    /// Cosine similarity to the query, in [-1, 1].
    pub score: f32,
    /// Learning objective this snippet evidences, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_marker: Option<String>,
}

struct Entry {
    snippet_id: String,
    text: String,
    embedding: Vec<f32>,
    personas: HashSet<String>,
    progress_marker: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Index
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Brute-force cosine index over persona-scoped snippets.
///
/// Loaded at startup, read-only at query time.
pub struct VectorIndex {
    entries: RwLock<Vec<Entry>>,
    dimension: usize,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Add a snippet visible to the given personas.
    pub fn insert(
        &self,
        snippet_id: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
        personas: impl IntoIterator<Item = String>,
        progress_marker: Option<String>,
    ) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(Error::Config(format!(
                "embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }
        self.entries.write().push(Entry {
            snippet_id: snippet_id.into(),
            text: text.into(),
            embedding,
            personas: personas.into_iter().collect(),
            progress_marker,
        });
        Ok(())
    }

    /// Split a document into overlapping word-window chunks for indexing.
    pub fn chunk_text(text: &str, chunk_words: usize, overlap: usize) -> Vec<String> {
        assert!(chunk_words > overlap, "chunk size must exceed overlap");
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + chunk_words).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end == words.len() {
                break;
            }
            start += chunk_words - overlap;
        }
        chunks
    }
}

#[async_trait]
impl KnowledgeRetriever for VectorIndex {
    async fn retrieve(&self, query: &[f32], persona_id: &str, k: usize) -> Result<Vec<Snippet>> {
        if query.len() != self.dimension || k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read();
        let mut hits: Vec<Snippet> = entries
            .iter()
            .filter(|e| e.personas.contains(persona_id))
            .map(|e| Snippet {
                snippet_id: e.snippet_id.clone(),
                text: e.text.clone(),
                score: cosine_similarity(query, &e.embedding),
                progress_marker: e.progress_marker.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

/// Cosine similarity between two vectors; 0.0 when either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
