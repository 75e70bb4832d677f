//! REST implementation of [`EmbeddingProvider`].
//!
//! `RestEmbeddingClient` wraps a `reqwest::Client` and talks to any
//! OpenAI-compatible `/embeddings` endpoint.  Transport failures are mapped
//! onto the degradable error classes (`ProviderTimeout`,
//! `ProviderUnavailable`) so the orchestrator can absorb them into a
//! degraded turn instead of failing the conversation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ce_domain::config::EmbeddingConfig;
use ce_domain::error::{Error, Result};

use crate::embedder::EmbeddingProvider;

// ── wire types ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Embedding client for an OpenAI-compatible endpoint.
///
/// Created once and reused; the underlying `reqwest::Client` maintains a
/// connection pool.
#[derive(Debug, Clone)]
pub struct RestEmbeddingClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

impl RestEmbeddingClient {
    /// Build a client from config.  `dimension` must match what the
    /// configured model produces; the retrieval index checks it on insert.
    pub fn new(cfg: &EmbeddingConfig, dimension: usize) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            dimension,
        })
    }

    fn classify(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::ProviderTimeout(format!("embeddings: {e}"))
        } else if e.is_connect() {
            Error::ProviderUnavailable(format!("embeddings: {e}"))
        } else {
            Error::Http(e.to_string())
        }
    }
}

#[async_trait]
impl EmbeddingProvider for RestEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let body = EmbeddingsRequest {
            model: &self.model,
            input: vec![text],
        };

        let mut rb = self.http.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            rb = rb.bearer_auth(key);
        }

        let resp = rb.send().await.map_err(|e| self.classify(e))?;
        let status = resp.status();
        if status.is_server_error() {
            return Err(Error::ProviderUnavailable(format!(
                "embeddings returned {status}"
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http(format!("embeddings returned {status}: {body}")));
        }

        let parsed: EmbeddingsResponse =
            resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::Http("embeddings response had no data".into()))?;

        if vector.len() != self.dimension {
            return Err(Error::Config(format!(
                "embedding model returned dimension {}, expected {}",
                vector.len(),
                self.dimension
            )));
        }

        debug!(chars = text.len(), dim = vector.len(), "utterance embedded");
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
