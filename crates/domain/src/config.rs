use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Engine-wide configuration.
///
/// Every empirically chosen constant (similarity thresholds, consecutive
/// counts, cooldowns, timeouts) lives here rather than in code — the
/// shipped defaults are starting points, not guarantees.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub director: DirectorConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session retention and history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Seconds since `last_active_at` after which a session is expired
    /// and evicted on next access.
    #[serde(default = "d_86400")]
    pub retention_secs: u64,

    /// How many recent turns the orchestrator hands to the director and
    /// composer as working context.
    #[serde(default = "d_10")]
    pub recent_history: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            retention_secs: 86_400,
            recent_history: 10,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Director
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Loop detection and supervision tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorConfig {
    /// Cosine similarity at or above which a turn counts as a repeat.
    #[serde(default = "d_085")]
    pub similarity_threshold: f32,

    /// How many recent user turns (same persona) the loop detector scans.
    #[serde(default = "d_10")]
    pub window: usize,

    /// Consecutive qualifying turns before the detector reports stuck.
    #[serde(default = "d_2")]
    pub min_run: u32,

    /// Length of a repeated-question run, original ask included, at which
    /// the supervisor emits a nudge.
    #[serde(default = "d_3")]
    pub nudge_after: u32,

    /// Turns to suppress further nudges after one is emitted.
    #[serde(default = "d_5")]
    pub nudge_cooldown: u32,

    /// Best retrieval score below which a turn counts toward the
    /// off-topic streak.
    #[serde(default = "d_030")]
    pub relevance_floor: f32,

    /// Consecutive low-relevance turns before an off-topic redirect.
    #[serde(default = "d_2")]
    pub offtopic_after: u32,

    /// Turns to suppress further redirects after one is emitted.
    #[serde(default = "d_5")]
    pub offtopic_cooldown: u32,

    /// Retrieval score at or above which a snippet's progress marker is
    /// considered demonstrably covered.
    #[serde(default = "d_045")]
    pub progress_floor: f32,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            window: 10,
            min_run: 2,
            nudge_after: 3,
            nudge_cooldown: 5,
            relevance_floor: 0.30,
            offtopic_after: 2,
            offtopic_cooldown: 5,
            progress_floor: 0.45,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Retrieval
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Knowledge retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of snippets returned per query.
    #[serde(default = "d_3")]
    pub top_k: u32,

    /// Timeout for a single retrieval call, in milliseconds.
    #[serde(default = "d_5000")]
    pub timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            timeout_ms: 5_000,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Embedding provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Embedding provider connection settings (REST backend).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible embeddings endpoint.
    #[serde(default = "d_embed_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Embedding model identifier sent with each request.
    #[serde(default = "d_embed_model")]
    pub model: String,

    /// Timeout for a single embed call, in milliseconds.
    #[serde(default = "d_5000")]
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: d_embed_url(),
            api_key: None,
            model: d_embed_model(),
            timeout_ms: 5_000,
        }
    }
}

// ── serde default helpers ────────────────────────────────────────────

fn d_2() -> u32 {
    2
}
fn d_3() -> u32 {
    3
}
fn d_5() -> u32 {
    5
}
fn d_10() -> usize {
    10
}
fn d_085() -> f32 {
    0.85
}
fn d_030() -> f32 {
    0.30
}
fn d_045() -> f32 {
    0.45
}
fn d_5000() -> u64 {
    5_000
}
fn d_86400() -> u64 {
    86_400
}
fn d_embed_url() -> String {
    "http://localhost:8080/v1".to_owned()
}
fn d_embed_model() -> String {
    "all-minilm-l6-v2".to_owned()
}
