//! The session-state entity: conversation history, per-persona
//! relationships, progress markers, and the director's internal counters.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ce_domain::turn::Turn;
use ce_domain::PersonaId;

/// Relationship score bounds — the score saturates here, it never overflows.
pub const SCORE_MIN: i8 = -10;
pub const SCORE_MAX: i8 = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Relationship
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Interaction signal detected on a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// Warmth of one persona toward the user.  Exactly one instance exists per
/// `(session, persona)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipState {
    /// Bounded to [-10, 10]; moves by at most ±1 per turn.
    pub score: i8,
    pub interaction_count: u32,
    #[serde(default)]
    pub last_sentiment: Option<Sentiment>,
}

impl Default for RelationshipState {
    fn default() -> Self {
        Self {
            score: 0,
            interaction_count: 0,
            last_sentiment: None,
        }
    }
}

impl RelationshipState {
    /// Apply a per-turn delta, clamped to ±1 and saturating at the bounds.
    pub fn apply_delta(&mut self, delta: i8, sentiment: Sentiment) {
        let delta = delta.clamp(-1, 1);
        self.score = (self.score + delta).clamp(SCORE_MIN, SCORE_MAX);
        self.interaction_count += 1;
        self.last_sentiment = Some(sentiment);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Director state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Supervision phase for the stuck-loop state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DirectorPhase {
    #[default]
    Idle,
    Monitoring,
    NudgePending,
}

/// Internal supervision counters.
///
/// Mutated only through deltas returned by the supervisor — the composer
/// and callers never touch these directly.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DirectorState {
    pub phase: DirectorPhase,
    /// Consecutive user turns whose max similarity met the threshold.
    /// Resets to zero whenever a turn falls below threshold.
    pub consecutive_similar: u32,
    /// History index of the most recent matched turn in the flagged run.
    #[serde(default)]
    pub matched_turn: Option<usize>,
    /// Turns remaining during which nudges are suppressed.
    pub nudge_cooldown: u32,
    /// Consecutive turns whose best retrieval score fell below the
    /// relevance floor.
    pub offtopic_streak: u32,
    /// Turns remaining during which redirects are suppressed.
    pub offtopic_cooldown: u32,
    /// Total nudges emitted over the session's life.
    pub nudges_issued: u32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Complete state of one user conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// Opaque unique id, assigned at creation, immutable.
    pub session_id: String,
    /// Opaque user id, immutable.
    pub user_id: String,
    /// Persona the user is currently addressing.
    pub active_persona_id: Option<PersonaId>,
    /// One relationship per persona the user has interacted with.
    #[serde(default)]
    pub relationships: HashMap<PersonaId, RelationshipState>,
    /// Append-only, strictly chronological.
    #[serde(default)]
    pub conversation_history: Vec<Turn>,
    /// Learning objectives demonstrably covered; grows monotonically.
    #[serde(default)]
    pub progress_markers: BTreeSet<String>,
    #[serde(default)]
    pub director_state: DirectorState,
    /// Rolling log of upstream-detected content flags.
    #[serde(default)]
    pub safety_flags: Vec<String>,
    /// Optimistic-concurrency counter maintained by the store.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl SessionState {
    /// Create a fresh session for a user.
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            active_persona_id: None,
            relationships: HashMap::new(),
            conversation_history: Vec::new(),
            progress_markers: BTreeSet::new(),
            director_state: DirectorState::default(),
            safety_flags: Vec::new(),
            version: 0,
            created_at: now,
            last_active_at: now,
        }
    }

    /// Append a turn, preserving chronological order, and mark activity.
    pub fn push_turn(&mut self, turn: Turn) {
        debug_assert!(
            self.conversation_history
                .last()
                .map(|prev| prev.timestamp <= turn.timestamp)
                .unwrap_or(true),
            "history must stay chronological"
        );
        self.last_active_at = turn.timestamp.max(self.last_active_at);
        self.conversation_history.push(turn);
    }

    /// The last `n` turns.
    pub fn recent_history(&self, n: usize) -> &[Turn] {
        let len = self.conversation_history.len();
        &self.conversation_history[len.saturating_sub(n)..]
    }

    /// Current relationship score with a persona (0 if never interacted).
    pub fn relationship_score(&self, persona_id: &str) -> i8 {
        self.relationships
            .get(persona_id)
            .map(|r| r.score)
            .unwrap_or(0)
    }

    /// Apply a relationship delta for a persona, creating the entry on
    /// first interaction.
    pub fn apply_relationship_delta(&mut self, persona_id: &str, delta: i8, sentiment: Sentiment) {
        self.relationships
            .entry(persona_id.to_owned())
            .or_default()
            .apply_delta(delta, sentiment);
    }

    /// Merge newly covered progress markers.  Markers are never removed.
    pub fn add_progress_markers(&mut self, markers: impl IntoIterator<Item = String>) {
        self.progress_markers.extend(markers);
    }
}
