//! The per-turn orchestration pipeline.
//!
//! One turn = one read-modify-write cycle under the session's run lock:
//!
//! 1. load state, evicting it if the retention window has lapsed
//! 2. embed the utterance (timeout-bounded, failure degrades)
//! 3. loop detection against recent history
//! 4. persona-scoped retrieval (timeout-bounded, failure degrades)
//! 5. supervision — directive + director-state delta
//! 6. compose the persona's reply
//! 7. apply all deltas to a fresh copy of the state and `put` it once
//!
//! The single `put` is a version CAS; a conflict retries the whole cycle
//! once with freshly loaded state, so no appended history is ever lost.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{info, warn};

use ce_director::{LoopDetector, Supervisor};
use ce_domain::config::Config;
use ce_domain::directive::Directive;
use ce_domain::error::{Error, Result};
use ce_domain::turn::Turn;
use ce_personas::PersonaRegistry;
use ce_retrieval::{EmbeddingProvider, KnowledgeRetriever, Snippet};
use ce_sessions::state::Sentiment;
use ce_sessions::{LifecycleManager, SessionLocks, SessionState, SessionStore};

use crate::composer::Composer;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the caller gets back from one completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: String,
    pub persona_id: String,
    pub reply_text: String,
    pub directive: Directive,
    pub sentiment: Sentiment,
    /// Relationship score with the addressed persona after this turn.
    pub relationship_score: i8,
    /// Progress markers newly covered by this turn.
    pub new_progress_markers: Vec<String>,
    /// True when an embedding or retrieval provider failed and the turn
    /// proceeded without that signal.
    pub degraded: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Owns the full turn pipeline and everything it needs: persona registry,
/// session store, providers, and the supervision machinery.
pub struct Engine {
    config: Config,
    registry: PersonaRegistry,
    store: Arc<dyn SessionStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    retriever: Arc<dyn KnowledgeRetriever>,
    locks: SessionLocks,
    detector: LoopDetector,
    supervisor: Supervisor,
    composer: Composer,
    lifecycle: LifecycleManager,
}

impl Engine {
    pub fn new(
        config: Config,
        registry: PersonaRegistry,
        store: Arc<dyn SessionStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        retriever: Arc<dyn KnowledgeRetriever>,
    ) -> Self {
        let detector = LoopDetector::new(config.director.clone());
        let supervisor = Supervisor::new(config.director.clone());
        let lifecycle = LifecycleManager::new(&config.sessions);
        Self {
            config,
            registry,
            store,
            embedder,
            retriever,
            locks: SessionLocks::new(),
            detector,
            supervisor,
            composer: Composer::new(),
            lifecycle,
        }
    }

    /// Create and persist a fresh session for a user.
    pub async fn create_session(&self, user_id: &str) -> Result<SessionState> {
        let state = SessionState::new(user_id);
        self.store.put(&state).await?;
        info!(session_id = %state.session_id, %user_id, "session created");
        // Re-read so the caller's copy carries the stored version.
        self.store.get(&state.session_id).await
    }

    /// Run one conversation turn addressed to `persona_id`.
    ///
    /// `safety_flags` are upstream content-moderation labels for this
    /// utterance; they are recorded on the session verbatim.
    pub async fn run_turn(
        &self,
        session_id: &str,
        persona_id: &str,
        utterance: &str,
        safety_flags: &[String],
    ) -> Result<TurnOutcome> {
        // Reject unknown personas before touching any session state.
        self.registry.load(persona_id)?;

        let _permit = self.locks.acquire(session_id).await?;

        match self
            .turn_under_lock(session_id, persona_id, utterance, safety_flags)
            .await
        {
            Err(Error::StoreWriteConflict { .. }) => {
                // An external writer raced us; the state we based the turn
                // on is stale.  One retry with fresh state is enough under
                // the run lock.
                warn!(%session_id, "write conflict, retrying turn with fresh state");
                self.turn_under_lock(session_id, persona_id, utterance, safety_flags)
                    .await
            }
            other => other,
        }
    }

    /// Point the session at a different persona without consuming a turn.
    pub async fn switch_persona(&self, session_id: &str, persona_id: &str) -> Result<()> {
        self.registry.load(persona_id)?;
        let _permit = self.locks.acquire(session_id).await?;

        let mut state = self.store.get(session_id).await?;
        if self.lifecycle.is_expired(&state, Utc::now()) {
            self.store.delete(session_id).await?;
            return Err(Error::SessionExpired(session_id.to_owned()));
        }
        state.active_persona_id = Some(persona_id.to_owned());
        self.store.put(&state).await
    }

    /// The most recent turns of a session, bounded by the configured
    /// `sessions.recent_history`, for hosts rendering a transcript.
    pub async fn recent_history(&self, session_id: &str) -> Result<Vec<Turn>> {
        let state = self.store.get(session_id).await?;
        Ok(state
            .recent_history(self.config.sessions.recent_history)
            .to_vec())
    }

    /// Evict every session past the retention window.  Sessions with a
    /// turn in flight are skipped and caught on a later sweep.
    pub async fn sweep_expired(&self) -> Result<Vec<String>> {
        self.lifecycle
            .sweep(self.store.as_ref(), &self.locks, Utc::now())
            .await
    }

    // ── the pipeline ─────────────────────────────────────────────────

    async fn turn_under_lock(
        &self,
        session_id: &str,
        persona_id: &str,
        utterance: &str,
        safety_flags: &[String],
    ) -> Result<TurnOutcome> {
        let state = self.store.get(session_id).await?;

        if self.lifecycle.is_expired(&state, Utc::now()) {
            self.store.delete(session_id).await?;
            info!(%session_id, "expired session evicted on access");
            return Err(Error::SessionExpired(session_id.to_owned()));
        }

        let mut degraded = false;

        let embedding = match timeout(
            Duration::from_millis(self.config.embedding.timeout_ms),
            self.embedder.embed(utterance),
        )
        .await
        {
            Ok(Ok(vector)) => Some(vector),
            Ok(Err(e)) => {
                warn!(%session_id, error = %e, "embedding failed, turn continues without it");
                degraded = true;
                None
            }
            Err(_) => {
                warn!(%session_id, "embedding timed out, turn continues without it");
                degraded = true;
                None
            }
        };

        let loop_result = self.detector.detect(
            &state.conversation_history,
            embedding.as_deref(),
            persona_id,
            state.director_state.consecutive_similar,
        );

        let snippets = match &embedding {
            Some(query) => self
                .retrieve_degradable(session_id, query, persona_id, &mut degraded)
                .await,
            // No query vector, nothing to search with.
            None => Vec::new(),
        };

        let supervision = self.supervisor.supervise(&state, &loop_result, &snippets);
        let composition = self.composer.compose(
            self.registry.load(persona_id)?,
            state.relationship_score(persona_id),
            utterance,
            &snippets,
            &supervision.verdict,
        );

        let mut next = state;
        next.active_persona_id = Some(persona_id.to_owned());
        next.push_turn(Turn::user(persona_id, utterance, embedding));
        next.push_turn(Turn::assistant(persona_id, composition.reply_text.clone()));
        next.apply_relationship_delta(
            persona_id,
            composition.relationship_delta,
            composition.sentiment,
        );
        next.director_state = supervision.director_state;
        next.add_progress_markers(supervision.verdict.new_progress_markers.iter().cloned());
        next.safety_flags.extend(safety_flags.iter().cloned());

        self.store.put(&next).await?;

        Ok(TurnOutcome {
            session_id: session_id.to_owned(),
            persona_id: persona_id.to_owned(),
            reply_text: composition.reply_text,
            directive: supervision.verdict.directive,
            sentiment: composition.sentiment,
            relationship_score: next.relationship_score(persona_id),
            new_progress_markers: supervision.verdict.new_progress_markers,
            degraded,
        })
    }

    async fn retrieve_degradable(
        &self,
        session_id: &str,
        query: &[f32],
        persona_id: &str,
        degraded: &mut bool,
    ) -> Vec<Snippet> {
        match timeout(
            Duration::from_millis(self.config.retrieval.timeout_ms),
            self.retriever
                .retrieve(query, persona_id, self.config.retrieval.top_k as usize),
        )
        .await
        {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                warn!(%session_id, error = %e, "retrieval failed, turn continues without it");
                *degraded = true;
                Vec::new()
            }
            Err(_) => {
                warn!(%session_id, "retrieval timed out, turn continues without it");
                *degraded = true;
                Vec::new()
            }
        }
    }
}
