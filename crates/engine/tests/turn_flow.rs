//! End-to-end turn pipeline tests with the deterministic hash embedder
//! and the in-memory backends.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use ce_domain::config::Config;
use ce_domain::directive::Directive;
use ce_domain::error::{Error, Result};
use ce_engine::Engine;
use ce_personas::PersonaRegistry;
use ce_retrieval::{EmbeddingProvider, HashEmbedder, VectorIndex};
use ce_sessions::{JsonFileSessionStore, MemorySessionStore, SessionState, SessionStore};

const DIM: usize = 256;

fn engine_with(
    config: Config,
    store: Arc<dyn SessionStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: VectorIndex,
) -> Engine {
    Engine::new(
        config,
        PersonaRegistry::with_builtin(),
        store,
        embedder,
        Arc::new(index),
    )
}

fn default_engine(store: Arc<dyn SessionStore>) -> Engine {
    engine_with(
        Config::default(),
        store,
        Arc::new(HashEmbedder::new(DIM)),
        VectorIndex::new(DIM),
    )
}

// ── provider doubles ─────────────────────────────────────────────────

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::ProviderUnavailable("embeddings offline".into()))
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

/// Memory-backed store that fails the next `conflicts` puts with a version
/// conflict, as an external writer racing the turn would.
#[derive(Default)]
struct ConflictingStore {
    inner: MemorySessionStore,
    conflicts: AtomicU32,
}

#[async_trait]
impl SessionStore for ConflictingStore {
    async fn get(&self, session_id: &str) -> Result<SessionState> {
        self.inner.get(session_id).await
    }

    async fn put(&self, state: &SessionState) -> Result<()> {
        let remaining = self.conflicts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::StoreWriteConflict {
                session_id: state.session_id.clone(),
                expected: state.version,
                found: state.version + 1,
            });
        }
        self.inner.put(state).await
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.inner.delete(session_id).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.inner.list().await
    }
}

struct SlowEmbedder;

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        Ok(vec![0.0; DIM])
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Basic flow
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn turn_appends_history_and_bumps_version() {
    let store = Arc::new(MemorySessionStore::new());
    let engine = default_engine(store.clone());

    let session = engine.create_session("u1").await.unwrap();
    assert_eq!(session.version, 1);

    let outcome = engine
        .run_turn(&session.session_id, "chro", "hello, where do we start?", &[])
        .await
        .unwrap();
    assert!(!outcome.reply_text.is_empty());
    assert_eq!(outcome.directive, Directive::None);

    let state = store.get(&session.session_id).await.unwrap();
    assert_eq!(state.conversation_history.len(), 2);
    assert_eq!(state.version, 2);
    assert_eq!(state.active_persona_id.as_deref(), Some("chro"));
    // The user turn carries its embedding for later loop detection.
    assert!(state.conversation_history[0].embedding.is_some());
    assert!(state.conversation_history[1].embedding.is_none());
}

#[tokio::test]
async fn unknown_persona_is_rejected_before_state_changes() {
    let store = Arc::new(MemorySessionStore::new());
    let engine = default_engine(store.clone());
    let session = engine.create_session("u1").await.unwrap();

    let err = engine
        .run_turn(&session.session_id, "intern", "hi", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownPersona(_)));

    let state = store.get(&session.session_id).await.unwrap();
    assert!(state.conversation_history.is_empty());
}

#[tokio::test]
async fn switch_persona_updates_the_session_without_a_turn() {
    let store = Arc::new(MemorySessionStore::new());
    let engine = default_engine(store.clone());
    let session = engine.create_session("u1").await.unwrap();

    engine.switch_persona(&session.session_id, "ceo").await.unwrap();

    let state = store.get(&session.session_id).await.unwrap();
    assert_eq!(state.active_persona_id.as_deref(), Some("ceo"));
    assert!(state.conversation_history.is_empty());

    let err = engine
        .switch_persona(&session.session_id, "intern")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownPersona(_)));
}

#[tokio::test]
async fn missing_session_is_not_found() {
    let engine = default_engine(Arc::new(MemorySessionStore::new()));
    let err = engine.run_turn("no-such-id", "chro", "hi", &[]).await.unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(_)));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Relationships
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn enthusiasm_trigger_warms_relationship() {
    let engine = default_engine(Arc::new(MemorySessionStore::new()));
    let session = engine.create_session("u1").await.unwrap();

    let outcome = engine
        .run_turn(
            &session.session_id,
            "chro",
            "I'd like to build inter-brand mobility into the program",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(outcome.relationship_score, 1);
}

#[tokio::test]
async fn pushback_trigger_cools_relationship() {
    let engine = default_engine(Arc::new(MemorySessionStore::new()));
    let session = engine.create_session("u1").await.unwrap();

    let outcome = engine
        .run_turn(
            &session.session_id,
            "chro",
            "let's just roll out a one-size-fits-all framework",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(outcome.relationship_score, -1);
}

#[tokio::test]
async fn relationships_are_tracked_per_persona() {
    let store = Arc::new(MemorySessionStore::new());
    let engine = default_engine(store.clone());
    let session = engine.create_session("u1").await.unwrap();

    engine
        .run_turn(&session.session_id, "chro", "job rotations sound great", &[])
        .await
        .unwrap();
    engine
        .run_turn(&session.session_id, "ceo", "I worry about corporate bureaucracy", &[])
        .await
        .unwrap();

    let state = store.get(&session.session_id).await.unwrap();
    assert_eq!(state.relationship_score("chro"), 1);
    assert_eq!(state.relationship_score("ceo"), -1);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Supervision through the pipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn third_ask_of_the_same_question_carries_a_nudge() {
    let store = Arc::new(MemorySessionStore::new());
    let engine = default_engine(store.clone());
    let session = engine.create_session("u1").await.unwrap();

    let question = "how exactly do the four pillars fit together?";

    let opener = engine
        .run_turn(&session.session_id, "chro", "good morning Elena", &[])
        .await
        .unwrap();
    assert_eq!(opener.directive, Directive::None);

    let first = engine
        .run_turn(&session.session_id, "chro", question, &[])
        .await
        .unwrap();
    assert_eq!(first.directive, Directive::None);

    let second = engine
        .run_turn(&session.session_id, "chro", question, &[])
        .await
        .unwrap();
    assert_eq!(second.directive, Directive::None);

    let third = engine
        .run_turn(&session.session_id, "chro", question, &[])
        .await
        .unwrap();
    assert_eq!(third.directive, Directive::SuggestNextTopic);
    // The steer is woven into the persona's reply, not a separate message.
    assert!(third.reply_text.contains("3 times now"));
    assert!(third.reply_text.contains("rather than repeat myself"));

    let state = store.get(&session.session_id).await.unwrap();
    assert_eq!(state.director_state.nudges_issued, 1);
    assert_eq!(state.director_state.nudge_cooldown, 5);
}

#[tokio::test]
async fn repeats_to_a_different_persona_do_not_count() {
    let engine = default_engine(Arc::new(MemorySessionStore::new()));
    let session = engine.create_session("u1").await.unwrap();

    let question = "how exactly do the four pillars fit together?";
    engine
        .run_turn(&session.session_id, "chro", question, &[])
        .await
        .unwrap();
    engine
        .run_turn(&session.session_id, "chro", question, &[])
        .await
        .unwrap();

    // Same question, but now addressed to the CEO: fresh run.
    let outcome = engine
        .run_turn(&session.session_id, "ceo", question, &[])
        .await
        .unwrap();
    assert_eq!(outcome.directive, Directive::None);
}

#[tokio::test]
async fn relevant_snippet_marks_progress() {
    let embedder = HashEmbedder::new(DIM);
    let index = VectorIndex::new(DIM);
    let text = "the four pillars framework covers vision entrepreneurship passion trust";
    index
        .insert(
            "hr_1",
            text,
            embedder.embed_sync(text),
            ["chro".to_owned()],
            Some("pillars".to_owned()),
        )
        .unwrap();

    let store = Arc::new(MemorySessionStore::new());
    let engine = engine_with(Config::default(), store.clone(), Arc::new(embedder), index);
    let session = engine.create_session("u1").await.unwrap();

    let outcome = engine
        .run_turn(&session.session_id, "chro", text, &[])
        .await
        .unwrap();
    assert_eq!(outcome.new_progress_markers, vec!["pillars"]);
    assert!(outcome.reply_text.contains("vision entrepreneurship"));

    let state = store.get(&session.session_id).await.unwrap();
    assert!(state.progress_markers.contains("pillars"));
}

#[tokio::test]
async fn retrieval_is_persona_scoped_through_the_pipeline() {
    let embedder = HashEmbedder::new(DIM);
    let index = VectorIndex::new(DIM);
    let text = "the four pillars framework covers vision entrepreneurship passion trust";
    index
        .insert(
            "hr_1",
            text,
            embedder.embed_sync(text),
            ["chro".to_owned()],
            Some("pillars".to_owned()),
        )
        .unwrap();

    let engine = engine_with(
        Config::default(),
        Arc::new(MemorySessionStore::new()),
        Arc::new(embedder),
        index,
    );
    let session = engine.create_session("u1").await.unwrap();

    // The snippet is CHRO-only; asking the CEO must not surface it.
    let outcome = engine
        .run_turn(&session.session_id, "ceo", text, &[])
        .await
        .unwrap();
    assert!(outcome.new_progress_markers.is_empty());
    assert!(!outcome.reply_text.contains("vision entrepreneurship"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Degradation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn embedding_failure_degrades_instead_of_failing() {
    let store = Arc::new(MemorySessionStore::new());
    let engine = engine_with(
        Config::default(),
        store.clone(),
        Arc::new(FailingEmbedder),
        VectorIndex::new(DIM),
    );
    let session = engine.create_session("u1").await.unwrap();

    let outcome = engine
        .run_turn(&session.session_id, "chro", "hello there", &[])
        .await
        .unwrap();
    assert!(outcome.degraded);
    assert!(!outcome.reply_text.is_empty());

    // The turn still lands in history, just without an embedding.
    let state = store.get(&session.session_id).await.unwrap();
    assert_eq!(state.conversation_history.len(), 2);
    assert!(state.conversation_history[0].embedding.is_none());
}

#[tokio::test]
async fn embedding_timeout_degrades_instead_of_failing() {
    let mut config = Config::default();
    config.embedding.timeout_ms = 50;

    let engine = engine_with(
        config,
        Arc::new(MemorySessionStore::new()),
        Arc::new(SlowEmbedder),
        VectorIndex::new(DIM),
    );
    let session = engine.create_session("u1").await.unwrap();

    let outcome = engine
        .run_turn(&session.session_id, "chro", "hello there", &[])
        .await
        .unwrap();
    assert!(outcome.degraded);
    assert!(!outcome.reply_text.is_empty());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Write conflicts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn write_conflict_is_retried_with_fresh_state() {
    let store = Arc::new(ConflictingStore::default());
    let engine = engine_with(
        Config::default(),
        store.clone(),
        Arc::new(HashEmbedder::new(DIM)),
        VectorIndex::new(DIM),
    );
    let session = engine.create_session("u1").await.unwrap();

    store.conflicts.store(1, Ordering::SeqCst);
    let outcome = engine
        .run_turn(&session.session_id, "chro", "hello there", &[])
        .await
        .unwrap();
    assert!(!outcome.reply_text.is_empty());
    // The injected conflict was consumed by the retry.
    assert_eq!(store.conflicts.load(Ordering::SeqCst), 0);

    let state = store.get(&session.session_id).await.unwrap();
    assert_eq!(state.conversation_history.len(), 2);
}

#[tokio::test]
async fn second_write_conflict_surfaces_to_the_caller() {
    let store = Arc::new(ConflictingStore::default());
    let engine = engine_with(
        Config::default(),
        store.clone(),
        Arc::new(HashEmbedder::new(DIM)),
        VectorIndex::new(DIM),
    );
    let session = engine.create_session("u1").await.unwrap();

    store.conflicts.store(2, Ordering::SeqCst);
    let err = engine
        .run_turn(&session.session_id, "chro", "hello there", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StoreWriteConflict { .. }));

    // Nothing landed: the turn failed whole.
    let state = store.get(&session.session_id).await.unwrap();
    assert!(state.conversation_history.is_empty());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Expiry and flags
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn expired_session_is_evicted_on_access() {
    let store = Arc::new(MemorySessionStore::new());
    let engine = default_engine(store.clone());

    let mut stale = SessionState::new("u1");
    stale.last_active_at = Utc::now() - Duration::hours(25);
    let id = stale.session_id.clone();
    store.put(&stale).await.unwrap();

    let err = engine.run_turn(&id, "chro", "hello?", &[]).await.unwrap_err();
    assert!(matches!(err, Error::SessionExpired(_)));
    assert!(matches!(store.get(&id).await, Err(Error::SessionNotFound(_))));
}

#[tokio::test]
async fn recent_history_is_bounded() {
    let mut config = Config::default();
    config.sessions.recent_history = 4;

    let engine = engine_with(
        config,
        Arc::new(MemorySessionStore::new()),
        Arc::new(HashEmbedder::new(DIM)),
        VectorIndex::new(DIM),
    );
    let session = engine.create_session("u1").await.unwrap();

    for topic in ["budget", "timeline", "staffing"] {
        engine
            .run_turn(&session.session_id, "chro", &format!("about the {topic}"), &[])
            .await
            .unwrap();
    }

    // Six turns exist; only the last four come back.
    let recent = engine.recent_history(&session.session_id).await.unwrap();
    assert_eq!(recent.len(), 4);
    assert!(recent[0].text.contains("timeline"));
}

#[tokio::test]
async fn safety_flags_are_recorded_on_the_session() {
    let store = Arc::new(MemorySessionStore::new());
    let engine = default_engine(store.clone());
    let session = engine.create_session("u1").await.unwrap();

    engine
        .run_turn(
            &session.session_id,
            "chro",
            "something questionable",
            &["harassment".to_owned()],
        )
        .await
        .unwrap();

    let state = store.get(&session.session_id).await.unwrap();
    assert_eq!(state.safety_flags, vec!["harassment"]);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Durable backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn turns_survive_a_store_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let session_id = {
        let store = Arc::new(JsonFileSessionStore::new(dir.path()).unwrap());
        let engine = default_engine(store);
        let session = engine.create_session("u1").await.unwrap();
        engine
            .run_turn(&session.session_id, "chro", "let's talk job rotations", &[])
            .await
            .unwrap();
        session.session_id
    };

    // A fresh store over the same directory sees the same session.
    let reopened = JsonFileSessionStore::new(dir.path()).unwrap();
    let state = reopened.get(&session_id).await.unwrap();
    assert_eq!(state.conversation_history.len(), 2);
    assert_eq!(state.relationship_score("chro"), 1);
}
