//! Stuck-loop detection over recent conversation history.
//!
//! Compares the current utterance's embedding against the cached embeddings
//! of the last `window` user turns addressed to the same persona (a stuck
//! loop is persona-relative).  A single similar question is not a loop:
//! the detector only reports stuck after `min_run` consecutive qualifying
//! turns.

use tracing::warn;

use ce_domain::config::DirectorConfig;
use ce_domain::turn::Turn;
use ce_retrieval::cosine_similarity;

/// Result of one detection pass.
#[derive(Debug, Clone, Default)]
pub struct LoopResult {
    /// Max similarity met the threshold this turn (extends the run).
    pub qualifies: bool,
    /// The run is long enough to count as a stuck loop.
    pub is_stuck: bool,
    /// History index of the best-matching prior turn.  Ties prefer the
    /// most recent turn.
    pub matched_turn_index: Option<usize>,
    /// The maximum similarity observed.
    pub similarity: f32,
}

/// Semantic repetition detector.  Stateless; the consecutive-run counter
/// lives in `DirectorState` and is threaded in by the caller.
pub struct LoopDetector {
    config: DirectorConfig,
}

impl LoopDetector {
    pub fn new(config: DirectorConfig) -> Self {
        Self { config }
    }

    /// Evaluate the current user utterance against history.
    ///
    /// `prior_consecutive` is the number of consecutive qualifying turns
    /// so far (from `DirectorState`).  A missing embedding fails open:
    /// the detector reports not-stuck rather than blocking the turn.
    pub fn detect(
        &self,
        history: &[Turn],
        current_embedding: Option<&[f32]>,
        persona_id: &str,
        prior_consecutive: u32,
    ) -> LoopResult {
        let Some(current) = current_embedding else {
            warn!(%persona_id, "no embedding for current utterance; loop detection skipped");
            return LoopResult::default();
        };

        // Candidate turns: recent user turns to the same persona with a
        // cached embedding.
        let candidates: Vec<(usize, &[f32])> = history
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_user_turn_for(persona_id))
            .filter_map(|(i, t)| t.embedding.as_deref().map(|e| (i, e)))
            .rev()
            .take(self.config.window)
            .collect();

        let mut best: Option<(usize, f32)> = None;
        // Iterated newest-first, so strict `>` keeps the most recent turn
        // on ties.
        for (index, embedding) in &candidates {
            let sim = cosine_similarity(current, embedding);
            if best.map(|(_, s)| sim > s).unwrap_or(true) {
                best = Some((*index, sim));
            }
        }

        let Some((matched, similarity)) = best else {
            return LoopResult::default();
        };

        let qualifies = similarity >= self.config.similarity_threshold;
        // An isolated similar question is never a loop; and with fewer
        // than two prior comparable turns there is nothing to loop over.
        let run = if qualifies { prior_consecutive + 1 } else { 0 };
        let is_stuck = qualifies && candidates.len() >= 2 && run >= self.config.min_run;

        LoopResult {
            qualifies,
            is_stuck,
            matched_turn_index: Some(matched),
            similarity,
        }
    }
}
