//! The supervisor (director): decides when to intervene.
//!
//! Runs once per turn.  Consumes the loop-detector result and the
//! retrieval hits, and returns a directive plus a replacement
//! `DirectorState` — it never writes the store, and the user never sees
//! it as a separate actor: directives are advisory text the composer
//! weaves into the persona's own voice.

use tracing::{debug, info};

use ce_domain::config::DirectorConfig;
use ce_domain::directive::{Directive, SupervisorVerdict};
use ce_retrieval::Snippet;
use ce_sessions::state::{DirectorPhase, DirectorState, SessionState};

use crate::loop_detector::LoopResult;

/// What one supervision pass produced: the verdict for the composer and
/// the director-state delta for the orchestrator to apply.
#[derive(Debug, Clone)]
pub struct SupervisionOutcome {
    pub verdict: SupervisorVerdict,
    pub director_state: DirectorState,
}

/// Per-turn supervision state machine.
pub struct Supervisor {
    config: DirectorConfig,
}

impl Supervisor {
    pub fn new(config: DirectorConfig) -> Self {
        Self { config }
    }

    /// Evaluate one turn.
    ///
    /// State machine: `Idle → Monitoring` on the first qualifying repeat;
    /// once the run reaches `nudge_after` a single nudge is emitted and the
    /// phase returns to `Idle` with a cooldown.  While the cooldown runs,
    /// a qualifying run parks in `NudgePending` instead of nudging again.
    /// Off-topic redirects are evaluated independently with their own
    /// streak and cooldown; when both fire, the stuck-loop nudge wins.
    pub fn supervise(
        &self,
        state: &SessionState,
        loop_result: &LoopResult,
        retrieval: &[Snippet],
    ) -> SupervisionOutcome {
        let mut ds = state.director_state.clone();

        // Readiness is judged on the cooldown as it stood at turn start;
        // unfired cooldowns tick down at the end of the pass so a freshly
        // set cooldown suppresses the full configured number of turns.
        let nudge_ready = ds.nudge_cooldown == 0;
        let offtopic_ready = ds.offtopic_cooldown == 0;

        let mut directive = Directive::None;
        let mut directive_text = None;

        // ── stuck-loop machine ───────────────────────────────────────
        if loop_result.qualifies {
            ds.consecutive_similar += 1;
            ds.matched_turn = loop_result.matched_turn_index;

            // `consecutive_similar` counts repeats; the run length includes
            // the original ask, so a run of `nudge_after` utterances means
            // `nudge_after - 1` qualifying repeats.  The detector's stuck
            // signal additionally guards against thin history.
            if loop_result.is_stuck && ds.consecutive_similar + 1 >= self.config.nudge_after {
                if nudge_ready {
                    directive = Directive::SuggestNextTopic;
                    // Lead-in clause the composer builds its steer around.
                    directive_text = Some(format!(
                        "We've been over this same question {} times now",
                        ds.consecutive_similar + 1
                    ));
                    ds.phase = DirectorPhase::Idle;
                    ds.nudge_cooldown = self.config.nudge_cooldown;
                    ds.nudges_issued += 1;
                    info!(
                        session_id = %state.session_id,
                        run = ds.consecutive_similar,
                        "stuck loop confirmed, nudge emitted"
                    );
                } else {
                    // Nudge wanted but suppressed — wait out the cooldown.
                    ds.phase = DirectorPhase::NudgePending;
                }
            } else {
                ds.phase = DirectorPhase::Monitoring;
            }
        } else {
            // Run broken: reset per the state-machine invariant.
            ds.consecutive_similar = 0;
            ds.matched_turn = None;
            ds.phase = DirectorPhase::Idle;
        }

        // ── off-topic detection ──────────────────────────────────────
        // Only measurable when retrieval produced something; an empty or
        // failed retrieval never counts toward the streak.
        if let Some(best) = retrieval.first() {
            if best.score < self.config.relevance_floor {
                ds.offtopic_streak += 1;
            } else {
                ds.offtopic_streak = 0;
            }

            if directive.is_none()
                && ds.offtopic_streak >= self.config.offtopic_after
                && offtopic_ready
            {
                directive = Directive::RedirectOnTopic;
                directive_text = Some(
                    "This has drifted a fair way from what we set out to work on"
                        .to_owned(),
                );
                ds.offtopic_cooldown = self.config.offtopic_cooldown;
                info!(
                    session_id = %state.session_id,
                    streak = ds.offtopic_streak,
                    "off-topic drift confirmed, redirect emitted"
                );
            }
        }

        // Tick down any cooldown that was not set this turn.
        if directive != Directive::SuggestNextTopic {
            ds.nudge_cooldown = ds.nudge_cooldown.saturating_sub(1);
        }
        if directive != Directive::RedirectOnTopic {
            ds.offtopic_cooldown = ds.offtopic_cooldown.saturating_sub(1);
        }

        // ── progress markers ─────────────────────────────────────────
        // Independent of nudge logic, always applied.
        let new_progress_markers: Vec<String> = retrieval
            .iter()
            .filter(|s| s.score >= self.config.progress_floor)
            .filter_map(|s| s.progress_marker.clone())
            .filter(|m| !state.progress_markers.contains(m))
            .collect();

        if !new_progress_markers.is_empty() {
            debug!(
                session_id = %state.session_id,
                markers = ?new_progress_markers,
                "progress markers covered"
            );
        }

        SupervisionOutcome {
            verdict: SupervisorVerdict {
                directive,
                directive_text,
                new_progress_markers,
            },
            director_state: ds,
        }
    }
}
