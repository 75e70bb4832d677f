//! `ce-director` — invisible conversation supervision.
//!
//! Two cooperating pieces: the [`LoopDetector`] measures semantic
//! repetition against recent history, and the [`Supervisor`] turns those
//! signals (plus retrieval relevance) into directives and director-state
//! deltas.  Neither writes the session store; the orchestrator applies
//! what they return.

pub mod loop_detector;
pub mod supervisor;

pub use loop_detector::{LoopDetector, LoopResult};
pub use supervisor::{SupervisionOutcome, Supervisor};
