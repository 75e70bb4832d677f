//! `ce-engine` — the turn orchestrator and response composer.
//!
//! The [`Engine`] owns one full turn: it serializes access per session,
//! embeds the utterance, runs loop detection and supervision, composes the
//! persona's reply, and persists the updated state through the version-CAS
//! store.  Provider hiccups degrade the turn instead of failing it; the
//! caller learns via [`TurnOutcome::degraded`].

pub mod composer;
pub mod orchestrator;

pub use composer::{Composer, Composition};
pub use orchestrator::{Engine, TurnOutcome};
