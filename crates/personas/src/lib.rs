//! `ce-personas` — static persona registry.
//!
//! A persona is a configured AI co-worker identity: name, role, behavioral
//! triggers, hidden constraints, and tone rules.  The registry is built once
//! at startup (from the built-in set, a TOML file, or explicit configs) and
//! is immutable afterwards — there is deliberately no runtime mutation path.

pub mod builtin;
pub mod config;
pub mod registry;

pub use config::{PersonaConfig, ToneBand, ToneRules};
pub use registry::PersonaRegistry;
