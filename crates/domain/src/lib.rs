//! `ce-domain` — shared types for the coworker-engine workspace.
//!
//! Holds the error taxonomy, the engine configuration structs, the
//! turn/message model, and the supervisor directive contract.  Every other
//! crate in the workspace depends on this one and nothing else internal.

pub mod config;
pub mod directive;
pub mod error;
pub mod turn;

pub use config::{Config, DirectorConfig, EmbeddingConfig, RetrievalConfig, SessionsConfig};
pub use directive::{Directive, SupervisorVerdict};
pub use error::{Error, Result};
pub use turn::{Role, Turn};

/// Opaque persona identifier (e.g. `"chro"`, `"ceo"`).
pub type PersonaId = String;
