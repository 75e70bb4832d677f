//! `ce-sessions` — session state and storage.
//!
//! One [`SessionState`] per active conversation, persisted through the
//! [`SessionStore`] contract (in-memory and JSON-file backends), with a
//! retention-window expiry lifecycle and per-session run locks that
//! serialize the orchestrator's read-modify-write cycle.

pub mod lifecycle;
pub mod lock;
pub mod state;
pub mod store;

pub use lifecycle::LifecycleManager;
pub use lock::SessionLocks;
pub use state::{DirectorPhase, DirectorState, RelationshipState, Sentiment, SessionState};
pub use store::{JsonFileSessionStore, MemorySessionStore, SessionStore};
