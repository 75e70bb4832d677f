/// Shared error type used across all coworker-engine crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("session expired: {0}")]
    SessionExpired(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("provider timeout: {0}")]
    ProviderTimeout(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("store write conflict for session {session_id}: expected version {expected}, found {found}")]
    StoreWriteConflict {
        session_id: String,
        expected: u64,
        found: u64,
    },

    #[error("unknown persona: {0}")]
    UnknownPersona(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this failure is absorbed into a degraded-but-successful turn.
    ///
    /// Provider-level failures (embedding, retrieval) never fail a turn:
    /// the orchestrator falls back to persona-general behavior.  Store and
    /// session failures surface to the caller as explicit outcomes.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Error::ProviderTimeout(_) | Error::ProviderUnavailable(_) | Error::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
