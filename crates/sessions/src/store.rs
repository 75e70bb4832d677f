//! The session store contract and its two backends.
//!
//! `put` is a compare-and-swap on the session's version counter: the stored
//! version must match the caller's copy, and the written state carries
//! `version + 1`.  A mismatch fails with `StoreWriteConflict` and leaves
//! the previous state intact — a second concurrent writer can never
//! silently overwrite the first one's appended history.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use ce_domain::error::{Error, Result};

use crate::state::SessionState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Contract
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Key-value session storage.  The engine is agnostic about the backend;
/// both implementations below pass the same test suite.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session.  `SessionNotFound` when absent.
    async fn get(&self, session_id: &str) -> Result<SessionState>;

    /// Atomically persist a session (version CAS, see module docs).
    /// A brand-new session must carry `version == 0`.
    async fn put(&self, state: &SessionState) -> Result<()>;

    /// Remove a session.  Removing an absent session is not an error.
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// All stored session ids.
    async fn list(&self) -> Result<Vec<String>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Transient process-local store.  Data does not survive a restart.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<SessionState> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(session_id.to_owned()))
    }

    async fn put(&self, state: &SessionState) -> Result<()> {
        let mut sessions = self.sessions.write();
        let found = sessions.get(&state.session_id).map(|s| s.version);
        check_version(&state.session_id, state.version, found)?;

        let mut next = state.clone();
        next.version += 1;
        sessions.insert(state.session_id.clone(), next);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions.write().remove(session_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.sessions.read().keys().cloned().collect())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JSON-file backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Durable store: one `<session_id>.json` per session under a base dir.
///
/// Writes go to a temp file first and are renamed into place, so a failed
/// write leaves the previous state on disk.  A process-wide mutex keeps
/// the read-compare-write of `put` atomic within this process; cross-process
/// writers are out of scope for this backend.
pub struct JsonFileSessionStore {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileSessionStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Session ids are uuids; anything else (path separators, `..`, empty)
    /// is rejected so a crafted id can never reach files outside `base_dir`.
    fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        let well_formed = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !well_formed {
            return Err(Error::Other(format!("malformed session id: {session_id}")));
        }
        Ok(self.base_dir.join(format!("{session_id}.json")))
    }

    fn read_file(&self, session_id: &str) -> Result<Option<SessionState>> {
        let path = self.path_for(session_id)?;
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn get(&self, session_id: &str) -> Result<SessionState> {
        self.read_file(session_id)?
            .ok_or_else(|| Error::SessionNotFound(session_id.to_owned()))
    }

    async fn put(&self, state: &SessionState) -> Result<()> {
        let _guard = self.write_lock.lock();

        let found = self.read_file(&state.session_id)?.map(|s| s.version);
        check_version(&state.session_id, state.version, found)?;

        let mut next = state.clone();
        next.version += 1;
        let json = serde_json::to_string_pretty(&next)?;

        // Temp-then-rename keeps the old state intact if the write fails.
        let path = self.path_for(&state.session_id)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;

        debug!(session_id = %state.session_id, version = next.version, "session persisted");
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        match std::fs::remove_file(self.path_for(session_id)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_owned());
                }
            }
        }
        Ok(ids)
    }
}

/// Shared CAS check: a new session (version 0) must not already exist; an
/// existing session must match the stored version exactly.
fn check_version(session_id: &str, expected: u64, found: Option<u64>) -> Result<()> {
    match found {
        None if expected == 0 => Ok(()),
        None => Err(Error::StoreWriteConflict {
            session_id: session_id.to_owned(),
            expected,
            found: 0,
        }),
        Some(v) if v == expected => Ok(()),
        Some(v) => Err(Error::StoreWriteConflict {
            session_id: session_id.to_owned(),
            expected,
            found: v,
        }),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backend-parametrized tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
