//! Per-session run locks.
//!
//! One turn at a time per session: the orchestrator holds a permit for the
//! duration of its read-modify-write cycle, so a second concurrent turn on
//! the same session waits instead of reading stale history.  Different
//! sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use ce_domain::error::{Error, Result};

/// Maps each session id to a single-permit semaphore.
///
/// Entries are created lazily on first acquire and pruned when idle.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn semaphore(&self, session_id: &str) -> Arc<Semaphore> {
        let mut locks = self.locks.lock();
        locks
            .entry(session_id.to_owned())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    /// Acquire the run permit for a session, waiting if a turn is in flight.
    /// The permit releases on drop.
    pub async fn acquire(&self, session_id: &str) -> Result<OwnedSemaphorePermit> {
        self.semaphore(session_id)
            .acquire_owned()
            .await
            .map_err(|_| Error::Other(format!("session lock closed: {session_id}")))
    }

    /// Acquire without waiting.  `None` means a turn is in flight — used by
    /// the expiry sweep so it never evicts a session mid-turn.
    pub fn try_acquire(&self, session_id: &str) -> Option<OwnedSemaphorePermit> {
        match self.semaphore(session_id).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(TryAcquireError::NoPermits) => None,
            Err(TryAcquireError::Closed) => None,
        }
    }

    /// Number of tracked sessions (for monitoring).
    pub fn session_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop lock entries for sessions with no turn in flight.
    pub fn prune_idle(&self) {
        self.locks.lock().retain(|_, sem| sem.available_permits() == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_turns_on_one_session() {
        let locks = SessionLocks::new();
        let p1 = locks.acquire("s1").await.unwrap();
        drop(p1);
        let p2 = locks.acquire("s1").await.unwrap();
        drop(p2);
    }

    #[tokio::test]
    async fn different_sessions_run_in_parallel() {
        let locks = SessionLocks::new();
        let _p1 = locks.acquire("s1").await.unwrap();
        let _p2 = locks.acquire("s2").await.unwrap();
        assert_eq!(locks.session_count(), 2);
    }

    #[tokio::test]
    async fn try_acquire_fails_while_held() {
        let locks = SessionLocks::new();
        let held = locks.acquire("s1").await.unwrap();
        assert!(locks.try_acquire("s1").is_none());
        drop(held);
        assert!(locks.try_acquire("s1").is_some());
    }

    #[tokio::test]
    async fn second_turn_waits_for_first() {
        let locks = Arc::new(SessionLocks::new());
        let permit = locks.acquire("s1").await.unwrap();

        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move { locks2.acquire("s1").await.unwrap() });

        // The waiter cannot finish while the permit is held.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(permit);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn prune_drops_idle_entries() {
        let locks = SessionLocks::new();
        let held = locks.acquire("busy").await.unwrap();
        drop(locks.acquire("idle").await.unwrap());

        locks.prune_idle();
        assert_eq!(locks.session_count(), 1);
        drop(held);
    }
}
