//! Session expiry lifecycle.
//!
//! A session is expired once `now - last_active_at` exceeds the retention
//! window.  Expiry is enforced two ways: lazily on access (the orchestrator
//! evicts and fails the turn with `SessionExpired`) and via an explicit
//! [`LifecycleManager::sweep`] that hosts can run on a timer.  The sweep
//! skips sessions whose run lock is held, so it never evicts mid-turn.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use ce_domain::config::SessionsConfig;
use ce_domain::error::Result;

use crate::lock::SessionLocks;
use crate::state::SessionState;
use crate::store::SessionStore;

/// Evaluates and enforces the retention window.
pub struct LifecycleManager {
    retention: Duration,
}

impl LifecycleManager {
    pub fn new(config: &SessionsConfig) -> Self {
        Self {
            retention: Duration::seconds(config.retention_secs as i64),
        }
    }

    /// Whether the session has outlived the retention window at `now`.
    pub fn is_expired(&self, state: &SessionState, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(state.last_active_at) > self.retention
    }

    /// Evict every expired session.  Returns the evicted ids.
    ///
    /// Safe to run concurrently with active turns: a session whose run
    /// lock is held is skipped this round, and expiry is re-checked under
    /// the permit so a just-refreshed session survives.
    pub async fn sweep(
        &self,
        store: &dyn SessionStore,
        locks: &SessionLocks,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let mut evicted = Vec::new();

        for session_id in store.list().await? {
            // A held lock means a turn is in flight — never evict those.
            let Some(_permit) = locks.try_acquire(&session_id) else {
                continue;
            };

            let state = match store.get(&session_id).await {
                Ok(state) => state,
                // Deleted between list and get — nothing to do.
                Err(_) => continue,
            };

            if self.is_expired(&state, now) {
                store.delete(&session_id).await?;
                info!(%session_id, "expired session evicted");
                evicted.push(session_id);
            }
        }

        locks.prune_idle();
        Ok(evicted)
    }
}
