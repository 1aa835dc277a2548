//! Per-session mutation locks
//!
//! Every mutating operation on a session runs inside a [`SessionGuard`]. The
//! guard also owns the session's cancellation token, which outstanding AI calls
//! check before their response is recorded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ConcurrencyConfig;
use crate::error::EngineError;
use crate::types::SessionId;

/// Registry of per-session locks
///
/// Locks are created lazily on first use and live as long as the registry;
/// sessions are never deleted.
pub struct SessionLocks {
    slots: RwLock<HashMap<SessionId, Arc<Mutex<CancellationToken>>>>,
    wait: Duration,
    retry_after_ms: u64,
}

impl SessionLocks {
    pub fn new(config: &ConcurrencyConfig) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            wait: Duration::from_millis(config.lock_wait_ms),
            retry_after_ms: config.retry_after_ms,
        }
    }

    /// Acquire exclusive mutation rights on a session
    ///
    /// Waits at most the configured lock wait, then fails with `SessionBusy`.
    pub async fn acquire(&self, session_id: &SessionId) -> Result<SessionGuard, EngineError> {
        let slot = self.slot(session_id).await;
        match tokio::time::timeout(self.wait, slot.lock_owned()).await {
            Ok(guard) => {
                debug!(session_id = %session_id, "Session lock acquired");
                Ok(SessionGuard {
                    session_id: session_id.clone(),
                    token: guard,
                })
            }
            Err(_) => {
                warn!(
                    session_id = %session_id,
                    wait_ms = self.wait.as_millis() as u64,
                    "Session lock wait exceeded"
                );
                Err(EngineError::SessionBusy {
                    session_id: session_id.clone(),
                    retry_after_ms: self.retry_after_ms,
                })
            }
        }
    }

    /// Acquire the lock without the fail-fast bound
    ///
    /// For finishing a submission that already passed [`acquire`]. Holders
    /// never keep the lock across an AI call, so the wait is short.
    ///
    /// [`acquire`]: SessionLocks::acquire
    pub async fn wait_for(&self, session_id: &SessionId) -> SessionGuard {
        let slot = self.slot(session_id).await;
        let guard = slot.lock_owned().await;
        debug!(session_id = %session_id, "Session lock reacquired");
        SessionGuard {
            session_id: session_id.clone(),
            token: guard,
        }
    }

    /// Number of sessions with a lock slot
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    async fn slot(&self, session_id: &SessionId) -> Arc<Mutex<CancellationToken>> {
        if let Some(slot) = self.slots.read().await.get(session_id) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(CancellationToken::new())))
            .clone()
    }
}

/// Exclusive access to one session until dropped
pub struct SessionGuard {
    session_id: SessionId,
    token: OwnedMutexGuard<CancellationToken>,
}

impl SessionGuard {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Token that is cancelled when the session stops tutoring
    ///
    /// Clone it before releasing the guard to watch an out-of-band call.
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel every call started before now and arm a fresh token
    pub fn cancel_in_flight(&mut self) {
        self.token.cancel();
        *self.token = CancellationToken::new();
        debug!(session_id = %self.session_id, "Cancelled in-flight tutor calls");
    }
}
