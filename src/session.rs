//! Client-side session storage.
//!
//! Holds the signed-in user's id and bearer token. Every sign-in gets a new
//! epoch so work started under an older session can be recognised and
//! dropped when it completes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub token: String,
    pub epoch: u64,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Shared, cheaply-cloneable session slot.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Option<Session>>>,
    next_epoch: Arc<AtomicU64>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            next_epoch: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Convenience constructor for an already signed-in session.
    pub fn signed_in(user_id: i64, token: impl Into<String>) -> Self {
        let store = Self::new();
        store.sign_in(user_id, token);
        store
    }

    /// Start a new session, replacing any existing one. Returns its epoch.
    pub fn sign_in(&self, user_id: i64, token: impl Into<String>) -> u64 {
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        self.tx.send_replace(Some(Session {
            user_id,
            token: token.into(),
            epoch,
        }));
        tracing::info!(user_id, epoch, "session started");
        epoch
    }

    pub fn sign_out(&self) {
        if let Some(prev) = self.tx.send_replace(None) {
            tracing::info!(user_id = prev.user_id, epoch = prev.epoch, "session ended");
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// Epoch of the active session, if any.
    pub fn epoch(&self) -> Option<u64> {
        self.tx.borrow().as_ref().map(|s| s.epoch)
    }

    /// True while the session that had `epoch` is still the active one.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == Some(epoch)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
