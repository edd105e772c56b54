//! App-scoped notification store.
//!
//! Holds the most recently fetched list and the badge count for the signed-in
//! user. Every display surface reads the same snapshot through a `watch`
//! channel, so a change made from one surface is visible in all of them.
//!
//! Mutations are optimistic: the local snapshot is updated and published
//! before the backend call is issued. A failed call never flips a record
//! back to unread by itself; with `reconcile_on_failure` the store runs one
//! refresh, which is the only way a failed change gets undone.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::api::NotificationSource;
use crate::errors::{Result, SyncError};
use crate::models::notification::{unread_count, Notification};
use crate::session::{Session, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    MarkRead,
    MarkAllRead,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::MarkRead => "mark_read",
            MutationKind::MarkAllRead => "mark_all_read",
            MutationKind::Delete => "delete",
        }
    }
}

/// An optimistic change whose backend call has not answered yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    pub kind: MutationKind,
    /// `None` for mark-all-read.
    pub notification_id: Option<i64>,
    pub started_at: DateTime<Utc>,
}

/// Point-in-time view of the store, as published to subscribers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    /// Backend order, newest first.
    pub notifications: Vec<Notification>,
    /// Badge value. Recomputed on refresh, adjusted locally by mutations.
    pub unread: usize,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub pending: BTreeMap<u64, PendingMutation>,
}

impl StoreSnapshot {
    pub fn get(&self, id: i64) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.id == id)
    }
}

/// Shared, cheaply-cloneable notification store.
#[derive(Clone)]
pub struct NotificationStore {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn NotificationSource>,
    session: SessionStore,
    tx: watch::Sender<StoreSnapshot>,
    next_mutation: AtomicU64,
    reconcile_on_failure: bool,
}

impl NotificationStore {
    pub fn new(source: Arc<dyn NotificationSource>, session: SessionStore) -> Self {
        Self::with_options(source, session, true)
    }

    /// `reconcile_on_failure` controls the refresh that follows a failed mutation.
    pub fn with_options(
        source: Arc<dyn NotificationSource>,
        session: SessionStore,
        reconcile_on_failure: bool,
    ) -> Self {
        let (tx, _rx) = watch::channel(StoreSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                source,
                session,
                tx,
                next_mutation: AtomicU64::new(1),
                reconcile_on_failure,
            }),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.tx.borrow().clone()
    }

    pub fn unread(&self) -> usize {
        self.inner.tx.borrow().unread
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.inner.tx.subscribe()
    }

    /// Stream of snapshots, starting with the current one.
    pub fn changes(&self) -> WatchStream<StoreSnapshot> {
        WatchStream::new(self.subscribe())
    }

    pub fn pending_mutations(&self) -> Vec<PendingMutation> {
        self.inner.tx.borrow().pending.values().cloned().collect()
    }

    fn active_session(&self) -> Result<Session> {
        self.inner.session.current().ok_or(SyncError::NoSession)
    }

    /// Replace the local list with the backend's. On failure the list is left untouched.
    pub async fn refresh(&self) -> Result<usize> {
        let session = self.active_session()?;
        let result = self.inner.source.fetch_all(session.user_id).await;

        match result {
            Ok(fetched) => {
                let mut seen = HashSet::with_capacity(fetched.len());
                let notifications: Vec<Notification> = fetched
                    .into_iter()
                    .filter(|n| seen.insert(n.id))
                    .collect();
                let total = notifications.len();
                let unread = unread_count(&notifications);

                let session_store = &self.inner.session;
                let mut applied = false;
                self.inner.tx.send_if_modified(|s| {
                    // late answer for a session that has since ended
                    if !session_store.is_current(session.epoch) {
                        return false;
                    }
                    s.notifications = notifications;
                    s.unread = unread;
                    s.last_refreshed = Some(Utc::now());
                    s.last_error = None;
                    applied = true;
                    true
                });

                if !applied {
                    tracing::debug!(user_id = session.user_id, "discarding refresh for stale session");
                    return Err(SyncError::SessionChanged);
                }
                tracing::debug!(user_id = session.user_id, total, unread, "notifications refreshed");
                Ok(total)
            }
            Err(e) => {
                tracing::error!(
                    user_id = session.user_id,
                    error = %e,
                    kind = e.kind(),
                    "failed to refresh notifications"
                );
                self.record_error(session.epoch, &e);
                Err(e)
            }
        }
    }

    /// Fetch the server's unread count and publish it as the badge value.
    pub async fn load_unread_count(&self) -> Result<usize> {
        let session = self.active_session()?;
        match self.inner.source.unread_count(session.user_id).await {
            Ok(count) => {
                let session_store = &self.inner.session;
                let applied = self.inner.tx.send_if_modified(|s| {
                    if !session_store.is_current(session.epoch) {
                        return false;
                    }
                    let changed = s.unread != count;
                    s.unread = count;
                    changed
                });
                if !applied && !session_store.is_current(session.epoch) {
                    return Err(SyncError::SessionChanged);
                }
                Ok(count)
            }
            Err(e) => {
                tracing::error!(user_id = session.user_id, error = %e, "failed to load unread count");
                self.record_error(session.epoch, &e);
                Err(e)
            }
        }
    }

    /// Mark one record read locally, then tell the backend.
    pub async fn mark_one_read(&self, id: i64) -> Result<()> {
        let session = self.active_session()?;

        self.inner.tx.send_if_modified(|s| {
            match s.notifications.iter_mut().find(|n| n.id == id) {
                Some(n) if !n.is_read => {
                    n.is_read = true;
                    s.unread = s.unread.saturating_sub(1);
                    true
                }
                _ => false,
            }
        });

        let seq = self.begin(MutationKind::MarkRead, Some(id));
        let outcome = self.inner.source.mark_read(id).await;
        self.finish(seq, &session, MutationKind::MarkRead, Some(id), outcome)
            .await
    }

    /// Mark every local record read and zero the badge, then one backend call.
    pub async fn mark_all_read(&self) -> Result<()> {
        let session = self.active_session()?;

        self.inner.tx.send_if_modified(|s| {
            let mut changed = s.unread != 0;
            for n in s.notifications.iter_mut().filter(|n| !n.is_read) {
                n.is_read = true;
                changed = true;
            }
            s.unread = 0;
            changed
        });

        let seq = self.begin(MutationKind::MarkAllRead, None);
        let outcome = self.inner.source.mark_all_read(session.user_id).await;
        self.finish(seq, &session, MutationKind::MarkAllRead, None, outcome)
            .await
    }

    /// Remove one record locally, then issue the backend delete.
    pub async fn delete_one(&self, id: i64) -> Result<()> {
        let session = self.active_session()?;

        self.inner.tx.send_if_modified(|s| {
            match s.notifications.iter().position(|n| n.id == id) {
                Some(idx) => {
                    let removed = s.notifications.remove(idx);
                    if !removed.is_read {
                        s.unread = s.unread.saturating_sub(1);
                    }
                    true
                }
                None => false,
            }
        });

        let seq = self.begin(MutationKind::Delete, Some(id));
        let outcome = self.inner.source.delete(id).await;
        self.finish(seq, &session, MutationKind::Delete, Some(id), outcome)
            .await
    }

    /// Drop everything, e.g. when the session ends.
    pub fn clear(&self) {
        self.inner.tx.send_replace(StoreSnapshot::default());
    }

    fn begin(&self, kind: MutationKind, notification_id: Option<i64>) -> u64 {
        let seq = self.inner.next_mutation.fetch_add(1, Ordering::Relaxed);
        self.inner.tx.send_modify(|s| {
            s.pending.insert(
                seq,
                PendingMutation {
                    kind,
                    notification_id,
                    started_at: Utc::now(),
                },
            );
        });
        seq
    }

    async fn finish(
        &self,
        seq: u64,
        session: &Session,
        kind: MutationKind,
        notification_id: Option<i64>,
        outcome: Result<()>,
    ) -> Result<()> {
        self.inner.tx.send_if_modified(|s| s.pending.remove(&seq).is_some());

        if !self.inner.session.is_current(session.epoch) {
            tracing::debug!(mutation = kind.as_str(), "ignoring mutation result for stale session");
            return outcome.map_err(|_| SyncError::SessionChanged);
        }

        match outcome {
            Ok(()) => {
                tracing::debug!(
                    mutation = kind.as_str(),
                    notification_id = ?notification_id,
                    "mutation confirmed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    mutation = kind.as_str(),
                    notification_id = ?notification_id,
                    user_id = session.user_id,
                    error = %e,
                    "optimistic mutation failed on backend"
                );
                self.record_error(session.epoch, &e);

                if self.inner.reconcile_on_failure {
                    if let Err(refresh_err) = self.refresh().await {
                        tracing::warn!(error = %refresh_err, "reconciling refresh failed");
                    }
                }
                Err(e)
            }
        }
    }

    fn record_error(&self, epoch: u64, err: &SyncError) {
        let session_store = &self.inner.session;
        let message = err.to_string();
        self.inner.tx.send_if_modified(|s| {
            if !session_store.is_current(epoch) {
                return false;
            }
            s.last_error = Some(message);
            true
        });
    }
}
