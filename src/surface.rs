//! Display surfaces and the hub that owns the shared store and poller.
//!
//! All mounted surfaces read the same store. The first mount starts the
//! poller; dropping the last surface stops it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

use crate::api::NotificationSource;
use crate::config::Config;
use crate::errors::Result;
use crate::models::notification::Notification;
use crate::poller::{self, PollerConfig, PollerHandle};
use crate::session::SessionStore;
use crate::store::{NotificationStore, StoreSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Header widget; shows the first `dropdown_limit` records.
    Dropdown,
    /// Notifications page; shows everything.
    FullPage,
}

/// One rendered row: the record plus its relative-age label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRow {
    #[serde(flatten)]
    pub notification: Notification,
    pub age: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceView {
    pub items: Vec<NotificationRow>,
    pub unread: usize,
    /// Size of the full list, before any truncation.
    pub total: usize,
}

/// Records a surface of `kind` displays, in backend order (not re-sorted).
pub fn visible(kind: SurfaceKind, limit: usize, notifications: &[Notification]) -> &[Notification] {
    match kind {
        SurfaceKind::Dropdown => &notifications[..notifications.len().min(limit)],
        SurfaceKind::FullPage => notifications,
    }
}

pub fn render(kind: SurfaceKind, limit: usize, snapshot: &StoreSnapshot, now: DateTime<Utc>) -> SurfaceView {
    let items = visible(kind, limit, &snapshot.notifications)
        .iter()
        .map(|n| NotificationRow {
            age: n.relative_age(now),
            notification: n.clone(),
        })
        .collect();
    SurfaceView {
        items,
        unread: snapshot.unread,
        total: snapshot.notifications.len(),
    }
}

struct Mounts {
    count: usize,
    poller: Option<PollerHandle>,
}

/// App-scoped owner of the notification store and its single poller.
#[derive(Clone)]
pub struct NotificationHub {
    store: NotificationStore,
    poller_config: PollerConfig,
    dropdown_limit: usize,
    mounts: Arc<Mutex<Mounts>>,
    clock: Arc<watch::Sender<u64>>,
}

impl NotificationHub {
    pub fn new(store: NotificationStore, poller_config: PollerConfig, dropdown_limit: usize) -> Self {
        let (clock, _rx) = watch::channel(0);
        Self {
            store,
            poller_config,
            dropdown_limit,
            mounts: Arc::new(Mutex::new(Mounts {
                count: 0,
                poller: None,
            })),
            clock: Arc::new(clock),
        }
    }

    pub fn from_config(cfg: &Config, source: Arc<dyn NotificationSource>, session: SessionStore) -> Self {
        let store = NotificationStore::with_options(source, session, cfg.reconcile_on_failure);
        Self::new(store, PollerConfig::from(cfg), cfg.dropdown_limit)
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn session(&self) -> &SessionStore {
        self.store.session()
    }

    pub fn mounted(&self) -> usize {
        self.lock_mounts().count
    }

    pub fn is_polling(&self) -> bool {
        self.lock_mounts().poller.is_some()
    }

    fn lock_mounts(&self) -> std::sync::MutexGuard<'_, Mounts> {
        // a poisoned lock only means a panic elsewhere; the counters are still usable
        self.mounts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mount a surface. Must be called inside a Tokio runtime.
    pub fn mount(&self, kind: SurfaceKind) -> Surface {
        let mut mounts = self.lock_mounts();
        mounts.count += 1;
        if mounts.poller.is_none() {
            tracing::debug!(?kind, "first surface mounted, starting poller");
            let handle = poller::spawn(self.store.clone(), self.poller_config);
            self.forward_clock(handle.clock());
            mounts.poller = Some(handle);
        }
        Surface {
            kind,
            hub: self.clone(),
            changes: self.store.changes(),
            clock_rx: self.clock.subscribe(),
        }
    }

    fn unmount(&self, kind: SurfaceKind) {
        let mut mounts = self.lock_mounts();
        mounts.count = mounts.count.saturating_sub(1);
        if mounts.count == 0 && mounts.poller.take().is_some() {
            tracing::debug!(?kind, "last surface unmounted, poller stopped");
        }
    }

    /// Relay the running poller's clock into the hub's long-lived clock channel.
    fn forward_clock(&self, mut rx: watch::Receiver<u64>) {
        let tx = self.clock.clone();
        tokio::spawn(async move {
            // ends when the poller drops its sender
            while rx.changed().await.is_ok() {
                tx.send_modify(|g| *g = g.wrapping_add(1));
            }
        });
    }

    fn refresh_now(&self) {
        // a stored permit would double the first fetch after sign-in
        if self.session().current().is_none() {
            return;
        }
        if let Some(poller) = self.lock_mounts().poller.as_ref() {
            poller.refresh_now();
        }
    }

    pub fn sign_in(&self, user_id: i64, token: impl Into<String>) -> u64 {
        self.session().sign_in(user_id, token)
    }

    /// End the session: the poller goes idle and the store is emptied.
    pub fn sign_out(&self) {
        self.session().sign_out();
        self.store.clear();
    }
}

/// A mounted view over the shared store. Dropping it unmounts.
pub struct Surface {
    kind: SurfaceKind,
    hub: NotificationHub,
    changes: WatchStream<StoreSnapshot>,
    clock_rx: watch::Receiver<u64>,
}

impl Surface {
    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    pub fn view(&self) -> SurfaceView {
        self.view_at(Utc::now())
    }

    pub fn view_at(&self, now: DateTime<Utc>) -> SurfaceView {
        render(self.kind, self.hub.dropdown_limit, &self.hub.store.snapshot(), now)
    }

    pub fn unread(&self) -> usize {
        self.hub.store.unread()
    }

    /// Opening a surface asks for an immediate refresh.
    pub fn open(&self) {
        self.hub.refresh_now();
    }

    pub async fn mark_read(&self, id: i64) -> Result<()> {
        self.hub.store.mark_one_read(id).await
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        self.hub.store.mark_all_read().await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.hub.store.delete_one(id).await
    }

    /// Action target to navigate to on click. Clicking also marks the record read.
    pub async fn activate(&self, id: i64) -> Option<String> {
        let target = self
            .hub
            .store
            .snapshot()
            .get(id)
            .and_then(|n| n.action_url.clone());
        match self.mark_read(id).await {
            Err(e) if e.is_session_loss() => {
                tracing::debug!(notification_id = id, error = %e, "session gone during activate")
            }
            Err(e) => tracing::warn!(notification_id = id, error = %e, "mark-read on activate failed"),
            Ok(()) => {}
        }
        target
    }

    /// Wait until the store changes or the clock ticks, whichever comes first.
    ///
    /// The first call returns at once so the caller can draw the initial view.
    /// Changes that land between two calls are not lost.
    pub async fn changed(&mut self) {
        tokio::select! {
            _ = self.changes.next() => {}
            _ = self.clock_rx.changed() => {}
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        self.hub.unmount(self.kind);
    }
}
