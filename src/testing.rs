//! In-memory backend used by unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::api::NotificationSource;
use crate::errors::{Result, SyncError};
use crate::models::notification::{Notification, NotificationKind};

pub(crate) fn notif(id: i64, is_read: bool) -> Notification {
    Notification {
        id,
        title: format!("Notification {}", id),
        message: "Your analysis has been updated".into(),
        kind: NotificationKind::Info,
        is_read,
        created_at: "2024-01-01T00:00:00Z".into(),
        action_url: None,
    }
}

#[derive(Default)]
pub(crate) struct FakeSource {
    server: Mutex<Vec<Notification>>,
    fail_fetch: AtomicBool,
    fail_mutations: AtomicBool,
    calls: Mutex<HashMap<&'static str, usize>>,
    fetch_gate: Mutex<Option<Arc<Notify>>>,
    mutation_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeSource {
    pub(crate) fn with(list: Vec<Notification>) -> Self {
        let source = Self::default();
        source.set_server(list);
        source
    }

    pub(crate) fn set_server(&self, list: Vec<Notification>) {
        *self.server.lock().unwrap() = list;
    }

    pub(crate) fn server(&self) -> Vec<Notification> {
        self.server.lock().unwrap().clone()
    }

    pub(crate) fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent fetch wait for one `notify_one()` on the returned handle.
    pub(crate) fn hold_fetches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.fetch_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn hold_mutations(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.mutation_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub(crate) async fn wait_for_calls(&self, name: &str, n: usize) {
        while self.calls(name) < n {
            tokio::task::yield_now().await;
        }
    }

    fn record(&self, name: &'static str) {
        *self.calls.lock().unwrap().entry(name).or_insert(0) += 1;
    }

    async fn pass(gate: &Mutex<Option<Arc<Notify>>>) {
        let gate = gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    async fn mutate(&self, name: &'static str, apply: impl FnOnce(&mut Vec<Notification>)) -> Result<()> {
        self.record(name);
        Self::pass(&self.mutation_gate).await;
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(SyncError::Server {
                status: 500,
                message: "mutation rejected".into(),
            });
        }
        apply(&mut self.server.lock().unwrap());
        Ok(())
    }
}

#[async_trait]
impl NotificationSource for FakeSource {
    async fn fetch_all(&self, _user_id: i64) -> Result<Vec<Notification>> {
        self.record("fetch");
        Self::pass(&self.fetch_gate).await;
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(SyncError::Server {
                status: 503,
                message: "backend unavailable".into(),
            });
        }
        Ok(self.server())
    }

    async fn mark_read(&self, id: i64) -> Result<()> {
        self.mutate("mark_read", |list| {
            if let Some(n) = list.iter_mut().find(|n| n.id == id) {
                n.is_read = true;
            }
        })
        .await
    }

    async fn mark_all_read(&self, _user_id: i64) -> Result<()> {
        self.mutate("mark_all_read", |list| {
            list.iter_mut().for_each(|n| n.is_read = true);
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.mutate("delete", |list| list.retain(|n| n.id != id))
            .await
    }

    async fn unread_count(&self, _user_id: i64) -> Result<usize> {
        self.record("unread_count");
        Ok(self.server().iter().filter(|n| !n.is_read).count())
    }
}
