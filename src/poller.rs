//! Background poller: keeps the store fresh without user interaction.
//!
//! While a session exists it refreshes once immediately, then on a fixed
//! interval (no backoff, no jitter; failures are logged by the store and the
//! next tick proceeds). A second, independent clock tick only bumps a
//! generation counter so views can re-render relative-time labels.
//!
//! Both timers live inside the per-session loop, so they stop when the
//! session ends or the handle is shut down. An in-flight refresh is dropped
//! on shutdown.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::session::Session;
use crate::store::NotificationStore;

#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub clock_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            clock_interval: Duration::from_secs(10),
        }
    }
}

impl From<&Config> for PollerConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            poll_interval: cfg.poll_interval,
            clock_interval: cfg.clock_interval,
        }
    }
}

/// Owner of a running poller. Dropping it stops the poller.
pub struct PollerHandle {
    cancel: CancellationToken,
    refresh_now: Arc<Notify>,
    clock: watch::Receiver<u64>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Ask for an out-of-band refresh (e.g. when the dropdown opens).
    pub fn refresh_now(&self) {
        self.refresh_now.notify_one();
    }

    /// Receiver that changes on every clock tick.
    pub fn clock(&self) -> watch::Receiver<u64> {
        self.clock.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Stop both timers and wait for the background task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "poller task ended abnormally");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Exit {
    Cancelled,
    SessionEnded,
    SessionReplaced,
}

/// Spawn the poller for `store`. Call once per app scope.
pub fn spawn(store: NotificationStore, config: PollerConfig) -> PollerHandle {
    let cancel = CancellationToken::new();
    let refresh_now = Arc::new(Notify::new());
    let (clock_tx, clock_rx) = watch::channel(0u64);

    let task = tokio::spawn(run(
        store,
        config,
        cancel.clone(),
        refresh_now.clone(),
        clock_tx,
    ));

    PollerHandle {
        cancel,
        refresh_now,
        clock: clock_rx,
        task: Some(task),
    }
}

async fn run(
    store: NotificationStore,
    config: PollerConfig,
    cancel: CancellationToken,
    refresh_now: Arc<Notify>,
    clock_tx: watch::Sender<u64>,
) {
    let mut session_rx = store.session().subscribe();
    tracing::debug!(
        poll_secs = config.poll_interval.as_secs(),
        clock_secs = config.clock_interval.as_secs(),
        "poller started"
    );

    loop {
        let current = session_rx.borrow_and_update().clone();
        let exit = match current {
            Some(session) => {
                run_session(
                    &store,
                    &session,
                    &config,
                    &cancel,
                    &refresh_now,
                    &clock_tx,
                    &mut session_rx,
                )
                .await
            }
            // dormant: no timers, no requests
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => Exit::Cancelled,
                changed = session_rx.changed() => match changed {
                    Ok(()) => continue,
                    Err(_) => Exit::Cancelled,
                },
            },
        };

        match exit {
            Exit::Cancelled => break,
            Exit::SessionEnded => {
                tracing::info!("session ended, poller idle");
                store.clear();
            }
            Exit::SessionReplaced => {
                tracing::info!("session replaced, restarting poll cycle");
                store.clear();
            }
        }
    }

    tracing::debug!("poller stopped");
}

async fn run_session(
    store: &NotificationStore,
    session: &Session,
    config: &PollerConfig,
    cancel: &CancellationToken,
    refresh_now: &Notify,
    clock_tx: &watch::Sender<u64>,
    session_rx: &mut watch::Receiver<Option<Session>>,
) -> Exit {
    // first tick fires immediately: the on-mount refresh
    let mut poll = time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut clock = time::interval_at(Instant::now() + config.clock_interval, config.clock_interval);
    clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let should_refresh = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Exit::Cancelled,
            changed = session_rx.changed() => {
                if changed.is_err() {
                    return Exit::Cancelled;
                }
                match session_rx.borrow_and_update().as_ref().map(|s| s.epoch) {
                    None => return Exit::SessionEnded,
                    Some(epoch) if epoch != session.epoch => return Exit::SessionReplaced,
                    Some(_) => false,
                }
            }
            _ = poll.tick() => true,
            _ = refresh_now.notified() => true,
            _ = clock.tick() => {
                clock_tx.send_modify(|generation| *generation = generation.wrapping_add(1));
                false
            }
        };

        if should_refresh {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(user_id = session.user_id, "abandoning in-flight refresh");
                    return Exit::Cancelled;
                }
                // errors are already logged by the store; keep the fixed cadence
                _ = store.refresh() => {}
            }
        }
    }
}
