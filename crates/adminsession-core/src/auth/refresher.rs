//! Background credential renewal.
//!
//! The refresher is `Idle` while logged out and `Active` while
//! authenticated. When active it renews the credential on a fixed interval
//! and validates the session whenever the tab becomes visible again. A
//! failed renewal logs out; a failed validation does not.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::service::SessionService;
use crate::models::Session;
use crate::origin::Visibility;

/// Renewal interval, shorter than the backend's ~60 minute credential lifetime
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(50 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherState {
    Idle,
    Active,
}

/// Running refresher. Dropping the handle stops the task.
pub struct RefresherHandle {
    state: watch::Receiver<RefresherState>,
    task: JoinHandle<()>,
}

impl RefresherHandle {
    pub fn state(&self) -> RefresherState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition
    pub fn watch_state(&self) -> watch::Receiver<RefresherState> {
        self.state.clone()
    }
}

impl Drop for RefresherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct CredentialRefresher {
    service: SessionService,
    interval: Duration,
}

enum ActiveExit {
    LoggedOut,
    Closed,
}

impl CredentialRefresher {
    pub fn new(service: SessionService, interval: Duration) -> Self {
        Self { service, interval }
    }

    pub fn spawn(self) -> RefresherHandle {
        let (state_tx, state_rx) = watch::channel(RefresherState::Idle);
        let session_rx = self.service.subscribe();
        let visibility_rx = self.service.tab().visibility();
        let task = tokio::spawn(self.run(state_tx, session_rx, visibility_rx));
        RefresherHandle {
            state: state_rx,
            task,
        }
    }

    async fn run(
        self,
        state_tx: watch::Sender<RefresherState>,
        mut session_rx: watch::Receiver<Session>,
        mut visibility_rx: watch::Receiver<Visibility>,
    ) {
        loop {
            let authenticated = session_rx.borrow_and_update().authenticated;
            if !authenticated {
                state_tx.send_replace(RefresherState::Idle);
                if session_rx.changed().await.is_err() {
                    return;
                }
                continue;
            }

            state_tx.send_replace(RefresherState::Active);
            info!(interval_secs = self.interval.as_secs(), "Credential refresher active");

            match self.run_active(&mut session_rx, &mut visibility_rx).await {
                ActiveExit::LoggedOut => debug!("Credential refresher idle"),
                ActiveExit::Closed => return,
            }
        }
    }

    async fn run_active(
        &self,
        session_rx: &mut watch::Receiver<Session>,
        visibility_rx: &mut watch::Receiver<Visibility>,
    ) -> ActiveExit {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Only transitions observed from here on count
        visibility_rx.borrow_and_update();
        let mut visibility_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failure already logged out; the session branch picks it up
                    let _ = self.service.refresh_credential().await;
                }
                changed = session_rx.changed() => {
                    if changed.is_err() {
                        return ActiveExit::Closed;
                    }
                    if !session_rx.borrow_and_update().authenticated {
                        return ActiveExit::LoggedOut;
                    }
                }
                changed = visibility_rx.changed(), if visibility_open => {
                    if changed.is_err() {
                        visibility_open = false;
                        continue;
                    }
                    let visibility = *visibility_rx.borrow_and_update();
                    if visibility == Visibility::Visible && self.service.is_authenticated() {
                        self.spawn_validation();
                    }
                }
            }
        }
    }

    /// Validation runs on its own task so it may overlap a renewal
    fn spawn_validation(&self) {
        debug!("Tab visible again, validating session");
        let service = self.service.clone();
        tokio::spawn(async move {
            let _ = service.validate().await;
        });
    }
}
