//! Cross-tab logout propagation.
//!
//! Watches two sources from the other tabs of the origin: removal of the
//! persisted credential, and the `auth:logout` signal. Either one logs this
//! tab out locally. Delivery is best effort.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::service::SessionService;
use crate::origin::{Signal, SignalEnvelope, StorageEvent, TabReceiver};
use crate::storage::CREDENTIAL_KEY;

/// Running listener. Dropping the handle stops the task.
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct CrossTabListener {
    service: SessionService,
}

impl CrossTabListener {
    pub fn new(service: SessionService) -> Self {
        Self { service }
    }

    /// Subscribe and start listening. Subscriptions are taken before this
    /// returns, so no event published afterwards is missed.
    pub fn spawn(self) -> ListenerHandle {
        let storage_events = self.service.tab().storage_events();
        let signals = self.service.tab().signals();
        let task = tokio::spawn(self.run(storage_events, signals));
        ListenerHandle { task }
    }

    async fn run(
        self,
        mut storage_events: TabReceiver<StorageEvent>,
        mut signals: TabReceiver<SignalEnvelope>,
    ) {
        let mut storage_open = true;
        let mut signals_open = true;

        loop {
            tokio::select! {
                event = storage_events.recv(), if storage_open => match event {
                    Ok(event) => self.on_storage_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed storage events");
                        self.service.reconcile_with_storage();
                    }
                    Err(RecvError::Closed) => storage_open = false,
                },
                envelope = signals.recv(), if signals_open => match envelope {
                    Ok(envelope) => self.on_signal(&envelope),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed cross-tab signals");
                        self.service.reconcile_with_storage();
                    }
                    Err(RecvError::Closed) => signals_open = false,
                },
                else => break,
            }
        }
        debug!("Cross-tab listener stopped");
    }

    fn on_storage_event(&self, event: &StorageEvent) {
        if event.key != CREDENTIAL_KEY || !event.is_removal() {
            return;
        }
        if self.service.is_authenticated() {
            info!(from = %event.source, "Credential removed by another tab");
            self.service.logout_local();
        }
    }

    fn on_signal(&self, envelope: &SignalEnvelope) {
        match envelope.signal {
            Signal::Logout => {
                debug!(from = %envelope.source, signal = envelope.signal.name(), "Received signal");
                self.service.logout_local();
            }
        }
    }
}
