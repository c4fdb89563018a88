use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::models::{Action, Session};

/// Observable holder of the current `Session`.
///
/// Every dispatch runs the reducer and notifies subscribers when the
/// session actually changed. Clone is cheap and shares the same state.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_session(Session::default())
    }

    pub fn with_session(session: Session) -> Self {
        let (tx, _) = watch::channel(session);
        Self { tx: Arc::new(tx) }
    }

    /// Apply an action. Returns whether the session changed.
    pub fn dispatch(&self, action: Action) -> bool {
        let name = action.name();
        let changed = self.tx.send_if_modified(|session| {
            let next = session.apply(action);
            if next == *session {
                false
            } else {
                *session = next;
                true
            }
        });
        debug!(action = name, changed, "Session action dispatched");
        changed
    }

    /// Copy of the current session
    pub fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().authenticated
    }

    /// Receiver notified on every session change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
