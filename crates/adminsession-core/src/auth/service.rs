//! Session orchestration.
//!
//! `SessionService` owns the side effects around the pure session reducer:
//! storage reads and writes, backend calls, cross-tab signals. One service
//! exists per tab; it is injected wherever session state is needed instead
//! of living in a global.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::guard::{route, Route};
use super::listener::{CrossTabListener, ListenerHandle};
use super::refresher::{CredentialRefresher, RefresherHandle};
use super::store::SessionStore;
use crate::api::{ApiError, AuthBackend, ProfileUpdate};
use crate::models::{Action, Credential, Identity, Session};
use crate::origin::{Signal, Tab};
use crate::storage::{Scope, SessionStorage};

struct ServiceInner {
    backend: Arc<dyn AuthBackend>,
    store: SessionStore,
    storage: SessionStorage,
    tab: Tab,
    initialized: AtomicBool,
}

/// Per-tab session service. Clone is cheap and shares the same session.
#[derive(Clone)]
pub struct SessionService {
    inner: Arc<ServiceInner>,
}

/// Background tasks of an open page. Dropping it stops both.
pub struct BackgroundTasks {
    pub refresher: RefresherHandle,
    pub listener: ListenerHandle,
}

impl SessionService {
    pub fn new(backend: Arc<dyn AuthBackend>, tab: Tab) -> Self {
        let storage = SessionStorage::for_tab(&tab);
        Self {
            inner: Arc::new(ServiceInner {
                backend,
                store: SessionStore::new(),
                storage,
                tab,
                initialized: AtomicBool::new(false),
            }),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    pub fn storage(&self) -> &SessionStorage {
        &self.inner.storage
    }

    pub fn tab(&self) -> &Tab {
        &self.inner.tab
    }

    pub fn snapshot(&self) -> Session {
        self.inner.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.store.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.store.is_authenticated()
    }

    /// Current route guard decision
    pub fn route(&self) -> Route {
        route(&self.inner.store.snapshot())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Hydrate the session from storage. Runs once; later calls only
    /// return the current snapshot.
    ///
    /// Reads the scope selected by the "remember me" preference and nothing
    /// else. Missing or malformed state leaves the session logged out.
    pub fn initialize(&self) -> Session {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            warn!(tab = %self.inner.tab.id(), "Session already initialized");
            return self.snapshot();
        }

        match self.inner.storage.restore() {
            Some((credential, identity)) => {
                info!(user_id = identity.id, "Restored persisted session");
                self.inner.store.dispatch(Action::LoginSuccess {
                    identity,
                    credential,
                });
            }
            None => {
                debug!("No persisted session");
                self.inner.store.dispatch(Action::SetLoading(false));
            }
        }
        self.snapshot()
    }

    // =========================================================================
    // Login / logout
    // =========================================================================

    /// Sign in and persist the session in the scope chosen by `remember`.
    ///
    /// A failure is recorded in `Session::last_error` for the login form and
    /// returned to the caller.
    pub async fn login(&self, email: &str, password: &str, remember: bool) -> Result<Identity, ApiError> {
        self.inner.store.dispatch(Action::LoginStart);

        match self.inner.backend.login(email, password).await {
            Ok(grant) => {
                if let Err(e) = self.inner.storage.save(&grant.credential, &grant.identity, remember) {
                    warn!(error = %e, "Failed to save session");
                }
                let identity = grant.identity.clone();
                self.inner.store.dispatch(Action::LoginSuccess {
                    identity: grant.identity,
                    credential: grant.credential,
                });
                info!(user_id = identity.id, remember, "Login successful");
                Ok(identity)
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                self.inner.storage.deactivate();
                self.inner.store.dispatch(Action::LoginFailure(e.user_message()));
                Err(e)
            }
        }
    }

    /// Sign out everywhere.
    ///
    /// Storage is purged before the session is cleared, other tabs are told
    /// via `auth:logout`, and the backend is notified on a detached task
    /// whose failure changes nothing locally. Safe to call when already
    /// logged out.
    pub fn logout(&self) {
        let credential = self.inner.store.snapshot().credential;

        if let Err(e) = self.inner.storage.purge() {
            warn!(error = %e, "Failed to clear persisted session");
        }
        self.inner.tab.broadcast(Signal::Logout);
        self.inner.store.dispatch(Action::Logout);
        info!(tab = %self.inner.tab.id(), "Logged out");

        if let Some(credential) = credential {
            self.notify_backend_logout(credential);
        }
    }

    /// Clear the in-memory session only. Used when another tab already
    /// logged out and owns the storage cleanup.
    pub fn logout_local(&self) {
        self.inner.storage.deactivate();
        if self.inner.store.dispatch(Action::Logout) {
            info!(tab = %self.inner.tab.id(), "Logged out by another tab");
        }
    }

    fn notify_backend_logout(&self, credential: Credential) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime available, skipping backend logout");
            return;
        };
        let backend = Arc::clone(&self.inner.backend);
        runtime.spawn(async move {
            if let Err(e) = backend.logout(&credential).await {
                warn!(error = %e, "Backend logout failed");
            }
        });
    }

    // =========================================================================
    // Credential maintenance
    // =========================================================================

    /// One refresh cycle: exchange the current credential for a new one.
    ///
    /// Any failure logs the session out; an un-refreshable credential is
    /// treated as permanently invalid. Does nothing when logged out.
    pub async fn refresh_credential(&self) -> Result<(), ApiError> {
        let Some(current) = self.inner.store.snapshot().bearer().cloned() else {
            debug!("Refresh skipped, not authenticated");
            return Ok(());
        };

        match self.inner.backend.refresh(&current).await {
            Ok(renewed) => {
                // A logout may have happened while the request was in flight
                if !self.is_authenticated() {
                    debug!("Discarding renewed credential after logout");
                    return Ok(());
                }
                if let Err(e) = self.inner.storage.store_credential(&renewed) {
                    warn!(error = %e, "Failed to persist renewed credential");
                }
                self.inner.store.dispatch(Action::ReplaceCredential(renewed));
                info!("Credential refreshed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Credential refresh failed, logging out");
                self.logout();
                Err(e)
            }
        }
    }

    /// Advisory validation of the current credential.
    ///
    /// Updates the identity when the backend reports a different one. A
    /// failure is returned but never logs out.
    pub async fn validate(&self) -> Result<Identity, ApiError> {
        let Some(current) = self.inner.store.snapshot().bearer().cloned() else {
            return Err(ApiError::Unauthorized("Not signed in".to_string()));
        };

        match self.inner.backend.me(&current).await {
            Ok(identity) => {
                let snapshot = self.inner.store.snapshot();
                if snapshot.authenticated && snapshot.identity.as_ref() != Some(&identity) {
                    debug!(user_id = identity.id, "Identity changed on server");
                    self.apply_identity(&identity);
                }
                Ok(identity)
            }
            Err(e) => {
                warn!(error = %e, "Session validation failed");
                Err(e)
            }
        }
    }

    /// Update username and avatar. Failures are returned for inline display.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Identity, ApiError> {
        let Some(current) = self.inner.store.snapshot().bearer().cloned() else {
            return Err(ApiError::Unauthorized("Not signed in".to_string()));
        };

        let identity = self.inner.backend.update_profile(&current, &update).await?;
        if self.is_authenticated() {
            self.apply_identity(&identity);
        }
        info!(user_id = identity.id, "Profile updated");
        Ok(identity)
    }

    fn apply_identity(&self, identity: &Identity) {
        if let Err(e) = self.inner.storage.store_identity(identity) {
            warn!(error = %e, "Failed to persist identity");
        }
        self.inner.store.dispatch(Action::SetIdentity(identity.clone()));
    }

    /// Logout if storage says another tab removed our persisted session.
    /// Used after missing cross-tab events, and by hosts whose tabs live in
    /// separate processes.
    pub fn reconcile_with_storage(&self) {
        let storage = &self.inner.storage;
        if self.is_authenticated()
            && storage.active_scope() == Some(Scope::Persistent)
            && storage.load_from(Scope::Persistent).is_none()
        {
            info!("Persisted session gone, logging out");
            self.logout_local();
        }
    }

    // =========================================================================
    // Background tasks
    // =========================================================================

    /// Start the credential refresher and the cross-tab listener.
    pub fn spawn_background(&self, refresh_interval: Duration) -> BackgroundTasks {
        BackgroundTasks {
            refresher: CredentialRefresher::new(self.clone(), refresh_interval).spawn(),
            listener: CrossTabListener::new(self.clone()).spawn(),
        }
    }
}
