use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::{KeyValueStore, Scope, CREDENTIAL_KEY, IDENTITY_KEY, REMEMBER_ME_KEY};
use crate::models::{Credential, Identity};
use crate::origin::Tab;

/// Session persistence across the two scopes.
///
/// Writes always go through `save`, which targets the scope selected by the
/// "remember me" preference and clears the other one so no stale copy of a
/// session can linger in the alternate scope.
///
/// The scope picked by `save` or `restore` is recorded per tab. Later
/// credential and identity writes go to that scope only, whatever other
/// tabs have since done to the shared preference.
#[derive(Clone)]
pub struct SessionStorage {
    persistent: Arc<dyn KeyValueStore>,
    transient: Arc<dyn KeyValueStore>,
    active: Arc<Mutex<Option<Scope>>>,
}

impl SessionStorage {
    pub fn new(persistent: Arc<dyn KeyValueStore>, transient: Arc<dyn KeyValueStore>) -> Self {
        Self {
            persistent,
            transient,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Storage as seen from a tab: the origin's persistent store and the
    /// tab's own transient store.
    pub fn for_tab(tab: &Tab) -> Self {
        Self::new(tab.persistent(), tab.transient())
    }

    fn store(&self, scope: Scope) -> &dyn KeyValueStore {
        match scope {
            Scope::Persistent => self.persistent.as_ref(),
            Scope::Transient => self.transient.as_ref(),
        }
    }

    /// The persisted "remember me" preference. Absent or unreadable means false.
    pub fn remember_me(&self) -> bool {
        match self.persistent.get(REMEMBER_ME_KEY) {
            Ok(Some(value)) => value.trim() == "true",
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to read remember-me preference");
                false
            }
        }
    }

    /// Scope the shared preference currently points at
    pub fn selected_scope(&self) -> Scope {
        Scope::for_remember_me(self.remember_me())
    }

    /// Scope this tab's session was saved to or restored from
    pub fn active_scope(&self) -> Option<Scope> {
        *self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_active(&self, scope: Option<Scope>) {
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = scope;
    }

    /// Forget the recorded scope. Later credential and identity writes are
    /// dropped until the next `save` or `restore`.
    pub fn deactivate(&self) {
        self.set_active(None);
    }

    /// Read credential and identity from the selected scope only, and
    /// record that scope for later writes.
    ///
    /// Missing, unreadable or malformed values all yield `None`.
    pub fn restore(&self) -> Option<(Credential, Identity)> {
        let scope = self.selected_scope();
        let loaded = self.load_from(scope)?;
        self.set_active(Some(scope));
        Some(loaded)
    }

    /// Read credential and identity from one scope
    pub fn load_from(&self, scope: Scope) -> Option<(Credential, Identity)> {
        let store = self.store(scope);

        let credential: Credential = read_json(store, CREDENTIAL_KEY)?;
        let identity: Identity = read_json(store, IDENTITY_KEY)?;

        debug!(?scope, user_id = identity.id, "Loaded persisted session");
        Some((credential, identity))
    }

    /// Persist a fresh session. Records the preference, writes the selected
    /// scope and clears the other one.
    pub fn save(&self, credential: &Credential, identity: &Identity, remember: bool) -> Result<()> {
        let scope = Scope::for_remember_me(remember);

        self.persistent
            .set(REMEMBER_ME_KEY, if remember { "true" } else { "false" })
            .context("Failed to store remember-me preference")?;

        let store = self.store(scope);
        store.set(CREDENTIAL_KEY, &serde_json::to_string(credential)?)?;
        store.set(IDENTITY_KEY, &serde_json::to_string(identity)?)?;

        self.set_active(Some(scope));
        self.clear_scope(scope.other())?;
        debug!(?scope, user_id = identity.id, "Saved session");
        Ok(())
    }

    /// Overwrite the credential in the active scope
    pub fn store_credential(&self, credential: &Credential) -> Result<()> {
        let Some(scope) = self.active_scope() else {
            debug!("No active scope, renewed credential not stored");
            return Ok(());
        };
        self.store(scope)
            .set(CREDENTIAL_KEY, &serde_json::to_string(credential)?)
            .context("Failed to store renewed credential")
    }

    /// Overwrite the identity in the active scope
    pub fn store_identity(&self, identity: &Identity) -> Result<()> {
        let Some(scope) = self.active_scope() else {
            debug!("No active scope, identity not stored");
            return Ok(());
        };
        self.store(scope)
            .set(IDENTITY_KEY, &serde_json::to_string(identity)?)
            .context("Failed to store identity")
    }

    /// Remove session keys from both scopes. The preference is kept.
    ///
    /// Both scopes are attempted even when the first fails.
    pub fn purge(&self) -> Result<()> {
        self.deactivate();
        let persistent = self.clear_scope(Scope::Persistent);
        let transient = self.clear_scope(Scope::Transient);
        persistent.and(transient)
    }

    fn clear_scope(&self, scope: Scope) -> Result<()> {
        let store = self.store(scope);
        store
            .remove(CREDENTIAL_KEY)
            .with_context(|| format!("Failed to clear credential from {:?} scope", scope))?;
        store
            .remove(IDENTITY_KEY)
            .with_context(|| format!("Failed to clear identity from {:?} scope", scope))?;
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(error = %e, key, "Failed to read persisted session value");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, key, "Ignoring malformed persisted session value");
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
