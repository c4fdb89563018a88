//! Key-value storage for persisted session state.
//!
//! Two scopes exist, mirroring browser storage:
//! - `Scope::Persistent`: survives restarts, shared by every tab of an origin
//! - `Scope::Transient`: lives as long as a single tab
//!
//! `SessionStorage` is the only place session keys are written. Backends:
//! `FileStore` (JSON file), `KeyringStore` (OS keychain), `MemoryStore`.

pub mod file;
pub mod keychain;
pub mod memory;
pub mod scoped;

use anyhow::Result;

pub use file::FileStore;
pub use keychain::KeyringStore;
pub use memory::MemoryStore;
pub use scoped::SessionStorage;

/// Key holding the JSON-encoded credential
pub const CREDENTIAL_KEY: &str = "auth_token";

/// Key holding the JSON-encoded identity
pub const IDENTITY_KEY: &str = "auth_user";

/// Key holding the "remember me" preference (persistent scope only)
pub const REMEMBER_ME_KEY: &str = "remember_me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Persistent,
    Transient,
}

impl Scope {
    /// Scope selected by the "remember me" preference
    pub fn for_remember_me(remember: bool) -> Self {
        if remember {
            Scope::Persistent
        } else {
            Scope::Transient
        }
    }

    pub fn other(self) -> Self {
        match self {
            Scope::Persistent => Scope::Transient,
            Scope::Transient => Scope::Persistent,
        }
    }
}

/// A string key-value store.
///
/// Implementations synchronise internally; all methods take `&self`.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Returns whether a value was present.
    fn remove(&self, key: &str) -> Result<bool>;
}
