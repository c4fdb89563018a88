//! Client-side session manager for the admin dashboard.
//!
//! Keeps the signed-in admin's identity and bearer credential, persists
//! them in the scope picked by "remember me", renews the credential in the
//! background and propagates logout across every tab of an origin.
//!
//! ```text
//! SessionService::initialize -> SessionStore -> route()
//!        |                          ^   ^
//!        |      CredentialRefresher-'   '-CrossTabListener
//!        '-> SessionStorage (persistent / transient scope)
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod origin;
pub mod storage;

pub use api::{ApiError, AuthBackend, Avatar, HttpBackend, LoginGrant, ProfileUpdate};
pub use auth::{
    route, BackgroundTasks, CredentialRefresher, CrossTabListener, RefresherState, Route,
    SessionService, SessionStore, DEFAULT_REFRESH_INTERVAL,
};
pub use config::Config;
pub use models::{Action, Credential, Identity, Role, Session};
pub use origin::{Origin, Signal, Tab, Visibility};
pub use storage::{KeyValueStore, Scope, SessionStorage};
