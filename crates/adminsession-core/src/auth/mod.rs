//! Session management.
//!
//! This module provides:
//! - `SessionStore`: observable holder of the current `Session`
//! - `SessionService`: initializer, login/logout, refresh and profile flows
//! - `CredentialRefresher`: background renewal and visibility validation
//! - `CrossTabListener`: logout propagation between tabs
//! - `route`: the route guard

pub mod guard;
pub mod listener;
pub mod refresher;
pub mod service;
pub mod store;

pub use guard::{route, Route};
pub use listener::{CrossTabListener, ListenerHandle};
pub use refresher::{CredentialRefresher, RefresherHandle, RefresherState, DEFAULT_REFRESH_INTERVAL};
pub use service::{BackgroundTasks, SessionService};
pub use store::SessionStore;
