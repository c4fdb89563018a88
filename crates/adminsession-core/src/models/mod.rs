//! Data models for the admin session.
//!
//! - `Identity`, `Role`: the signed-in admin's profile
//! - `Credential`: opaque bearer token
//! - `Session`, `Action`: the session snapshot and its reducer

pub mod identity;
pub mod session;

pub use identity::{Credential, Identity, Role};
pub use session::{Action, Session};
