//! Backend API boundary.
//!
//! This module provides the `AuthBackend` trait the session service talks
//! to, the reqwest-based `HttpBackend` implementation, and the
//! normalization functions that turn loosely shaped backend JSON into
//! canonical `Identity` and `Credential` values.
//!
//! The backend uses bearer token authentication obtained from the login
//! endpoint.

pub mod backend;
pub mod client;
pub mod error;
pub mod normalize;

pub use backend::{AuthBackend, Avatar, LoginGrant, ProfileUpdate};
pub use client::HttpBackend;
pub use error::ApiError;
