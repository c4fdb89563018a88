//! HTTP implementation of `AuthBackend`.
//!
//! Talks to the dashboard's REST API. Every response body is read as JSON
//! and handed to the normalization functions before it leaves this module.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, multipart, Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::backend::{AuthBackend, LoginGrant, ProfileUpdate};
use super::normalize::{normalize_credential, normalize_identity, normalize_login};
use super::ApiError;
use crate::models::{Credential, Identity};

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const LOGIN_PATH: &str = "/auth/login";
const LOGOUT_PATH: &str = "/auth/logout";
const ME_PATH: &str = "/auth/me";
const REFRESH_PATH: &str = "/auth/refresh";
const PROFILE_PATH: &str = "/auth/profile";

/// Backend client. Clone is cheap - reqwest::Client uses Arc internally
/// for connection pooling.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder, credential: &Credential) -> RequestBuilder {
        request
            .bearer_auth(credential.as_str())
            .header(header::ACCEPT, "application/json")
    }

    /// Send a request and return the JSON body of a successful response.
    async fn send_json(request: RequestBuilder, what: &str) -> Result<Value, ApiError> {
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, request = what, "Request failed");
            ApiError::from(e)
        })?;

        let status = response.status();
        let body = response.text().await?;
        debug!(request = what, status = status.as_u16(), "Response received");

        if !status.is_success() {
            return Err(ApiError::from_status(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("{} response is not JSON: {}", what, e)))
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn login(&self, email: &str, password: &str) -> Result<LoginGrant, ApiError> {
        let request = self
            .client
            .post(self.url(LOGIN_PATH))
            .header(header::ACCEPT, "application/json")
            .json(&json!({ "email": email, "password": password }));

        let body = Self::send_json(request, "login").await?;
        normalize_login(&body)
    }

    async fn logout(&self, credential: &Credential) -> Result<(), ApiError> {
        let request = self.authorized(self.client.post(self.url(LOGOUT_PATH)), credential);
        Self::send_json(request, "logout").await.map(|_| ())
    }

    async fn me(&self, credential: &Credential) -> Result<Identity, ApiError> {
        let request = self.authorized(self.client.get(self.url(ME_PATH)), credential);
        let body = Self::send_json(request, "me").await?;
        normalize_identity(&body)
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential, ApiError> {
        let request = self.authorized(self.client.post(self.url(REFRESH_PATH)), credential);
        let body = Self::send_json(request, "refresh").await?;
        normalize_credential(&body)
    }

    async fn update_profile(
        &self,
        credential: &Credential,
        update: &ProfileUpdate,
    ) -> Result<Identity, ApiError> {
        // Multipart bodies go out as POST with a method override
        let mut form = multipart::Form::new()
            .text("_method", "PUT")
            .text("username", update.username.clone());

        if let Some(ref avatar) = update.avatar {
            let part = multipart::Part::bytes(avatar.bytes.clone())
                .file_name(avatar.file_name.clone())
                .mime_str(&avatar.mime_type)
                .map_err(|e| ApiError::Validation(format!("Invalid avatar type: {}", e)))?;
            form = form.part("avatar", part);
        }

        let request = self
            .authorized(self.client.post(self.url(PROFILE_PATH)), credential)
            .multipart(form);
        let body = Self::send_json(request, "update_profile").await?;
        normalize_identity(&body)
    }
}
