//! Shared test doubles.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use adminsession_core::api::{ApiError, AuthBackend, LoginGrant, ProfileUpdate};
use adminsession_core::{Credential, Identity, Role};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

pub fn sample_identity() -> Identity {
    Identity {
        id: 42,
        username: "ada".to_string(),
        email: "ada@example.com".to_string(),
        role: Role::SuperAdmin,
        avatar_url: None,
        last_login_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap()),
        created_at: Utc.with_ymd_and_hms(2023, 1, 15, 10, 0, 0).unwrap(),
    }
}

#[derive(Default)]
struct MockState {
    identity: Option<Identity>,
    login_error: Option<ApiError>,
    refresh_error: Option<ApiError>,
    me_error: Option<ApiError>,
    profile_error: Option<ApiError>,
    logout_error: Option<ApiError>,
    refresh_count: u32,
    refresh_gate: Option<Arc<Notify>>,
    calls: Vec<&'static str>,
    logged_out_with: Vec<Credential>,
}

/// In-memory backend with switchable failures.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn set_identity(&self, identity: Identity) {
        self.state().identity = Some(identity);
    }

    pub fn fail_login(&self, error: ApiError) {
        self.state().login_error = Some(error);
    }

    /// Make `refresh` wait until the returned gate is notified
    pub fn hold_refresh(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state().refresh_gate = Some(gate.clone());
        gate
    }

    pub fn fail_refresh(&self, error: ApiError) {
        self.state().refresh_error = Some(error);
    }

    pub fn fail_me(&self, error: ApiError) {
        self.state().me_error = Some(error);
    }

    pub fn fail_profile(&self, error: ApiError) {
        self.state().profile_error = Some(error);
    }

    pub fn fail_logout(&self, error: ApiError) {
        self.state().logout_error = Some(error);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.state().calls.iter().filter(|c| **c == name).count()
    }

    pub fn logged_out_with(&self) -> Vec<Credential> {
        self.state().logged_out_with.clone()
    }

    fn current_identity(state: &MockState) -> Identity {
        state.identity.clone().unwrap_or_else(sample_identity)
    }
}

#[async_trait]
impl AuthBackend for MockBackend {
    async fn login(&self, _email: &str, _password: &str) -> Result<LoginGrant, ApiError> {
        let mut state = self.state();
        state.calls.push("login");
        if let Some(ref error) = state.login_error {
            return Err(error.clone());
        }
        Ok(LoginGrant {
            identity: Self::current_identity(&state),
            credential: Credential::new("token-0"),
        })
    }

    async fn logout(&self, credential: &Credential) -> Result<(), ApiError> {
        let mut state = self.state();
        state.calls.push("logout");
        state.logged_out_with.push(credential.clone());
        match state.logout_error {
            Some(ref error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn me(&self, _credential: &Credential) -> Result<Identity, ApiError> {
        let mut state = self.state();
        state.calls.push("me");
        if let Some(ref error) = state.me_error {
            return Err(error.clone());
        }
        Ok(Self::current_identity(&state))
    }

    async fn refresh(&self, _credential: &Credential) -> Result<Credential, ApiError> {
        let gate = {
            let mut state = self.state();
            state.calls.push("refresh");
            state.refresh_gate.clone()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state();
        if let Some(ref error) = state.refresh_error {
            return Err(error.clone());
        }
        state.refresh_count += 1;
        Ok(Credential::new(format!("token-{}", state.refresh_count)))
    }

    async fn update_profile(
        &self,
        _credential: &Credential,
        update: &ProfileUpdate,
    ) -> Result<Identity, ApiError> {
        let mut state = self.state();
        state.calls.push("update_profile");
        if let Some(ref error) = state.profile_error {
            return Err(error.clone());
        }
        let mut identity = Self::current_identity(&state);
        identity.username = update.username.clone();
        if let Some(ref avatar) = update.avatar {
            identity.avatar_url = Some(format!("https://cdn.example.com/{}", avatar.file_name));
        }
        state.identity = Some(identity.clone());
        Ok(identity)
    }
}
