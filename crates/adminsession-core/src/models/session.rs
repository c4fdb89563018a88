//! Session snapshot and its state transitions.
//!
//! `Session::apply` is a pure reducer: no storage or network I/O happens
//! here. The orchestration in `auth::service` performs side effects and
//! then dispatches one of these actions.

use serde::{Deserialize, Serialize};

use super::{Credential, Identity};

/// In-memory authentication state.
///
/// `authenticated` is true exactly when both `identity` and `credential`
/// are present. A new session starts empty and `loading` until the
/// initializer has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub identity: Option<Identity>,
    pub credential: Option<Credential>,
    pub authenticated: bool,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            identity: None,
            credential: None,
            authenticated: false,
            loading: true,
            last_error: None,
        }
    }
}

/// Closed set of session transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    LoginStart,
    LoginSuccess {
        identity: Identity,
        credential: Credential,
    },
    LoginFailure(String),
    Logout,
    SetIdentity(Identity),
    SetLoading(bool),
    /// Swap in a renewed credential. Ignored unless authenticated.
    ReplaceCredential(Credential),
}

impl Action {
    /// Short name for log lines (never includes credential material)
    pub fn name(&self) -> &'static str {
        match self {
            Action::LoginStart => "login_start",
            Action::LoginSuccess { .. } => "login_success",
            Action::LoginFailure(_) => "login_failure",
            Action::Logout => "logout",
            Action::SetIdentity(_) => "set_identity",
            Action::SetLoading(_) => "set_loading",
            Action::ReplaceCredential(_) => "replace_credential",
        }
    }
}

impl Session {
    /// Apply an action, producing the next session.
    pub fn apply(&self, action: Action) -> Session {
        match action {
            Action::LoginStart => Session {
                loading: true,
                last_error: None,
                ..self.clone()
            },
            Action::LoginSuccess {
                identity,
                credential,
            } => Session {
                identity: Some(identity),
                credential: Some(credential),
                authenticated: true,
                loading: false,
                last_error: None,
            },
            Action::LoginFailure(message) => Session {
                identity: None,
                credential: None,
                authenticated: false,
                loading: false,
                last_error: Some(message),
            },
            Action::Logout => Session {
                identity: None,
                credential: None,
                authenticated: false,
                loading: false,
                last_error: None,
            },
            Action::SetIdentity(identity) => Session {
                identity: Some(identity),
                ..self.clone()
            },
            Action::SetLoading(loading) => Session {
                loading,
                ..self.clone()
            },
            Action::ReplaceCredential(credential) => {
                if self.authenticated {
                    Session {
                        credential: Some(credential),
                        ..self.clone()
                    }
                } else {
                    self.clone()
                }
            }
        }
    }

    /// Bearer credential, only while authenticated
    pub fn bearer(&self) -> Option<&Credential> {
        if self.authenticated {
            self.credential.as_ref()
        } else {
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::Utc;

    fn identity(name: &str) -> Identity {
        Identity {
            id: 7,
            username: name.to_string(),
            email: format!("{}@example.com", name),
            role: Role::Admin,
            avatar_url: None,
            last_login_at: None,
            created_at: Utc::now(),
        }
    }

    fn logged_in() -> Session {
        Session::default().apply(Action::LoginSuccess {
            identity: identity("ada"),
            credential: Credential::new("t1"),
        })
    }

    #[test]
    fn test_default_is_empty_and_loading() {
        let session = Session::default();
        assert!(session.loading);
        assert!(!session.authenticated);
        assert!(session.identity.is_none());
        assert!(session.credential.is_none());
    }

    #[test]
    fn test_login_start_clears_error() {
        let failed = Session::default().apply(Action::LoginFailure("bad".into()));
        let started = failed.apply(Action::LoginStart);
        assert!(started.loading);
        assert!(started.last_error.is_none());
    }

    #[test]
    fn test_login_success_sets_everything() {
        let session = logged_in();
        assert!(session.authenticated);
        assert!(!session.loading);
        assert_eq!(session.identity.as_ref().unwrap().username, "ada");
        assert_eq!(session.credential, Some(Credential::new("t1")));
    }

    #[test]
    fn test_login_failure_clears_session() {
        let session = logged_in().apply(Action::LoginFailure("Invalid email or password".into()));
        assert!(!session.authenticated);
        assert!(session.identity.is_none());
        assert!(session.credential.is_none());
        assert_eq!(session.last_error.as_deref(), Some("Invalid email or password"));
    }

    #[test]
    fn test_logout_is_idempotent() {
        let once = logged_in().apply(Action::Logout);
        let twice = once.apply(Action::Logout);
        assert_eq!(once, twice);

        let from_empty = Session::default().apply(Action::Logout);
        assert_eq!(from_empty, once);
    }

    #[test]
    fn test_set_identity_leaves_credential() {
        let session = logged_in().apply(Action::SetIdentity(identity("grace")));
        assert!(session.authenticated);
        assert_eq!(session.identity.unwrap().username, "grace");
        assert_eq!(session.credential, Some(Credential::new("t1")));
    }

    #[test]
    fn test_set_loading_only_touches_loading() {
        let session = Session::default().apply(Action::SetLoading(false));
        assert!(!session.loading);
        assert!(!session.authenticated);
    }

    #[test]
    fn test_replace_credential_when_authenticated() {
        let session = logged_in().apply(Action::ReplaceCredential(Credential::new("t2")));
        assert_eq!(session.credential, Some(Credential::new("t2")));
        assert!(session.authenticated);
    }

    #[test]
    fn test_replace_credential_ignored_after_logout() {
        let out = logged_in().apply(Action::Logout);
        let after = out.apply(Action::ReplaceCredential(Credential::new("t2")));
        assert_eq!(after, out);
        assert!(after.bearer().is_none());
    }
}
