//! Mapping from backend JSON to canonical types.
//!
//! The backend is not consistent about field names: the token may arrive as
//! `token` or `access_token`, the user under `user`, `admin` or a `data`
//! envelope, timestamps as RFC 3339 or `Y-m-d H:i:s`. Each response type has
//! exactly one mapping function here; anything it cannot map is rejected
//! with `ApiError::InvalidResponse`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use super::backend::LoginGrant;
use super::ApiError;
use crate::models::{Credential, Identity, Role};

const TOKEN_FIELDS: &[&str] = &["token", "access_token", "accessToken"];
const IDENTITY_CONTAINERS: &[&str] = &["user", "admin", "profile"];

/// Map a login response
pub fn normalize_login(value: &Value) -> Result<LoginGrant, ApiError> {
    Ok(LoginGrant {
        credential: normalize_credential(value)?,
        identity: normalize_identity(value)?,
    })
}

/// Map a refresh response (or the credential part of a login response)
pub fn normalize_credential(value: &Value) -> Result<Credential, ApiError> {
    envelopes(value)
        .find_map(|object| {
            TOKEN_FIELDS.iter().find_map(|field| {
                object
                    .get(*field)
                    .and_then(Value::as_str)
                    .filter(|token| !token.trim().is_empty())
            })
        })
        .map(Credential::new)
        .ok_or_else(|| reject("no token field in response"))
}

/// Map a `me`, profile-update or login response to an identity
pub fn normalize_identity(value: &Value) -> Result<Identity, ApiError> {
    let object = find_identity_object(value)
        .ok_or_else(|| reject("no user object in response"))?;

    let id = object
        .get("id")
        .and_then(|id| match id {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .ok_or_else(|| reject("user id missing or not an integer"))?;

    let email = string_field(object, &["email"])
        .ok_or_else(|| reject("user email missing"))?;

    // Accounts without a username are shown by email
    let username = string_field(object, &["username", "name"]).unwrap_or_default();

    let role = role_field(object).ok_or_else(|| reject("user role missing or unrecognized"))?;

    let avatar_url = string_field(object, &["avatar_url", "avatarUrl", "avatar"]);

    let last_login_at = match string_field(object, &["last_login_at", "lastLoginAt"]) {
        Some(raw) => {
            let parsed = parse_timestamp(&raw);
            if parsed.is_none() {
                warn!(value = %raw, "Ignoring unparseable last_login_at");
            }
            parsed
        }
        None => None,
    };

    let created_at = string_field(object, &["created_at", "createdAt"])
        .and_then(|raw| parse_timestamp(&raw))
        .ok_or_else(|| reject("user created_at missing or unparseable"))?;

    Ok(Identity {
        id,
        username,
        email,
        role,
        avatar_url,
        last_login_at,
        created_at,
    })
}

fn reject(reason: &str) -> ApiError {
    warn!(reason, "Rejecting backend response shape");
    ApiError::InvalidResponse(reason.to_string())
}

/// The response object followed by any nested `data` envelopes
fn envelopes(value: &Value) -> impl Iterator<Item = &Map<String, Value>> {
    std::iter::successors(value.as_object(), |&object| {
        object.get("data").and_then(Value::as_object)
    })
}

fn looks_like_identity(object: &Map<String, Value>) -> bool {
    object.contains_key("email") && object.contains_key("id")
}

fn find_identity_object(value: &Value) -> Option<&Map<String, Value>> {
    for object in envelopes(value) {
        for container in IDENTITY_CONTAINERS {
            if let Some(inner) = object.get(*container).and_then(Value::as_object) {
                if looks_like_identity(inner) {
                    return Some(inner);
                }
            }
        }
        if looks_like_identity(object) {
            return Some(object);
        }
    }
    None
}

fn string_field(object: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        object
            .get(*name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Role as a plain string, or as an object carrying a `name`
fn role_field(object: &Map<String, Value>) -> Option<Role> {
    match object.get("role")? {
        Value::String(raw) => Role::parse(raw),
        Value::Object(role) => role.get("name").and_then(Value::as_str).and_then(Role::parse),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    fn user_json() -> Value {
        json!({
            "id": 12,
            "username": "ada",
            "email": "ada@example.com",
            "role": "super_admin",
            "avatar_url": null,
            "last_login_at": "2024-05-01 08:30:00",
            "created_at": "2023-01-15T10:00:00.000000Z"
        })
    }

    #[test]
    fn test_login_flat_shape() {
        let grant = normalize_login(&json!({ "token": "abc", "user": user_json() })).unwrap();
        assert_eq!(grant.credential, Credential::new("abc"));
        assert_eq!(grant.identity.id, 12);
        assert_eq!(grant.identity.role, Role::SuperAdmin);
        assert!(grant.identity.avatar_url.is_none());
    }

    #[test]
    fn test_login_data_envelope_with_access_token() {
        let body = json!({
            "success": true,
            "data": { "access_token": "xyz", "token_type": "bearer", "admin": user_json() }
        });
        let grant = normalize_login(&body).unwrap();
        assert_eq!(grant.credential.as_str(), "xyz");
        assert_eq!(grant.identity.username, "ada");
    }

    #[test]
    fn test_identity_bare_and_enveloped() {
        assert_eq!(normalize_identity(&user_json()).unwrap().id, 12);
        assert_eq!(normalize_identity(&json!({ "data": user_json() })).unwrap().id, 12);
    }

    #[test]
    fn test_identity_aliases() {
        let body = json!({
            "id": "5",
            "name": "grace",
            "email": "grace@example.com",
            "role": { "name": "admin" },
            "avatar": "https://cdn.example.com/g.png",
            "createdAt": "2023-02-01 00:00:00"
        });
        let identity = normalize_identity(&body).unwrap();
        assert_eq!(identity.id, 5);
        assert_eq!(identity.username, "grace");
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(identity.avatar_url.as_deref(), Some("https://cdn.example.com/g.png"));
        assert_eq!(identity.created_at.month(), 2);
    }

    #[test]
    fn test_missing_username_falls_back_to_email() {
        let mut body = user_json();
        body["username"] = json!("");
        let identity = normalize_identity(&body).unwrap();
        assert_eq!(identity.username, "");
        assert_eq!(identity.display_name(), "ada@example.com");

        body.as_object_mut().unwrap().remove("username");
        assert_eq!(normalize_identity(&body).unwrap().display_name(), "ada@example.com");
    }

    #[test]
    fn test_laravel_timestamp_is_utc() {
        let identity = normalize_identity(&user_json()).unwrap();
        let last_login = identity.last_login_at.unwrap();
        assert_eq!(last_login.hour(), 8);
        assert_eq!(last_login.minute(), 30);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let mut body = user_json();
        body["role"] = json!("editor");
        assert!(matches!(normalize_identity(&body), Err(ApiError::InvalidResponse(_))));
    }

    #[test]
    fn test_missing_created_at_is_rejected() {
        let mut body = user_json();
        body.as_object_mut().unwrap().remove("created_at");
        assert!(normalize_identity(&body).is_err());
    }

    #[test]
    fn test_bad_last_login_is_dropped_not_rejected() {
        let mut body = user_json();
        body["last_login_at"] = json!("yesterday");
        assert!(normalize_identity(&body).unwrap().last_login_at.is_none());
    }

    #[test]
    fn test_credential_requires_non_empty_token() {
        assert!(normalize_credential(&json!({ "token": "" })).is_err());
        assert!(normalize_credential(&json!({ "message": "ok" })).is_err());
        assert!(normalize_credential(&json!("token")).is_err());
        assert_eq!(
            normalize_credential(&json!({ "data": { "token": "n" } })).unwrap(),
            Credential::new("n")
        );
    }
}
