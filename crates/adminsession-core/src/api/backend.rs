use async_trait::async_trait;

use super::ApiError;
use crate::models::{Credential, Identity};

/// Result of a successful login
#[derive(Debug, Clone, PartialEq)]
pub struct LoginGrant {
    pub identity: Identity,
    pub credential: Credential,
}

/// Image uploaded as the new avatar
#[derive(Debug, Clone, PartialEq)]
pub struct Avatar {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Avatar {
    /// Build an avatar from a file name, guessing the mime type from its
    /// extension.
    pub fn from_file_name(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let mime_type = match extension.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            _ => "application/octet-stream",
        }
        .to_string();

        Self {
            file_name,
            mime_type,
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub username: String,
    pub avatar: Option<Avatar>,
}

/// Boundary to the remote authentication backend.
///
/// Implementations return canonical types; response-shape quirks are
/// resolved before anything crosses this trait.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginGrant, ApiError>;

    /// Best-effort server-side logout
    async fn logout(&self, credential: &Credential) -> Result<(), ApiError>;

    /// Validate the credential and return the current identity
    async fn me(&self, credential: &Credential) -> Result<Identity, ApiError>;

    /// Exchange a still-valid credential for a renewed one
    async fn refresh(&self, credential: &Credential) -> Result<Credential, ApiError>;

    async fn update_profile(
        &self,
        credential: &Credential,
        update: &ProfileUpdate,
    ) -> Result<Identity, ApiError>;
}
