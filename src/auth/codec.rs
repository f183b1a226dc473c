//! Session codec
//!
//! Converts a [`UserProfile`] to and from the representation kept in the
//! session store. The store never sees profiles directly.

use base64::{Engine as _, engine::general_purpose};

use super::provider::UserProfile;
use crate::error::AppError;

/// Encode/decode a user profile for session storage
pub trait SessionCodec: Send + Sync {
    fn encode(&self, user: &UserProfile) -> Result<String, AppError>;

    fn decode(&self, stored: &str) -> Result<UserProfile, AppError>;
}

/// Stores the profile as base64url(JSON)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSessionCodec;

impl SessionCodec for JsonSessionCodec {
    fn encode(&self, user: &UserProfile) -> Result<String, AppError> {
        let json = serde_json::to_vec(user).map_err(|e| AppError::Codec(e.to_string()))?;
        Ok(general_purpose::URL_SAFE_NO_PAD.encode(json))
    }

    fn decode(&self, stored: &str) -> Result<UserProfile, AppError> {
        let json = general_purpose::URL_SAFE_NO_PAD
            .decode(stored)
            .map_err(|e| AppError::Codec(e.to_string()))?;
        serde_json::from_slice(&json).map_err(|e| AppError::Codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_codec_preserves_profile() {
        let codec = JsonSessionCodec;
        let mut user = UserProfile::new("42");
        user.username = Some("octocat".to_string());
        user.emails = vec!["octocat@example.com".to_string()];

        let stored = codec.encode(&user).unwrap();
        assert!(!stored.contains('{'));
        assert_eq!(codec.decode(&stored).unwrap(), user);
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        let codec = JsonSessionCodec;
        assert!(matches!(codec.decode("%%%"), Err(AppError::Codec(_))));

        let not_a_profile = general_purpose::URL_SAFE_NO_PAD.encode(b"[1,2,3]");
        assert!(matches!(
            codec.decode(&not_a_profile),
            Err(AppError::Codec(_))
        ));
    }
}
