//! User and linked-account data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User database model
///
/// `password` is None for accounts created through an OAuth provider.
/// `verification_code` and `password_reset_token` hold SHA-256 hex digests
/// of the values mailed to the user, never the plaintext.
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub password: Option<String>,
    pub verified_at: Option<String>,
    pub verification_code: Option<String>,
    pub password_reset_token: Option<String>,
    pub password_reset_at: Option<String>,
    pub image: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl User {
    /// Whether the user has completed email verification
    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }

    /// Whether the account can only sign in through an OAuth provider
    pub fn is_social_only(&self) -> bool {
        self.password.is_none()
    }
}

/// User projection safe to serialize into sessions and responses.
/// Excludes the password hash and every token column.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FilteredUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub verified: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&User> for FilteredUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            image: user.image.clone(),
            verified: user.is_verified(),
            created_at: user.created_at.clone(),
            updated_at: user.updated_at.clone(),
        }
    }
}

/// Linked OAuth provider account
///
/// One (provider, provider_account_id) pair maps to at most one user.
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub account_type: String,
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub created_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "U_K7NP3X".to_string(),
            email: "a@x.com".to_string(),
            name: Some("A".to_string()),
            password: Some("$argon2id$...".to_string()),
            verified_at: Some("2026-08-23T10:00:00+00:00".to_string()),
            verification_code: Some("deadbeef".to_string()),
            password_reset_token: Some("cafebabe".to_string()),
            password_reset_at: None,
            image: None,
            created_at: Some("2026-08-23T09:00:00+00:00".to_string()),
            updated_at: Some("2026-08-23T10:00:00+00:00".to_string()),
        }
    }

    #[test]
    fn test_verified_tracks_timestamp() {
        let mut user = sample_user();
        assert!(user.is_verified());

        user.verified_at = None;
        assert!(!user.is_verified());
    }

    #[test]
    fn test_social_only_means_no_password() {
        let mut user = sample_user();
        assert!(!user.is_social_only());

        user.password = None;
        assert!(user.is_social_only());
    }

    #[test]
    fn test_filtered_user_drops_secrets() {
        let user = sample_user();
        let filtered = FilteredUser::from(&user);

        let json = serde_json::to_value(&filtered).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("verification_code").is_none());
        assert!(json.get("password_reset_token").is_none());
        assert_eq!(json["id"], "U_K7NP3X");
        assert_eq!(json["verified"], true);
    }
}
