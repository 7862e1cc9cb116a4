//! Credential store: all user and linked-account queries

use sqlx::SqlitePool;
use tracing::info;

use super::models::{Account, User};
use crate::common::{generate_account_id, generate_user_id, safe_email_log, ApiError};

pub struct UserStore {
    db: SqlitePool,
}

impl UserStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    // ============================================================================
    // Users
    // ============================================================================

    /// Create a credential-login user with a pending verification code.
    ///
    /// The email is stored lowercased; the UNIQUE constraint on it is the
    /// sole arbiter for duplicates, so concurrent registrations with the
    /// same email both land here and exactly one wins.
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        verification_code_hash: &str,
    ) -> Result<User, ApiError> {
        let user_id = generate_user_id();
        let email = email.to_lowercase();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password, verification_code, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(&email)
        .bind(name)
        .bind(password_hash)
        .bind(verification_code_hash)
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                ApiError::BadRequest("Email already in use.".to_string())
            } else {
                ApiError::DatabaseError(e)
            }
        })?;

        info!(user_id = %user_id, email = %safe_email_log(&email), "Created user");

        self.require_by_id(&user_id).await
    }

    /// Create a passwordless user from a provider profile.
    /// The provider vouched for the email, so the account starts verified.
    pub async fn create_oauth_user(
        &self,
        name: &str,
        email: &str,
        image: Option<&str>,
    ) -> Result<User, ApiError> {
        let user_id = generate_user_id();
        let email = email.to_lowercase();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, verified_at, image, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(&email)
        .bind(name)
        .bind(&now)
        .bind(image)
        .bind(&now)
        .bind(&now)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                ApiError::BadRequest("Email already in use.".to_string())
            } else {
                ApiError::DatabaseError(e)
            }
        })?;

        info!(user_id = %user_id, email = %safe_email_log(&email), "Created user from provider profile");

        self.require_by_id(&user_id).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password, verified_at, verification_code,
                   password_reset_token, password_reset_at, image, created_at, updated_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email.to_lowercase())
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        Ok(user)
    }

    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password, verified_at, verification_code,
                   password_reset_token, password_reset_at, image, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        Ok(user)
    }

    async fn require_by_id(&self, user_id: &str) -> Result<User, ApiError> {
        self.find_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::InternalServer("Created user could not be loaded".to_string()))
    }

    // ============================================================================
    // Email verification
    // ============================================================================

    /// Consume a verification code: set the verified timestamp and clear the
    /// code in one statement. Returns false when no row matched, which covers
    /// both an invalid code and an already-consumed one.
    pub async fn mark_verified(&self, verification_code_hash: &str) -> Result<bool, ApiError> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            UPDATE users
            SET verified_at = ?, verification_code = NULL, updated_at = ?
            WHERE verification_code = ?
            "#,
        )
        .bind(&now)
        .bind(&now)
        .bind(verification_code_hash)
        .execute(&self.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Roll back a pending verification code after a failed mail dispatch
    pub async fn clear_verification_code(&self, user_id: &str) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            UPDATE users
            SET verification_code = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        Ok(())
    }

    // ============================================================================
    // Password reset
    // ============================================================================

    pub async fn set_reset_token(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: &str,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token = ?, password_reset_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(token_hash)
        .bind(expires_at)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        Ok(())
    }

    /// Roll back a pending reset token after a failed mail dispatch
    pub async fn clear_reset_token(&self, user_id: &str) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token = NULL, password_reset_at = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        Ok(())
    }

    /// Find the user holding this reset-token hash, but only while the reset
    /// window is open. An expired match behaves exactly like no match.
    pub async fn find_by_valid_reset_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password, verified_at, verification_code,
                   password_reset_token, password_reset_at, image, created_at, updated_at
            FROM users
            WHERE password_reset_token = ?
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        Ok(user.filter(reset_window_open))
    }

    /// Store the new password hash and clear both reset columns
    pub async fn reset_password(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            UPDATE users
            SET password = ?, password_reset_token = NULL, password_reset_at = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(password_hash)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        info!(user_id = %user_id, "Password reset completed");

        Ok(())
    }

    // ============================================================================
    // Linked provider accounts
    // ============================================================================

    pub async fn find_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Option<Account>, ApiError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, type, provider, provider_account_id,
                   access_token, token_type, scope, created_at
            FROM accounts
            WHERE provider = ? AND provider_account_id = ?
            "#,
        )
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        Ok(account)
    }

    pub async fn create_account(
        &self,
        user_id: &str,
        provider: &str,
        provider_account_id: &str,
        access_token: Option<&str>,
        token_type: Option<&str>,
        scope: Option<&str>,
    ) -> Result<(), ApiError> {
        let account_id = generate_account_id();

        sqlx::query(
            r#"
            INSERT INTO accounts (id, user_id, type, provider, provider_account_id,
                                  access_token, token_type, scope, created_at)
            VALUES (?, ?, 'oauth', ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account_id)
        .bind(user_id)
        .bind(provider)
        .bind(provider_account_id)
        .bind(access_token)
        .bind(token_type)
        .bind(scope)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        info!(user_id = %user_id, provider = %provider, "Linked provider account");

        Ok(())
    }
}

fn reset_window_open(user: &User) -> bool {
    user.password_reset_at
        .as_deref()
        .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
        .map(|expiry| expiry.with_timezone(&chrono::Utc) > chrono::Utc::now())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::migrations::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    // In-memory sqlite gives every connection its own database, so the pool
    // is capped at a single connection.
    async fn test_store() -> UserStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        UserStore::new(pool)
    }

    #[tokio::test]
    async fn test_create_user_lowercases_email() {
        let store = test_store().await;

        let user = store
            .create_user("A", "Mixed@Example.COM", "hash", "codehash")
            .await
            .unwrap();
        assert_eq!(user.email, "mixed@example.com");

        // Lookup normalizes too
        let found = store.find_by_email("MIXED@EXAMPLE.com").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = test_store().await;

        store
            .create_user("A", "a@x.com", "hash", "codehash")
            .await
            .unwrap();
        let err = store
            .create_user("B", "a@x.com", "hash2", "codehash2")
            .await
            .unwrap_err();

        match err {
            ApiError::BadRequest(msg) => assert_eq!(msg, "Email already in use."),
            other => panic!("expected BadRequest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_verification_code_is_single_use() {
        let store = test_store().await;

        let user = store
            .create_user("A", "a@x.com", "hash", "codehash")
            .await
            .unwrap();
        assert!(!user.is_verified());

        assert!(store.mark_verified("codehash").await.unwrap());
        let user = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(user.is_verified());
        assert!(user.verification_code.is_none());

        // Replaying the same code matches nothing
        assert!(!store.mark_verified("codehash").await.unwrap());
    }

    #[tokio::test]
    async fn test_bogus_verification_code_matches_nothing() {
        let store = test_store().await;

        store
            .create_user("A", "a@x.com", "hash", "codehash")
            .await
            .unwrap();
        assert!(!store.mark_verified("not-the-code").await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_token_respects_expiry() {
        let store = test_store().await;

        let user = store
            .create_user("A", "a@x.com", "hash", "codehash")
            .await
            .unwrap();

        let future = (chrono::Utc::now() + chrono::Duration::minutes(10)).to_rfc3339();
        store
            .set_reset_token(&user.id, "resethash", &future)
            .await
            .unwrap();
        assert!(store
            .find_by_valid_reset_token("resethash")
            .await
            .unwrap()
            .is_some());

        // Same hash, window closed
        let past = (chrono::Utc::now() - chrono::Duration::minutes(1)).to_rfc3339();
        store
            .set_reset_token(&user.id, "resethash", &past)
            .await
            .unwrap();
        assert!(store
            .find_by_valid_reset_token("resethash")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_reset_password_clears_token_columns() {
        let store = test_store().await;

        let user = store
            .create_user("A", "a@x.com", "oldhash", "codehash")
            .await
            .unwrap();
        let future = (chrono::Utc::now() + chrono::Duration::minutes(10)).to_rfc3339();
        store
            .set_reset_token(&user.id, "resethash", &future)
            .await
            .unwrap();

        store.reset_password(&user.id, "newhash").await.unwrap();

        let user = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(user.password.as_deref(), Some("newhash"));
        assert!(user.password_reset_token.is_none());
        assert!(user.password_reset_at.is_none());
    }

    #[tokio::test]
    async fn test_rollback_helpers_clear_pending_tokens() {
        let store = test_store().await;

        let user = store
            .create_user("A", "a@x.com", "hash", "codehash")
            .await
            .unwrap();
        store.clear_verification_code(&user.id).await.unwrap();

        let future = (chrono::Utc::now() + chrono::Duration::minutes(10)).to_rfc3339();
        store
            .set_reset_token(&user.id, "resethash", &future)
            .await
            .unwrap();
        store.clear_reset_token(&user.id).await.unwrap();

        let user = store.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(user.verification_code.is_none());
        assert!(user.password_reset_token.is_none());
        assert!(user.password_reset_at.is_none());
    }

    #[tokio::test]
    async fn test_oauth_user_starts_verified_and_passwordless() {
        let store = test_store().await;

        let user = store
            .create_oauth_user("A", "a@x.com", Some("https://img.example/a.png"))
            .await
            .unwrap();

        assert!(user.is_verified());
        assert!(user.is_social_only());
        assert_eq!(user.image.as_deref(), Some("https://img.example/a.png"));
    }

    #[tokio::test]
    async fn test_linked_account_roundtrip() {
        let store = test_store().await;

        let user = store.create_oauth_user("A", "a@x.com", None).await.unwrap();
        store
            .create_account(
                &user.id,
                "github",
                "12345",
                Some("gho_token"),
                Some("bearer"),
                Some("read:user user:email"),
            )
            .await
            .unwrap();

        let account = store
            .find_account("github", "12345")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.user_id, user.id);
        assert_eq!(account.account_type, "oauth");
        assert_eq!(account.token_type.as_deref(), Some("bearer"));

        assert!(store.find_account("github", "99999").await.unwrap().is_none());
        assert!(store.find_account("google", "12345").await.unwrap().is_none());
    }
}
