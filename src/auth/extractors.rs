//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::cookies;
use crate::common::{safe_email_log, ApiError, AppState};
use crate::services::tokens::KeyRole;

/// Authenticated user extractor
///
/// Resolves the access token from the Authorization header or the
/// `access_token` cookie, verifies it against the access public key, and
/// requires both a live session entry and an existing user row. The session
/// check is what makes logout effective while the signature is still valid.
#[derive(Debug)]
pub struct AuthedUser {
    pub id: String,
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Extract the Extension containing the AppState
        let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let app_state = state_lock.read().await.clone();

        // A Bearer header wins; the cookie covers plain browser requests
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| t.to_string())
            .or_else(|| cookies::request_cookie(&parts.headers, cookies::ACCESS_TOKEN_COOKIE));

        let token = match token {
            Some(t) => t,
            None => {
                warn!("Authentication failed: no access token in header or cookie");
                return Err(ApiError::Unauthorized("You have to log in".to_string()));
            }
        };

        let claims = match app_state.token_service.verify(&token, KeyRole::Access) {
            Some(c) => c,
            None => {
                warn!("Authentication failed: access token did not verify");
                return Err(ApiError::Unauthorized(
                    "Invalid token or user doesn't exist".to_string(),
                ));
            }
        };

        if app_state.session_cache.get(&claims.sub).await.is_none() {
            warn!(user_id = %claims.sub, "Authentication failed: session expired or revoked");
            return Err(ApiError::Unauthorized(
                "Invalid token or session has expired".to_string(),
            ));
        }

        let user = app_state
            .user_store
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "Authentication failed: user not found in database");
                ApiError::Unauthorized("Invalid token or user doesn't exist".to_string())
            })?;

        debug!(
            user_id = %user.id,
            email = %safe_email_log(&user.email),
            "User authentication successful via extractor"
        );

        Ok(AuthedUser {
            id: user.id,
            email: user.email,
        })
    }
}
