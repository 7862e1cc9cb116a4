//! Authentication handlers

use axum::extract::{Extension, Json, Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Redirect;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::cookies;
use super::extractors::AuthedUser;
use super::models::{ForgotPasswordPayload, LoginPayload, RegisterPayload, ResetPasswordPayload};
use crate::common::{safe_email_log, safe_token_log, ApiError, AppState, Validator};
use crate::oauth::exchange;
use crate::services::crypto;
use crate::services::queue::MailJob;
use crate::services::tokens::KeyRole;
use crate::users::{FilteredUser, User};

/// POST /api/auth/register
/// Creates a credential user and emails a verification code
///
/// # Request Body
/// ```json
/// {
///   "name": "A",
///   "email": "a@x.com",
///   "password": "hunter2222"
/// }
/// ```
pub async fn register_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let state = state_lock.read().await.clone();

    let validation_result = payload.validate(&payload);
    if !validation_result.is_valid {
        return Err(ApiError::from(validation_result));
    }

    let password_hash = crypto::hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ApiError::InternalServer("Could not process registration".to_string())
    })?;

    // Only the digest of the code is stored; the plaintext goes in the mail
    let verification_code = crypto::random_token();
    let code_hash = crypto::one_way_hash(&verification_code);

    let user = state
        .user_store
        .create_user(&payload.name, &payload.email, &password_hash, &code_hash)
        .await?;

    let verification_url = format!(
        "{}/api/auth/verifyemail/{}",
        state.config.origin, verification_code
    );

    let enqueued = state
        .mail_queue
        .enqueue(MailJob::VerifyEmail {
            to: user.email.clone(),
            name: payload.name.clone(),
            url: verification_url,
        })
        .await;

    if let Err(e) = enqueued {
        error!(error = %e, user_id = %user.id, "Could not enqueue verification mail");
        state.user_store.clear_verification_code(&user.id).await?;
        return Err(ApiError::InternalServer(
            "There was an error sending email, please try again".to_string(),
        ));
    }

    info!(
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        "User registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "status": "success",
            "message": "An email with a verification code has been sent to your email"
        })),
    ))
}

/// POST /api/auth/login
/// Verifies credentials and issues the access/refresh token pair
///
/// # Response
/// ```json
/// {
///   "status": "success",
///   "access_token": "<jwt>"
/// }
/// ```
pub async fn login_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<LoginPayload>,
) -> Result<(HeaderMap, Json<serde_json::Value>), ApiError> {
    let state = state_lock.read().await.clone();

    let user = state
        .user_store
        .find_by_email(&payload.email)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid email or password".to_string()))?;

    let password_hash = match &user.password {
        Some(hash) => hash.clone(),
        None => {
            return Err(ApiError::Forbidden(
                "We found your account. It looks like you registered with a social auth account. Try signing in with social auth."
                    .to_string(),
            ))
        }
    };

    if !user.is_verified() {
        return Err(ApiError::Unauthorized(
            "You are not verified, please verify your email to login".to_string(),
        ));
    }

    let password_ok = crypto::verify_password(&password_hash, &payload.password).map_err(|e| {
        error!(error = %e, user_id = %user.id, "Stored password hash unreadable");
        ApiError::InternalServer("Could not verify credentials".to_string())
    })?;

    if !password_ok {
        return Err(ApiError::BadRequest("Invalid email or password".to_string()));
    }

    let (access_token, refresh_token) = sign_tokens(&state, &user).await?;

    let headers = cookies::login_cookies(
        &access_token,
        &refresh_token,
        state.config.access_token_expires_in,
        state.config.refresh_token_expires_in,
        state.config.production,
    );

    info!(user_id = %user.id, "User logged in");

    Ok((
        headers,
        Json(serde_json::json!({
            "status": "success",
            "access_token": access_token
        })),
    ))
}

/// GET /api/auth/refresh
/// Mints a new access token while the refresh token and session both hold.
/// Every precondition failure answers with the same 403 message.
pub async fn refresh_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<serde_json::Value>), ApiError> {
    let state = state_lock.read().await.clone();

    let denied = || ApiError::Forbidden("Could not refresh access token".to_string());

    let refresh_token = match cookies::request_cookie(&headers, cookies::REFRESH_TOKEN_COOKIE) {
        Some(token) => token,
        None => {
            debug!("Refresh denied: no refresh_token cookie");
            return Err(denied());
        }
    };

    let claims = match state.token_service.verify(&refresh_token, KeyRole::Refresh) {
        Some(claims) => claims,
        None => {
            debug!("Refresh denied: refresh token did not verify");
            return Err(denied());
        }
    };

    // A valid signature is not enough: logout or TTL expiry removes the
    // session entry and with it the right to refresh
    if state.session_cache.get(&claims.sub).await.is_none() {
        debug!(user_id = %claims.sub, "Refresh denied: no live session");
        return Err(denied());
    }

    let user = match state.user_store.find_by_id(&claims.sub).await? {
        Some(user) => user,
        None => {
            warn!(user_id = %claims.sub, "Refresh denied: user row gone");
            return Err(denied());
        }
    };

    // Overwrite the session so an active client keeps its TTL fresh
    put_session(&state, &user).await?;

    let access_token = state
        .token_service
        .sign(&user.id, KeyRole::Access)
        .map_err(|e| {
            error!(error = %e, user_id = %user.id, "Failed to sign access token");
            ApiError::InternalServer("Token signing failed".to_string())
        })?;

    let cookie_headers = cookies::refreshed_cookies(
        &access_token,
        state.config.access_token_expires_in,
        state.config.production,
    );

    debug!(user_id = %user.id, "Access token refreshed");

    Ok((
        cookie_headers,
        Json(serde_json::json!({
            "status": "success",
            "access_token": access_token
        })),
    ))
}

/// GET /api/auth/logout
/// Revokes the session and clears the auth cookies
pub async fn logout_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<(HeaderMap, Json<serde_json::Value>), ApiError> {
    let state = state_lock.read().await.clone();

    state.session_cache.delete(&authed.id).await;

    info!(
        user_id = %authed.id,
        email = %safe_email_log(&authed.email),
        "User logged out"
    );

    Ok((
        cookies::clearing_cookies(state.config.production),
        Json(serde_json::json!({ "status": "success" })),
    ))
}

/// GET /api/auth/verifyemail/:verification_code
/// Consumes a verification code from the mailed link
pub async fn verify_email_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(verification_code): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let code_hash = crypto::one_way_hash(&verification_code);

    if !state.user_store.mark_verified(&code_hash).await? {
        warn!(
            code = %safe_token_log(&verification_code),
            "Verification failed: unknown or already-consumed code"
        );
        return Err(ApiError::Forbidden(
            "Verification code is invalid or user doesn't exist".to_string(),
        ));
    }

    info!("Email verified");

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Email verified successfully"
    })))
}

/// POST /api/auth/forgotpassword
/// Starts the reset flow; answers the same way whether or not the email
/// exists, except for the documented unverified/social cases
pub async fn forgot_password_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<ForgotPasswordPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let validation_result = payload.validate(&payload);
    if !validation_result.is_valid {
        return Err(ApiError::from(validation_result));
    }

    let generic_message = "You will receive a reset email if user with that email exist";

    let user = match state.user_store.find_by_email(&payload.email).await? {
        Some(user) => user,
        None => {
            debug!(
                email = %safe_email_log(&payload.email),
                "Password reset requested for unknown email"
            );
            return Ok(Json(serde_json::json!({
                "status": "success",
                "message": generic_message
            })));
        }
    };

    if !user.is_verified() {
        return Err(ApiError::Forbidden("Account not verified".to_string()));
    }

    if user.is_social_only() {
        return Err(ApiError::Forbidden(
            "We found your account. It looks like you registered with a social auth account. Try signing in with social auth."
                .to_string(),
        ));
    }

    let reset_token = crypto::random_token();
    let token_hash = crypto::one_way_hash(&reset_token);
    let expires_at = (chrono::Utc::now() + chrono::Duration::minutes(10)).to_rfc3339();

    state
        .user_store
        .set_reset_token(&user.id, &token_hash, &expires_at)
        .await?;

    let reset_url = format!(
        "{}/api/auth/resetpassword/{}",
        state.config.origin, reset_token
    );

    let enqueued = state
        .mail_queue
        .enqueue(MailJob::ResetPassword {
            to: user.email.clone(),
            name: user.name.clone().unwrap_or_default(),
            url: reset_url,
        })
        .await;

    if let Err(e) = enqueued {
        error!(error = %e, user_id = %user.id, "Could not enqueue reset mail");
        state.user_store.clear_reset_token(&user.id).await?;
        return Err(ApiError::InternalServer(
            "There was an error sending email".to_string(),
        ));
    }

    info!(user_id = %user.id, "Password reset email enqueued");

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": generic_message
    })))
}

/// PATCH /api/auth/resetpassword/:reset_token
/// Sets a new password for a live reset token and forces a logout
pub async fn reset_password_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(reset_token): Path<String>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<(HeaderMap, Json<serde_json::Value>), ApiError> {
    let state = state_lock.read().await.clone();

    let validation_result = payload.validate(&payload);
    if !validation_result.is_valid {
        return Err(ApiError::from(validation_result));
    }

    let token_hash = crypto::one_way_hash(&reset_token);

    let user = state
        .user_store
        .find_by_valid_reset_token(&token_hash)
        .await?
        .ok_or_else(|| {
            warn!(
                token = %safe_token_log(&reset_token),
                "Reset rejected: invalid or expired token"
            );
            ApiError::Forbidden("Invalid token or token has expired".to_string())
        })?;

    let password_hash = crypto::hash_password(&payload.password).map_err(|e| {
        error!(error = %e, user_id = %user.id, "Password hashing failed");
        ApiError::InternalServer("Could not reset password".to_string())
    })?;

    state
        .user_store
        .reset_password(&user.id, &password_hash)
        .await?;

    // Every outstanding refresh token dies with the session entry
    state.session_cache.delete(&user.id).await;

    Ok((
        cookies::clearing_cookies(state.config.production),
        Json(serde_json::json!({
            "status": "success",
            "message": "Password data updated successfully"
        })),
    ))
}

/// GET /api/auth/oauth/:provider_id
/// Redirects the browser to the provider's consent page
pub async fn oauth_authorize_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(provider_id): Path<String>,
) -> Result<Redirect, ApiError> {
    let state = state_lock.read().await.clone();

    let provider = state
        .oauth_registry
        .find(&provider_id)
        .ok_or_else(|| ApiError::Unauthorized("Invalid provider".to_string()))?;

    let redirect_uri = callback_url(&state.config.origin, &provider_id);

    // The provider echoes this back on the callback; the callback does not
    // match it against a stored value
    let oauth_state = crypto::random_token();
    let authorize_url = provider.authorization_url(&redirect_uri, &oauth_state);

    debug!(provider = %provider_id, "Redirecting to provider consent page");

    Ok(Redirect::to(&authorize_url))
}

/// GET /api/auth/oauth/callback/:provider_id
/// Completes the authorization-code flow and logs the resolved user in
pub async fn oauth_callback_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(provider_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<(HeaderMap, Json<serde_json::Value>), ApiError> {
    info!("🔐 Received OAuth callback");
    let state = state_lock.read().await.clone();

    let code = params
        .get("code")
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Authorization code not provided!".to_string()))?;

    let provider = state
        .oauth_registry
        .find(&provider_id)
        .ok_or_else(|| ApiError::Unauthorized("Invalid provider".to_string()))?;

    let redirect_uri = callback_url(&state.config.origin, &provider_id);

    // The code is single-use: any exchange failure is terminal
    let tokens = exchange::exchange_code(&state.http, provider, code, &redirect_uri)
        .await
        .map_err(|e| ApiError::InternalServer(e.to_string()))?;

    let profile = exchange::fetch_profile(&state.http, provider, &tokens.access_token)
        .await
        .map_err(|e| ApiError::InternalServer(e.to_string()))?;

    let user = exchange::resolve_user(&state.user_store, provider, &profile, &tokens).await?;

    let (access_token, refresh_token) = sign_tokens(&state, &user).await?;

    let headers = cookies::login_cookies(
        &access_token,
        &refresh_token,
        state.config.access_token_expires_in,
        state.config.refresh_token_expires_in,
        state.config.production,
    );

    info!(user_id = %user.id, provider = %provider_id, "User logged in via provider");

    Ok((
        headers,
        Json(serde_json::json!({
            "status": "success",
            "access_token": access_token
        })),
    ))
}

// ---- Helper Functions ----

/// Shared token issuance: write the session first, then sign both tokens
async fn sign_tokens(state: &AppState, user: &User) -> Result<(String, String), ApiError> {
    put_session(state, user).await?;

    let access_token = state
        .token_service
        .sign(&user.id, KeyRole::Access)
        .map_err(|e| {
            error!(error = %e, user_id = %user.id, "Failed to sign access token");
            ApiError::InternalServer("Token signing failed".to_string())
        })?;

    let refresh_token = state
        .token_service
        .sign(&user.id, KeyRole::Refresh)
        .map_err(|e| {
            error!(error = %e, user_id = %user.id, "Failed to sign refresh token");
            ApiError::InternalServer("Token signing failed".to_string())
        })?;

    Ok((access_token, refresh_token))
}

/// Cache the safe user projection under the user's id
async fn put_session(state: &AppState, user: &User) -> Result<(), ApiError> {
    let session_json = serde_json::to_string(&FilteredUser::from(user))
        .map_err(|e| ApiError::InternalServer(format!("Failed to serialize session: {}", e)))?;

    state
        .session_cache
        .put(
            &user.id,
            session_json,
            (state.config.session_cache_expires_in * 60) as u64,
        )
        .await;

    Ok(())
}

fn callback_url(origin: &str, provider_id: &str) -> String {
    format!("{}/api/auth/oauth/callback/{}", origin, provider_id)
}
