//! Authentication routes

use axum::{
    routing::{get, patch, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/auth/register` - Create a user, email a verification code
/// - `POST /api/auth/login` - Issue tokens for valid credentials
/// - `GET /api/auth/refresh` - Mint a new access token
/// - `GET /api/auth/logout` - Revoke the session (authenticated)
/// - `GET /api/auth/verifyemail/:verification_code` - Consume a verification code
/// - `POST /api/auth/forgotpassword` - Start a password reset
/// - `PATCH /api/auth/resetpassword/:reset_token` - Finish a password reset
/// - `GET /api/auth/oauth/:provider_id` - Redirect to the provider consent page
/// - `GET /api/auth/oauth/callback/:provider_id` - Complete the provider login
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/register", post(handlers::register_handler))
        .route("/api/auth/login", post(handlers::login_handler))
        .route("/api/auth/refresh", get(handlers::refresh_handler))
        .route("/api/auth/logout", get(handlers::logout_handler))
        .route(
            "/api/auth/verifyemail/:verification_code",
            get(handlers::verify_email_handler),
        )
        .route(
            "/api/auth/forgotpassword",
            post(handlers::forgot_password_handler),
        )
        .route(
            "/api/auth/resetpassword/:reset_token",
            patch(handlers::reset_password_handler),
        )
        .route(
            "/api/auth/oauth/:provider_id",
            get(handlers::oauth_authorize_handler),
        )
        .route(
            "/api/auth/oauth/callback/:provider_id",
            get(handlers::oauth_callback_handler),
        )
}
