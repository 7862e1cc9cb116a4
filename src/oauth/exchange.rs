// src/oauth/exchange.rs
//! Authorization-code exchange, profile fetch and account resolution
//!
//! One callback request walks: exchange the code for provider tokens, fetch
//! and normalize the profile, then resolve it to a local user. The code is
//! single-use, so a failed exchange is terminal and never retried.

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use super::providers::{OAuthProvider, ProviderKind};
use crate::common::{safe_email_log, ApiError};
use crate::users::{User, UserStore};

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Token exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("Profile fetch failed: {0}")]
    ProfileFailed(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),
}

/// Provider-agnostic profile after normalization
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub verified_email: bool,
}

/// Token-endpoint response, reduced to the fields the flow uses
#[derive(Debug, Clone)]
pub struct ProviderTokens {
    pub access_token: String,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

/// POST the authorization code to the provider's token endpoint.
///
/// GitHub answers a bad code with HTTP 200 and an `error` field, so a
/// missing `access_token` in the body is treated the same as a non-2xx.
pub async fn exchange_code(
    client: &Client,
    provider: &OAuthProvider,
    code: &str,
    redirect_uri: &str,
) -> Result<ProviderTokens, OAuthError> {
    let params = [
        ("code", code),
        ("client_id", provider.client_id.as_str()),
        ("client_secret", provider.client_secret.as_str()),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
    ];

    let response = client
        .post(provider.token_url)
        .header(ACCEPT, "application/json")
        .form(&params)
        .send()
        .await
        .map_err(|e| OAuthError::RequestFailed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!(provider = provider.id, status = %status, error = %error_text, "Token exchange failed");
        return Err(OAuthError::ExchangeFailed(format!(
            "HTTP {}: {}",
            status, error_text
        )));
    }

    #[derive(Deserialize)]
    struct TokenBody {
        access_token: Option<String>,
        token_type: Option<String>,
        scope: Option<String>,
        error_description: Option<String>,
    }

    let body = response
        .json::<TokenBody>()
        .await
        .map_err(|e| OAuthError::ExchangeFailed(e.to_string()))?;

    let access_token = body.access_token.ok_or_else(|| {
        let reason = body
            .error_description
            .unwrap_or_else(|| "No access token in response".to_string());
        error!(provider = provider.id, error = %reason, "Token exchange returned no token");
        OAuthError::ExchangeFailed(reason)
    })?;

    Ok(ProviderTokens {
        access_token,
        token_type: body.token_type,
        scope: body.scope,
    })
}

/// Fetch the provider's profile and normalize it
pub async fn fetch_profile(
    client: &Client,
    provider: &OAuthProvider,
    access_token: &str,
) -> Result<OAuthProfile, OAuthError> {
    match provider.kind {
        ProviderKind::GitHub => fetch_github_profile(client, provider, access_token).await,
        ProviderKind::Google => fetch_google_profile(client, provider, access_token).await,
    }
}

async fn fetch_github_profile(
    client: &Client,
    provider: &OAuthProvider,
    access_token: &str,
) -> Result<OAuthProfile, OAuthError> {
    #[derive(Deserialize)]
    struct GitHubUser {
        id: i64,
        login: String,
        name: Option<String>,
        email: Option<String>,
        avatar_url: Option<String>,
    }

    // GitHub rejects requests without a User-Agent header
    let user = get_json::<GitHubUser>(
        client
            .get(provider.userinfo_url)
            .header(USER_AGENT, "auth-api")
            .bearer_auth(access_token),
        provider,
    )
    .await?;

    // A public email on the profile is necessarily a verified one; a hidden
    // email needs the emails endpoint to recover the address and its flag.
    let (email, verified_email) = match user.email {
        Some(email) => (email, true),
        None => fetch_github_email(client, access_token).await?,
    };

    Ok(OAuthProfile {
        id: user.id.to_string(),
        name: user.name.unwrap_or(user.login),
        email,
        image: user.avatar_url,
        verified_email,
    })
}

async fn fetch_github_email(
    client: &Client,
    access_token: &str,
) -> Result<(String, bool), OAuthError> {
    #[derive(Deserialize)]
    struct GitHubEmail {
        email: String,
        primary: bool,
        verified: bool,
    }

    let response = client
        .get("https://api.github.com/user/emails")
        .header(USER_AGENT, "auth-api")
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| OAuthError::RequestFailed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(OAuthError::ProfileFailed(format!(
            "HTTP {} from email listing",
            status
        )));
    }

    let emails = response
        .json::<Vec<GitHubEmail>>()
        .await
        .map_err(|e| OAuthError::ProfileFailed(e.to_string()))?;

    emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.first())
        .map(|e| (e.email.clone(), e.verified))
        .ok_or_else(|| OAuthError::ProfileFailed("Account has no email addresses".to_string()))
}

async fn fetch_google_profile(
    client: &Client,
    provider: &OAuthProvider,
    access_token: &str,
) -> Result<OAuthProfile, OAuthError> {
    #[derive(Deserialize)]
    struct GoogleUser {
        id: String,
        name: Option<String>,
        email: String,
        picture: Option<String>,
        verified_email: Option<bool>,
    }

    let user = get_json::<GoogleUser>(
        client.get(provider.userinfo_url).bearer_auth(access_token),
        provider,
    )
    .await?;

    Ok(OAuthProfile {
        id: user.id,
        name: user.name.unwrap_or_else(|| user.email.clone()),
        email: user.email,
        image: user.picture,
        verified_email: user.verified_email.unwrap_or(false),
    })
}

async fn get_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
    provider: &OAuthProvider,
) -> Result<T, OAuthError> {
    let response = request
        .send()
        .await
        .map_err(|e| OAuthError::RequestFailed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!(provider = provider.id, status = %status, error = %error_text, "Profile fetch failed");
        return Err(OAuthError::ProfileFailed(format!(
            "HTTP {}: {}",
            status, error_text
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| OAuthError::ProfileFailed(e.to_string()))
}

/// Resolve a normalized profile to a local user.
///
/// Order matters: the verified-email check runs before any lookup or write,
/// so a rejected login leaves no trace. Resolution then prefers the linked
/// account, falls back to matching by email (the provider vouched for it),
/// and only then creates a fresh passwordless user.
pub async fn resolve_user(
    store: &UserStore,
    provider: &OAuthProvider,
    profile: &OAuthProfile,
    tokens: &ProviderTokens,
) -> Result<User, ApiError> {
    if !profile.verified_email {
        return Err(ApiError::Forbidden(format!(
            "`{}` account not verified",
            provider.name
        )));
    }

    if let Some(account) = store.find_account(provider.id, &profile.id).await? {
        return store
            .find_by_id(&account.user_id)
            .await?
            .ok_or_else(|| {
                ApiError::InternalServer("Linked account points at a missing user".to_string())
            });
    }

    let user = match store.find_by_email(&profile.email).await? {
        Some(user) => {
            info!(
                user_id = %user.id,
                provider = provider.id,
                email = %safe_email_log(&profile.email),
                "Linking provider account to existing user"
            );
            user
        }
        None => {
            store
                .create_oauth_user(&profile.name, &profile.email, profile.image.as_deref())
                .await?
        }
    };

    store
        .create_account(
            &user.id,
            provider.id,
            &profile.id,
            Some(&tokens.access_token),
            tokens.token_type.as_deref().or(Some("bearer")),
            tokens.scope.as_deref(),
        )
        .await?;

    Ok(user)
}
