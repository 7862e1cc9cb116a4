// src/common/config.rs
//! Environment configuration
//!
//! All runtime configuration is read once at startup by [`Config::from_env`]
//! and carried in [`AppState`](crate::common::AppState). Signing keys arrive
//! base64-encoded so multi-line PEM blocks survive `.env` files; they are
//! decoded here so a bad key fails the boot, not the first login.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid base64 in {0}")]
    InvalidKeyEncoding(String),

    #[error("Key {0} is not valid UTF-8 PEM")]
    InvalidKeyPem(String),
}

/// OAuth client credentials for one provider, present only when configured
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// SMTP transport settings
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub from: String,
}

/// Application configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Public origin used for verification/reset links and OAuth redirect URIs
    pub origin: String,
    /// True when APP_ENV=production; switches the Secure cookie attribute on
    pub production: bool,
    /// PEM-decoded RSA keys, one pair per token role
    pub access_token_private_key: String,
    pub access_token_public_key: String,
    pub refresh_token_private_key: String,
    pub refresh_token_public_key: String,
    /// Token lifetimes in minutes
    pub access_token_expires_in: i64,
    pub refresh_token_expires_in: i64,
    /// Session cache TTL in minutes
    pub session_cache_expires_in: i64,
    pub github: Option<OAuthCredentials>,
    pub google: Option<OAuthCredentials>,
    pub mail: MailConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Required | Default |
    /// |----------|----------|---------|
    /// | `DATABASE_URL` | no | `sqlite://auth_api.db` |
    /// | `PORT` | no | `8000` |
    /// | `APP_ENV` | no | `development` |
    /// | `ORIGIN` | no | `http://localhost:8000` |
    /// | `ACCESS_TOKEN_PRIVATE_KEY` | yes | — (base64 PEM) |
    /// | `ACCESS_TOKEN_PUBLIC_KEY` | yes | — (base64 PEM) |
    /// | `REFRESH_TOKEN_PRIVATE_KEY` | yes | — (base64 PEM) |
    /// | `REFRESH_TOKEN_PUBLIC_KEY` | yes | — (base64 PEM) |
    /// | `ACCESS_TOKEN_EXPIRES_IN` | no | `15` (minutes) |
    /// | `REFRESH_TOKEN_EXPIRES_IN` | no | `60` (minutes) |
    /// | `SESSION_CACHE_EXPIRES_IN` | no | `60` (minutes) |
    /// | `GITHUB_ID` / `GITHUB_SECRET` | no | provider disabled if unset |
    /// | `GOOGLE_OAUTH_CLIENT_ID` / `GOOGLE_OAUTH_CLIENT_SECRET` | no | provider disabled if unset |
    /// | `MAIL_HOST` | no | `localhost` |
    /// | `MAIL_PORT` | no | `1025` |
    /// | `MAIL_USER` / `MAIL_PASS` | no | unauthenticated transport |
    /// | `MAIL_FROM` | no | `Service <admin@first.com>` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://auth_api.db".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8000);

        let origin = env::var("ORIGIN").unwrap_or_else(|_| "http://localhost:8000".to_string());

        let production = env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Ok(Config {
            database_url,
            port,
            origin,
            production,
            access_token_private_key: decoded_key("ACCESS_TOKEN_PRIVATE_KEY")?,
            access_token_public_key: decoded_key("ACCESS_TOKEN_PUBLIC_KEY")?,
            refresh_token_private_key: decoded_key("REFRESH_TOKEN_PRIVATE_KEY")?,
            refresh_token_public_key: decoded_key("REFRESH_TOKEN_PUBLIC_KEY")?,
            access_token_expires_in: minutes_var("ACCESS_TOKEN_EXPIRES_IN", 15),
            refresh_token_expires_in: minutes_var("REFRESH_TOKEN_EXPIRES_IN", 60),
            session_cache_expires_in: minutes_var("SESSION_CACHE_EXPIRES_IN", 60),
            github: credentials_pair("GITHUB_ID", "GITHUB_SECRET"),
            google: credentials_pair("GOOGLE_OAUTH_CLIENT_ID", "GOOGLE_OAUTH_CLIENT_SECRET"),
            mail: MailConfig {
                host: env::var("MAIL_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port: env::var("MAIL_PORT")
                    .ok()
                    .and_then(|p| p.parse::<u16>().ok())
                    .unwrap_or(1025),
                user: env::var("MAIL_USER").ok().filter(|v| !v.is_empty()),
                pass: env::var("MAIL_PASS").ok().filter(|v| !v.is_empty()),
                from: env::var("MAIL_FROM")
                    .unwrap_or_else(|_| "Service <admin@first.com>".to_string()),
            },
        })
    }
}

/// Read a base64-encoded PEM key from the environment and decode it
fn decoded_key(var: &str) -> Result<String, ConfigError> {
    let raw = env::var(var).map_err(|_| ConfigError::MissingVar(var.to_string()))?;
    let bytes = BASE64
        .decode(raw.trim())
        .map_err(|_| ConfigError::InvalidKeyEncoding(var.to_string()))?;
    String::from_utf8(bytes).map_err(|_| ConfigError::InvalidKeyPem(var.to_string()))
}

fn minutes_var(var: &str, default: i64) -> i64 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|m| *m > 0)
        .unwrap_or(default)
}

fn credentials_pair(id_var: &str, secret_var: &str) -> Option<OAuthCredentials> {
    let client_id = env::var(id_var).ok().filter(|v| !v.is_empty())?;
    let client_secret = env::var(secret_var).ok().filter(|v| !v.is_empty())?;
    Some(OAuthCredentials {
        client_id,
        client_secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoded_key_rejects_bad_base64() {
        std::env::set_var("TEST_BAD_KEY", "%%%not-base64%%%");
        let err = decoded_key("TEST_BAD_KEY").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKeyEncoding(_)));
        std::env::remove_var("TEST_BAD_KEY");
    }

    #[test]
    fn test_decoded_key_decodes_pem() {
        let pem = "-----BEGIN PUBLIC KEY-----\nabc\n-----END PUBLIC KEY-----";
        std::env::set_var("TEST_GOOD_KEY", BASE64.encode(pem));
        let decoded = decoded_key("TEST_GOOD_KEY").unwrap();
        assert_eq!(decoded, pem);
        std::env::remove_var("TEST_GOOD_KEY");
    }

    #[test]
    fn test_missing_key_is_an_error() {
        std::env::remove_var("TEST_ABSENT_KEY");
        let err = decoded_key("TEST_ABSENT_KEY").unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(_)));
    }

    #[test]
    fn test_minutes_var_defaults() {
        std::env::remove_var("TEST_MINUTES");
        assert_eq!(minutes_var("TEST_MINUTES", 15), 15);

        std::env::set_var("TEST_MINUTES", "45");
        assert_eq!(minutes_var("TEST_MINUTES", 15), 45);

        std::env::set_var("TEST_MINUTES", "-3");
        assert_eq!(minutes_var("TEST_MINUTES", 15), 15);
        std::env::remove_var("TEST_MINUTES");
    }

    #[test]
    fn test_credentials_pair_requires_both() {
        std::env::set_var("TEST_OAUTH_ID", "client");
        std::env::remove_var("TEST_OAUTH_SECRET");
        assert!(credentials_pair("TEST_OAUTH_ID", "TEST_OAUTH_SECRET").is_none());

        std::env::set_var("TEST_OAUTH_SECRET", "secret");
        let creds = credentials_pair("TEST_OAUTH_ID", "TEST_OAUTH_SECRET").unwrap();
        assert_eq!(creds.client_id, "client");
        assert_eq!(creds.client_secret, "secret");
        std::env::remove_var("TEST_OAUTH_ID");
        std::env::remove_var("TEST_OAUTH_SECRET");
    }
}
