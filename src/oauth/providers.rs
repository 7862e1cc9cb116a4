// src/oauth/providers.rs
//! Declarative OAuth provider descriptors and the registry that owns them.
//!
//! Each provider is a plain record of endpoints and credentials plus a
//! `kind` tag that selects its profile-normalization quirks. Adding a
//! provider means adding a descriptor, not touching the callback flow.

use crate::common::config::{Config, OAuthCredentials};

/// Closed set of supported providers; selects profile normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    GitHub,
    Google,
}

/// Everything the callback flow needs to know about one provider
#[derive(Debug, Clone)]
pub struct OAuthProvider {
    /// Path-segment id (`github`, `google`)
    pub id: &'static str,
    /// Display name used in user-facing messages
    pub name: &'static str,
    pub kind: ProviderKind,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: &'static str,
    pub token_url: &'static str,
    pub userinfo_url: &'static str,
    pub scopes: &'static str,
}

impl OAuthProvider {
    fn github(credentials: &OAuthCredentials) -> Self {
        Self {
            id: "github",
            name: "GitHub",
            kind: ProviderKind::GitHub,
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            authorize_url: "https://github.com/login/oauth/authorize",
            token_url: "https://github.com/login/oauth/access_token",
            userinfo_url: "https://api.github.com/user",
            scopes: "read:user user:email",
        }
    }

    fn google(credentials: &OAuthCredentials) -> Self {
        Self {
            id: "google",
            name: "Google",
            kind: ProviderKind::Google,
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
            token_url: "https://oauth2.googleapis.com/token",
            userinfo_url: "https://www.googleapis.com/oauth2/v1/userinfo?alt=json",
            scopes: "https://www.googleapis.com/auth/userinfo.profile https://www.googleapis.com/auth/userinfo.email",
        }
    }

    /// The URL the browser is redirected to for consent. The `state` value
    /// is echoed back by the provider on the callback.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(self.scopes),
            urlencoding::encode(state)
        )
    }
}

/// Configured providers, keyed by the `:provider_id` path segment
pub struct OAuthRegistry {
    providers: Vec<OAuthProvider>,
}

impl OAuthRegistry {
    /// Build the registry from whichever credential pairs the environment
    /// provides; a provider without credentials simply isn't registered.
    pub fn from_config(config: &Config) -> Self {
        let mut providers = Vec::new();

        if let Some(credentials) = &config.github {
            providers.push(OAuthProvider::github(credentials));
        }
        if let Some(credentials) = &config.google {
            providers.push(OAuthProvider::google(credentials));
        }

        Self { providers }
    }

    pub fn find(&self, provider_id: &str) -> Option<&OAuthProvider> {
        self.providers.iter().find(|p| p.id == provider_id)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
