//! # OAuth Module
//!
//! This module handles social login against a closed set of providers:
//! - Declarative provider descriptors (GitHub, Google) and their registry
//! - Authorization-code token exchange
//! - Profile fetch, normalization and local-account resolution

pub mod exchange;
pub mod providers;


pub use exchange::{OAuthError, OAuthProfile, ProviderTokens};
pub use providers::{OAuthProvider, OAuthRegistry, ProviderKind};
