//! # Users Module
//!
//! This module owns the credential store and its row models:
//! - User records (credential and OAuth-created)
//! - Linked provider accounts
//! - Verification-code and reset-token bookkeeping

pub mod models;
pub mod store;

pub use models::{Account, FilteredUser, User};
pub use store::UserStore;
