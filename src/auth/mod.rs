//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - Registration with mailed verification codes
//! - Credential login issuing an access/refresh token pair
//! - Cookie-based refresh, logout, and session revocation
//! - Password reset over single-use hashed tokens
//! - GitHub and Google authorization-code logins
//! - AuthedUser extractor for protected routes

pub mod cookies;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;


pub use extractors::AuthedUser;
pub use routes::auth_routes;
