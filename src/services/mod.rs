// src/services/mod.rs
//
// Shared services module containing business logic services
// that can be used across different domain modules

pub mod crypto;
pub mod mail;
pub mod queue;
pub mod session;
pub mod tokens;

// Re-export commonly used types for convenience
pub use mail::Mailer;
pub use queue::{MailJob, MailQueue};
pub use session::SessionCache;
pub use tokens::{TokenClaims, TokenService};
