// src/services/crypto.rs
//! Password and token cryptography
//!
//! Passwords use Argon2id with a random salt, stored as PHC strings so the
//! parameters travel with the hash. Verification codes and reset tokens are
//! 32 random bytes hex-encoded; only their SHA-256 digest is ever persisted,
//! so a leaked database row cannot be replayed as a live token.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Hash a plaintext password using Argon2id with a random salt.
///
/// Returns the PHC-formatted hash string (includes algorithm, params, salt, and hash).
pub fn hash_password(password: &str) -> Result<String, CryptoError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CryptoError::HashingFailed(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC-formatted Argon2id hash.
///
/// Returns `Ok(true)` if the password matches, `Ok(false)` if it does not.
pub fn verify_password(hash: &str, password: &str) -> Result<bool, CryptoError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| CryptoError::MalformedHash(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CryptoError::MalformedHash(e.to_string())),
    }
}

/// Generate a high-entropy token: 32 random bytes, hex-encoded (64 chars).
///
/// Used for email verification codes and password reset tokens. The caller
/// sends this value to the user and stores only [`one_way_hash`] of it.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// SHA-256 hex digest of a token.
///
/// This is the stored form of verification codes and reset tokens; lookups
/// compare digests, never plaintext.
pub fn one_way_hash(token: &str) -> String {
    let hash = Sha256::digest(token.as_bytes());
    format!("{:x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hash_and_verify() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");

        // The hash must be a valid PHC string starting with the argon2id identifier.
        assert!(
            hash.starts_with("$argon2id$"),
            "expected argon2id PHC prefix"
        );

        let verified = verify_password(&hash, password).expect("verify should succeed");
        assert!(verified, "correct password should verify as true");
    }

    #[test]
    fn test_wrong_password_fails() {
        let hash = hash_password("real-password").expect("hashing should succeed");
        let verified = verify_password(&hash, "wrong-password").expect("verify should succeed");
        assert!(!verified, "wrong password should verify as false");
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        let result = verify_password("not-a-phc-string", "whatever");
        assert!(matches!(result, Err(CryptoError::MalformedHash(_))));
    }

    #[test]
    fn test_random_token_shape() {
        let token = random_token();
        assert_eq!(token.len(), 64, "32 bytes hex-encoded should be 64 chars");
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_random_token_uniqueness() {
        let mut seen = HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(random_token()), "Duplicate token generated");
        }
    }

    #[test]
    fn test_one_way_hash_known_vector() {
        // SHA-256 of the empty string
        assert_eq!(
            one_way_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_one_way_hash_deterministic() {
        let token = random_token();
        assert_eq!(one_way_hash(&token), one_way_hash(&token));
        assert_eq!(one_way_hash(&token).len(), 64);
        // Digest of a different token does not collide
        assert_ne!(one_way_hash(&token), one_way_hash(&random_token()));
    }
}
