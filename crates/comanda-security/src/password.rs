//! Password storage.
//!
//! New credentials are always Argon2. Records migrated from the legacy
//! platform may still hold bcrypt hashes or plaintext; those verify here and
//! are reported by [`PasswordService::needs_rehash`] so callers can upgrade
//! them after a successful login.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Hash error: {0}")]
    HashError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialScheme {
    Argon2,
    Bcrypt,
    Plaintext,
}

/// Hash verified when there is no real credential to compare against, so
/// that the unknown-account branch costs roughly one Argon2 verification.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| PasswordService::hash("comanda-timing-equalizer").ok());

pub struct PasswordService;

impl PasswordService {
    pub fn hash(password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError::HashError(e.to_string()))
    }

    pub fn verify(password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| PasswordError::HashError(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    pub fn scheme(stored: &str) -> CredentialScheme {
        if stored.starts_with("$argon2") {
            CredentialScheme::Argon2
        } else if ["$2a$", "$2b$", "$2y$"].iter().any(|p| stored.starts_with(p)) {
            CredentialScheme::Bcrypt
        } else {
            CredentialScheme::Plaintext
        }
    }

    /// Verify against whatever scheme the stored credential uses.
    pub fn verify_stored(password: &str, stored: &str) -> Result<bool, PasswordError> {
        match Self::scheme(stored) {
            CredentialScheme::Argon2 => Self::verify(password, stored),
            CredentialScheme::Bcrypt => bcrypt::verify(password, stored)
                .map_err(|e| PasswordError::HashError(e.to_string())),
            CredentialScheme::Plaintext => Ok(constant_time_eq(password, stored)),
        }
    }

    pub fn needs_rehash(stored: &str) -> bool {
        Self::scheme(stored) != CredentialScheme::Argon2
    }

    /// Burn one Argon2 verification and discard the result.
    pub fn verify_dummy(password: &str) {
        if let Some(hash) = DUMMY_HASH.as_deref() {
            let _ = Self::verify(password, hash);
        }
    }
}

// Compare digests so neither the length nor the position of the first
// differing byte leaks through timing.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let left = Sha256::digest(a.as_bytes());
    let right = Sha256::digest(b.as_bytes());
    left.iter()
        .zip(right.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
