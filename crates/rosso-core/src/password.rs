//! Password hashing and the single verification routine for every login path.
//!
//! New hashes are always Argon2id PHC strings. Salted SHA-256 hashes carried
//! over from the old login endpoint (`sha256$<salt>$<hex>`) still verify, and
//! report `needs_rehash` so the caller can upgrade them in place. Bcrypt hashes
//! from the retired catalog-side user list are recognized and refused.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const MIN_PASSWORD_LENGTH: usize = 8;

const LEGACY_SHA256_PREFIX: &str = "sha256$";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password must be at least {min} characters")]
    TooShort { min: usize },

    #[error("password hashing failed")]
    Hash,

    #[error("stored password hash is malformed")]
    MalformedHash,

    /// The stored hash uses a scheme this service no longer verifies; the
    /// account needs a password reset.
    #[error("unsupported password hash scheme: {0}")]
    UnsupportedScheme(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    Valid { needs_rehash: bool },
    Invalid,
}

impl PasswordCheck {
    #[must_use]
    pub fn is_valid(self) -> bool {
        matches!(self, PasswordCheck::Valid { .. })
    }

    #[must_use]
    pub fn needs_rehash(self) -> bool {
        matches!(self, PasswordCheck::Valid { needs_rehash: true })
    }
}

/// # Errors
///
/// Returns [`PasswordError::TooShort`] below [`MIN_PASSWORD_LENGTH`] characters.
pub fn validate_password(plain: &str) -> Result<(), PasswordError> {
    if plain.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Hash a password using Argon2id with a random salt.
///
/// # Errors
///
/// Returns [`PasswordError::TooShort`] for weak input, or
/// [`PasswordError::Hash`] if Argon2 fails.
pub fn hash_password(plain: &str) -> Result<String, PasswordError> {
    validate_password(plain)?;
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| PasswordError::Hash)
}

/// Verify `plain` against a stored hash of any scheme the users table may hold.
///
/// # Errors
///
/// - [`PasswordError::UnsupportedScheme`] for bcrypt hashes.
/// - [`PasswordError::MalformedHash`] for anything unrecognized or corrupt.
pub fn verify_password(plain: &str, stored: &str) -> Result<PasswordCheck, PasswordError> {
    let stored = stored.trim();

    if stored.starts_with("$argon2") {
        let parsed = PasswordHash::new(stored).map_err(|_| PasswordError::MalformedHash)?;
        return Ok(
            match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
                Ok(()) => PasswordCheck::Valid {
                    needs_rehash: false,
                },
                Err(_) => PasswordCheck::Invalid,
            },
        );
    }

    if let Some(rest) = stored.strip_prefix(LEGACY_SHA256_PREFIX) {
        let (salt, expected) = rest.split_once('$').ok_or(PasswordError::MalformedHash)?;
        let expected = expected.to_ascii_lowercase();
        if salt.is_empty() || expected.len() != 64 {
            return Err(PasswordError::MalformedHash);
        }
        let actual = sha256_hex(salt, plain);
        let equal: bool = actual.as_bytes().ct_eq(expected.as_bytes()).into();
        return Ok(if equal {
            PasswordCheck::Valid { needs_rehash: true }
        } else {
            PasswordCheck::Invalid
        });
    }

    if ["$2a$", "$2b$", "$2y$"].iter().any(|p| stored.starts_with(p)) {
        return Err(PasswordError::UnsupportedScheme("bcrypt"));
    }

    Err(PasswordError::MalformedHash)
}

fn sha256_hex(salt: &str, plain: &str) -> String {
    let digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(plain.as_bytes())
        .finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
