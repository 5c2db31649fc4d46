//! Password hashing and verification.
//!
//! Digests are argon2id PHC strings; the random per-call salt and the cost
//! parameters travel inside the digest, so verification needs nothing else.

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct HashError(pub(crate) String);

/// Hash `secret` with a fresh random salt.
pub fn hash(secret: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|digest| digest.to_string())
        .map_err(|err| HashError(err.to_string()))
}

/// Check `secret` against a stored digest.
///
/// Mismatches and unparseable digests both yield `false`; the comparison
/// inside argon2 is constant-time.
pub fn verify(digest: &str, secret: &str) -> bool {
    let parsed = match PasswordHash::new(digest) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!("stored password digest is malformed: {}", err);
            return false;
        }
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}
