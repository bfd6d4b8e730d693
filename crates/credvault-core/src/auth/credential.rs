//! Credential hashing for account login.
//!
//! Argon2id with the library's default (OWASP-recommended) parameters:
//! deliberately slow, salted, and producing a self-describing PHC string
//! that [`verify_password`] can check without any external parameters.
//! The work happens on a blocking thread so the deliberately high cost
//! never stalls the async workers.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use thiserror::Error;
use zeroize::Zeroizing;

/// Errors from the credential hasher.
///
/// A wrong password is NOT an error: [`verify_password`] reports it as
/// `Ok(false)`.
#[derive(Error, Debug)]
pub enum HashError {
    /// The stored hash string is structurally invalid (corrupted user
    /// record), so no verification could be attempted.
    #[error("Stored credential hash is malformed: {0}")]
    MalformedHash(argon2::password_hash::Error),

    /// The hashing backend itself failed. Fatal; propagated to the caller.
    #[error("Credential hashing failed: {0}")]
    Backend(argon2::password_hash::Error),

    /// The blocking hash task was cancelled before completion.
    #[error("Credential hashing task was cancelled")]
    Cancelled,
}

/// Hash a password for storage in the user record.
///
/// Each call generates a fresh salt, so hashing the same password twice
/// yields different strings.
pub async fn hash_password(password: &str) -> Result<String, HashError> {
    let password = Zeroizing::new(password.to_owned());
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(HashError::Backend)
    })
    .await
    .map_err(|_| HashError::Cancelled)?
}

/// Verify a password against a stored hash.
///
/// Returns `Ok(false)` for any mismatch. Errors only when the stored
/// hash cannot be parsed or the backend fails, never for a wrong
/// password.
pub async fn verify_password(password: &str, stored: &str) -> Result<bool, HashError> {
    let password = Zeroizing::new(password.to_owned());
    let stored = stored.to_owned();
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored).map_err(HashError::MalformedHash)?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(HashError::Backend(e)),
        }
    })
    .await
    .map_err(|_| HashError::Cancelled)?
}
