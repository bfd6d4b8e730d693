//! Cryptographic primitives for credvault: key derivation and the
//! envelope cipher used for all persisted records.

pub mod cipher;
pub mod kdf;

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
///
/// Decryption failure is deliberately ambiguous: a wrong password and a
/// corrupted ciphertext that still pads correctly produce the same wrong
/// key, so the two causes cannot be told apart here. Callers rule out
/// accidental corruption with the integrity checksum before decrypting.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The envelope string could not be decoded (bad base64 or JSON, or
    /// salt/iv fields of the wrong size). Indicates corrupted storage,
    /// not a wrong password.
    #[error("Invalid envelope encoding: {0}")]
    InvalidEnvelope(String),

    /// Decryption produced invalid padding or unusable plaintext.
    ///
    /// Either the password is wrong or the ciphertext was corrupted past
    /// the integrity pre-check. The two are cryptographically
    /// indistinguishable in CBC mode.
    #[error("Decryption failed - wrong password or corrupted data")]
    DecryptionFailed,

    /// The system random number generator failed.
    #[error("Random generation failed")]
    Rng,
}

pub use cipher::{decrypt, encrypt, Envelope};
pub use kdf::{derive_key, generate_iv, generate_salt, generate_session_key};
