//! PBKDF2 key derivation from the master password.
//!
//! Every encryption call derives its key from the master password and a
//! fresh random salt, so no two records ever share a key. Derivation is
//! deterministic for a fixed (password, salt) pair, which is what lets
//! `decrypt` recover the key from the salt embedded in the envelope.

use std::num::NonZeroU32;

use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use super::CryptoError;

/// PBKDF2-HMAC-SHA256 iteration count.
pub const KDF_ITERATIONS: NonZeroU32 = NonZeroU32::new(10_000).unwrap();

/// Salt length in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Initialization vector length in bytes (128 bits, one AES block).
pub const IV_LEN: usize = 16;

/// Derive a 256-bit encryption key from a password and salt.
///
/// The returned key is wrapped in [`Zeroizing`] so the key material is
/// wiped from memory on drop.
pub fn derive_key(password: &str, salt: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        KDF_ITERATIONS,
        salt,
        password.as_bytes(),
        key.as_mut(),
    );
    key
}

/// Generate a fresh random salt for one encryption call.
///
/// Reusing a salt across distinct records would make their keys equal,
/// so callers must generate a new one per envelope.
pub fn generate_salt() -> Result<[u8; SALT_LEN], CryptoError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt).map_err(|_| CryptoError::Rng)?;
    Ok(salt)
}

/// Generate a fresh random initialization vector.
pub fn generate_iv() -> Result<[u8; IV_LEN], CryptoError> {
    let rng = SystemRandom::new();
    let mut iv = [0u8; IV_LEN];
    rng.fill(&mut iv).map_err(|_| CryptoError::Rng)?;
    Ok(iv)
}

/// Generate a random 256-bit session token, hex encoded.
///
/// Used by callers that need an ephemeral per-session identifier that is
/// unrelated to the master password.
pub fn generate_session_key() -> Result<String, CryptoError> {
    let rng = SystemRandom::new();
    let mut token = [0u8; 32];
    rng.fill(&mut token).map_err(|_| CryptoError::Rng)?;
    Ok(hex::encode(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn derive_key_is_deterministic() {
        let salt = hex!("000102030405060708090a0b0c0d0e0f");
        let key1 = derive_key("correct horse", &salt);
        let key2 = derive_key("correct horse", &salt);
        assert_eq!(*key1, *key2);
    }

    #[test]
    fn derive_key_differs_across_passwords() {
        let salt = [7u8; SALT_LEN];
        let key1 = derive_key("password one", &salt);
        let key2 = derive_key("password two", &salt);
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn derive_key_differs_across_salts() {
        let key1 = derive_key("same password", &[1u8; SALT_LEN]);
        let key2 = derive_key("same password", &[2u8; SALT_LEN]);
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn generated_salts_are_unique() {
        let salt1 = generate_salt().unwrap();
        let salt2 = generate_salt().unwrap();
        assert_ne!(salt1, salt2);
    }

    #[test]
    fn session_key_is_hex_of_256_bits() {
        let token = generate_session_key().unwrap();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
