//! Envelope encryption for vault records.
//!
//! Each call to [`encrypt`] produces a self-contained envelope: a fresh
//! random salt and IV, AES-256-CBC ciphertext under a key derived from the
//! master password, all bundled into one JSON object and wrapped in base64
//! so it can be stored as a plain string. [`decrypt`] reverses the
//! process using the salt embedded in the envelope.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::kdf::{derive_key, generate_iv, generate_salt, IV_LEN};
use super::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// The three components produced by one encryption call.
///
/// Serialized as JSON and then base64-wrapped into the opaque envelope
/// string that callers store. `salt` and `iv` are hex, `encrypted` is
/// base64 ciphertext.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub salt: String,
    pub iv: String,
    pub encrypted: String,
}

/// Encrypt a plaintext string under the master password.
///
/// Generates a fresh salt and IV per call, so encrypting identical
/// plaintext twice never yields identical envelopes.
pub fn encrypt(plaintext: &str, master: &SecretString) -> Result<String, CryptoError> {
    let salt = generate_salt()?;
    let iv = generate_iv()?;
    let key = derive_key(master.expose_secret(), &salt);

    let ciphertext = Aes256CbcEnc::new((&*key).into(), (&iv).into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let envelope = Envelope {
        salt: hex::encode(salt),
        iv: hex::encode(iv),
        encrypted: BASE64.encode(ciphertext),
    };

    let json = serde_json::to_string(&envelope)
        .map_err(|e| CryptoError::InvalidEnvelope(e.to_string()))?;
    Ok(BASE64.encode(json))
}

/// Decrypt an envelope string produced by [`encrypt`].
///
/// # Errors
///
/// - [`CryptoError::InvalidEnvelope`]: the envelope text itself could not
///   be decoded (corrupted storage).
/// - [`CryptoError::DecryptionFailed`]: wrong password, or corruption
///   that survived the envelope decode. These cannot be told apart;
///   callers should have ruled out corruption via the integrity checksum
///   before calling.
pub fn decrypt(sealed: &str, master: &SecretString) -> Result<String, CryptoError> {
    let envelope = decode_envelope(sealed)?;

    let salt = hex::decode(&envelope.salt)
        .map_err(|e| CryptoError::InvalidEnvelope(format!("bad salt hex: {e}")))?;
    let iv_bytes = hex::decode(&envelope.iv)
        .map_err(|e| CryptoError::InvalidEnvelope(format!("bad iv hex: {e}")))?;
    let iv: [u8; IV_LEN] = iv_bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidEnvelope(format!("iv is {} bytes", iv_bytes.len())))?;
    let ciphertext = BASE64
        .decode(&envelope.encrypted)
        .map_err(|e| CryptoError::InvalidEnvelope(format!("bad ciphertext base64: {e}")))?;

    let key = derive_key(master.expose_secret(), &salt);

    // A wrong key almost always fails PKCS#7 unpadding. When it does not,
    // the UTF-8 and non-empty checks below catch the garbage output.
    let plaintext_bytes = Aes256CbcDec::new((&*key).into(), (&iv).into())
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    let plaintext = String::from_utf8(plaintext_bytes).map_err(|_| CryptoError::DecryptionFailed)?;
    if plaintext.is_empty() {
        return Err(CryptoError::DecryptionFailed);
    }
    Ok(plaintext)
}

fn decode_envelope(sealed: &str) -> Result<Envelope, CryptoError> {
    let json = BASE64
        .decode(sealed)
        .map_err(|e| CryptoError::InvalidEnvelope(format!("bad envelope base64: {e}")))?;
    serde_json::from_slice(&json).map_err(|e| CryptoError::InvalidEnvelope(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn master(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn round_trip() {
        let pw = master("Secret123!");
        let sealed = encrypt("the quick brown fox", &pw).unwrap();
        let plain = decrypt(&sealed, &pw).unwrap();
        assert_eq!(plain, "the quick brown fox");
    }

    #[test]
    fn wrong_password_fails_closed() {
        let sealed = encrypt("payload", &master("password one")).unwrap();
        let err = decrypt(&sealed, &master("password two")).unwrap_err();
        assert!(matches!(err, CryptoError::DecryptionFailed));
    }

    #[test]
    fn envelopes_are_never_identical() {
        let pw = master("Secret123!");
        let a = encrypt("same plaintext", &pw).unwrap();
        let b = encrypt("same plaintext", &pw).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn envelope_carries_fresh_salt_and_iv() {
        let pw = master("Secret123!");
        let a = decode_envelope(&encrypt("x", &pw).unwrap()).unwrap();
        let b = decode_envelope(&encrypt("x", &pw).unwrap()).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        // 256-bit salt and 128-bit iv, hex encoded
        assert_eq!(a.salt.len(), 64);
        assert_eq!(a.iv.len(), 32);
    }

    #[test]
    fn garbage_envelope_is_rejected_as_invalid() {
        let err = decrypt("not base64 at all!!!", &master("pw")).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidEnvelope(_)));
    }

    #[test]
    fn empty_plaintext_round_trip_fails_decryption() {
        // Matches the store's contract: an empty decryption result is
        // indistinguishable from failure and is reported as such.
        let pw = master("Secret123!");
        let sealed = encrypt("", &pw).unwrap();
        let err = decrypt(&sealed, &pw).unwrap_err();
        assert!(matches!(err, CryptoError::DecryptionFailed));
    }

    #[test]
    fn unicode_round_trip() {
        let pw = master("pässwörd");
        let sealed = encrypt("héllo wörld 日本語", &pw).unwrap();
        assert_eq!(decrypt(&sealed, &pw).unwrap(), "héllo wörld 日本語");
    }
}
