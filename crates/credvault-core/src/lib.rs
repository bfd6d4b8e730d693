//! Secure session and encrypted persistence core for a credential vault.
//!
//! The crate is organized around one central type, [`SecureSession`],
//! which holds the master secret for the lifetime of a session and
//! mediates every encrypted read and write against a pluggable
//! [`KeyValueStore`] backend. Around it:
//!
//! - [`crypto`]: PBKDF2 key derivation and the AES-256-CBC envelope
//!   cipher. Every stored value is an opaque, self-contained envelope.
//! - [`auth`]: the Argon2id credential hash used for login and the
//!   password-strength validator used at registration. Independent of
//!   the cipher engine.
//! - [`session`]: the session store itself plus the checksummed record
//!   format it persists.
//! - [`storage`]: the backend contract and an in-memory reference
//!   implementation.
//!
//! Writes are debounced and coalesced; reads verify an integrity
//! checksum before decrypting; sessions expire after a configurable
//! quiet period and notify subscribers.

#![forbid(unsafe_code)]

pub mod auth;
pub mod crypto;
pub mod error;
pub mod session;
pub mod storage;

pub use session::{SecureSession, SessionConfig, SessionState};
pub use storage::{KeyValueStore, MemoryStore};
