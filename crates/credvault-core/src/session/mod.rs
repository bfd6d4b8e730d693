//! Session-level abstractions: the secure session store and the
//! persisted record format it reads and writes.

pub mod record;
pub mod store;

pub use record::{rolling_checksum, storage_key, StoredRecord, STORAGE_PREFIX};
pub use store::{
    SecureSession, SessionConfig, SessionError, SessionExpired, SessionState,
};
