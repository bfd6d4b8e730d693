//! The persisted record format and its integrity checksum.
//!
//! Every vault entry is stored as JSON `{ data, timestamp, checksum }`
//! under a `secure_`-prefixed key. The checksum is a cheap rolling hash
//! of the envelope string: it detects accidental storage corruption and
//! lets reads bail out before an expensive, ambiguous decrypt attempt.
//! It is NOT tamper-proof - anyone who can rewrite the record can
//! recompute it.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Namespace prefix for all keys this crate writes to the backend.
pub const STORAGE_PREFIX: &str = "secure_";

/// One persisted vault entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredRecord {
    /// The opaque envelope string produced by the cipher engine.
    pub data: String,
    /// Write time, epoch milliseconds.
    pub timestamp: u64,
    /// Rolling checksum of `data`, hex.
    pub checksum: String,
}

impl StoredRecord {
    /// Wrap an envelope string into a record, stamping time and checksum.
    pub fn seal(envelope: String) -> Self {
        let checksum = rolling_checksum(&envelope);
        Self {
            data: envelope,
            timestamp: epoch_millis(),
            checksum,
        }
    }

    /// Recompute the checksum over `data` and compare with the stored one.
    ///
    /// A mismatch means the record is corrupt and must never reach the
    /// cipher engine.
    pub fn verify_integrity(&self) -> bool {
        rolling_checksum(&self.data) == self.checksum
    }
}

/// Map a logical key to its namespaced backend key.
pub fn storage_key(logical: &str) -> String {
    format!("{STORAGE_PREFIX}{logical}")
}

/// Rolling 32-bit hash of a string, rendered as (signed) hex.
///
/// The classic `h = h * 31 + c` shift-and-subtract form, computed with
/// wrapping arithmetic over the string's bytes. Envelope strings are
/// base64ed JSON, so bytes and characters coincide.
pub fn rolling_checksum(data: &str) -> String {
    let mut hash: i32 = 0;
    for &byte in data.as_bytes() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(byte));
    }
    if hash < 0 {
        format!("-{:x}", i64::from(hash).unsigned_abs())
    } else {
        format!("{hash:x}")
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
