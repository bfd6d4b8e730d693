//! Authentication-side concerns: the one-way credential hash used for
//! login and the password-strength validator used at registration.
//!
//! Neither of these touches the cipher engine. The credential hash proves
//! the user knows the master password; the cipher key is derived from the
//! password separately, per record.

pub mod credential;
pub mod strength;

pub use credential::{hash_password, verify_password, HashError};
pub use strength::{score_password, StrengthReport};
