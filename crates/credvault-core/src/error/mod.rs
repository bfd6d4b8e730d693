//! Error types for the credvault core crate.
//!
//! Each concern defines its own error enum next to its implementation;
//! this module re-exports them all in one place.

pub use crate::auth::credential::HashError;
pub use crate::crypto::CryptoError;
pub use crate::session::store::SessionError;
pub use crate::storage::StoreError;
