//! # AlphaBase Core
//!
//! Core library for AlphaBase - a single-file JSON key-value store with
//! optional encryption at rest.
//!
//! This crate holds the storage engine independent of the CLI.
//!
//! ## Architecture
//!
//! - **storage**: document store, TTL sweep, envelope codec, persistence,
//!   transactions and the async facade
//! - **crypto**: cipher strategies and passphrase key derivation
//! - **schema**: built-in JSON-Schema-style validator
//!
//! ## Durability
//!
//! A file that cannot be decrypted opens as an empty store. Opening with the
//! wrong passphrase and then writing will replace the encrypted contents.

pub mod crypto;
pub mod error;
pub mod fs;
pub mod schema;
pub mod storage;

pub use crypto::CipherKind;
pub use error::{AlphaError, ErrorKind, Result};
pub use schema::JsonSchema;
pub use storage::{
    AlphaBase, AsyncAlphaBase, BatchOp, EncryptionStatus, Exported, MutationEvent,
    MutationKind, StoreOptions, StoreStatistics, WriteMode,
};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
