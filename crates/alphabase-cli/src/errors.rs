//! CLI-level errors and exit code classification.

use alphabase_core::{AlphaError, ErrorKind};

use crate::constants::exit_codes;

/// Failures that originate in the CLI rather than the store.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("No passphrase provided and no TTY available. Set ALPHABASE_PASSPHRASE.")]
    MissingPassphrase,

    #[error("{0}")]
    InvalidArgument(String),
}

/// Exit code for a store error kind.
pub fn exit_code_for_kind(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::CollectionNotFound | ErrorKind::DocumentNotFound => exit_codes::NOT_FOUND,
        ErrorKind::InvalidKeyType
        | ErrorKind::ImportFormat
        | ErrorKind::UnknownBatchOp
        | ErrorKind::InvalidInput
        | ErrorKind::Json => exit_codes::INVALID_INPUT,
        ErrorKind::SchemaViolation => exit_codes::SCHEMA_VIOLATION,
        ErrorKind::TransactionAlreadyOpen | ErrorKind::NoTransactionOpen => {
            exit_codes::TRANSACTION
        }
        ErrorKind::Storage | ErrorKind::Crypto => exit_codes::STORAGE,
    }
}

/// Exit code for any error returned by a command handler.
///
/// The whole `anyhow` chain is searched, so context added on the way up
/// does not hide the classified cause.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(alpha) = cause.downcast_ref::<AlphaError>() {
            return exit_code_for_kind(alpha.kind());
        }
        if let Some(cli) = cause.downcast_ref::<CliError>() {
            return match cli {
                CliError::KeyNotFound(_) => exit_codes::NOT_FOUND,
                CliError::MissingPassphrase | CliError::InvalidArgument(_) => {
                    exit_codes::INVALID_INPUT
                }
            };
        }
    }
    exit_codes::GENERAL
}
