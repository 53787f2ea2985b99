//! Error types for AlphaBase core operations.
//!
//! Validation and state-machine errors are reported synchronously and leave
//! the store untouched. `Storage` errors raised while persisting arrive after
//! the in-memory mutation has already happened: the data is correct in memory
//! but not yet durable, and the caller may retry with [`crate::AlphaBase::flush`].

use thiserror::Error;

/// Result type alias for AlphaBase operations.
pub type Result<T> = std::result::Result<T, AlphaError>;

/// Core error type for AlphaBase operations.
#[derive(Debug, Error)]
pub enum AlphaError {
    /// A key supplied through untyped input was not a string
    #[error("Invalid key type: expected a string, got {0}")]
    InvalidKeyType(String),

    /// The configured schema rejected a value
    #[error("Schema violation: {}", .errors.join("; "))]
    SchemaViolation { errors: Vec<String> },

    /// Imported data had an unusable shape
    #[error("Import format error: {0}")]
    ImportFormat(String),

    /// A batch entry named an operation other than set/delete
    #[error("Unknown batch operation: {0}")]
    UnknownBatchOp(String),

    /// `begin_transaction` called while a transaction is open
    #[error("A transaction is already open")]
    TransactionAlreadyOpen,

    /// `commit`/`rollback` called with no open transaction
    #[error("No transaction is open")]
    NoTransactionOpen,

    /// Collection does not exist (or the key does not hold a collection)
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Document id not present in the collection
    #[error("Document not found: {collection}/{id}")]
    DocumentNotFound { collection: String, id: String },

    /// Disk read/write failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Encryption or decryption error
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

/// Stable classification of [`AlphaError`], used by outer layers to pick
/// exit codes or status codes without matching on payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidKeyType,
    SchemaViolation,
    ImportFormat,
    UnknownBatchOp,
    TransactionAlreadyOpen,
    NoTransactionOpen,
    CollectionNotFound,
    DocumentNotFound,
    Storage,
    Crypto,
    InvalidInput,
    Json,
}

impl AlphaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AlphaError::InvalidKeyType(_) => ErrorKind::InvalidKeyType,
            AlphaError::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            AlphaError::ImportFormat(_) => ErrorKind::ImportFormat,
            AlphaError::UnknownBatchOp(_) => ErrorKind::UnknownBatchOp,
            AlphaError::TransactionAlreadyOpen => ErrorKind::TransactionAlreadyOpen,
            AlphaError::NoTransactionOpen => ErrorKind::NoTransactionOpen,
            AlphaError::CollectionNotFound(_) => ErrorKind::CollectionNotFound,
            AlphaError::DocumentNotFound { .. } => ErrorKind::DocumentNotFound,
            AlphaError::Storage(_) => ErrorKind::Storage,
            AlphaError::Crypto(_) => ErrorKind::Crypto,
            AlphaError::InvalidInput(_) => ErrorKind::InvalidInput,
            AlphaError::Json { .. } => ErrorKind::Json,
        }
    }
}

impl From<std::io::Error> for AlphaError {
    fn from(err: std::io::Error) -> Self {
        AlphaError::Storage(err.to_string())
    }
}
