//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error (anything not classified below)
/// - 2: Misuse of shell command (clap argument errors)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// General failure.
    pub const GENERAL: i32 = 1;

    /// Key, collection or document not found.
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input, import data or batch operation.
    pub const INVALID_INPUT: i32 = 4;

    /// Value rejected by the configured schema.
    pub const SCHEMA_VIOLATION: i32 = 5;

    /// Transaction state error.
    pub const TRANSACTION: i32 = 6;

    /// Disk or encryption failure.
    pub const STORAGE: i32 = 7;
}

/// Environment variable names.
pub mod env {
    pub const CONFIG: &str = "ALPHABASE_CONFIG";
    pub const PASSPHRASE: &str = "ALPHABASE_PASSPHRASE";
    pub const LOG: &str = "ALPHABASE_LOG";
}

/// Store file used when neither `--db` nor the config names one.
pub const DEFAULT_STORE_FILE: &str = "alphabase.json";
