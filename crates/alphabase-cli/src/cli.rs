use std::path::PathBuf;

use alphabase_core::VERSION;
use clap::{Args, Parser, Subcommand};

/// AlphaBase - a single-file JSON key-value store with optional encryption
#[derive(Parser)]
#[command(name = "alphabase")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the store file
    #[arg(short, long, global = true, env = "ALPHABASE_PATH")]
    pub db: Option<PathBuf>,

    /// Cipher used when saving (none, base64, xor, aes, age)
    #[arg(long, global = true, env = "ALPHABASE_CIPHER")]
    pub cipher: Option<String>,

    /// JSON schema file applied to every `set`
    #[arg(long, global = true, value_name = "FILE")]
    pub schema: Option<PathBuf>,

    /// Never prompt for a passphrase
    #[arg(long, global = true)]
    pub no_input: bool,

    /// Emit machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store a value under a key
    Set(SetArgs),

    /// Print the value stored under a key
    Get {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Remove a key
    Delete {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Report whether a key is present
    Has {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// List keys (or keys with values)
    List {
        /// Include values
        #[arg(long)]
        values: bool,
    },

    /// Remaining lifetime of a key in milliseconds (0 = no TTL)
    Ttl {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Remove every key
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Replace the store contents with an exported file ("-" for stdin)
    Import {
        #[arg(value_name = "FILE")]
        file: String,
    },

    /// Export the store contents
    Export(ExportArgs),

    /// Show store statistics
    Stats,

    /// Write a timestamped backup next to the store
    Backup,

    /// Apply a JSON array of set/delete operations ("-" for stdin)
    Batch(BatchArgs),

    /// Show store path and encryption status
    Status,

    /// Work with document collections
    #[command(subcommand)]
    Doc(DocCommands),
}

#[derive(Args)]
pub struct SetArgs {
    #[arg(value_name = "KEY")]
    pub key: String,

    /// Value as JSON (plain text is stored as a string)
    #[arg(value_name = "VALUE")]
    pub value: String,

    /// Expire after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub ttl: Option<u64>,

    /// Store VALUE verbatim as a string, never parsing it as JSON
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Export the exact on-disk encoding (encrypted when a cipher is active)
    #[arg(long)]
    pub text: bool,

    /// Write to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct BatchArgs {
    #[arg(value_name = "FILE")]
    pub file: String,

    /// All-or-nothing: roll back every operation if one fails
    #[arg(long)]
    pub atomic: bool,
}

#[derive(Subcommand)]
pub enum DocCommands {
    /// Insert a JSON object and print its id
    Insert {
        #[arg(value_name = "COLLECTION")]
        collection: String,

        #[arg(value_name = "JSON")]
        document: String,

        /// Expire the document after this many milliseconds
        #[arg(long, value_name = "MS")]
        ttl: Option<u64>,
    },

    /// Print one document
    Get {
        #[arg(value_name = "COLLECTION")]
        collection: String,

        #[arg(value_name = "ID")]
        id: String,
    },

    /// Merge fields into a document
    Update {
        #[arg(value_name = "COLLECTION")]
        collection: String,

        #[arg(value_name = "ID")]
        id: String,

        #[arg(value_name = "JSON")]
        patch: String,
    },

    /// Remove a document
    Delete {
        #[arg(value_name = "COLLECTION")]
        collection: String,

        #[arg(value_name = "ID")]
        id: String,
    },

    /// Print every live document in a collection
    List {
        #[arg(value_name = "COLLECTION")]
        collection: String,
    },
}
