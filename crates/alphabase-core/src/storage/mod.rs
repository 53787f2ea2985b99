//! Storage engine: the document store, its persistence and transactions.

mod background;
mod collections;
pub mod envelope;
mod nonblocking;
mod options;
pub mod persistence;
mod store;
pub mod traits;
mod transaction;
pub mod ttl;
pub mod types;

pub use collections::ID_FIELD;
pub use nonblocking::AsyncAlphaBase;
pub use options::StoreOptions;
pub use persistence::{backup_stamp, Persistence, DEFAULT_BACKUP_DIR};
pub use store::AlphaBase;
pub use traits::{MutationObserver, SchemaValidator, ValidationOutcome};
pub use transaction::BatchOp;
pub use ttl::{TtlEntry, TtlMeta, TtlScope};
pub use types::{
    Documents, EncryptionStatus, Exported, MutationEvent, MutationKind, Snapshot,
    StoreStatistics, WriteMode,
};
