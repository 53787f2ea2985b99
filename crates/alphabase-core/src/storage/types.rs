//! Core data types for the storage layer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ttl::TtlMeta;
use crate::crypto::CipherKind;

/// The document map: string keys to arbitrary JSON values, ordered by key.
pub type Documents = serde_json::Map<String, Value>;

/// Document map and TTL metadata, always moved and persisted together.
///
/// Serializes to the plain envelope form `{ "data": ..., "ttlMeta": ... }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub data: Documents,

    #[serde(rename = "ttlMeta", default)]
    pub ttl_meta: TtlMeta,
}

impl Snapshot {
    pub fn new(data: Documents, ttl_meta: TtlMeta) -> Self {
        Self { data, ttl_meta }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.ttl_meta.is_empty()
    }
}

/// When physical writes happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Every mutation is written before the call returns.
    #[default]
    Immediate,
    /// Mutations are applied in memory at once; the disk write is coalesced
    /// and happens once the given window has passed since the first unsaved
    /// change (or on `flush`/`close`). The background check runs four times
    /// per window, so the write lands within 1.25 windows.
    Deferred(Duration),
}

/// Summary returned by `statistics()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatistics {
    pub total_keys: usize,
    pub file_size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub approximate_memory_usage: usize,
    pub average_value_size_bytes: usize,
    pub largest_key_name: Option<String>,
    pub largest_value_size_bytes: usize,
}

/// Configured versus effective cipher.
///
/// A passphrase cipher configured without a passphrase is written as plain
/// JSON; `downgraded()` makes that visible instead of silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionStatus {
    pub configured: CipherKind,
    pub effective: CipherKind,
    pub passphrase_set: bool,
}

impl EncryptionStatus {
    pub fn downgraded(&self) -> bool {
        self.configured != self.effective
    }

    pub fn encrypted_at_rest(&self) -> bool {
        self.effective.requires_passphrase()
    }
}

/// Output of `export_envelope`.
#[derive(Debug, Clone, PartialEq)]
pub enum Exported {
    Object(Value),
    Text(String),
}

/// Kind of change reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Set,
    Delete,
    Clear,
    Import,
    Expire,
    DocumentInsert,
    DocumentUpdate,
    DocumentDelete,
    Commit,
    Rollback,
}

/// A change that has been applied to the live state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationEvent {
    pub kind: MutationKind,
    pub key: Option<String>,
    pub doc_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl MutationEvent {
    pub fn new(kind: MutationKind) -> Self {
        Self {
            kind,
            key: None,
            doc_id: None,
            at: Utc::now(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_uses_envelope_field_names() {
        let mut snapshot = Snapshot::default();
        snapshot.data.insert("a".to_string(), json!(1));
        snapshot.ttl_meta.set_key("a", 42);

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value, json!({"data": {"a": 1}, "ttlMeta": {"a": 42}}));
    }

    #[test]
    fn test_snapshot_without_ttl_meta_parses() {
        let snapshot: Snapshot = serde_json::from_value(json!({"data": {"a": 1}})).unwrap();
        assert_eq!(snapshot.data["a"], json!(1));
        assert!(snapshot.ttl_meta.is_empty());
    }

    #[test]
    fn test_statistics_serialize_camel_case() {
        let stats = StoreStatistics {
            total_keys: 2,
            file_size_bytes: 10,
            last_modified: None,
            approximate_memory_usage: 6,
            average_value_size_bytes: 1,
            largest_key_name: Some("bb".to_string()),
            largest_value_size_bytes: 2,
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["totalKeys"], json!(2));
        assert_eq!(value["largestKeyName"], json!("bb"));
    }

    #[test]
    fn test_mutation_event_builder() {
        let event = MutationEvent::new(MutationKind::DocumentDelete)
            .with_key("users")
            .with_doc_id("u1");
        assert_eq!(event.key.as_deref(), Some("users"));
        assert_eq!(event.doc_id.as_deref(), Some("u1"));
    }
}
