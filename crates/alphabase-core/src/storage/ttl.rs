//! TTL metadata and the expiry sweep.
//!
//! On disk, TTL metadata is a JSON object whose values are either an expiry
//! instant (`key -> ms`) or, for collections, a nested object
//! (`collection -> { doc_id -> ms }`). In memory both shapes are exposed as
//! [`TtlEntry`] values tagged with a [`TtlScope`].

use std::collections::BTreeMap;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::types::Documents;

/// What a TTL entry expires.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum TtlScope {
    /// A whole top-level key.
    Key(String),
    /// One document inside a collection value.
    CollectionDoc { collection: String, doc_id: String },
}

impl TtlScope {
    /// The top-level key this scope lives under.
    pub fn key(&self) -> &str {
        match self {
            TtlScope::Key(key) => key,
            TtlScope::CollectionDoc { collection, .. } => collection,
        }
    }
}

/// A single expiry record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlEntry {
    pub scope: TtlScope,
    /// Absolute expiry, milliseconds since the Unix epoch.
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
enum TtlRecord {
    Key(i64),
    Documents(BTreeMap<String, i64>),
}

/// TTL metadata for a store. Keys without an entry never expire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TtlMeta {
    records: BTreeMap<String, TtlRecord>,
}

impl TtlMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of individual expiry records, counting each document.
    pub fn len(&self) -> usize {
        self.records
            .values()
            .map(|record| match record {
                TtlRecord::Key(_) => 1,
                TtlRecord::Documents(docs) => docs.len(),
            })
            .sum()
    }

    /// Expire the whole `key` at `expires_at`, replacing any document TTLs under it.
    pub fn set_key(&mut self, key: &str, expires_at: i64) {
        self.records.insert(key.to_string(), TtlRecord::Key(expires_at));
    }

    /// Expire one document of `collection`.
    ///
    /// A collection that already expires as a whole keeps that TTL: both
    /// cannot be stored under one key, so the document TTL is not recorded
    /// and `false` is returned.
    pub fn set_document(&mut self, collection: &str, doc_id: &str, expires_at: i64) -> bool {
        let record = self
            .records
            .entry(collection.to_string())
            .or_insert_with(|| TtlRecord::Documents(BTreeMap::new()));
        match record {
            TtlRecord::Documents(docs) => {
                docs.insert(doc_id.to_string(), expires_at);
                true
            }
            TtlRecord::Key(collection_expiry) => {
                warn!(
                    collection,
                    doc_id,
                    collection_expiry = *collection_expiry,
                    "collection already has a TTL; document TTL ignored"
                );
                false
            }
        }
    }

    /// Drop every TTL recorded under `key`, whatever its scope.
    pub fn remove_key(&mut self, key: &str) -> bool {
        self.records.remove(key).is_some()
    }

    pub fn remove_document(&mut self, collection: &str, doc_id: &str) -> bool {
        let Some(TtlRecord::Documents(docs)) = self.records.get_mut(collection) else {
            return false;
        };
        let removed = docs.remove(doc_id).is_some();
        if docs.is_empty() {
            self.records.remove(collection);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Whole-key expiry for `key`, if one is set.
    pub fn key_expiry(&self, key: &str) -> Option<i64> {
        match self.records.get(key) {
            Some(TtlRecord::Key(at)) => Some(*at),
            _ => None,
        }
    }

    pub fn document_expiry(&self, collection: &str, doc_id: &str) -> Option<i64> {
        match self.records.get(collection) {
            Some(TtlRecord::Documents(docs)) => docs.get(doc_id).copied(),
            _ => None,
        }
    }

    /// All records, flattened into scoped entries.
    pub fn entries(&self) -> Vec<TtlEntry> {
        let mut out = Vec::with_capacity(self.len());
        for (key, record) in &self.records {
            match record {
                TtlRecord::Key(at) => out.push(TtlEntry {
                    scope: TtlScope::Key(key.clone()),
                    expires_at: *at,
                }),
                TtlRecord::Documents(docs) => {
                    out.extend(docs.iter().map(|(doc_id, at)| TtlEntry {
                        scope: TtlScope::CollectionDoc {
                            collection: key.clone(),
                            doc_id: doc_id.clone(),
                        },
                        expires_at: *at,
                    }))
                }
            }
        }
        out
    }

    fn remove_scope(&mut self, scope: &TtlScope) {
        match scope {
            TtlScope::Key(key) => {
                self.records.remove(key);
            }
            TtlScope::CollectionDoc { collection, doc_id } => {
                self.remove_document(collection, doc_id);
            }
        }
    }

    /// Build TTL metadata from its on-disk JSON form.
    ///
    /// Unusable records are skipped with a warning rather than failing the load.
    pub fn from_value(value: &Value) -> Self {
        let mut meta = TtlMeta::new();
        let Some(object) = value.as_object() else {
            if !value.is_null() {
                warn!("ignoring TTL metadata that is not an object");
            }
            return meta;
        };
        for (key, raw) in object {
            match raw {
                Value::Object(docs) => {
                    let parsed: BTreeMap<String, i64> = docs
                        .iter()
                        .filter_map(|(doc_id, at)| millis(at).map(|at| (doc_id.clone(), at)))
                        .collect();
                    if !parsed.is_empty() {
                        meta.records.insert(key.clone(), TtlRecord::Documents(parsed));
                    }
                }
                other => match millis(other) {
                    Some(at) => {
                        meta.records.insert(key.clone(), TtlRecord::Key(at));
                    }
                    None => warn!(key = %key, "ignoring malformed TTL record"),
                },
            }
        }
        meta
    }
}

fn millis(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

impl Serialize for TtlMeta {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for (key, record) in &self.records {
            match record {
                TtlRecord::Key(at) => map.serialize_entry(key, at)?,
                TtlRecord::Documents(docs) => map.serialize_entry(key, docs)?,
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TtlMeta {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(TtlMeta::from_value(&value))
    }
}

/// Evict everything whose expiry is strictly before `now`.
///
/// Whole-key entries remove the key from both maps. Document entries remove
/// only that document from its collection (object keyed by id, or legacy array
/// of `{ "_id": ... }` objects). TTL records pointing at data that no longer
/// exists are dropped as well. Returns the scopes whose data was evicted.
pub fn sweep(data: &mut Documents, ttl: &mut TtlMeta, now: i64) -> SweepOutcome {
    let mut outcome = SweepOutcome::default();

    for entry in ttl.entries() {
        let present = match &entry.scope {
            TtlScope::Key(key) => data.contains_key(key),
            TtlScope::CollectionDoc { collection, doc_id } => data
                .get(collection)
                .is_some_and(|value| collection_contains(value, doc_id)),
        };

        if !present {
            ttl.remove_scope(&entry.scope);
            outcome.orphans_dropped += 1;
            continue;
        }

        if entry.expires_at >= now {
            continue;
        }

        match &entry.scope {
            TtlScope::Key(key) => {
                data.remove(key);
            }
            TtlScope::CollectionDoc { collection, doc_id } => {
                if let Some(value) = data.get_mut(collection) {
                    remove_from_collection(value, doc_id);
                }
            }
        }
        ttl.remove_scope(&entry.scope);
        outcome.evicted.push(entry.scope);
    }

    outcome
}

/// Result of one sweep.
#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub evicted: Vec<TtlScope>,
    pub orphans_dropped: usize,
}

impl SweepOutcome {
    /// Whether the sweep changed anything that needs persisting.
    pub fn changed(&self) -> bool {
        !self.evicted.is_empty() || self.orphans_dropped > 0
    }
}

/// Document id of an array element, accepting string or numeric `_id`/`id`.
pub(crate) fn element_id(element: &Value) -> Option<String> {
    let raw = element.get("_id").or_else(|| element.get("id"))?;
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn collection_contains(value: &Value, doc_id: &str) -> bool {
    match value {
        Value::Object(docs) => docs.contains_key(doc_id),
        Value::Array(items) => items
            .iter()
            .any(|item| element_id(item).as_deref() == Some(doc_id)),
        _ => false,
    }
}

pub(crate) fn remove_from_collection(value: &mut Value, doc_id: &str) -> bool {
    match value {
        Value::Object(docs) => docs.remove(doc_id).is_some(),
        Value::Array(items) => {
            let before = items.len();
            items.retain(|item| element_id(item).as_deref() != Some(doc_id));
            items.len() != before
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn documents(value: Value) -> Documents {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_on_disk_shape_round_trips() {
        let raw = json!({"session": 1700000000000i64, "users": {"u1": 1700000000500i64}});
        let meta: TtlMeta = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(meta.key_expiry("session"), Some(1_700_000_000_000));
        assert_eq!(meta.document_expiry("users", "u1"), Some(1_700_000_000_500));
        assert_eq!(serde_json::to_value(&meta).unwrap(), raw);
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let meta = TtlMeta::from_value(&json!({"a": "soon", "b": 5.0, "c": {"d": null}}));
        assert_eq!(meta.key_expiry("a"), None);
        assert_eq!(meta.key_expiry("b"), Some(5));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn test_sweep_uses_strict_comparison() {
        let mut data = documents(json!({"a": 1, "b": 2}));
        let mut ttl = TtlMeta::new();
        ttl.set_key("a", 100);
        ttl.set_key("b", 99);

        let outcome = sweep(&mut data, &mut ttl, 100);

        assert_eq!(outcome.evicted, vec![TtlScope::Key("b".to_string())]);
        assert!(data.contains_key("a"));
        assert!(!data.contains_key("b"));
        assert_eq!(ttl.key_expiry("a"), Some(100));
    }

    #[test]
    fn test_sweep_removes_only_expired_documents() {
        let mut data = documents(json!({
            "users": {"u1": {"_id": "u1"}, "u2": {"_id": "u2"}},
            "legacy": [{"_id": "x"}, {"_id": 7}]
        }));
        let mut ttl = TtlMeta::new();
        ttl.set_document("users", "u1", 10);
        ttl.set_document("users", "u2", 1_000);
        ttl.set_document("legacy", "7", 10);

        let outcome = sweep(&mut data, &mut ttl, 50);

        assert_eq!(outcome.evicted.len(), 2);
        assert_eq!(data["users"], json!({"u2": {"_id": "u2"}}));
        assert_eq!(data["legacy"], json!([{"_id": "x"}]));
        assert_eq!(ttl.document_expiry("users", "u2"), Some(1_000));
        assert_eq!(ttl.len(), 1);
    }

    #[test]
    fn test_sweep_drops_orphaned_ttl() {
        let mut data = documents(json!({"kept": true}));
        let mut ttl = TtlMeta::new();
        ttl.set_key("gone", i64::MAX);
        ttl.set_document("kept", "missing", i64::MAX);

        let outcome = sweep(&mut data, &mut ttl, 0);

        assert!(outcome.evicted.is_empty());
        assert_eq!(outcome.orphans_dropped, 2);
        assert!(outcome.changed());
        assert!(ttl.is_empty());
    }

    #[test]
    fn test_set_key_replaces_document_ttls() {
        let mut ttl = TtlMeta::new();
        ttl.set_document("users", "u1", 10);
        ttl.set_key("users", 20);
        assert_eq!(ttl.document_expiry("users", "u1"), None);
        assert_eq!(ttl.key_expiry("users"), Some(20));

        assert!(!ttl.set_document("users", "u2", 30));
        assert_eq!(ttl.key_expiry("users"), Some(20));
        assert_eq!(ttl.document_expiry("users", "u2"), None);
        assert_eq!(ttl.entries().len(), 1);
    }
}
