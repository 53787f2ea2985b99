//! Collections: top-level keys holding documents by id.
//!
//! A collection value is an object mapping document id to document; every
//! document carries its id under `_id`. Arrays of `{ "_id": ... }` objects
//! written by older versions are read and updated in place.

use serde_json::{Map, Value};
use uuid::Uuid;

use super::envelope::json_type_name;
use super::store::{expiry_from, now_millis, AlphaBase, Events, Inner, State};
use super::ttl::element_id;
use super::types::{MutationEvent, MutationKind};
use crate::error::{AlphaError, Result};

/// Field holding a document's id.
pub const ID_FIELD: &str = "_id";

fn is_collection(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

fn collection<'a>(state: &'a State, name: &str) -> Result<&'a Value> {
    state
        .live
        .data
        .get(name)
        .filter(|value| is_collection(value))
        .ok_or_else(|| AlphaError::CollectionNotFound(name.to_string()))
}

fn collection_mut<'a>(state: &'a mut State, name: &str) -> Result<&'a mut Value> {
    state
        .live
        .data
        .get_mut(name)
        .filter(|value| is_collection(value))
        .ok_or_else(|| AlphaError::CollectionNotFound(name.to_string()))
}

fn find_document<'a>(collection: &'a Value, id: &str) -> Option<&'a Value> {
    match collection {
        Value::Object(docs) => docs.get(id),
        Value::Array(items) => items
            .iter()
            .find(|item| element_id(item).as_deref() == Some(id)),
        _ => None,
    }
}

fn find_document_mut<'a>(collection: &'a mut Value, id: &str) -> Option<&'a mut Value> {
    match collection {
        Value::Object(docs) => docs.get_mut(id),
        Value::Array(items) => items
            .iter_mut()
            .find(|item| element_id(item).as_deref() == Some(id)),
        _ => None,
    }
}

fn document_id(document: &Map<String, Value>) -> Result<Option<String>> {
    match document.get(ID_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) if !id.is_empty() => Ok(Some(id.clone())),
        Some(Value::Number(id)) => Ok(Some(id.to_string())),
        Some(other) => Err(AlphaError::InvalidInput(format!(
            "Document {} must be a non-empty string or number, got {}",
            ID_FIELD,
            json_type_name(other)
        ))),
    }
}

fn into_object(value: Value, what: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(object) => Ok(object),
        other => Err(AlphaError::InvalidInput(format!(
            "{} must be a JSON object, got {}",
            what,
            json_type_name(&other)
        ))),
    }
}

impl Inner {
    fn insert_document_locked(
        &self,
        state: &mut State,
        events: &mut Events,
        name: &str,
        mut document: Map<String, Value>,
        ttl_ms: Option<u64>,
    ) -> Result<String> {
        let id = match document_id(&document)? {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
        };

        let target = state
            .live
            .data
            .entry(name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match target {
            Value::Object(docs) => {
                docs.insert(id.clone(), Value::Object(document));
            }
            Value::Array(items) => {
                items.retain(|item| element_id(item).as_deref() != Some(id.as_str()));
                items.push(Value::Object(document));
            }
            other => {
                return Err(AlphaError::InvalidInput(format!(
                    "Key {} holds a {}, not a collection",
                    name,
                    json_type_name(other)
                )))
            }
        }

        match expiry_from(ttl_ms, now_millis()) {
            Some(at) => {
                state.live.ttl_meta.set_document(name, &id, at);
            }
            None => {
                state.live.ttl_meta.remove_document(name, &id);
            }
        }
        events.push(
            MutationEvent::new(MutationKind::DocumentInsert)
                .with_key(name)
                .with_doc_id(id.clone()),
        );
        Ok(id)
    }
}

impl AlphaBase {
    /// Create an empty collection. Returns `false` if it already exists.
    pub fn create_collection(&self, name: &str) -> Result<bool> {
        self.inner.run(|inner, state, events| {
            inner.sweep_then(state, events, |state, events| {
                let existing = state
                    .live
                    .data
                    .get(name)
                    .map(|value| (is_collection(value), json_type_name(value)));
                match existing {
                    Some((true, _)) => Ok(false),
                    Some((false, kind)) => Err(AlphaError::InvalidInput(format!(
                        "Key {} holds a {}, not a collection",
                        name, kind
                    ))),
                    None => {
                        state
                            .live
                            .data
                            .insert(name.to_string(), Value::Object(Map::new()));
                        events.push(MutationEvent::new(MutationKind::Set).with_key(name));
                        inner.persist(state)?;
                        Ok(true)
                    }
                }
            })
        })
    }

    /// Insert (or replace) a document, creating the collection if needed.
    ///
    /// An `_id` is generated when the document has none. A positive `ttl_ms`
    /// expires just this document.
    pub fn insert_document(&self, name: &str, document: Value, ttl_ms: Option<u64>) -> Result<String> {
        let document = into_object(document, "Document")?;
        self.inner.run(|inner, state, events| {
            inner.sweep_then(state, events, |state, events| {
                let id = inner.insert_document_locked(state, events, name, document, ttl_ms)?;
                inner.persist(state)?;
                Ok(id)
            })
        })
    }

    pub fn get_document(&self, name: &str, id: &str) -> Result<Option<Value>> {
        self.inner.run(|inner, state, events| {
            inner.expire_and_persist(state, events)?;
            let docs = collection(state, name)?;
            Ok(find_document(docs, id).cloned())
        })
    }

    /// Shallow-merge `patch` into a document. `_id` cannot be changed.
    pub fn update_document(&self, name: &str, id: &str, patch: Value) -> Result<Value> {
        let patch = into_object(patch, "Patch")?;
        self.inner.run(|inner, state, events| {
            inner.sweep_then(state, events, |state, events| {
                let docs = collection_mut(state, name)?;
                let document = find_document_mut(docs, id).ok_or_else(|| {
                    AlphaError::DocumentNotFound {
                        collection: name.to_string(),
                        id: id.to_string(),
                    }
                })?;
                let Value::Object(fields) = document else {
                    return Err(AlphaError::InvalidInput(format!(
                        "Document {} in {} is not an object",
                        id, name
                    )));
                };
                for (field, value) in patch {
                    if field != ID_FIELD {
                        fields.insert(field, value);
                    }
                }
                let updated = Value::Object(fields.clone());
                events.push(
                    MutationEvent::new(MutationKind::DocumentUpdate)
                        .with_key(name)
                        .with_doc_id(id),
                );
                inner.persist(state)?;
                Ok(updated)
            })
        })
    }

    pub fn delete_document(&self, name: &str, id: &str) -> Result<()> {
        self.inner.run(|inner, state, events| {
            inner.sweep_then(state, events, |state, events| {
                let docs = collection_mut(state, name)?;
                if !super::ttl::remove_from_collection(docs, id) {
                    return Err(AlphaError::DocumentNotFound {
                        collection: name.to_string(),
                        id: id.to_string(),
                    });
                }
                state.live.ttl_meta.remove_document(name, id);
                events.push(
                    MutationEvent::new(MutationKind::DocumentDelete)
                        .with_key(name)
                        .with_doc_id(id),
                );
                inner.persist(state)
            })
        })
    }

    /// Documents of a collection, in id order for object collections.
    pub fn list_documents(&self, name: &str) -> Result<Vec<Value>> {
        self.inner.run(|inner, state, events| {
            inner.expire_and_persist(state, events)?;
            match collection(state, name)? {
                Value::Object(docs) => Ok(docs.values().cloned().collect()),
                Value::Array(items) => Ok(items.clone()),
                _ => Err(AlphaError::CollectionNotFound(name.to_string())),
            }
        })
    }

    /// Milliseconds until a document expires; 0 when it has no TTL.
    pub fn get_document_ttl(&self, name: &str, id: &str) -> Result<u64> {
        self.inner.run(|inner, state, events| {
            inner.expire_and_persist(state, events)?;
            let now = now_millis();
            let remaining = state
                .live
                .ttl_meta
                .document_expiry(name, id)
                .map_or(0, |at| at.saturating_sub(now).max(0));
            Ok(u64::try_from(remaining).unwrap_or(0))
        })
    }
}
