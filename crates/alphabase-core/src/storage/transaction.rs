//! Transactions and batch updates.
//!
//! A transaction is a deep copy of the live state taken by
//! `begin_transaction`. Changes made while it is open live in memory only;
//! `commit` writes them and `rollback` restores the copy and writes that.

use serde_json::Value;
use tracing::{debug, warn};

use super::envelope::json_type_name;
use super::store::{AlphaBase, Events, Inner, State};
use super::types::{MutationEvent, MutationKind};
use crate::error::{AlphaError, Result};

/// One step of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    Set {
        key: String,
        value: Value,
        ttl_ms: Option<u64>,
    },
    Delete {
        key: String,
    },
}

impl BatchOp {
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        BatchOp::Set {
            key: key.into(),
            value,
            ttl_ms: None,
        }
    }

    pub fn set_with_ttl(key: impl Into<String>, value: Value, ttl_ms: u64) -> Self {
        BatchOp::Set {
            key: key.into(),
            value,
            ttl_ms: Some(ttl_ms),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        BatchOp::Delete { key: key.into() }
    }

    pub fn key(&self) -> &str {
        match self {
            BatchOp::Set { key, .. } | BatchOp::Delete { key } => key,
        }
    }

    /// Parse `{"operation": "set"|"delete", "key": ..., "value"?: ..., "ttl"?: ms}`.
    ///
    /// `op` and `type` are accepted in place of `operation`; tags are case
    /// insensitive.
    pub fn from_json(raw: &Value) -> Result<Self> {
        let object = raw.as_object().ok_or_else(|| {
            AlphaError::InvalidInput(format!(
                "Batch operation must be an object, got {}",
                json_type_name(raw)
            ))
        })?;

        let tag = ["operation", "op", "type"]
            .iter()
            .find_map(|field| object.get(*field))
            .and_then(Value::as_str)
            .ok_or_else(|| AlphaError::UnknownBatchOp("<missing>".to_string()))?;

        let key = match object.get("key") {
            Some(Value::String(key)) => key.clone(),
            Some(other) => return Err(AlphaError::InvalidKeyType(json_type_name(other).to_string())),
            None => return Err(AlphaError::InvalidKeyType("missing".to_string())),
        };

        match tag.to_ascii_lowercase().as_str() {
            "set" => {
                let value = object.get("value").cloned().unwrap_or(Value::Null);
                let ttl_ms = match object.get("ttl") {
                    None | Some(Value::Null) => None,
                    Some(ttl) => Some(ttl.as_u64().ok_or_else(|| {
                        AlphaError::InvalidInput(format!(
                            "ttl for {} must be a non-negative integer",
                            key
                        ))
                    })?),
                };
                Ok(BatchOp::Set { key, value, ttl_ms })
            }
            "delete" => Ok(BatchOp::Delete { key }),
            _ => Err(AlphaError::UnknownBatchOp(tag.to_string())),
        }
    }
}

impl Inner {
    fn apply_op(&self, state: &mut State, events: &mut Events, op: BatchOp) -> Result<()> {
        match op {
            BatchOp::Set { key, value, ttl_ms } => {
                self.validate(&value)?;
                self.set_locked(state, events, &key, value, ttl_ms);
            }
            BatchOp::Delete { key } => {
                self.delete_locked(state, events, &key);
            }
        }
        Ok(())
    }

    /// Apply ops in order, stopping at the first error. Effects before the
    /// failing op stay applied and are persisted.
    fn apply_each(
        &self,
        state: &mut State,
        events: &mut Events,
        ops: impl IntoIterator<Item = Result<BatchOp>>,
    ) -> Result<usize> {
        let swept = self.expire(state, events);
        let mut applied = 0;
        let mut failure = None;
        for op in ops {
            if let Err(err) = op.and_then(|op| self.apply_op(state, events, op)) {
                failure = Some(err);
                break;
            }
            applied += 1;
        }
        if applied > 0 || swept {
            self.persist(state)?;
        }
        match failure {
            Some(err) => {
                debug!(applied, error = %err, "batch stopped early");
                Err(err)
            }
            None => Ok(applied),
        }
    }

    /// Apply ops as one unit under a single lock hold: all or nothing.
    fn apply_atomically(
        &self,
        state: &mut State,
        events: &mut Events,
        ops: impl IntoIterator<Item = Result<BatchOp>>,
    ) -> Result<usize> {
        if state.tx.is_some() {
            return Err(AlphaError::TransactionAlreadyOpen);
        }
        let swept = self.expire(state, events);
        let before = state.live.clone();
        let mut staged = Events::new();

        let mut applied = 0;
        for op in ops {
            let outcome = op.and_then(|op| self.apply_op(state, &mut staged, op));
            if let Err(err) = outcome {
                state.live = before;
                events.push(MutationEvent::new(MutationKind::Rollback));
                debug!(error = %err, "transactional batch rolled back");
                if swept {
                    if let Err(save_err) = self.persist(state) {
                        warn!(error = %save_err, "rollback write failed");
                    }
                }
                return Err(err);
            }
            applied += 1;
        }

        events.append(&mut staged);
        events.push(MutationEvent::new(MutationKind::Commit));
        self.persist(state)?;
        Ok(applied)
    }
}

impl AlphaBase {
    /// Snapshot the current state and hold writes until `commit` or `rollback`.
    pub fn begin_transaction(&self) -> Result<()> {
        self.inner.run(|inner, state, events| {
            if state.tx.is_some() {
                return Err(AlphaError::TransactionAlreadyOpen);
            }
            inner.expire_and_persist(state, events)?;
            state.tx = Some(state.live.clone());
            debug!("transaction started");
            Ok(())
        })
    }

    pub fn in_transaction(&self) -> Result<bool> {
        self.inner.run(|_, state, _| Ok(state.tx.is_some()))
    }

    /// Keep the transaction's changes and write them.
    pub fn commit(&self) -> Result<()> {
        self.inner.run(|inner, state, events| {
            if state.tx.take().is_none() {
                return Err(AlphaError::NoTransactionOpen);
            }
            events.push(MutationEvent::new(MutationKind::Commit));
            inner.persist(state)
        })
    }

    /// Restore the state captured by `begin_transaction` and write it.
    pub fn rollback(&self) -> Result<()> {
        self.inner.run(|inner, state, events| {
            let snapshot = state.tx.take().ok_or(AlphaError::NoTransactionOpen)?;
            state.live = snapshot;
            events.push(MutationEvent::new(MutationKind::Rollback));
            inner.persist(state)
        })
    }

    /// Apply `ops` in order. Outside a transaction an error part-way leaves
    /// the earlier ops applied; use [`AlphaBase::transactionally`] for
    /// all-or-nothing.
    pub fn apply_batch(&self, ops: &[BatchOp]) -> Result<usize> {
        self.inner.run(|inner, state, events| {
            inner.apply_each(state, events, ops.iter().cloned().map(Ok))
        })
    }

    /// Like [`AlphaBase::apply_batch`] for untyped input; each op is parsed
    /// just before it is applied.
    pub fn apply_batch_json(&self, ops: &[Value]) -> Result<usize> {
        self.inner.run(|inner, state, events| {
            inner.apply_each(state, events, ops.iter().map(BatchOp::from_json))
        })
    }

    /// Begin, apply and commit; on any error the store is left exactly as
    /// it was and the error is returned.
    pub fn transactionally(&self, ops: &[BatchOp]) -> Result<usize> {
        self.inner.run(|inner, state, events| {
            inner.apply_atomically(state, events, ops.iter().cloned().map(Ok))
        })
    }

    pub fn transactionally_json(&self, ops: &[Value]) -> Result<usize> {
        self.inner.run(|inner, state, events| {
            inner.apply_atomically(state, events, ops.iter().map(BatchOp::from_json))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreOptions;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_from_json_parses_ops() {
        let op = BatchOp::from_json(&json!({"operation": "SET", "key": "a", "value": 1, "ttl": 50}))
            .unwrap();
        assert_eq!(op, BatchOp::set_with_ttl("a", json!(1), 50));

        let op = BatchOp::from_json(&json!({"op": "delete", "key": "a"})).unwrap();
        assert_eq!(op, BatchOp::delete("a"));
    }

    #[test]
    fn test_from_json_errors() {
        let err = BatchOp::from_json(&json!({"operation": "merge", "key": "a"})).unwrap_err();
        assert!(matches!(err, AlphaError::UnknownBatchOp(tag) if tag == "merge"));

        let err = BatchOp::from_json(&json!({"operation": "set", "key": 7})).unwrap_err();
        assert!(matches!(err, AlphaError::InvalidKeyType(kind) if kind == "number"));

        let err = BatchOp::from_json(&json!({"key": "a"})).unwrap_err();
        assert!(matches!(err, AlphaError::UnknownBatchOp(_)));

        let err = BatchOp::from_json(&json!({"operation": "set", "key": "a", "ttl": -5}))
            .unwrap_err();
        assert!(matches!(err, AlphaError::InvalidInput(_)));
    }

    #[test]
    fn test_transaction_state_machine() {
        let dir = tempdir().unwrap();
        let store = AlphaBase::open(dir.path().join("db.json"), StoreOptions::new()).unwrap();

        assert!(matches!(store.commit(), Err(AlphaError::NoTransactionOpen)));
        assert!(matches!(store.rollback(), Err(AlphaError::NoTransactionOpen)));

        store.begin_transaction().unwrap();
        assert!(store.in_transaction().unwrap());
        assert!(matches!(
            store.begin_transaction(),
            Err(AlphaError::TransactionAlreadyOpen)
        ));
        assert!(matches!(
            store.transactionally(&[]),
            Err(AlphaError::TransactionAlreadyOpen)
        ));
        store.commit().unwrap();
        assert!(!store.in_transaction().unwrap());
    }

    #[test]
    fn test_writes_are_held_during_transaction() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.json");
        let store = AlphaBase::open(&path, StoreOptions::new()).unwrap();
        store.set("x", json!(1), None).unwrap();
        let on_disk = std::fs::read_to_string(&path).unwrap();

        store.begin_transaction().unwrap();
        store.set("x", json!(2), None).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), on_disk);

        store.commit().unwrap();
        assert_ne!(std::fs::read_to_string(&path).unwrap(), on_disk);
    }

    #[test]
    fn test_apply_batch_json_leaves_partial_effects() {
        let dir = tempdir().unwrap();
        let store = AlphaBase::open(dir.path().join("db.json"), StoreOptions::new()).unwrap();

        let ops = vec![
            json!({"operation": "set", "key": "a", "value": 1}),
            json!({"operation": "explode", "key": "b"}),
            json!({"operation": "set", "key": "c", "value": 3}),
        ];
        let err = store.apply_batch_json(&ops).unwrap_err();

        assert!(matches!(err, AlphaError::UnknownBatchOp(_)));
        assert_eq!(store.get("a").unwrap(), Some(json!(1)));
        assert_eq!(store.get("c").unwrap(), None);
    }
}
