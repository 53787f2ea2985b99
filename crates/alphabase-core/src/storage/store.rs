//! The document store.
//!
//! `AlphaBase` owns one backing file. Every operation takes the state lock,
//! sweeps expired entries, applies its change and persists before releasing
//! the lock, so a reader never observes a half-expired state. Observers are
//! notified once the lock has been released.
//!
//! Two processes opening the same file will overwrite each other; there is no
//! cross-process locking.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use super::background::Maintenance;
use super::options::StoreOptions;
use super::persistence::Persistence;
use super::traits::{MutationObserver, SchemaValidator};
use super::ttl::{self, TtlScope};
use super::types::{
    Documents, EncryptionStatus, Exported, MutationEvent, MutationKind, Snapshot,
    StoreStatistics, WriteMode,
};
use crate::error::{AlphaError, Result};

pub(crate) type Events = Vec<MutationEvent>;

/// Current time in epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Absolute expiry for a relative TTL. Zero or absent means no expiry.
pub(crate) fn expiry_from(ttl_ms: Option<u64>, now: i64) -> Option<i64> {
    ttl_ms
        .filter(|ms| *ms > 0)
        .map(|ms| now.saturating_add(i64::try_from(ms).unwrap_or(i64::MAX)))
}

pub(crate) struct State {
    pub(crate) live: Snapshot,
    /// Pre-transaction copy; `Some` while a transaction is open.
    pub(crate) tx: Option<Snapshot>,
    pub(crate) dirty_since: Option<Instant>,
}

impl State {
    fn mark_dirty(&mut self) {
        if self.dirty_since.is_none() {
            self.dirty_since = Some(Instant::now());
        }
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty_since.is_some()
    }
}

pub(crate) struct Inner {
    persistence: Persistence,
    validator: Option<Arc<dyn SchemaValidator>>,
    pub(crate) write_mode: WriteMode,
    observers: RwLock<Vec<Arc<dyn MutationObserver>>>,
    state: Mutex<State>,
}

impl Inner {
    fn lock_state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| AlphaError::Storage("Store state lock poisoned".to_string()))
    }

    /// Run `op` under the state lock, then deliver the events it recorded.
    ///
    /// Events describe in-memory changes, so they are delivered even when
    /// `op` fails afterwards (for example on a disk write error).
    pub(crate) fn run<T>(
        &self,
        op: impl FnOnce(&Inner, &mut State, &mut Events) -> Result<T>,
    ) -> Result<T> {
        let mut events = Vec::new();
        let result = {
            let mut state = self.lock_state()?;
            op(self, &mut *state, &mut events)
        };
        self.notify(&events);
        result
    }

    fn notify(&self, events: &[MutationEvent]) {
        if events.is_empty() {
            return;
        }
        let observers = match self.observers.read() {
            Ok(observers) => observers.clone(),
            Err(_) => {
                warn!("observer list lock poisoned; dropping mutation events");
                return;
            }
        };
        for event in events {
            for observer in &observers {
                observer.on_mutation(event);
            }
        }
    }

    pub(crate) fn validate(&self, value: &Value) -> Result<()> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let outcome = validator.validate(value);
        if outcome.ok {
            return Ok(());
        }
        let errors = if outcome.errors.is_empty() {
            vec!["value rejected by schema".to_string()]
        } else {
            outcome.errors
        };
        Err(AlphaError::SchemaViolation { errors })
    }

    /// Evict expired entries in memory. Returns whether anything changed;
    /// a change marks the state dirty but is not written here.
    pub(crate) fn expire(&self, state: &mut State, events: &mut Events) -> bool {
        let outcome = ttl::sweep(
            &mut state.live.data,
            &mut state.live.ttl_meta,
            now_millis(),
        );
        if outcome.changed() {
            state.mark_dirty();
            debug!(
                evicted = outcome.evicted.len(),
                orphans = outcome.orphans_dropped,
                "expiry sweep"
            );
        }
        for scope in &outcome.evicted {
            let event = match scope {
                TtlScope::Key(key) => MutationEvent::new(MutationKind::Expire).with_key(key.clone()),
                TtlScope::CollectionDoc { collection, doc_id } => {
                    MutationEvent::new(MutationKind::Expire)
                        .with_key(collection.clone())
                        .with_doc_id(doc_id.clone())
                }
            };
            events.push(event);
        }
        outcome.changed()
    }

    /// Sweep and, if anything was evicted, persist once.
    pub(crate) fn expire_and_persist(&self, state: &mut State, events: &mut Events) -> Result<()> {
        if self.expire(state, events) {
            self.persist(state)?;
        }
        Ok(())
    }

    /// Sweep, then run `op`. If `op` fails after the sweep evicted
    /// something, the evictions are still persisted; on success `op` persists.
    pub(crate) fn sweep_then<T>(
        &self,
        state: &mut State,
        events: &mut Events,
        op: impl FnOnce(&mut State, &mut Events) -> Result<T>,
    ) -> Result<T> {
        let swept = self.expire(state, events);
        let result = op(state, events);
        if result.is_err() && swept {
            if let Err(save_err) = self.persist(state) {
                warn!(error = %save_err, "writing swept state failed");
            }
        }
        result
    }

    /// Record that the live state changed and write it according to the
    /// write mode. Nothing is written while a transaction is open.
    pub(crate) fn persist(&self, state: &mut State) -> Result<()> {
        state.mark_dirty();
        if state.tx.is_some() {
            return Ok(());
        }
        match self.write_mode {
            WriteMode::Immediate => self.write(state),
            WriteMode::Deferred(_) => Ok(()),
        }
    }

    fn write(&self, state: &mut State) -> Result<()> {
        self.persistence.save(&state.live)?;
        state.dirty_since = None;
        Ok(())
    }

    pub(crate) fn flush_locked(&self, state: &mut State) -> Result<()> {
        if state.tx.is_some() {
            debug!("flush held back: transaction open");
            return Ok(());
        }
        if state.is_dirty() {
            self.write(state)?;
        }
        Ok(())
    }

    /// Flush a deferred write whose window has elapsed.
    pub(crate) fn flush_if_due(&self) -> Result<()> {
        let WriteMode::Deferred(window) = self.write_mode else {
            return Ok(());
        };
        self.run(|inner, state, _| match state.dirty_since {
            Some(since) if since.elapsed() >= window => inner.flush_locked(state),
            _ => Ok(()),
        })
    }

    pub(crate) fn sweep(&self) -> Result<usize> {
        self.run(|inner, state, events| {
            inner.expire_and_persist(state, events)?;
            Ok(events.len())
        })
    }

    /// Write `value` under `key`. The caller has already validated it.
    pub(crate) fn set_locked(
        &self,
        state: &mut State,
        events: &mut Events,
        key: &str,
        value: Value,
        ttl_ms: Option<u64>,
    ) {
        state.live.data.insert(key.to_string(), value);
        match expiry_from(ttl_ms, now_millis()) {
            Some(at) => state.live.ttl_meta.set_key(key, at),
            None => {
                state.live.ttl_meta.remove_key(key);
            }
        }
        events.push(MutationEvent::new(MutationKind::Set).with_key(key));
    }

    pub(crate) fn delete_locked(&self, state: &mut State, events: &mut Events, key: &str) -> bool {
        let existed = state.live.data.remove(key).is_some();
        state.live.ttl_meta.remove_key(key);
        if existed {
            events.push(MutationEvent::new(MutationKind::Delete).with_key(key));
        }
        existed
    }
}

/// A single-file JSON document store.
pub struct AlphaBase {
    pub(crate) inner: Arc<Inner>,
    maintenance: Option<Maintenance>,
}

impl AlphaBase {
    /// Open (or create) the store at `path`.
    ///
    /// A file that cannot be decrypted or parsed opens as an empty store
    /// rather than failing, so a wrong passphrase looks like an empty
    /// database. Only I/O errors are returned.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let StoreOptions {
            passphrase,
            cipher,
            schema,
            write_mode,
            sweep_interval,
            backup_dir,
        } = options;

        let persistence = Persistence::new(path.as_ref(), cipher, passphrase, backup_dir);
        let live = persistence.load()?;
        debug!(
            path = %persistence.path().display(),
            keys = live.data.len(),
            cipher = %persistence.encryption_status().effective,
            "store opened"
        );

        let inner = Arc::new(Inner {
            persistence,
            validator: schema,
            write_mode,
            observers: RwLock::new(Vec::new()),
            state: Mutex::new(State {
                live,
                tx: None,
                dirty_since: None,
            }),
        });
        let maintenance = Maintenance::start(&inner, sweep_interval, write_mode)?;

        Ok(Self { inner, maintenance })
    }

    pub fn path(&self) -> &Path {
        self.inner.persistence.path()
    }

    /// Configured versus effective cipher; shows when encryption was dropped
    /// for lack of a passphrase.
    pub fn encryption_status(&self) -> EncryptionStatus {
        self.inner.persistence.encryption_status()
    }

    /// Register an observer for every applied mutation, expiry included.
    pub fn subscribe(&self, observer: impl MutationObserver + 'static) -> Result<()> {
        let mut observers = self
            .inner
            .observers
            .write()
            .map_err(|_| AlphaError::Storage("Observer list lock poisoned".to_string()))?;
        observers.push(Arc::new(observer));
        Ok(())
    }

    /// Store `value` under `key`.
    ///
    /// A positive `ttl_ms` expires the key that many milliseconds from now;
    /// `None` or zero makes it permanent, clearing any earlier TTL.
    pub fn set(&self, key: &str, value: Value, ttl_ms: Option<u64>) -> Result<()> {
        self.inner.run(|inner, state, events| {
            inner.validate(&value)?;
            inner.expire(state, events);
            inner.set_locked(state, events, key, value, ttl_ms);
            inner.persist(state)
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        self.inner.run(|inner, state, events| {
            inner.expire_and_persist(state, events)?;
            Ok(state.live.data.get(key).cloned())
        })
    }

    pub fn has(&self, key: &str) -> Result<bool> {
        self.inner.run(|inner, state, events| {
            inner.expire_and_persist(state, events)?;
            Ok(state.live.data.contains_key(key))
        })
    }

    /// Remove `key` and its TTL. Deleting an absent key is not an error;
    /// the return value says whether anything was removed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.inner.run(|inner, state, events| {
            inner.expire(state, events);
            let existed = inner.delete_locked(state, events, key);
            inner.persist(state)?;
            Ok(existed)
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.inner.run(|inner, state, events| {
            state.live = Snapshot::default();
            events.push(MutationEvent::new(MutationKind::Clear));
            inner.persist(state)
        })
    }

    /// Copy of every non-expired entry.
    pub fn all(&self) -> Result<Documents> {
        self.inner.run(|inner, state, events| {
            inner.expire_and_persist(state, events)?;
            Ok(state.live.data.clone())
        })
    }

    /// Non-expired keys in sorted order.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.inner.run(|inner, state, events| {
            inner.expire_and_persist(state, events)?;
            Ok(state.live.data.keys().cloned().collect())
        })
    }

    /// Milliseconds until `key` expires; 0 when it has no TTL or is gone.
    pub fn get_ttl(&self, key: &str) -> Result<u64> {
        self.inner.run(|inner, state, events| {
            inner.expire_and_persist(state, events)?;
            let now = now_millis();
            let remaining = state
                .live
                .ttl_meta
                .key_expiry(key)
                .map_or(0, |at| at.saturating_sub(now).max(0));
            Ok(u64::try_from(remaining).unwrap_or(0))
        })
    }

    /// Replace the whole store with `data`.
    ///
    /// Accepts a bare document map, a `{data, ttlMeta}` envelope, or a string
    /// holding either form (plain or encrypted). Arrays and scalars are
    /// rejected with [`AlphaError::ImportFormat`] and leave the store as is.
    pub fn import_bulk(&self, data: Value) -> Result<()> {
        let snapshot = self.inner.persistence.decode_import(data)?;
        self.inner.run(|inner, state, events| {
            debug!(keys = snapshot.data.len(), "importing snapshot");
            state.live = snapshot;
            events.push(MutationEvent::new(MutationKind::Import));
            inner.persist(state)
        })
    }

    pub fn statistics(&self) -> Result<StoreStatistics> {
        let data = self.all()?;
        let (file_size_bytes, last_modified) = self.inner.persistence.file_metadata();
        Ok(compute_statistics(&data, file_size_bytes, last_modified))
    }

    /// The current contents as a plain envelope object, or as the exact text
    /// a save would write (encrypted when a cipher is in effect).
    pub fn export_envelope(&self, as_text: bool) -> Result<Exported> {
        self.inner.run(|inner, state, events| {
            inner.expire_and_persist(state, events)?;
            if as_text {
                Ok(Exported::Text(inner.persistence.encode(&state.live)?))
            } else {
                Ok(Exported::Object(serde_json::to_value(&state.live)?))
            }
        })
    }

    /// Write the current contents to a new timestamped backup file.
    pub fn backup(&self) -> Result<PathBuf> {
        self.inner.run(|inner, state, events| {
            inner.expire_and_persist(state, events)?;
            inner.persistence.backup(&state.live)
        })
    }

    /// Run the expiry sweep now. Returns the number of evicted entries.
    pub fn sweep(&self) -> Result<usize> {
        self.inner.sweep()
    }

    /// Write any pending deferred changes.
    pub fn flush(&self) -> Result<()> {
        self.inner.run(|inner, state, _| inner.flush_locked(state))
    }

    /// Stop background maintenance and flush.
    pub fn close(mut self) -> Result<()> {
        if let Some(maintenance) = self.maintenance.take() {
            maintenance.stop();
        }
        self.flush()
    }
}

impl Drop for AlphaBase {
    fn drop(&mut self) {
        if let Some(maintenance) = self.maintenance.take() {
            maintenance.stop();
        }
        if let Err(err) = self.flush() {
            warn!(error = %err, "flush on drop failed; pending changes lost");
        }
    }
}

fn compute_statistics(
    data: &Documents,
    file_size_bytes: u64,
    last_modified: Option<chrono::DateTime<Utc>>,
) -> StoreStatistics {
    let mut total_value_bytes = 0usize;
    let mut approximate_memory_usage = 0usize;
    let mut largest: Option<(&str, usize)> = None;

    for (key, value) in data {
        let size = serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(0);
        total_value_bytes += size;
        approximate_memory_usage += key.len() + size;
        if largest.map_or(true, |(_, best)| size > best) {
            largest = Some((key, size));
        }
    }

    let total_keys = data.len();
    StoreStatistics {
        total_keys,
        file_size_bytes,
        last_modified,
        approximate_memory_usage,
        average_value_size_bytes: if total_keys == 0 {
            0
        } else {
            total_value_bytes / total_keys
        },
        largest_key_name: largest.map(|(key, _)| key.to_string()),
        largest_value_size_bytes: largest.map_or(0, |(_, size)| size),
    }
}
