//! Async facade over [`AlphaBase`].
//!
//! Each call runs the synchronous operation on tokio's blocking pool, so
//! file I/O and key derivation never stall the async executor.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use super::options::StoreOptions;
use super::store::AlphaBase;
use super::transaction::BatchOp;
use super::types::{Documents, Exported, StoreStatistics};
use crate::error::{AlphaError, Result};

#[derive(Clone)]
pub struct AsyncAlphaBase {
    store: Arc<AlphaBase>,
}

impl AsyncAlphaBase {
    pub async fn open(path: impl Into<PathBuf>, options: StoreOptions) -> Result<Self> {
        let path = path.into();
        let store = run_blocking(move || AlphaBase::open(path, options)).await?;
        Ok(Self::new(store))
    }

    pub fn new(store: AlphaBase) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// The wrapped synchronous store.
    pub fn store(&self) -> &Arc<AlphaBase> {
        &self.store
    }

    async fn call<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&AlphaBase) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        run_blocking(move || op(&store)).await
    }

    pub async fn set(&self, key: impl Into<String>, value: Value, ttl_ms: Option<u64>) -> Result<()> {
        let key = key.into();
        self.call(move |store| store.set(&key, value, ttl_ms)).await
    }

    pub async fn get(&self, key: impl Into<String>) -> Result<Option<Value>> {
        let key = key.into();
        self.call(move |store| store.get(&key)).await
    }

    pub async fn has(&self, key: impl Into<String>) -> Result<bool> {
        let key = key.into();
        self.call(move |store| store.has(&key)).await
    }

    pub async fn delete(&self, key: impl Into<String>) -> Result<bool> {
        let key = key.into();
        self.call(move |store| store.delete(&key)).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.call(|store| store.clear()).await
    }

    pub async fn all(&self) -> Result<Documents> {
        self.call(|store| store.all()).await
    }

    pub async fn keys(&self) -> Result<Vec<String>> {
        self.call(|store| store.keys()).await
    }

    pub async fn get_ttl(&self, key: impl Into<String>) -> Result<u64> {
        let key = key.into();
        self.call(move |store| store.get_ttl(&key)).await
    }

    pub async fn import_bulk(&self, data: Value) -> Result<()> {
        self.call(move |store| store.import_bulk(data)).await
    }

    pub async fn statistics(&self) -> Result<StoreStatistics> {
        self.call(|store| store.statistics()).await
    }

    pub async fn export_envelope(&self, as_text: bool) -> Result<Exported> {
        self.call(move |store| store.export_envelope(as_text)).await
    }

    pub async fn backup(&self) -> Result<PathBuf> {
        self.call(|store| store.backup()).await
    }

    pub async fn sweep(&self) -> Result<usize> {
        self.call(|store| store.sweep()).await
    }

    pub async fn flush(&self) -> Result<()> {
        self.call(|store| store.flush()).await
    }

    pub async fn begin_transaction(&self) -> Result<()> {
        self.call(|store| store.begin_transaction()).await
    }

    pub async fn commit(&self) -> Result<()> {
        self.call(|store| store.commit()).await
    }

    pub async fn rollback(&self) -> Result<()> {
        self.call(|store| store.rollback()).await
    }

    pub async fn apply_batch(&self, ops: Vec<BatchOp>) -> Result<usize> {
        self.call(move |store| store.apply_batch(&ops)).await
    }

    pub async fn transactionally(&self, ops: Vec<BatchOp>) -> Result<usize> {
        self.call(move |store| store.transactionally(&ops)).await
    }

    pub async fn insert_document(
        &self,
        collection: impl Into<String>,
        document: Value,
        ttl_ms: Option<u64>,
    ) -> Result<String> {
        let collection = collection.into();
        self.call(move |store| store.insert_document(&collection, document, ttl_ms))
            .await
    }

    pub async fn get_document(
        &self,
        collection: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<Option<Value>> {
        let (collection, id) = (collection.into(), id.into());
        self.call(move |store| store.get_document(&collection, &id)).await
    }

    pub async fn update_document(
        &self,
        collection: impl Into<String>,
        id: impl Into<String>,
        patch: Value,
    ) -> Result<Value> {
        let (collection, id) = (collection.into(), id.into());
        self.call(move |store| store.update_document(&collection, &id, patch))
            .await
    }

    pub async fn delete_document(
        &self,
        collection: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<()> {
        let (collection, id) = (collection.into(), id.into());
        self.call(move |store| store.delete_document(&collection, &id)).await
    }

    pub async fn list_documents(&self, collection: impl Into<String>) -> Result<Vec<Value>> {
        let collection = collection.into();
        self.call(move |store| store.list_documents(&collection)).await
    }
}

async fn run_blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| AlphaError::Storage(format!("Blocking store task failed: {}", e)))?
}
