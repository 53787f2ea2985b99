//! Options accepted by [`AlphaBase::open`](super::AlphaBase::open).

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use super::traits::SchemaValidator;
use super::types::WriteMode;
use crate::crypto::CipherKind;

/// Builder for store configuration.
///
/// ```no_run
/// use alphabase_core::{AlphaBase, CipherKind, StoreOptions};
///
/// let options = StoreOptions::new()
///     .with_cipher(CipherKind::Aes)
///     .with_passphrase("correct horse battery");
/// let store = AlphaBase::open("data/app.json", options)?;
/// # Ok::<(), alphabase_core::AlphaError>(())
/// ```
#[derive(Default)]
pub struct StoreOptions {
    pub(crate) passphrase: Option<SecretString>,
    pub(crate) cipher: CipherKind,
    pub(crate) schema: Option<Arc<dyn SchemaValidator>>,
    pub(crate) write_mode: WriteMode,
    pub(crate) sweep_interval: Option<Duration>,
    pub(crate) backup_dir: Option<PathBuf>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(SecretString::from(passphrase.into()));
        self
    }

    pub fn with_cipher(mut self, cipher: CipherKind) -> Self {
        self.cipher = cipher;
        self
    }

    /// Validate every value passed to `set` and batch `Set` operations.
    pub fn with_schema(mut self, schema: impl SchemaValidator + 'static) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    /// Run the expiry sweep on a background thread at this interval.
    ///
    /// Without it, expiry still happens lazily on every operation.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Where `backup()` writes. Defaults to `backups/` beside the store file.
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .field("cipher", &self.cipher)
            .field("schema", &self.schema.is_some())
            .field("write_mode", &self.write_mode)
            .field("sweep_interval", &self.sweep_interval)
            .field("backup_dir", &self.backup_dir)
            .finish()
    }
}
