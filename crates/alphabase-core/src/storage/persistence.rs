//! Persistence manager: owns the backing file, the cipher choice and backups.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

use super::envelope;
use super::types::{EncryptionStatus, Snapshot};
use crate::crypto::{CipherKind, KeyCache};
use crate::error::{AlphaError, Result};
use crate::fs::write_atomic;

/// Directory name used for backups when none is configured.
pub const DEFAULT_BACKUP_DIR: &str = "backups";

pub struct Persistence {
    path: PathBuf,
    backup_dir: PathBuf,
    cipher: CipherKind,
    passphrase: Option<SecretString>,
    keys: KeyCache,
    downgrade_warned: AtomicBool,
    saves: AtomicU64,
}

impl Persistence {
    pub fn new(
        path: impl Into<PathBuf>,
        cipher: CipherKind,
        passphrase: Option<SecretString>,
        backup_dir: Option<PathBuf>,
    ) -> Self {
        let path = path.into();
        let backup_dir = backup_dir.unwrap_or_else(|| default_backup_dir(&path));
        let passphrase = passphrase.filter(|p| !p.expose_secret().is_empty());
        Self {
            path,
            backup_dir,
            cipher,
            passphrase,
            keys: KeyCache::new(),
            downgrade_warned: AtomicBool::new(false),
            saves: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Successful writes of the backing file since this manager was created.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_ref().map(|p| p.expose_secret())
    }

    pub fn encryption_status(&self) -> EncryptionStatus {
        EncryptionStatus {
            configured: self.cipher,
            effective: envelope::effective_cipher(self.cipher, self.passphrase()),
            passphrase_set: self.passphrase.is_some(),
        }
    }

    /// Read the backing file, creating it with `{}` first if it does not exist.
    ///
    /// Only I/O failures are errors; undecodable contents load as empty.
    pub fn load(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "creating empty store file");
            write_atomic(&self.path, b"{}")?;
        }
        let raw = fs::read(&self.path).map_err(|e| {
            AlphaError::Storage(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        Ok(envelope::decode_on_open(
            &raw,
            self.passphrase(),
            self.cipher,
            &self.keys,
        ))
    }

    /// Serialize `snapshot` the way it would be written to disk.
    pub fn encode(&self, snapshot: &Snapshot) -> Result<String> {
        let status = self.encryption_status();
        if status.downgraded() && !self.downgrade_warned.swap(true, Ordering::Relaxed) {
            warn!(
                configured = %status.configured,
                "no passphrase set; store is written unencrypted"
            );
        }
        envelope::encode_for_save(snapshot, self.passphrase(), self.cipher, &self.keys)
    }

    /// Overwrite the backing file with `snapshot`.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let text = self.encode(snapshot)?;
        write_atomic(&self.path, text.as_bytes())?;
        let save = self.saves.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            path = %self.path.display(),
            keys = snapshot.data.len(),
            bytes = text.len(),
            save,
            "store saved"
        );
        Ok(())
    }

    /// Write `snapshot` to a fresh timestamped file under the backup directory.
    pub fn backup(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        let text = self.encode(snapshot)?;
        let stamp = backup_stamp(Utc::now());
        let mut target = self.backup_dir.join(format!("backup-{}.json", stamp));
        let mut suffix = 1;
        while target.exists() {
            target = self
                .backup_dir
                .join(format!("backup-{}-{}.json", stamp, suffix));
            suffix += 1;
        }
        write_atomic(&target, text.as_bytes())?;
        debug!(path = %target.display(), "backup written");
        Ok(target)
    }

    /// Decode caller-supplied import data. Strings go through envelope
    /// decryption first.
    pub fn decode_import(&self, data: Value) -> Result<Snapshot> {
        match data {
            Value::String(text) => {
                envelope::decode_import_text(&text, self.passphrase(), self.cipher, &self.keys)
            }
            other => envelope::decode_import_value(other, self.passphrase(), &self.keys),
        }
    }

    /// Size and modification time of the backing file, if it can be read.
    pub fn file_metadata(&self) -> (u64, Option<DateTime<Utc>>) {
        match fs::metadata(&self.path) {
            Ok(meta) => (
                meta.len(),
                meta.modified().ok().map(DateTime::<Utc>::from),
            ),
            Err(_) => (0, None),
        }
    }
}

fn default_backup_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(DEFAULT_BACKUP_DIR),
        _ => PathBuf::from(DEFAULT_BACKUP_DIR),
    }
}

/// ISO 8601 timestamp with `:` and `.` replaced so it is safe in file names.
pub fn backup_stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}
