//! Application context for the AlphaBase CLI.
//!
//! Combines CLI arguments with the config file and turns both into
//! [`StoreOptions`] for opening the store.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use alphabase_core::crypto::validate_passphrase;
use alphabase_core::{AlphaBase, CipherKind, JsonSchema, StoreOptions, WriteMode};
use tracing::debug;

use crate::cli::Cli;
use crate::config::{default_store_path, load_config, AlphaConfig};
use crate::errors::CliError;
use crate::helpers::{env_passphrase, prompt_passphrase, read_source};

pub struct AppContext<'a> {
    cli: &'a Cli,
    config: AlphaConfig,
}

impl<'a> AppContext<'a> {
    pub fn new(cli: &'a Cli) -> anyhow::Result<Self> {
        Ok(Self::with_config(cli, load_config()?))
    }

    pub fn with_config(cli: &'a Cli, config: AlphaConfig) -> Self {
        Self { cli, config }
    }

    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    pub fn json(&self) -> bool {
        self.cli.json
    }

    pub fn interactive(&self) -> bool {
        std::io::stdin().is_terminal() && !self.cli.no_input
    }

    /// `--db`/ALPHABASE_PATH, then `[store] path`, then the XDG data dir.
    pub fn store_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = self.cli.db.clone() {
            return Ok(path);
        }
        if let Some(path) = self.config.store.path.as_deref() {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        default_store_path()
    }

    pub fn cipher(&self) -> anyhow::Result<CipherKind> {
        let name = self
            .cli
            .cipher
            .as_deref()
            .or(self.config.store.cipher.as_deref());
        match name {
            Some(name) => Ok(name.parse::<CipherKind>()?),
            None => Ok(CipherKind::None),
        }
    }

    pub fn store_options(&self) -> anyhow::Result<StoreOptions> {
        let cipher = self.cipher()?;
        let mut options = StoreOptions::new().with_cipher(cipher);

        if cipher.requires_passphrase() {
            let passphrase = prompt_passphrase(self.interactive())?;
            // Existing stores keep the passphrase they were written with.
            if !self.store_path()?.exists() {
                validate_passphrase(&passphrase)?;
            }
            options = options.with_passphrase(passphrase);
        } else if let Some(passphrase) = env_passphrase() {
            // Still needed to read encrypted imports into a plain store.
            options = options.with_passphrase(passphrase);
        }
        if let Some(path) = self.cli.schema.as_ref() {
            let text = read_source(&path.to_string_lossy())?;
            options = options.with_schema(JsonSchema::from_json_str(&text)?);
        }
        if let Some(ms) = self.config.write.deferred_ms.filter(|ms| *ms > 0) {
            options = options.with_write_mode(WriteMode::Deferred(Duration::from_millis(ms)));
        }
        if let Some(ms) = self.config.ttl.sweep_interval_ms.filter(|ms| *ms > 0) {
            options = options.with_sweep_interval(Duration::from_millis(ms));
        }
        if let Some(dir) = self.config.store.backup_dir.as_deref() {
            options = options.with_backup_dir(dir);
        }
        Ok(options)
    }

    pub fn open_store(&self) -> anyhow::Result<AlphaBase> {
        let path = self.store_path()?;
        let options = self.store_options()?;
        debug!(path = %path.display(), ?options, "opening store");
        Ok(AlphaBase::open(&path, options)?)
    }
}

/// Reject options that only make sense together.
pub fn validate_args(cli: &Cli) -> anyhow::Result<()> {
    if cli.quiet && cli.json {
        return Err(CliError::InvalidArgument(
            "--quiet and --json cannot be combined".to_string(),
        )
        .into());
    }
    Ok(())
}
