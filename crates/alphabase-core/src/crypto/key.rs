//! Passphrase stretching for the `aes` cipher.
//!
//! Each sealed payload carries the salt its key was stretched with. A store
//! seals every write of a session under one random salt, so the expensive
//! Argon2id pass runs once per (passphrase, salt) and [`KeyCache`] remembers it.

use std::collections::HashMap;
use std::sync::Mutex;

use aes_gcm::{Aes256Gcm, KeyInit};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use zeroize::ZeroizeOnDrop;

use crate::error::{AlphaError, Result};

/// Salt bytes stored at the front of every AES payload.
pub const SALT_LENGTH: usize = 16;

/// AES-256 key size.
const KEY_BYTES: usize = 32;

// Argon2id cost: 19 MiB, two passes, one lane.
const MEMORY_KIB: u32 = 19 * 1024;
const PASSES: u32 = 2;
const LANES: u32 = 1;

pub type Salt = [u8; SALT_LENGTH];

/// 256-bit AES key. Wiped on drop and never printed.
#[derive(Clone, ZeroizeOnDrop)]
pub struct AesKey([u8; KEY_BYTES]);

impl AesKey {
    /// Build the AES-256-GCM cipher for this key.
    pub fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| AlphaError::Crypto(format!("AES-GCM key setup failed: {}", e)))
    }

    #[cfg(test)]
    fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AesKey([REDACTED])")
    }
}

fn argon2id() -> Result<Argon2<'static>> {
    let params = Params::new(MEMORY_KIB, PASSES, LANES, Some(KEY_BYTES))
        .map_err(|e| AlphaError::Crypto(format!("Invalid Argon2 parameters: {}", e)))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Stretch `passphrase` into an AES key. Deterministic for a given salt.
pub fn stretch_passphrase(passphrase: &str, salt: &Salt) -> Result<AesKey> {
    if passphrase.is_empty() {
        return Err(AlphaError::Crypto("Passphrase cannot be empty".to_string()));
    }
    let mut key = [0u8; KEY_BYTES];
    argon2id()?
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| AlphaError::Crypto(format!("Key derivation failed: {}", e)))?;
    Ok(AesKey(key))
}

struct Entry {
    passphrase: SecretString,
    key: AesKey,
}

/// Stretched keys by salt, plus the salt this session seals new payloads with.
///
/// A hit only counts when the passphrase matches too, so a store reopened
/// with another passphrase never decrypts with a stale key.
pub struct KeyCache {
    write_salt: Salt,
    entries: Mutex<HashMap<Salt, Entry>>,
}

impl KeyCache {
    pub fn new() -> Self {
        let mut write_salt = [0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut write_salt);
        Self {
            write_salt,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn write_salt(&self) -> Salt {
        self.write_salt
    }

    pub fn key_for(&self, passphrase: &str, salt: &Salt) -> Result<AesKey> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AlphaError::Crypto("Key cache poisoned".to_string()))?;
        match entries.get(salt) {
            Some(entry) if entry.passphrase.expose_secret() == passphrase => Ok(entry.key.clone()),
            _ => {
                let key = stretch_passphrase(passphrase, salt)?;
                entries.insert(
                    *salt,
                    Entry {
                        passphrase: SecretString::from(passphrase.to_string()),
                        key: key.clone(),
                    },
                );
                Ok(key)
            }
        }
    }

    #[cfg(test)]
    fn cached(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}
