//! Cipher strategies for encrypting the persisted envelope.
//!
//! Every strategy turns a UTF-8 string into a transport-safe string and back.
//! The set is closed and selected by [`CipherKind`]:
//!
//! - **none**: identity
//! - **base64**: reversible obfuscation, not a secret
//! - **xor**: repeating-key byte XOR for environments that want no crypto library
//! - **aes**: AES-256-GCM with an Argon2id key derived from the passphrase
//! - **age**: age passphrase encryption (scrypt)
//!
//! ## Threat Model
//!
//! Only `aes` and `age` protect a stolen store file against an offline attacker.
//! `xor` and `base64` keep casual readers out and nothing more.

pub mod aes;
pub mod age_passphrase;
pub mod key;
pub mod passphrase;
pub mod xor;

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{AlphaError, Result};

pub use key::{stretch_passphrase, AesKey, KeyCache};
pub use passphrase::{require_passphrase, validate_passphrase};

/// Cipher selected for the persisted envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherKind {
    #[default]
    None,
    Base64,
    Xor,
    Aes,
    Age,
}

impl CipherKind {
    pub const ALL: [CipherKind; 5] = [
        CipherKind::None,
        CipherKind::Base64,
        CipherKind::Xor,
        CipherKind::Aes,
        CipherKind::Age,
    ];

    /// Tag written to the envelope `type` field.
    pub fn tag(&self) -> &'static str {
        match self {
            CipherKind::None => "none",
            CipherKind::Base64 => "base64",
            CipherKind::Xor => "xor",
            CipherKind::Aes => "aes",
            CipherKind::Age => "age",
        }
    }

    /// Whether this cipher needs a passphrase to do anything.
    pub fn requires_passphrase(&self) -> bool {
        matches!(self, CipherKind::Xor | CipherKind::Aes | CipherKind::Age)
    }

    /// Encrypt `text`. Passphrase ciphers fail fast when `passphrase` is absent.
    pub fn encrypt(&self, text: &str, passphrase: Option<&str>, keys: &KeyCache) -> Result<String> {
        match self {
            CipherKind::None => Ok(text.to_string()),
            CipherKind::Base64 => Ok(STANDARD.encode(text.as_bytes())),
            CipherKind::Xor => xor::encrypt(text, require_passphrase(passphrase)?),
            CipherKind::Aes => aes::encrypt(text, require_passphrase(passphrase)?, keys),
            CipherKind::Age => age_passphrase::encrypt(text, require_passphrase(passphrase)?),
        }
    }

    /// Decrypt `ciphertext` produced by [`CipherKind::encrypt`].
    ///
    /// A wrong passphrase either fails here or produces text that will not
    /// parse as JSON; callers must treat both the same way.
    pub fn decrypt(
        &self,
        ciphertext: &str,
        passphrase: Option<&str>,
        keys: &KeyCache,
    ) -> Result<String> {
        match self {
            CipherKind::None => Ok(ciphertext.to_string()),
            CipherKind::Base64 => {
                let bytes = STANDARD
                    .decode(ciphertext.trim().as_bytes())
                    .map_err(|e| AlphaError::Crypto(format!("Invalid base64 payload: {}", e)))?;
                String::from_utf8(bytes)
                    .map_err(|_| AlphaError::Crypto("Decoded payload is not UTF-8".to_string()))
            }
            CipherKind::Xor => xor::decrypt(ciphertext, require_passphrase(passphrase)?),
            CipherKind::Aes => aes::decrypt(ciphertext, require_passphrase(passphrase)?, keys),
            CipherKind::Age => age_passphrase::decrypt(ciphertext, require_passphrase(passphrase)?),
        }
    }
}

impl fmt::Display for CipherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for CipherKind {
    type Err = AlphaError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(CipherKind::None),
            "base64" => Ok(CipherKind::Base64),
            "xor" => Ok(CipherKind::Xor),
            "aes" | "aes-256-gcm" | "aes256gcm" => Ok(CipherKind::Aes),
            "age" => Ok(CipherKind::Age),
            other => Err(AlphaError::InvalidInput(format!(
                "Unknown cipher \"{}\" (expected one of: none, base64, xor, aes, age)",
                other
            ))),
        }
    }
}
