//! AES-256-GCM cipher keyed by Argon2id.
//!
//! Payload layout before base64: `salt (16) || nonce (12) || ciphertext+tag`.

use aes_gcm::aead::Aead;
use aes_gcm::Nonce;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use super::key::{KeyCache, Salt, SALT_LENGTH};
use crate::error::{AlphaError, Result};

const NONCE_LENGTH: usize = 12;

/// Encrypt `text`, reusing the cache's session salt and a fresh random nonce.
pub fn encrypt(text: &str, passphrase: &str, keys: &KeyCache) -> Result<String> {
    let salt = keys.write_salt();
    let cipher = keys.key_for(passphrase, &salt)?.cipher()?;

    let mut nonce = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce);
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), text.as_bytes())
        .map_err(|e| AlphaError::Crypto(format!("AES-GCM encrypt failed: {}", e)))?;

    let mut payload = Vec::with_capacity(SALT_LENGTH + NONCE_LENGTH + sealed.len());
    payload.extend_from_slice(&salt);
    payload.extend_from_slice(&nonce);
    payload.extend_from_slice(&sealed);
    Ok(STANDARD.encode(payload))
}

/// Decrypt a payload produced by [`encrypt`].
///
/// # Errors
///
/// Returns `AlphaError::Crypto` for malformed payloads, a wrong passphrase,
/// or tampered ciphertext (the GCM tag check fails).
pub fn decrypt(ciphertext: &str, passphrase: &str, keys: &KeyCache) -> Result<String> {
    let payload = STANDARD
        .decode(ciphertext.trim().as_bytes())
        .map_err(|e| AlphaError::Crypto(format!("Invalid AES payload encoding: {}", e)))?;
    if payload.len() < SALT_LENGTH + NONCE_LENGTH {
        return Err(AlphaError::Crypto("AES payload too short".to_string()));
    }

    let (salt, rest) = payload.split_at(SALT_LENGTH);
    let (nonce, sealed) = rest.split_at(NONCE_LENGTH);
    let mut salt_bytes: Salt = [0u8; SALT_LENGTH];
    salt_bytes.copy_from_slice(salt);

    let cipher = keys.key_for(passphrase, &salt_bytes)?.cipher()?;
    let plain = cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| AlphaError::Crypto("AES-GCM decrypt failed".to_string()))?;

    String::from_utf8(plain)
        .map_err(|_| AlphaError::Crypto("Decrypted payload is not UTF-8".to_string()))
}
