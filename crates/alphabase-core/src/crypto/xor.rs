//! Repeating-key XOR stream cipher.
//!
//! Not a secure cipher. It exists for deployments that refuse a crypto
//! library but still want the file unreadable at a glance.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{AlphaError, Result};

fn apply(bytes: &mut [u8], key: &[u8]) {
    for (byte, k) in bytes.iter_mut().zip(key.iter().cycle()) {
        *byte ^= k;
    }
}

pub fn encrypt(text: &str, passphrase: &str) -> Result<String> {
    let mut bytes = text.as_bytes().to_vec();
    apply(&mut bytes, passphrase.as_bytes());
    Ok(STANDARD.encode(bytes))
}

/// A wrong passphrase usually fails the UTF-8 check here; when it does not,
/// the garbage text fails the caller's JSON parse instead.
pub fn decrypt(ciphertext: &str, passphrase: &str) -> Result<String> {
    let mut bytes = STANDARD
        .decode(ciphertext.trim().as_bytes())
        .map_err(|e| AlphaError::Crypto(format!("Invalid XOR payload encoding: {}", e)))?;
    apply(&mut bytes, passphrase.as_bytes());
    String::from_utf8(bytes)
        .map_err(|_| AlphaError::Crypto("XOR payload did not decode to UTF-8".to_string()))
}
