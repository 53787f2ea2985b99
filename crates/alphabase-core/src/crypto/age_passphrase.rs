//! Age passphrase encryption.
//!
//! Age uses scrypt internally for passphrase-based encryption, so every
//! encrypt and decrypt pays the KDF cost. The binary age output is base64
//! encoded to fit in the JSON envelope.

use std::io::{Read, Write};
use std::iter;

use age::secrecy::SecretString;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{AlphaError, Result};

/// Encrypt `text` with age passphrase encryption.
pub fn encrypt(text: &str, passphrase: &str) -> Result<String> {
    let encryptor =
        age::Encryptor::with_user_passphrase(SecretString::from(passphrase.to_string()));

    let mut encrypted = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .map_err(|e| AlphaError::Crypto(format!("Failed to create encryptor: {}", e)))?;

    writer
        .write_all(text.as_bytes())
        .map_err(|e| AlphaError::Crypto(format!("Encryption write failed: {}", e)))?;

    writer
        .finish()
        .map_err(|e| AlphaError::Crypto(format!("Encryption finish failed: {}", e)))?;

    Ok(STANDARD.encode(encrypted))
}

/// Decrypt a payload produced by [`encrypt`].
///
/// # Errors
///
/// Returns `AlphaError::Crypto` if the passphrase is incorrect, the payload
/// is not base64, or the age stream is corrupted.
pub fn decrypt(ciphertext: &str, passphrase: &str) -> Result<String> {
    let encrypted = STANDARD
        .decode(ciphertext.trim().as_bytes())
        .map_err(|e| AlphaError::Crypto(format!("Invalid age payload encoding: {}", e)))?;

    let decryptor = age::Decryptor::new(encrypted.as_slice())
        .map_err(|e| AlphaError::Crypto(format!("Failed to create decryptor: {}", e)))?;

    let identity = age::scrypt::Identity::new(SecretString::from(passphrase.to_string()));
    let mut reader = decryptor
        .decrypt(iter::once(&identity as &dyn age::Identity))
        .map_err(|e| match e {
            age::DecryptError::NoMatchingKeys
            | age::DecryptError::DecryptionFailed
            | age::DecryptError::KeyDecryptionFailed => {
                AlphaError::Crypto("Incorrect passphrase".to_string())
            }
            _ => AlphaError::Crypto(format!("Decryption failed: {}", e)),
        })?;

    let mut decrypted = Vec::new();
    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| AlphaError::Crypto(format!("Failed to read decrypted data: {}", e)))?;

    String::from_utf8(decrypted)
        .map_err(|_| AlphaError::Crypto("Decrypted payload is not UTF-8".to_string()))
}
