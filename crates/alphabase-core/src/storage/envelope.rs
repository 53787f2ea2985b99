//! On-disk envelope codec.
//!
//! A store file holds one of:
//!
//! - the plain envelope `{ "data": {...}, "ttlMeta": {...} }`
//! - an encrypted envelope `{ "_encrypted": true, "type": "<cipher>", "data": "<ciphertext>" }`
//!   whose decrypted text is a plain envelope
//! - a bare document map written before TTL support existed
//! - legacy ciphertext: the whole file (or a JSON string) encrypted with the
//!   configured cipher
//!
//! Loading never fails: a file that cannot be decrypted or parsed opens as an
//! empty store and a warning is logged. A wrong passphrase therefore looks
//! like an empty database. Imports use the same detection but report errors.
//!
//! `serde_json::Value` is an owned tree, so serialization cannot meet a cycle.

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::ttl::TtlMeta;
use super::types::Snapshot;
use crate::crypto::{CipherKind, KeyCache};
use crate::error::{AlphaError, Result};

/// Marker field of the encrypted envelope.
pub const ENCRYPTED_FLAG: &str = "_encrypted";

/// Cipher actually used for a save: passphrase ciphers without a passphrase
/// fall back to `none`.
pub fn effective_cipher(configured: CipherKind, passphrase: Option<&str>) -> CipherKind {
    let has_passphrase = passphrase.is_some_and(|p| !p.is_empty());
    if configured.requires_passphrase() && !has_passphrase {
        CipherKind::None
    } else {
        configured
    }
}

/// Serialize a snapshot for writing with the effective cipher.
pub fn encode_for_save(
    snapshot: &Snapshot,
    passphrase: Option<&str>,
    cipher: CipherKind,
    keys: &KeyCache,
) -> Result<String> {
    let effective = effective_cipher(cipher, passphrase);
    if effective == CipherKind::None {
        return Ok(serde_json::to_string_pretty(snapshot)?);
    }

    let plain = serde_json::to_string(snapshot)?;
    let ciphertext = effective.encrypt(&plain, passphrase, keys)?;
    let envelope = json!({
        ENCRYPTED_FLAG: true,
        "type": effective.tag(),
        "data": ciphertext,
    });
    Ok(serde_json::to_string(&envelope)?)
}

/// Decode the raw file contents read at open time.
///
/// Never fails; see the module docs for the fallback order.
pub fn decode_on_open(
    raw: &[u8],
    passphrase: Option<&str>,
    configured: CipherKind,
    keys: &KeyCache,
) -> Snapshot {
    match try_decode(raw, passphrase, configured, keys) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(error = %err, "store file could not be decoded; opening empty");
            Snapshot::default()
        }
    }
}

fn try_decode(
    raw: &[u8],
    passphrase: Option<&str>,
    configured: CipherKind,
    keys: &KeyCache,
) -> Result<Snapshot> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| AlphaError::InvalidInput("store file is not UTF-8".to_string()))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Snapshot::default());
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(object)) if is_encrypted(&object) => {
            decrypt_envelope(&object, passphrase, keys)
        }
        Ok(Value::Object(object)) => Ok(snapshot_from_object(object)),
        Ok(Value::String(ciphertext)) => {
            debug!("store file holds a JSON string; treating it as legacy ciphertext");
            decrypt_legacy(&ciphertext, passphrase, configured, keys)
        }
        Ok(_) | Err(_) => {
            debug!("store file is not an envelope; treating it as legacy ciphertext");
            decrypt_legacy(trimmed, passphrase, configured, keys)
        }
    }
}

fn is_encrypted(object: &Map<String, Value>) -> bool {
    object.get(ENCRYPTED_FLAG).and_then(Value::as_bool) == Some(true)
}

/// Whether an object is a plain envelope rather than a bare document map.
fn is_plain_envelope(object: &Map<String, Value>) -> bool {
    let data_ok = object.get("data").is_some_and(Value::is_object);
    let ttl_ok = object
        .get("ttlMeta")
        .map_or(true, |ttl| ttl.is_object() || ttl.is_null());
    let only_known = object.keys().all(|k| k == "data" || k == "ttlMeta");
    data_ok && ttl_ok && only_known
}

fn snapshot_from_object(mut object: Map<String, Value>) -> Snapshot {
    if !is_plain_envelope(&object) {
        return Snapshot::new(object, TtlMeta::new());
    }
    let ttl_meta = object
        .remove("ttlMeta")
        .map(|value| TtlMeta::from_value(&value))
        .unwrap_or_default();
    let data = match object.remove("data") {
        Some(Value::Object(data)) => data,
        _ => Map::new(),
    };
    Snapshot::new(data, ttl_meta)
}

fn snapshot_from_text(text: &str) -> Result<Snapshot> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(object) => Ok(snapshot_from_object(object)),
        _ => Err(AlphaError::InvalidInput(
            "decrypted payload is not a JSON object".to_string(),
        )),
    }
}

fn decrypt_envelope(
    object: &Map<String, Value>,
    passphrase: Option<&str>,
    keys: &KeyCache,
) -> Result<Snapshot> {
    let tag = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| AlphaError::Crypto("encrypted envelope has no cipher type".to_string()))?;
    let ciphertext = object
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| AlphaError::Crypto("encrypted envelope has no payload".to_string()))?;
    // The envelope names its own cipher; the configured one does not matter here.
    let kind: CipherKind = tag.parse()?;
    let plain = kind.decrypt(ciphertext, passphrase, keys)?;
    snapshot_from_text(&plain)
}

fn decrypt_legacy(
    ciphertext: &str,
    passphrase: Option<&str>,
    configured: CipherKind,
    keys: &KeyCache,
) -> Result<Snapshot> {
    let plain = configured.decrypt(ciphertext, passphrase, keys)?;
    snapshot_from_text(&plain)
}

/// Decode an already-parsed import payload.
///
/// Accepts a bare document map, a plain envelope, or an encrypted envelope.
pub fn decode_import_value(
    value: Value,
    passphrase: Option<&str>,
    keys: &KeyCache,
) -> Result<Snapshot> {
    match value {
        Value::Object(object) if is_encrypted(&object) => {
            decrypt_envelope(&object, passphrase, keys).map_err(|e| {
                AlphaError::ImportFormat(format!("encrypted import could not be read: {}", e))
            })
        }
        Value::Object(object) => Ok(snapshot_from_object(object)),
        Value::Array(_) => Err(AlphaError::ImportFormat(
            "expected an object, got an array".to_string(),
        )),
        other => Err(AlphaError::ImportFormat(format!(
            "expected an object, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Decode import text: JSON first, then legacy ciphertext under `configured`.
pub fn decode_import_text(
    text: &str,
    passphrase: Option<&str>,
    configured: CipherKind,
    keys: &KeyCache,
) -> Result<Snapshot> {
    let trimmed = text.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(ciphertext)) => decrypt_legacy(&ciphertext, passphrase, configured, keys)
            .map_err(|e| AlphaError::ImportFormat(format!("import could not be decrypted: {}", e))),
        Ok(value) => decode_import_value(value, passphrase, keys),
        Err(parse_err) => decrypt_legacy(trimmed, passphrase, configured, keys).map_err(|_| {
            AlphaError::ImportFormat(format!("import is not valid JSON: {}", parse_err))
        }),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
