//! Input and parsing helper functions for the CLI.

use std::io::{self, Read};
use std::path::Path;

use dialoguer::Password;
use serde_json::Value;

use crate::constants::env;
use crate::errors::CliError;

/// ALPHABASE_PASSPHRASE, when set and not blank.
pub fn env_passphrase() -> Option<String> {
    std::env::var(env::PASSPHRASE)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Read ALPHABASE_PASSPHRASE, falling back to a prompt when interactive.
pub fn prompt_passphrase(interactive: bool) -> anyhow::Result<String> {
    if let Some(value) = env_passphrase() {
        return Ok(value);
    }
    if !interactive {
        return Err(CliError::MissingPassphrase.into());
    }
    Password::new()
        .with_prompt("Passphrase")
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to read passphrase: {}", e))
}

/// Parse a command-line value as JSON, or keep it as a string.
///
/// `42`, `true`, `{"a":1}` become typed values; `hello` becomes `"hello"`.
/// With `raw` the text is never parsed.
pub fn parse_value(text: &str, raw: bool) -> Value {
    if raw {
        return Value::String(text.to_string());
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Parse text that must be JSON (documents, patches, batch files).
pub fn parse_json(text: &str, what: &str) -> anyhow::Result<Value> {
    serde_json::from_str(text)
        .map_err(|e| CliError::InvalidArgument(format!("Invalid JSON for {}: {}", what, e)).into())
}

/// Read a whole file, or stdin when `source` is "-".
pub fn read_source(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| anyhow::anyhow!("Failed to read stdin: {}", e))?;
        return Ok(buffer);
    }
    let path = Path::new(source);
    std::fs::read_to_string(path).map_err(|e| {
        CliError::InvalidArgument(format!("Failed to read {}: {}", path.display(), e)).into()
    })
}

/// Render a value for human output: strings unquoted, everything else as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Render milliseconds as a short human duration.
pub fn format_millis(ms: u64) -> String {
    if ms < 1_000 {
        return format!("{}ms", ms);
    }
    let seconds = ms / 1_000;
    match seconds {
        0..=59 => format!("{}.{:01}s", seconds, (ms % 1_000) / 100),
        60..=3_599 => format!("{}m {}s", seconds / 60, seconds % 60),
        _ => format!("{}h {}m", seconds / 3_600, (seconds % 3_600) / 60),
    }
}

/// Render a byte count with a binary unit.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_value_prefers_json() {
        assert_eq!(parse_value("42", false), json!(42));
        assert_eq!(parse_value("{\"a\":[1,2]}", false), json!({"a": [1, 2]}));
        assert_eq!(parse_value("hello world", false), json!("hello world"));
        assert_eq!(parse_value("42", true), json!("42"));
    }

    #[test]
    fn test_parse_json_rejects_plain_text() {
        let err = parse_json("not json", "document").unwrap_err();
        assert!(err.to_string().contains("document"));
    }

    #[test]
    fn test_display_value_unquotes_strings() {
        assert_eq!(display_value(&json!("plain")), "plain");
        assert_eq!(display_value(&json!({"a": 1})), "{\"a\":1}");
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(0), "0ms");
        assert_eq!(format_millis(1_500), "1.5s");
        assert_eq!(format_millis(125_000), "2m 5s");
        assert_eq!(format_millis(7_260_000), "2h 1m");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
    }
}
