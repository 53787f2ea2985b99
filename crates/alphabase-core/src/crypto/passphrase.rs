//! Passphrase checks.

use crate::error::{AlphaError, Result};

/// Minimum passphrase length recommended for new encrypted stores.
const MIN_PASSPHRASE_LENGTH: usize = 8;

/// Return the passphrase, or fail if a passphrase cipher was given none.
pub fn require_passphrase(passphrase: Option<&str>) -> Result<&str> {
    match passphrase {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(AlphaError::Crypto(
            "A passphrase is required for this cipher".to_string(),
        )),
    }
}

/// Validate passphrase strength before creating a new encrypted store.
///
/// # Requirements
///
/// - At least 8 characters long
/// - Not empty or only whitespace
///
/// The core never enforces this on open; existing stores keep whatever
/// passphrase they were written with.
pub fn validate_passphrase(passphrase: &str) -> Result<()> {
    if passphrase.trim().is_empty() {
        return Err(AlphaError::InvalidInput(
            "Passphrase cannot be empty".to_string(),
        ));
    }

    if passphrase.chars().count() < MIN_PASSPHRASE_LENGTH {
        return Err(AlphaError::InvalidInput(format!(
            "Passphrase must be at least {} characters (got {})",
            MIN_PASSPHRASE_LENGTH,
            passphrase.chars().count()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_passphrase() {
        assert_eq!(require_passphrase(Some("secret")).unwrap(), "secret");
        assert!(require_passphrase(Some("")).is_err());
        assert!(require_passphrase(None).is_err());
    }

    #[test]
    fn test_passphrase_too_short() {
        let result = validate_passphrase("short");
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("at least 8 characters"));
    }

    #[test]
    fn test_passphrase_empty() {
        assert!(validate_passphrase("").is_err());
        assert!(validate_passphrase("   ").is_err());
        assert!(validate_passphrase("\n\t").is_err());
    }

    #[test]
    fn test_passphrase_exactly_min_length() {
        assert!(validate_passphrase("12345678").is_ok());
    }
}
