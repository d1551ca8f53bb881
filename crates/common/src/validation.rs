//! Input validation utilities for submitted records and storage keys
//!
//! Every function returns an error instead of panicking so callers can surface
//! the message to the user and keep running.

use anyhow::{anyhow, Result};
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================================================
// CONSTANTS: Input Size Limits
// ============================================================================

/// Maximum length for storage keys
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum length for short text (titles, locations, user names)
pub const MAX_NAME_LENGTH: usize = 512;

/// Maximum length for descriptions and notes
pub const MAX_DESCRIPTION_LENGTH: usize = 4096;

// ============================================================================
// Safe Time Operations
// ============================================================================

/// Current Unix timestamp in milliseconds, 0 when the clock is before the epoch
pub fn safe_unix_millis() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "System clock is before UNIX epoch (1970-01-01), using timestamp 0"
            );
            0
        }
    }
}

// ============================================================================
// String Validation
// ============================================================================

/// Validate string length against a maximum
pub fn validate_length(value: &str, max_length: usize, field_name: &str) -> Result<()> {
    if value.len() > max_length {
        return Err(anyhow!(
            "{} exceeds maximum length of {} bytes (got {})",
            field_name,
            max_length,
            value.len()
        ));
    }
    Ok(())
}

/// Validate non-blank string
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} cannot be empty", field_name));
    }
    Ok(())
}

/// Required short text field (title, location, author)
pub fn validate_name(value: &str, field_name: &str) -> Result<()> {
    validate_non_empty(value, field_name)?;
    validate_length(value, MAX_NAME_LENGTH, field_name)
}

/// Required long text field
pub fn validate_description(value: &str, field_name: &str) -> Result<()> {
    validate_non_empty(value, field_name)?;
    validate_length(value, MAX_DESCRIPTION_LENGTH, field_name)
}

/// Validate a storage key
///
/// Keys double as file names in the file backend, so path separators and
/// `..` are refused.
pub fn validate_key(key: &str) -> Result<()> {
    validate_non_empty(key, "key")?;
    validate_length(key, MAX_KEY_LENGTH, "key")?;

    if key.contains("..") || key.contains('/') || key.contains('\\') {
        return Err(anyhow!(
            "key contains invalid characters (no path separators or '..' allowed)"
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_unix_millis_is_recent() {
        // 2020-01-01 in milliseconds
        assert!(safe_unix_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_validate_non_empty() {
        assert!(validate_non_empty("Leak", "title").is_ok());
        assert!(validate_non_empty("", "title").is_err());
        assert!(validate_non_empty("   ", "title").is_err());
    }

    #[test]
    fn test_validate_length_reports_field() {
        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        let err = validate_name(&long, "location").unwrap_err();
        assert!(err.to_string().contains("location"));
    }

    #[test]
    fn test_validate_description_allows_multiline() {
        assert!(validate_description("line one\nline two", "description").is_ok());
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("unifap-tickets").is_ok());
        assert!(validate_key("unifap-alerta-alerts").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("a\\b").is_err());
    }
}
