//! Display name validation.
//!
//! Valid display names:
//! - Must be non-empty and at most 255 bytes
//! - Must not contain `/` or `\`
//! - Must not contain control characters
//! - Must not be `.` or `..`

use crate::error::{RefError, Result};

/// Longest accepted display name, in bytes.
pub const MAX_DISPLAY_NAME_BYTES: usize = 255;

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidDisplayName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a display name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use cask_refs::names::validate_display_name;
///
/// assert!(validate_display_name("report.pdf").is_ok());
/// assert!(validate_display_name("").is_err());
/// assert!(validate_display_name("../etc/passwd").is_err());
/// ```
pub fn validate_display_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(invalid(name, "display name must not be empty"));
    }

    if name.len() > MAX_DISPLAY_NAME_BYTES {
        return Err(invalid(
            name,
            format!("longer than {MAX_DISPLAY_NAME_BYTES} bytes"),
        ));
    }

    if let Some(ch) = name.chars().find(|c| *c == '/' || *c == '\\') {
        return Err(invalid(name, format!("contains path separator {ch:?}")));
    }

    if let Some(ch) = name.chars().find(|c| c.is_control()) {
        return Err(invalid(name, format!("contains control character {ch:?}")));
    }

    if name == "." || name == ".." {
        return Err(invalid(name, "must not be '.' or '..'"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(validate_display_name("photo.jpg").is_ok());
        assert!(validate_display_name("Quarterly Report (final).pdf").is_ok());
        assert!(validate_display_name(".bashrc").is_ok());
        assert!(validate_display_name("résumé.docx").is_ok());
    }

    #[test]
    fn reject_empty_and_blank() {
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("   ").is_err());
    }

    #[test]
    fn reject_separators() {
        assert!(validate_display_name("a/b").is_err());
        assert!(validate_display_name("a\\b").is_err());
    }

    #[test]
    fn reject_control_characters() {
        assert!(validate_display_name("bad\nname").is_err());
        assert!(validate_display_name("nul\0byte").is_err());
    }

    #[test]
    fn reject_dot_names() {
        assert!(validate_display_name(".").is_err());
        assert!(validate_display_name("..").is_err());
    }

    #[test]
    fn length_limit_is_in_bytes() {
        assert!(validate_display_name(&"a".repeat(255)).is_ok());
        assert!(validate_display_name(&"a".repeat(256)).is_err());
        // 128 two-byte characters is 256 bytes.
        assert!(validate_display_name(&"é".repeat(128)).is_err());
    }
}
