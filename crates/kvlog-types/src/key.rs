//! Key validation.
//!
//! Keys are opaque strings. The only structural rule is that a key must be
//! non-empty; any other content, including whitespace, is significant and
//! stored verbatim.

use crate::error::TypeError;

/// Validate a key, returning `Ok(())` if it may be written or queried.
///
/// # Examples
///
/// ```
/// use kvlog_types::validate_key;
///
/// assert!(validate_key("foo").is_ok());
/// assert!(validate_key("user:42/profile").is_ok());
/// assert!(validate_key("").is_err());
/// ```
pub fn validate_key(key: &str) -> Result<(), TypeError> {
    if key.is_empty() {
        return Err(TypeError::InvalidKey {
            key: key.to_string(),
            reason: "key must not be empty".into(),
        });
    }
    Ok(())
}
