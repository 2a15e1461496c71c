//! # Address to transport recipient.
//!
//! Stored addresses are local-format numbers. The transport wants the international
//! form without a leading `+`:
//!
//! ```text
//! "9876543210"        + "91" ──► "919876543210"
//! "98765-43210"       + "91" ──► "919876543210"
//! "+44 (20) 7946.0958"       ──► "442079460958"   (already international, no prefix)
//! ```

use crate::error::SendError;

/// Formats `address` for the transport, prepending `prefix` to local numbers.
///
/// Returns [`SendError::InvalidAddress`] when the normalized address is empty or still
/// contains a non-digit character.
pub fn format(prefix: &str, address: &str) -> Result<String, SendError> {
    let invalid = || SendError::InvalidAddress {
        address: address.to_string(),
    };

    let cleaned: String = address
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    let (international, digits) = match cleaned.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    if international {
        Ok(digits.to_string())
    } else {
        Ok(format!("{prefix}{digits}"))
    }
}
