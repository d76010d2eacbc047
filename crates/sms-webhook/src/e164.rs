//! Phone number normalization.

use tracing::warn;

/// Normalize a phone number to E.164.
///
/// - A leading `+` is kept and everything but digits is dropped.
/// - Ten bare digits are taken as US/Canada and prefixed with `+1`.
/// - Eleven digits starting with `1` are prefixed with `+`.
/// - Anything else is prefixed with `+` as is.
///
/// The last rule can produce values that are not valid E.164; those are
/// logged. Use [`is_plausible_e164`] to reject them.
pub fn format_to_e164(input: &str) -> String {
    let trimmed = input.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();

    // Every rule but the bare ten-digit one reduces to `+` and the digits.
    let formatted = if !trimmed.starts_with('+') && digits.len() == 10 {
        format!("+1{digits}")
    } else {
        format!("+{digits}")
    };

    if !is_plausible_e164(&formatted) {
        warn!(input = %trimmed, formatted = %formatted, "Phone number is not valid E.164");
    }

    formatted
}

/// `+` followed by 8 to 15 digits, not starting with 0.
pub fn is_plausible_e164(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('+') else {
        return false;
    };
    (8..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0')
}
