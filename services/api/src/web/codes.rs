//! services/api/src/web/codes.rs
//!
//! Join-code generation and normalization for the session join flow.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of a session join code.
pub const JOIN_CODE_LEN: usize = 6;

/// Draws a random uppercase alphanumeric join code.
///
/// Codes are not guaranteed globally unique; a collision would make the older
/// session unreachable by code, which mirrors the original behavior.
pub fn generate_join_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(JOIN_CODE_LEN)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

/// Normalizes a user-entered code: trimmed and uppercased, so lookups are
/// case-insensitive exact matches against the stored code.
pub fn normalize_join_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}
