//! Best-effort text decoding for free-form fields.
//!
//! Player names, chat and map paths are stored as raw bytes. Older
//! replays may carry legacy code-page text, so these fields are decoded
//! leniently: valid UTF-8 passes through untouched and invalid sequences
//! become U+FFFD. Structural fields never go through this module.

use std::borrow::Cow;

use tracing::debug;

/// Decodes `bytes` as UTF-8, replacing invalid sequences.
///
/// ```
/// use w3g_replay::text::decode_best_effort;
///
/// assert_eq!(decode_best_effort(b"Grubby"), "Grubby");
/// assert_eq!(decode_best_effort(b"Moon\xFF"), "Moon\u{FFFD}");
/// ```
#[must_use]
pub fn decode_best_effort(bytes: &[u8]) -> String {
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(text) => text.to_owned(),
        Cow::Owned(text) => {
            debug!(len = bytes.len(), "replaced invalid UTF-8 in text field");
            text
        }
    }
}

/// Returns true when `bytes` decode as UTF-8 without substitution.
#[must_use]
pub fn is_exact(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_ok()
}
