//! Error types for the W3G replay decoder.
//!
//! Every failure carries enough context (block index, byte offset or the
//! offending tag) to locate the problem in the file. Conditions the decoder
//! can recover from, such as an unknown color id or missing Reforged
//! metadata, are logged and never surface here.

use thiserror::Error;

use crate::replay::Replay;

/// The main error type for W3G replay decoding.
///
/// # Example
///
/// ```
/// use w3g_replay::error::{ParserError, Result};
///
/// fn example_operation() -> Result<()> {
///     Err(ParserError::MalformedRecord {
///         offset: 0x44,
///         reason: "slot record size 12 outside 7..=9".to_string(),
///     })
/// }
///
/// assert!(example_operation().is_err());
/// ```
#[derive(Error, Debug)]
pub enum ParserError {
    /// The signature is unknown or the header version maps to no layout.
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat {
        /// What was found instead of a supported format.
        reason: String,
    },

    /// A length field promises more bytes than the input holds.
    ///
    /// This typically indicates a truncated replay file.
    #[error("Truncated input: expected {expected} bytes, but only {available} available")]
    TruncatedInput {
        /// The number of bytes that were promised.
        expected: usize,
        /// The number of bytes actually available.
        available: usize,
    },

    /// A compressed block failed to inflate to its declared size.
    #[error("Corrupt block {block}: {reason}")]
    CorruptBlock {
        /// Zero-based index of the failing block.
        block: usize,
        /// A description of the mismatch or zlib failure.
        reason: String,
    },

    /// A typed read ran past the end of the buffer.
    #[error("Read out of bounds at offset {offset:#x}: needed {needed} bytes, {available} available")]
    OutOfBounds {
        /// Absolute offset of the failed read.
        offset: usize,
        /// Bytes the read required.
        needed: usize,
        /// Bytes left at that offset.
        available: usize,
    },

    /// A record with a known layout holds structurally impossible values.
    #[error("Malformed record at offset {offset:#x}: {reason}")]
    MalformedRecord {
        /// Absolute offset of the record in the decoded stream.
        offset: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// The event stream hit a tag whose length cannot be determined.
    ///
    /// When raised by [`Replay::parse`], `partial` holds the replay with
    /// every event decoded before the tag.
    #[error("Unrecoverable tag {tag:#04x} at offset {offset:#x}")]
    UnrecoverableTag {
        /// The unknown tag byte.
        tag: u8,
        /// Offset of the tag in the decoded stream.
        offset: usize,
        /// Everything decoded before the tag.
        partial: Option<Box<Replay>>,
    },
}

impl ParserError {
    /// Creates an `UnsupportedFormat` error for an unrecognized signature.
    ///
    /// The bytes are rendered as hex for display.
    ///
    /// # Arguments
    ///
    /// * `expected` - The expected magic bytes
    /// * `found` - The actual bytes found
    ///
    /// # Example
    ///
    /// ```
    /// use w3g_replay::error::ParserError;
    ///
    /// let err = ParserError::invalid_magic(b"GRBN", b"\x00\x00\x00\x00");
    /// assert!(err.to_string().contains("Unsupported format"));
    /// ```
    #[must_use]
    pub fn invalid_magic(expected: &[u8], found: &[u8]) -> Self {
        ParserError::UnsupportedFormat {
            reason: format!(
                "expected magic {}, found {}",
                bytes_to_hex(expected),
                bytes_to_hex(found)
            ),
        }
    }

    /// Creates a `TruncatedInput` error with the given sizes.
    #[must_use]
    pub fn truncated(expected: usize, available: usize) -> Self {
        ParserError::TruncatedInput {
            expected,
            available,
        }
    }

    /// Creates a `MalformedRecord` error.
    #[must_use]
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        ParserError::MalformedRecord {
            offset,
            reason: reason.into(),
        }
    }

    /// Returns the replay decoded before an unrecoverable tag, if any.
    #[must_use]
    pub fn partial(&self) -> Option<&Replay> {
        match self {
            ParserError::UnrecoverableTag {
                partial: Some(replay),
                ..
            } => Some(replay),
            _ => None,
        }
    }

    /// Consumes the error, returning the partially decoded replay.
    #[must_use]
    pub fn into_partial(self) -> Option<Replay> {
        match self {
            ParserError::UnrecoverableTag {
                partial: Some(replay),
                ..
            } => Some(*replay),
            _ => None,
        }
    }
}

/// Converts a byte slice to a hexadecimal string representation.
///
/// If the slice is 8 bytes or less, formats as space-separated hex values.
/// If longer, shows the first 8 bytes followed by "...".
fn bytes_to_hex(bytes: &[u8]) -> String {
    let shown = &bytes[..bytes.len().min(8)];
    let prefix = shown
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ");
    if bytes.len() <= 8 {
        prefix
    } else {
        format!("{prefix}... ({} bytes total)", bytes.len())
    }
}

/// A specialized Result type for W3G decoding operations.
pub type Result<T> = std::result::Result<T, ParserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_magic_display() {
        let err = ParserError::invalid_magic(b"GRBN", b"RIFF");
        let msg = err.to_string();
        assert!(msg.contains("47 52 42 4E"));
        assert!(msg.contains("52 49 46 46"));
    }

    #[test]
    fn test_truncated_display() {
        let err = ParserError::truncated(100, 50);
        assert_eq!(
            err.to_string(),
            "Truncated input: expected 100 bytes, but only 50 available"
        );
    }

    #[test]
    fn test_corrupt_block_names_index() {
        let err = ParserError::CorruptBlock {
            block: 3,
            reason: "inflated 10 bytes, declared 8192".to_string(),
        };
        assert!(err.to_string().starts_with("Corrupt block 3:"));
    }

    #[test]
    fn test_bytes_to_hex_long() {
        let hex = bytes_to_hex(&[0u8; 12]);
        assert!(hex.ends_with("... (12 bytes total)"));
    }

    #[test]
    fn test_partial_absent_for_other_kinds() {
        let err = ParserError::malformed(4, "bad");
        assert!(err.partial().is_none());
        let err = ParserError::UnrecoverableTag {
            tag: 0x99,
            offset: 10,
            partial: None,
        };
        assert!(err.into_partial().is_none());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ParserError>();
    }
}
