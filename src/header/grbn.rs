//! GRBN container header for Warcraft III: Reforged replay files.
//!
//! A GRBN file wraps a complete classic replay:
//!
//! 1. A 128-byte GRBN header
//! 2. A zlib-compressed protobuf metadata blob at offset 0x80
//! 3. Zero padding
//! 4. An embedded classic replay, located by its magic string
//!
//! # Header Layout (128 bytes)
//!
//! | Offset | Size | Field | Description |
//! |--------|------|-------|-------------|
//! | 0x00 | 4 | `magic` | "GRBN" |
//! | 0x04 | 4 | `version` | Container version (2 observed) |
//! | 0x08 | 4 | `unknown_1` | 11 observed |
//! | 0x0C | 4 | `unknown_2` | 51200 observed |
//! | 0x18 | 4 | `unknown_3` | 0-6 observed |
//! | 0x1C | 4 | `unknown_4` | 0 or 1 |
//! | 0x24 | 4 | `metadata_size` | Inflated size of the metadata blob |
//!
//! Only the embedded classic replay is decoded; the metadata blob repeats
//! information that the classic replay also carries.

use serde::Serialize;
use tracing::debug;

use crate::binary::ByteReader;
use crate::error::{ParserError, Result};
use crate::format::{CLASSIC_MAGIC, GRBN_MAGIC};

/// The size of a GRBN header in bytes.
pub const GRBN_HEADER_SIZE: usize = 128;

/// Parsed GRBN container header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrbnHeader {
    /// Container version at offset 0x04.
    pub version: u32,
    /// Unknown field at offset 0x08.
    pub unknown_1: u32,
    /// Unknown field at offset 0x0C.
    pub unknown_2: u32,
    /// Unknown field at offset 0x18.
    pub unknown_3: u32,
    /// Unknown field at offset 0x1C.
    pub unknown_4: u32,
    /// Inflated size of the metadata blob, offset 0x24.
    pub metadata_size: u32,
    /// Offset of the embedded classic replay's magic string.
    pub embedded_offset: usize,
}

impl GrbnHeader {
    /// Parses the GRBN header and locates the embedded classic replay.
    ///
    /// # Errors
    ///
    /// - `TruncatedInput` if data is shorter than 128 bytes
    /// - `UnsupportedFormat` if the magic is wrong or no classic replay is
    ///   embedded
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < GRBN_HEADER_SIZE {
            return Err(ParserError::truncated(GRBN_HEADER_SIZE, data.len()));
        }

        let mut reader = ByteReader::new(data);
        let magic = reader.read_bytes(4)?;
        if magic != GRBN_MAGIC {
            return Err(ParserError::invalid_magic(GRBN_MAGIC, magic));
        }

        let version = reader.read_u32()?;
        let unknown_1 = reader.read_u32()?;
        let unknown_2 = reader.read_u32()?;
        reader.skip(8)?;
        let unknown_3 = reader.read_u32()?;
        let unknown_4 = reader.read_u32()?;
        reader.skip(4)?;
        let metadata_size = reader.read_u32()?;

        let embedded_offset =
            find_embedded_classic(data).ok_or_else(|| ParserError::UnsupportedFormat {
                reason: "GRBN container holds no classic replay".to_string(),
            })?;
        debug!(version, embedded_offset, "located embedded classic replay");

        Ok(GrbnHeader {
            version,
            unknown_1,
            unknown_2,
            unknown_3,
            unknown_4,
            metadata_size,
            embedded_offset,
        })
    }
}

/// Searches past the GRBN header for the classic magic string.
#[must_use]
pub fn find_embedded_classic(data: &[u8]) -> Option<usize> {
    data.get(GRBN_HEADER_SIZE..)?
        .windows(CLASSIC_MAGIC.len())
        .position(|window| window == CLASSIC_MAGIC)
        .map(|pos| pos + GRBN_HEADER_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grbn_with_embedded(padding: usize) -> Vec<u8> {
        let mut data = vec![0u8; GRBN_HEADER_SIZE];
        data[..4].copy_from_slice(GRBN_MAGIC);
        data[4..8].copy_from_slice(&2u32.to_le_bytes());
        data[0x24..0x28].copy_from_slice(&77u32.to_le_bytes());
        data.extend(std::iter::repeat(0u8).take(padding));
        data.extend_from_slice(CLASSIC_MAGIC);
        data
    }

    #[test]
    fn test_parse_grbn_header() {
        let data = grbn_with_embedded(16);
        let header = GrbnHeader::parse(&data).unwrap();
        assert_eq!(header.version, 2);
        assert_eq!(header.metadata_size, 77);
        assert_eq!(header.embedded_offset, GRBN_HEADER_SIZE + 16);
    }

    #[test]
    fn test_grbn_too_short() {
        let err = GrbnHeader::parse(b"GRBN").unwrap_err();
        assert!(matches!(err, ParserError::TruncatedInput { expected: 128, .. }));
    }

    #[test]
    fn test_grbn_without_embedded_replay() {
        let mut data = vec![0u8; 200];
        data[..4].copy_from_slice(GRBN_MAGIC);
        let err = GrbnHeader::parse(&data).unwrap_err();
        assert!(matches!(err, ParserError::UnsupportedFormat { .. }));
    }
}
