//! Classic replay header parser.
//!
//! Offsets below are relative to the classic magic string, which is at
//! file offset 0 for plain replays and further in for GRBN files.
//!
//! # Common Layout
//!
//! | Offset | Size | Field | Description |
//! |--------|------|-------|-------------|
//! | 0x00 | 28 | `magic` | "Warcraft III recorded game\x1A\0" |
//! | 0x1C | 4 | `header_size` | Offset of the first block |
//! | 0x20 | 4 | `compressed_size` | Compressed file size |
//! | 0x24 | 4 | `header_version` | 0 or 1 |
//! | 0x28 | 4 | `decompressed_size` | Total decompressed payload size |
//! | 0x2C | 4 | `block_count` | Number of compressed blocks |
//!
//! # Sub-header, version 0
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x30 | 2 | unknown |
//! | 0x32 | 2 | `version_number` |
//! | 0x34 | 2 | `build_number` |
//! | 0x36 | 2 | `flags` |
//! | 0x38 | 4 | `duration_ms` |
//! | 0x3C | 4 | `checksum` |
//!
//! # Sub-header, version 1
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x30 | 4 | `product_id` ("3RAW" / "PX3W", stored reversed) |
//! | 0x34 | 4 | `version_number` |
//! | 0x38 | 2 | `build_number` |
//! | 0x3A | 2 | `flags` (0x8000 = multiplayer) |
//! | 0x3C | 4 | `duration_ms` |
//! | 0x40 | 4 | `checksum` |

use tracing::debug;

use super::ReplayHeader;
use crate::binary::ByteReader;
use crate::error::{ParserError, Result};
use crate::format::{Container, FormatVersion, CLASSIC_MAGIC};

/// Size of the common part shared by both header versions.
pub const COMMON_HEADER_SIZE: usize = 0x30;

/// Size of a complete version 0 header.
pub const V0_HEADER_SIZE: usize = 0x40;

/// Size of a complete version 1 header.
pub const V1_HEADER_SIZE: usize = 0x44;

/// Parses a classic header whose magic starts at `base`.
///
/// # Errors
///
/// - `TruncatedInput` if the header does not fit in `data`
/// - `UnsupportedFormat` on a bad magic or an unknown header version
/// - `MalformedRecord` if the declared header size is smaller than the
///   fields it must contain
pub fn parse_classic(data: &[u8], base: usize) -> Result<ReplayHeader> {
    let available = data.len().saturating_sub(base);
    if available < COMMON_HEADER_SIZE {
        return Err(ParserError::truncated(COMMON_HEADER_SIZE, available));
    }

    let mut reader = ByteReader::at(data, base)?;
    let magic = reader.read_bytes(CLASSIC_MAGIC.len())?;
    if magic != CLASSIC_MAGIC {
        return Err(ParserError::invalid_magic(CLASSIC_MAGIC, magic));
    }

    let header_size = reader.read_u32()?;
    let compressed_size = reader.read_u32()?;
    let header_version = reader.read_u32()?;
    let decompressed_size = reader.read_u32()?;
    let block_count = reader.read_u32()?;

    let expected_size = match header_version {
        0 => V0_HEADER_SIZE,
        1 => V1_HEADER_SIZE,
        other => {
            return Err(ParserError::UnsupportedFormat {
                reason: format!("unknown header version {other}"),
            })
        }
    };
    if available < expected_size {
        return Err(ParserError::truncated(expected_size, available));
    }

    let (product_id, version_number) = if header_version == 0 {
        reader.skip(2)?;
        (None, u32::from(reader.read_u16()?))
    } else {
        let mut raw = reader.read_array::<4>()?;
        raw.reverse();
        (Some(String::from_utf8_lossy(&raw).into_owned()), reader.read_u32()?)
    };
    let build_number = reader.read_u16()?;
    let flags = reader.read_u16()?;
    let duration_ms = reader.read_u32()?;
    let checksum = reader.read_u32()?;

    if (header_size as usize) < expected_size {
        return Err(ParserError::malformed(
            base + 0x1C,
            format!("header size {header_size} smaller than {expected_size}"),
        ));
    }

    let format = FormatVersion::resolve(header_version, version_number);
    debug!(?format, version_number, build_number, block_count, "parsed classic header");

    Ok(ReplayHeader {
        container: Container::Classic,
        grbn: None,
        base_offset: base,
        header_size,
        compressed_size,
        header_version,
        decompressed_size,
        block_count,
        product_id,
        version_number,
        build_number,
        flags,
        duration_ms,
        checksum,
        format,
    })
}
