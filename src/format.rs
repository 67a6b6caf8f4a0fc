//! Format detection and version dispatch for W3G replay files.
//!
//! Replays come in two container families, told apart by their magic bytes:
//!
//! - **Classic**: `Warcraft III recorded game\x1A\x00` (28 bytes) at offset 0
//! - **GRBN**: `GRBN` at offset 0, a Reforged wrapper around an embedded
//!   classic replay
//!
//! Inside the classic container the field layout depends on the header
//! version and the game version number. [`FormatVersion`] names each known
//! layout and hands out its [`Layout`] table of decode functions; anything
//! else resolves to [`FormatVersion::Unsupported`].
//!
//! # Example
//!
//! ```
//! use w3g_replay::format::{detect_container, Container, FormatVersion};
//!
//! let classic_magic = b"Warcraft III recorded game\x1A\x00";
//! assert_eq!(detect_container(classic_magic).unwrap(), Container::Classic);
//!
//! assert_eq!(FormatVersion::resolve(1, 26), FormatVersion::Classic);
//! assert_eq!(FormatVersion::resolve(1, 10032), FormatVersion::Reforged);
//! assert!(FormatVersion::resolve(7, 26).layout().is_err());
//! ```

use std::fmt;

use serde::Serialize;

use crate::binary::ByteReader;
use crate::decompress::block::{read_reforged_block_header, read_short_block_header, BlockHeader};
use crate::error::{ParserError, Result};
use crate::records::player::{no_reforged_metadata, read_reforged_metadata, ReforgedPlayerMetadata};

/// The magic bytes for the GRBN (Reforged) container.
pub const GRBN_MAGIC: &[u8; 4] = b"GRBN";

/// The magic string for classic replays (26 characters + 0x1A + 0x00).
pub const CLASSIC_MAGIC: &[u8; 28] = b"Warcraft III recorded game\x1A\x00";

/// Version numbers at or above this value use Reforged block headers.
pub const REFORGED_VERSION_THRESHOLD: u32 = 10000;

/// The outer container of a replay file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Container {
    /// A plain classic replay starting with [`CLASSIC_MAGIC`].
    Classic,
    /// A GRBN wrapper; the classic replay is embedded further in.
    Grbn,
}

/// Detects the container from the leading magic bytes.
///
/// # Errors
///
/// Returns `UnsupportedFormat` if neither magic matches, or
/// `TruncatedInput` if the data is shorter than the magic it starts with.
pub fn detect_container(data: &[u8]) -> Result<Container> {
    if data.starts_with(GRBN_MAGIC) {
        return Ok(Container::Grbn);
    }
    if data.starts_with(CLASSIC_MAGIC) {
        return Ok(Container::Classic);
    }
    if !data.is_empty() && CLASSIC_MAGIC.starts_with(data) {
        return Err(ParserError::truncated(CLASSIC_MAGIC.len(), data.len()));
    }
    let shown = &data[..data.len().min(CLASSIC_MAGIC.len())];
    Err(ParserError::invalid_magic(CLASSIC_MAGIC, shown))
}

/// A known field layout, selected from the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FormatVersion {
    /// Header version 0 (Reign of Chaos up to 1.06).
    Legacy,
    /// Header version 1 with a pre-Reforged version number.
    Classic,
    /// Header version 1, version number 10000 and above.
    Reforged,
    /// Any other header version. Decoding stops here.
    Unsupported {
        /// The header version found in the file.
        header_version: u32,
    },
}

impl FormatVersion {
    /// Resolves the layout from the header version and version number.
    #[must_use]
    pub fn resolve(header_version: u32, version_number: u32) -> Self {
        match header_version {
            0 => FormatVersion::Legacy,
            1 if version_number >= REFORGED_VERSION_THRESHOLD => FormatVersion::Reforged,
            1 => FormatVersion::Classic,
            other => FormatVersion::Unsupported {
                header_version: other,
            },
        }
    }

    /// Returns the decode table for this layout.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` for [`FormatVersion::Unsupported`].
    pub fn layout(self) -> Result<&'static Layout> {
        match self {
            FormatVersion::Legacy => Ok(&LEGACY_LAYOUT),
            FormatVersion::Classic => Ok(&CLASSIC_LAYOUT),
            FormatVersion::Reforged => Ok(&REFORGED_LAYOUT),
            FormatVersion::Unsupported { header_version } => Err(ParserError::UnsupportedFormat {
                reason: format!("unknown header version {header_version}"),
            }),
        }
    }
}

/// Reads a block sub-header at the cursor.
pub type BlockHeaderFn = fn(&mut ByteReader<'_>) -> Result<BlockHeader>;

/// Reads any Reforged player metadata records at the cursor.
pub type MetadataFn = fn(&mut ByteReader<'_>) -> Result<Vec<ReforgedPlayerMetadata>>;

/// Decode functions and sizes that differ between format versions.
pub struct Layout {
    /// Display name of the layout.
    pub name: &'static str,
    /// Size of each block sub-header in bytes.
    pub block_header_size: usize,
    /// Block sub-header reader.
    pub read_block_header: BlockHeaderFn,
    /// Reforged metadata reader, a no-op for older layouts.
    pub read_reforged_metadata: MetadataFn,
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layout")
            .field("name", &self.name)
            .field("block_header_size", &self.block_header_size)
            .finish_non_exhaustive()
    }
}

static LEGACY_LAYOUT: Layout = Layout {
    name: "legacy",
    block_header_size: 8,
    read_block_header: read_short_block_header,
    read_reforged_metadata: no_reforged_metadata,
};

static CLASSIC_LAYOUT: Layout = Layout {
    name: "classic",
    block_header_size: 8,
    read_block_header: read_short_block_header,
    read_reforged_metadata: no_reforged_metadata,
};

static REFORGED_LAYOUT: Layout = Layout {
    name: "reforged",
    block_header_size: 12,
    read_block_header: read_reforged_block_header,
    read_reforged_metadata: read_reforged_metadata,
};
