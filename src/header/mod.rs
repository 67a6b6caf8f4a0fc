//! Replay file header parsing.
//!
//! [`ReplayHeader::parse`] detects the container, parses the GRBN wrapper
//! when present, and then decodes the classic header that describes the
//! compressed blocks. The resolved [`FormatVersion`] selects every
//! version-dependent layout used further down the pipeline.
//!
//! # Example
//!
//! ```no_run
//! use w3g_replay::header::ReplayHeader;
//!
//! let data = std::fs::read("replay.w3g").unwrap();
//! let header = ReplayHeader::parse(&data)?;
//! println!("{} ({})", header.version_string(), header.duration_string());
//! # Ok::<(), w3g_replay::error::ParserError>(())
//! ```

pub mod classic;
pub mod grbn;

use serde::Serialize;

use crate::error::Result;
use crate::format::{detect_container, Container, FormatVersion, Layout};
use grbn::GrbnHeader;

/// Multiplayer bit of the header flags.
pub const FLAG_MULTIPLAYER: u16 = 0x8000;

/// The decoded file header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayHeader {
    /// Outer container of the file.
    pub container: Container,
    /// GRBN wrapper header, for Reforged container files.
    pub grbn: Option<GrbnHeader>,
    /// File offset of the classic magic string.
    pub base_offset: usize,
    /// Size of the classic header; blocks start right after it.
    pub header_size: u32,
    /// Compressed file size as declared by the header.
    pub compressed_size: u32,
    /// Header version (0 or 1).
    pub header_version: u32,
    /// Total size of the decompressed payload.
    pub decompressed_size: u32,
    /// Number of compressed blocks.
    pub block_count: u32,
    /// Product id, `WAR3` or `W3XP` (version 1 headers only).
    pub product_id: Option<String>,
    /// Game version number, e.g. 26 for 1.26 or 10032 for 1.32.
    pub version_number: u32,
    /// Game build number.
    pub build_number: u16,
    /// Raw header flags.
    pub flags: u16,
    /// Recorded game length in milliseconds.
    pub duration_ms: u32,
    /// Header checksum.
    pub checksum: u32,
    /// Resolved field layout.
    pub format: FormatVersion,
}

impl ReplayHeader {
    /// Parses the header of a replay file.
    ///
    /// # Errors
    ///
    /// - `UnsupportedFormat` for an unknown magic or header version
    /// - `TruncatedInput` if the header is cut short
    /// - `MalformedRecord` for an impossible header size
    pub fn parse(data: &[u8]) -> Result<Self> {
        match detect_container(data)? {
            Container::Classic => classic::parse_classic(data, 0),
            Container::Grbn => {
                let grbn = GrbnHeader::parse(data)?;
                let mut header = classic::parse_classic(data, grbn.embedded_offset)?;
                header.container = Container::Grbn;
                header.grbn = Some(grbn);
                Ok(header)
            }
        }
    }

    /// Returns the decode table for this header's format version.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` if the version has no layout.
    pub fn layout(&self) -> Result<&'static Layout> {
        self.format.layout()
    }

    /// File offset of the first block sub-header.
    #[must_use]
    pub fn data_offset(&self) -> usize {
        self.base_offset + self.header_size as usize
    }

    /// True for games recorded in multiplayer mode.
    #[must_use]
    pub fn is_multiplayer(&self) -> bool {
        self.flags & FLAG_MULTIPLAYER != 0
    }

    /// True for The Frozen Throne replays.
    #[must_use]
    pub fn is_expansion(&self) -> bool {
        self.product_id.as_deref() == Some("W3XP")
    }

    /// Returns the duration split into (hours, minutes, seconds, milliseconds).
    #[must_use]
    pub fn duration_parts(&self) -> (u32, u32, u32, u32) {
        let ms = self.duration_ms % 1000;
        let total_secs = self.duration_ms / 1000;
        (total_secs / 3600, (total_secs / 60) % 60, total_secs % 60, ms)
    }

    /// Returns the duration as `HH:MM:SS` or `MM:SS`.
    #[must_use]
    pub fn duration_string(&self) -> String {
        let (hours, minutes, seconds, _) = self.duration_parts();
        if hours > 0 {
            format!("{hours}:{minutes:02}:{seconds:02}")
        } else {
            format!("{minutes}:{seconds:02}")
        }
    }

    /// Returns the version as the game displays it, e.g. `1.26` or `1.32`.
    #[must_use]
    pub fn version_string(&self) -> String {
        let minor = if self.version_number >= crate::format::REFORGED_VERSION_THRESHOLD {
            self.version_number - crate::format::REFORGED_VERSION_THRESHOLD
        } else {
            self.version_number
        };
        format!("1.{minor:02}.{}", self.build_number)
    }
}
