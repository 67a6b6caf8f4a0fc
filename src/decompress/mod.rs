//! Block decompression for W3G replay files.
//!
//! The payload after the classic header is split into independently
//! zlib-compressed blocks. Each block is preceded by a sub-header whose
//! layout comes from the header's [`FormatVersion`](crate::format::FormatVersion).
//! [`decompress`] inflates every declared block in order and concatenates
//! the results into one decoded stream.
//!
//! The final block is usually padded with zeros up to 8192 bytes; the
//! concatenation is cut back to the header's declared total size.
//!
//! # Example
//!
//! ```no_run
//! use w3g_replay::header::ReplayHeader;
//! use w3g_replay::decompress::decompress;
//!
//! let data = std::fs::read("replay.w3g").unwrap();
//! let header = ReplayHeader::parse(&data)?;
//! let payload = decompress(&data, &header)?;
//! println!("{} blocks, {} bytes", payload.blocks.len(), payload.data.len());
//! # Ok::<(), w3g_replay::error::ParserError>(())
//! ```

pub mod block;

pub use block::{inflate_block, BlockHeader, BLOCK_DECOMPRESSED_SIZE};

use tracing::{debug, trace};

use crate::binary::ByteReader;
use crate::error::{ParserError, Result};
use crate::header::ReplayHeader;

/// The decoded payload and the sub-headers of the blocks it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inflated {
    /// Concatenated block contents, cut to the declared total size.
    pub data: Vec<u8>,
    /// One entry per inflated block, in file order.
    pub blocks: Vec<BlockHeader>,
}

/// Decompresses every block declared by `header`.
///
/// # Errors
///
/// - `TruncatedInput` if the declared block count cannot fit in `data`, a
///   block sub-header or its compressed bytes run past the end of `data`,
///   or the blocks inflate to less than the declared total
/// - `CorruptBlock` if a block fails to inflate to its declared size
/// - `UnsupportedFormat` if the header's version has no layout
pub fn decompress(data: &[u8], header: &ReplayHeader) -> Result<Inflated> {
    let layout = header.layout()?;
    let start = header.data_offset();
    if start > data.len() {
        return Err(ParserError::truncated(start, data.len()));
    }

    let mut reader = ByteReader::at(data, start)?;
    let block_count = header.block_count as usize;
    if block_count > reader.remaining() / layout.block_header_size {
        return Err(ParserError::truncated(
            block_count.saturating_mul(layout.block_header_size),
            reader.remaining(),
        ));
    }
    let declared = header.decompressed_size as usize;
    let mut output =
        Vec::with_capacity(declared.min(block_count.saturating_mul(BLOCK_DECOMPRESSED_SIZE)));
    let mut blocks = Vec::with_capacity(block_count);

    for index in 0..block_count {
        if reader.remaining() < layout.block_header_size {
            return Err(ParserError::truncated(
                layout.block_header_size,
                reader.remaining(),
            ));
        }
        let block_header = (layout.read_block_header)(&mut reader)?;

        let compressed_size = block_header.compressed_size as usize;
        if reader.remaining() < compressed_size {
            return Err(ParserError::truncated(compressed_size, reader.remaining()));
        }
        let compressed = reader.read_bytes(compressed_size)?;

        let inflated = inflate_block(
            compressed,
            block_header.decompressed_size as usize,
            index,
        )?;
        trace!(
            index,
            compressed = compressed_size,
            inflated = inflated.len(),
            "inflated block"
        );
        output.extend_from_slice(&inflated);
        blocks.push(block_header);
    }

    if output.len() < declared {
        return Err(ParserError::truncated(declared, output.len()));
    }
    output.truncate(declared);

    debug!(
        blocks = blocks.len(),
        bytes = output.len(),
        layout = layout.name,
        "decompressed payload"
    );
    Ok(Inflated {
        data: output,
        blocks,
    })
}
