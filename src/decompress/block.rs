//! Compressed block sub-headers and single-block inflation.
//!
//! # Block Header Layouts
//!
//! Legacy and classic replays (8 bytes):
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00 | 2 | compressed size |
//! | 0x02 | 2 | decompressed size (0x2000) |
//! | 0x04 | 4 | checksum |
//!
//! Reforged replays (12 bytes):
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00 | 4 | compressed size |
//! | 0x04 | 4 | decompressed size (0x2000) |
//! | 0x08 | 4 | checksum |

use flate2::{Decompress, FlushDecompress, Status};
use serde::Serialize;

use crate::binary::ByteReader;
use crate::error::{ParserError, Result};

/// The usual decompressed size of a block.
pub const BLOCK_DECOMPRESSED_SIZE: usize = 8192;

/// A decoded block sub-header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockHeader {
    /// Bytes of zlib data following the sub-header.
    pub compressed_size: u32,
    /// Bytes the zlib data must inflate to.
    pub decompressed_size: u32,
    /// Block checksum.
    pub checksum: u32,
}

/// Reads an 8-byte block sub-header.
///
/// # Errors
///
/// Returns `OutOfBounds` if fewer than 8 bytes remain.
pub fn read_short_block_header(reader: &mut ByteReader<'_>) -> Result<BlockHeader> {
    Ok(BlockHeader {
        compressed_size: u32::from(reader.read_u16()?),
        decompressed_size: u32::from(reader.read_u16()?),
        checksum: reader.read_u32()?,
    })
}

/// Reads a 12-byte Reforged block sub-header.
///
/// # Errors
///
/// Returns `OutOfBounds` if fewer than 12 bytes remain.
pub fn read_reforged_block_header(reader: &mut ByteReader<'_>) -> Result<BlockHeader> {
    Ok(BlockHeader {
        compressed_size: reader.read_u32()?,
        decompressed_size: reader.read_u32()?,
        checksum: reader.read_u32()?,
    })
}

/// Bytes inflated per step.
const INFLATE_CHUNK: usize = 16 * 1024;

/// Inflates one block to exactly `expected` bytes.
///
/// Output beyond `expected` is never produced, and a zlib stream that is
/// not properly terminated is accepted once `expected` bytes are out.
///
/// # Errors
///
/// Returns `CorruptBlock` naming `block` if the stream is invalid,
/// inflates to fewer than `expected` bytes, or ends before the declared
/// compressed length is used up.
pub fn inflate_block(compressed: &[u8], expected: usize, block: usize) -> Result<Vec<u8>> {
    let mut inflater = Decompress::new(true);
    let mut output = Vec::with_capacity(expected.min(BLOCK_DECOMPRESSED_SIZE));
    let mut chunk = vec![0u8; expected.min(INFLATE_CHUNK)];
    let mut ended = false;

    while output.len() < expected {
        let consumed = total_in(&inflater);
        let input = compressed.get(consumed..).unwrap_or_default();
        let before_out = inflater.total_out();
        let want = (expected - output.len()).min(chunk.len());

        let status = inflater
            .decompress(input, &mut chunk[..want], FlushDecompress::None)
            .map_err(|e| ParserError::CorruptBlock {
                block,
                reason: format!("zlib error: {e}"),
            })?;

        let produced = usize::try_from(inflater.total_out() - before_out).unwrap_or(want);
        output.extend_from_slice(&chunk[..produced.min(want)]);

        if status == Status::StreamEnd {
            ended = true;
            break;
        }
        if produced == 0 && total_in(&inflater) == consumed {
            break;
        }
    }

    if output.len() != expected {
        return Err(ParserError::CorruptBlock {
            block,
            reason: format!("inflated to {} bytes, declared {expected}", output.len()),
        });
    }

    if !ended {
        ended = finish_stream(&mut inflater, compressed);
    }
    let used = total_in(&inflater);
    if ended && used < compressed.len() {
        return Err(ParserError::CorruptBlock {
            block,
            reason: format!(
                "zlib stream ends after {used} of {} declared compressed bytes",
                compressed.len()
            ),
        });
    }
    Ok(output)
}

fn total_in(inflater: &Decompress) -> usize {
    usize::try_from(inflater.total_in()).unwrap_or(usize::MAX)
}

/// Consumes the end-of-stream trailer once all declared output is out.
///
/// Returns false when the stream carries more output or no valid trailer.
fn finish_stream(inflater: &mut Decompress, compressed: &[u8]) -> bool {
    let input = compressed.get(total_in(inflater)..).unwrap_or_default();
    let before_out = inflater.total_out();
    let mut spare = [0u8; 1];
    matches!(
        inflater.decompress(input, &mut spare, FlushDecompress::Finish),
        Ok(Status::StreamEnd)
    ) && inflater.total_out() == before_out
}
