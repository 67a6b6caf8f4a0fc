//! Bounds-checked binary reading for W3G replay data.
//!
//! [`ByteReader`] is a forward cursor over a byte buffer. Every read checks
//! the remaining length first and fails with [`ParserError::OutOfBounds`]
//! carrying the absolute offset of the failed read, so errors raised deep
//! inside a record still point at the right place in the file.
//!
//! # Endianness
//!
//! All W3G replay formats use little-endian byte order for multi-byte
//! integers and IEEE-754 floats.
//!
//! # Example
//!
//! ```
//! use w3g_replay::binary::ByteReader;
//!
//! let data = [0x26, 0x89, 0x01, 0x00, b'H', b'i', 0x00];
//! let mut reader = ByteReader::new(&data);
//!
//! assert_eq!(reader.read_u32().unwrap(), 0x0001_8926);
//! assert_eq!(reader.read_cstring().unwrap(), "Hi");
//! assert_eq!(reader.remaining(), 0);
//! ```

use crate::error::{ParserError, Result};
use crate::text::decode_best_effort;

/// A forward-only cursor over a byte buffer.
///
/// Cursors created with [`ByteReader::sub_reader`] keep the absolute offset
/// of their first byte so that error offsets stay file-relative.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
    base: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            base: 0,
        }
    }

    /// Creates a reader positioned at `offset` within `data`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if `offset` lies past the end of `data`.
    pub fn at(data: &'a [u8], offset: usize) -> Result<Self> {
        if offset > data.len() {
            return Err(ParserError::OutOfBounds {
                offset,
                needed: 0,
                available: 0,
            });
        }
        Ok(Self {
            data,
            position: offset,
            base: 0,
        })
    }

    /// Absolute offset of the next byte to be read.
    #[must_use]
    pub fn position(&self) -> usize {
        self.base + self.position
    }

    /// Number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Returns true when every byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The unread bytes, without consuming them.
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if needed > self.remaining() {
            return Err(ParserError::OutOfBounds {
                offset: self.position(),
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    /// Returns the next `len` bytes without consuming them.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if fewer than `len` bytes remain.
    pub fn peek(&self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        Ok(&self.data[self.position..self.position + len])
    }

    /// Returns the next byte without consuming it, or `None` at the end.
    #[must_use]
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.position).copied()
    }

    /// Consumes and returns the next `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self.peek(len)?;
        self.position += len;
        Ok(bytes)
    }

    /// Consumes exactly `N` bytes into an array.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if fewer than `N` bytes remain.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Advances the cursor by `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if fewer than `len` bytes remain.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` at the end of the buffer.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a little-endian u16.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if fewer than 2 bytes remain.
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Reads a little-endian u32.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if fewer than 4 bytes remain.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Reads a little-endian f32.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if fewer than 4 bytes remain.
    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    /// Reads an unsigned little-endian integer of 1, 2 or 4 bytes.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the value does not fit in the remaining
    /// bytes, or `MalformedRecord` for any other width.
    ///
    /// # Example
    ///
    /// ```
    /// use w3g_replay::binary::ByteReader;
    ///
    /// let mut reader = ByteReader::new(&[0x34, 0x12, 0x07]);
    /// assert_eq!(reader.read_uint(2).unwrap(), 0x1234);
    /// assert_eq!(reader.read_uint(1).unwrap(), 7);
    /// ```
    pub fn read_uint(&mut self, width: usize) -> Result<u32> {
        match width {
            1 => self.read_u8().map(u32::from),
            2 => self.read_u16().map(u32::from),
            4 => self.read_u32(),
            _ => Err(ParserError::malformed(
                self.position(),
                format!("unsupported integer width {width}"),
            )),
        }
    }

    /// Reads a null-terminated string and consumes the terminator.
    ///
    /// A string running to the end of the buffer without a terminator is
    /// returned as-is. Bytes are decoded with
    /// [`decode_best_effort`](crate::text::decode_best_effort).
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the cursor is already at the end.
    pub fn read_cstring(&mut self) -> Result<String> {
        let raw = self.read_cstring_bytes()?;
        Ok(decode_best_effort(raw))
    }

    /// Reads the raw bytes of a null-terminated string, consuming the
    /// terminator but not returning it.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the cursor is already at the end.
    pub fn read_cstring_bytes(&mut self) -> Result<&'a [u8]> {
        self.ensure(1)?;
        let rest = self.rest();
        match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                self.position += end + 1;
                Ok(&rest[..end])
            }
            None => {
                self.position = self.data.len();
                Ok(rest)
            }
        }
    }

    /// Reads a protobuf base-128 varint (at most 10 bytes).
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the buffer ends inside the varint, or
    /// `MalformedRecord` if it is longer than 10 bytes.
    pub fn read_varint(&mut self) -> Result<u64> {
        let start = self.position();
        let mut value = 0u64;
        for shift in (0..70).step_by(7) {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ParserError::malformed(start, "varint longer than 10 bytes"))
    }

    /// Splits off a bounded reader over the next `len` bytes and advances
    /// past them.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if fewer than `len` bytes remain.
    pub fn sub_reader(&mut self, len: usize) -> Result<ByteReader<'a>> {
        let base = self.position();
        let data = self.read_bytes(len)?;
        Ok(ByteReader {
            data,
            position: 0,
            base,
        })
    }
}

/// Returns bit `index` of `byte`.
#[must_use]
pub fn bit(byte: u8, index: u8) -> bool {
    (byte >> index) & 1 == 1
}

/// Extracts `width` bits of `byte` starting at bit `low`.
///
/// ```
/// use w3g_replay::binary::bit_field;
///
/// assert_eq!(bit_field(0b0011_0000, 4, 2), 3);
/// ```
#[must_use]
pub fn bit_field(byte: u8, low: u8, width: u8) -> u8 {
    let mask = if width >= 8 { 0xFF } else { (1u8 << width) - 1 };
    (byte >> low) & mask
}
