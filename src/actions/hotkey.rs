//! Control group hotkeys (0x17 assign, 0x18 select).
//!
//! Groups are stored zero-based; the key on the keyboard is
//! `(group + 1) % 10`, so group 9 is key 0.

use serde::Serialize;

use super::types::ObjectId;
use crate::binary::ByteReader;
use crate::error::Result;

/// Assign or select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HotkeyOperation {
    /// Ctrl+number.
    Assign,
    /// Number.
    Select,
}

/// A control group action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HotkeyAction {
    /// Assign or select.
    pub operation: HotkeyOperation,
    /// Zero-based group index.
    pub group: u8,
    /// Objects put into the group (assign only).
    pub objects: Vec<ObjectId>,
}

impl HotkeyAction {
    /// Parses an assign body: group, `u16` count, 8 bytes per object.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the body is cut short.
    pub fn parse_assign(reader: &mut ByteReader<'_>) -> Result<Self> {
        let group = reader.read_u8()?;
        let count = reader.read_u16()?;
        let objects = (0..count)
            .map(|_| ObjectId::parse(reader))
            .collect::<Result<Vec<_>>>()?;
        Ok(HotkeyAction {
            operation: HotkeyOperation::Assign,
            group,
            objects,
        })
    }

    /// Parses a select body: group and one unknown byte.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the body is cut short.
    pub fn parse_select(reader: &mut ByteReader<'_>) -> Result<Self> {
        let group = reader.read_u8()?;
        reader.skip(1)?;
        Ok(HotkeyAction {
            operation: HotkeyOperation::Select,
            group,
            objects: Vec::new(),
        })
    }

    /// The number key for this group.
    #[must_use]
    pub fn key(&self) -> u8 {
        self.group.wrapping_add(1) % 10
    }
}
