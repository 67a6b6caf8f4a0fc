//! Selection actions (0x16 change selection, 0x19 select subgroup).

use serde::Serialize;

use super::ability::AbilityCode;
use super::types::ObjectId;
use crate::binary::ByteReader;
use crate::error::Result;

/// First build with the long subgroup layout (1.14b).
pub const BUILD_1_14B: u16 = 6040;

/// Whether units are added to or removed from the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectionMode {
    /// 0x01.
    Select,
    /// 0x02.
    Deselect,
    /// Any other mode byte.
    Other(u8),
}

impl From<u8> for SelectionMode {
    fn from(raw: u8) -> Self {
        match raw {
            0x01 => SelectionMode::Select,
            0x02 => SelectionMode::Deselect,
            other => SelectionMode::Other(other),
        }
    }
}

/// A change-selection action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionAction {
    /// Select or deselect.
    pub mode: SelectionMode,
    /// Objects affected.
    pub objects: Vec<ObjectId>,
}

impl SelectionAction {
    /// Parses the body: mode, `u16` count, then 8 bytes per object.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if fewer objects follow than the count says.
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let mode = SelectionMode::from(reader.read_u8()?);
        let count = reader.read_u16()?;
        let objects = (0..count)
            .map(|_| ObjectId::parse(reader))
            .collect::<Result<Vec<_>>>()?;
        Ok(SelectionAction { mode, objects })
    }
}

/// A select-subgroup action. Its layout changed in 1.14b.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Subgroup {
    /// Before 1.14b: one subgroup byte (0xFF and 0x00 are client updates).
    Index(u8),
    /// From 1.14b: the unit type and object now in focus.
    Focus {
        /// Unit type id.
        item: AbilityCode,
        /// Focused object.
        object: ObjectId,
    },
}

impl Subgroup {
    /// Parses the body for the given build.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the body is cut short.
    pub fn parse(reader: &mut ByteReader<'_>, build: u16) -> Result<Self> {
        if build < BUILD_1_14B {
            Ok(Subgroup::Index(reader.read_u8()?))
        } else {
            Ok(Subgroup::Focus {
                item: AbilityCode::from_raw(reader.read_array()?),
                object: ObjectId::parse(reader)?,
            })
        }
    }

    /// True when the subgroup change was made by the player.
    #[must_use]
    pub fn is_player_initiated(&self) -> bool {
        matches!(self, Subgroup::Index(index) if *index != 0x00 && *index != 0xFF)
    }
}
