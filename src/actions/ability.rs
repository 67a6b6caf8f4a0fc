//! Ability commands (0x10-0x14) and item identifiers.
//!
//! All five ability actions share a prefix:
//!
//! | Size | Field |
//! |------|-------|
//! | 1 or 2 | Flags (1 byte before 1.13, 2 bytes from 1.13) |
//! | 4 | Item/ability id |
//! | 8 | Unknown (from 1.07) |
//!
//! and then extend it with a target point (0x11), a target object (0x12),
//! an item to give (0x13) or a second ability with its own point (0x14).

use std::fmt;

use serde::{Serialize, Serializer};

use super::types::ObjectId;
use crate::binary::ByteReader;
use crate::error::Result;
use crate::records::player::Race;

/// First build whose ability actions carry 8 extra bytes (1.07).
pub const BUILD_1_07: u16 = 6031;

/// First build whose ability flags are two bytes wide (1.13).
pub const BUILD_1_13: u16 = 6037;

/// An item, unit or ability id.
///
/// String ids are stored reversed (`htow` is stored as `woth`); numeric
/// command ids end in `0x0D 0x00` and are stored as-is.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbilityCode([u8; 4]);

impl AbilityCode {
    /// Creates an `AbilityCode` from raw bytes as stored in the replay.
    #[must_use]
    pub fn from_raw(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Creates an `AbilityCode` from its readable form, e.g. `b"hpea"`.
    #[must_use]
    pub fn from_fourcc(code: [u8; 4]) -> Self {
        Self([code[3], code[2], code[1], code[0]])
    }

    /// Gets the raw bytes as stored in the replay.
    #[must_use]
    pub fn raw_bytes(&self) -> [u8; 4] {
        self.0
    }

    /// True for numeric command ids such as right-click or stop.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.0[2..] == [0x0D, 0x00]
    }

    /// The readable id: reversed for string ids, unchanged for numeric ones.
    #[must_use]
    pub fn canonical(&self) -> [u8; 4] {
        if self.is_numeric() {
            self.0
        } else {
            [self.0[3], self.0[2], self.0[1], self.0[0]]
        }
    }

    /// The race whose worker or town hall this id names, if any.
    ///
    /// Used to resolve the race of players who picked random.
    #[must_use]
    pub fn race_hint(&self) -> Option<Race> {
        match &self.canonical() {
            b"emow" | b"etoa" | b"etol" | b"ewsp" => Some(Race::NightElf),
            b"hpea" | b"htow" => Some(Race::Human),
            b"otrb" | b"ogre" | b"opeo" => Some(Race::Orc),
            b"uaco" | b"uzig" | b"unpl" => Some(Race::Undead),
            _ => None,
        }
    }

    /// Name of a numeric command, if known.
    #[must_use]
    pub fn command_name(&self) -> Option<&'static str> {
        if !self.is_numeric() {
            return None;
        }
        let name = match u16::from_le_bytes([self.0[0], self.0[1]]) {
            0x03 => "right-click",
            0x04 => "stop",
            0x08 => "cancel",
            0x0C => "set rally point",
            0x0F => "attack",
            0x10 => "attack ground",
            0x12 => "move",
            0x16 => "patrol",
            0x19 => "hold position",
            0x21 => "give item",
            0x22..=0x27 => "swap item",
            0x28..=0x2D => "use item",
            0x31 => "return resources",
            0x32 => "mine",
            0x3B..=0x3F => "revive hero",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Debug for AbilityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AbilityCode({self})")
    }
}

impl fmt::Display for AbilityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.command_name() {
            return f.write_str(name);
        }
        if self.is_numeric() {
            return write!(f, "command {:#06x}", u16::from_le_bytes([self.0[0], self.0[1]]));
        }
        let canonical = self.canonical();
        if canonical.iter().all(u8::is_ascii_graphic) {
            f.write_str(&String::from_utf8_lossy(&canonical))
        } else {
            write!(f, "{:02X}{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2], self.0[3])
        }
    }
}

impl Serialize for AbilityCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which of the five ability actions this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AbilityKind {
    /// 0x10, no target.
    NoTarget,
    /// 0x11, target point.
    Point,
    /// 0x12, target point and object.
    Object,
    /// 0x13, give an item to an object.
    GiveItem,
    /// 0x14, two abilities with two points.
    Double,
}

/// Target data of an ability action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum AbilityTarget {
    /// No target.
    None,
    /// A point on the map.
    Point {
        /// X coordinate.
        x: f32,
        /// Y coordinate.
        y: f32,
    },
    /// An object at a point.
    Object {
        /// X coordinate.
        x: f32,
        /// Y coordinate.
        y: f32,
        /// Targeted object.
        object: ObjectId,
    },
    /// An item handed to an object.
    GiveItem {
        /// X coordinate.
        x: f32,
        /// Y coordinate.
        y: f32,
        /// Receiving object.
        object: ObjectId,
        /// Item given.
        item: ObjectId,
    },
    /// A second ability at a second point.
    Double {
        /// First X coordinate.
        x: f32,
        /// First Y coordinate.
        y: f32,
        /// Second ability id.
        second: AbilityCode,
        /// Second X coordinate.
        x2: f32,
        /// Second Y coordinate.
        y2: f32,
    },
}

/// A decoded ability action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AbilityAction {
    /// Which ability action this is.
    pub kind: AbilityKind,
    /// Order flags (queue, group command, autocast toggle, ...).
    pub flags: u16,
    /// Ability, unit or item id.
    pub ability_code: AbilityCode,
    /// Target data.
    pub target: AbilityTarget,
}

impl AbilityAction {
    /// Parses an ability action body (after the action id).
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the body is shorter than the kind requires.
    pub fn parse(reader: &mut ByteReader<'_>, kind: AbilityKind, build: u16) -> Result<Self> {
        let flags = if build < BUILD_1_13 {
            u16::from(reader.read_u8()?)
        } else {
            reader.read_u16()?
        };
        let ability_code = AbilityCode::from_raw(reader.read_array()?);
        if build >= BUILD_1_07 {
            reader.skip(8)?;
        }

        let target = match kind {
            AbilityKind::NoTarget => AbilityTarget::None,
            AbilityKind::Point => AbilityTarget::Point {
                x: reader.read_f32()?,
                y: reader.read_f32()?,
            },
            AbilityKind::Object => AbilityTarget::Object {
                x: reader.read_f32()?,
                y: reader.read_f32()?,
                object: ObjectId::parse(reader)?,
            },
            AbilityKind::GiveItem => AbilityTarget::GiveItem {
                x: reader.read_f32()?,
                y: reader.read_f32()?,
                object: ObjectId::parse(reader)?,
                item: ObjectId::parse(reader)?,
            },
            AbilityKind::Double => {
                let x = reader.read_f32()?;
                let y = reader.read_f32()?;
                let second = AbilityCode::from_raw(reader.read_array()?);
                reader.skip(9)?;
                AbilityTarget::Double {
                    x,
                    y,
                    second,
                    x2: reader.read_f32()?,
                    y2: reader.read_f32()?,
                }
            }
        };

        Ok(AbilityAction {
            kind,
            flags,
            ability_code,
            target,
        })
    }

    /// The race this action reveals, from either ability id.
    #[must_use]
    pub fn race_hint(&self) -> Option<Race> {
        self.ability_code.race_hint().or(match self.target {
            AbilityTarget::Double { second, .. } => second.race_hint(),
            _ => None,
        })
    }

    /// True when the order was queued with shift.
    #[must_use]
    pub fn is_queued(&self) -> bool {
        self.flags & 0x0001 != 0
    }
}
