//! Player records, Reforged player metadata and the slot table.
//!
//! # Player Record
//!
//! | Offset | Size | Type | Field |
//! |--------|------|------|-------|
//! | 0 | 1 | u8 | Record id (0x00 host, 0x16 joined player) |
//! | 1 | 1 | u8 | Player id |
//! | 2 | var | string | Player name (null-terminated) |
//! | var | 1 | u8 | Additional data length (1 custom, 8 ladder) |
//! | var | n | bytes | Additional data |
//!
//! Ladder records carry `u32` runtime and `u32` race flags in their 8
//! additional bytes. Other lengths occur in the wild (2 has been seen) and
//! are skipped by the declared length. Joined player records are followed
//! by 4 padding bytes.
//!
//! # Slot Table (0x19)
//!
//! | Offset | Size | Type | Field |
//! |--------|------|------|-------|
//! | 0 | 1 | u8 | Marker (0x19) |
//! | 1 | 2 | u16 | Byte count of the rest of the record |
//! | 3 | 1 | u8 | Slot count |
//! | 4 | n*s | bytes | Slot records, s = 7..=9 bytes each |
//! | var | 4 | u32 | Random seed |
//! | var | 1 | u8 | Select mode |
//! | var | 1 | u8 | Start spot count |
//!
//! Each slot record holds player id, download percent, status, computer
//! flag, team, color, race flags, and (by size) AI strength and handicap.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::binary::ByteReader;
use crate::error::{ParserError, Result};

/// Record id of the host player record.
pub const HOST_RECORD_ID: u8 = 0x00;

/// Record id of additional player records.
pub const PLAYER_RECORD_MARKER: u8 = 0x16;

/// Marker of the slot table record.
pub const SLOT_TABLE_MARKER: u8 = 0x19;

/// Marker of a Reforged metadata record.
pub const REFORGED_METADATA_MARKER: u8 = 0x39;

/// Reforged metadata subtype carrying one player's profile.
pub const REFORGED_PLAYER_SUBTYPE: u8 = 0x03;

/// Bytes in the slot table record that are not slot records.
const SLOT_TABLE_FIXED_BYTES: usize = 7;

/// Playable race, decoded from race flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Race {
    /// Human alliance (0x01).
    Human,
    /// Orc horde (0x02).
    Orc,
    /// Night elf sentinels (0x04).
    NightElf,
    /// Undead scourge (0x08).
    Undead,
    /// Random pick (0x20).
    Random,
    /// Any other value, kept after masking.
    Unknown(u8),
}

impl Race {
    /// Decodes race flags. The two high bits (`0x40` selectable/fixed and
    /// `0x80`) are cleared first.
    ///
    /// ```
    /// use w3g_replay::records::player::Race;
    ///
    /// assert_eq!(Race::from_flags(0x41), Race::Human);
    /// assert_eq!(Race::from_flags(0x60), Race::Random);
    /// assert_eq!(Race::from_flags(0x10), Race::Unknown(0x10));
    /// ```
    #[must_use]
    pub fn from_flags(flags: u32) -> Self {
        match (flags & 0x3F) as u8 {
            0x01 => Race::Human,
            0x02 => Race::Orc,
            0x04 => Race::NightElf,
            0x08 => Race::Undead,
            0x20 => Race::Random,
            other => Race::Unknown(other),
        }
    }

    /// Returns true for a concrete, playable race.
    #[must_use]
    pub fn is_concrete(self) -> bool {
        matches!(self, Race::Human | Race::Orc | Race::NightElf | Race::Undead)
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Race::Human => write!(f, "Human"),
            Race::Orc => write!(f, "Orc"),
            Race::NightElf => write!(f, "Night Elf"),
            Race::Undead => write!(f, "Undead"),
            Race::Random => write!(f, "Random"),
            Race::Unknown(raw) => write!(f, "Unknown({raw:#04x})"),
        }
    }
}

const COLOR_NAMES: [&str; 25] = [
    "red",
    "blue",
    "teal",
    "purple",
    "yellow",
    "orange",
    "green",
    "pink",
    "gray",
    "light blue",
    "dark green",
    "brown",
    "maroon",
    "navy",
    "turquoise",
    "violet",
    "wheat",
    "peach",
    "mint",
    "lavender",
    "coal",
    "snow",
    "emerald",
    "peanut",
    "observer",
];

/// Slot color id: 12 classic colors, 12 extended ones, and 24 for
/// observers. Unknown ids are kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Color(pub u8);

impl Color {
    /// Color id used for observer slots.
    pub const OBSERVER: Color = Color(24);

    /// Name of the color, if the id is known.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        COLOR_NAMES.get(usize::from(self.0)).copied()
    }

    /// True for the 12 colors older clients know about.
    #[must_use]
    pub fn is_classic(self) -> bool {
        self.0 < 12
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "color {}", self.0),
        }
    }
}

/// Occupancy of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotStatus {
    /// Open, nobody in it.
    Empty,
    /// Closed by the host.
    Closed,
    /// Taken by a player or computer.
    Used,
    /// Unknown status byte.
    Other(u8),
}

impl From<u8> for SlotStatus {
    fn from(raw: u8) -> Self {
        match raw {
            0 => SlotStatus::Empty,
            1 => SlotStatus::Closed,
            2 => SlotStatus::Used,
            other => SlotStatus::Other(other),
        }
    }
}

/// Who controls a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Controller {
    /// A human player.
    Human,
    /// A computer player.
    Computer,
}

/// Computer player difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AiStrength {
    /// Easy (0).
    Easy,
    /// Normal (1).
    Normal,
    /// Insane (2).
    Insane,
    /// Unknown value.
    Other(u8),
}

impl From<u8> for AiStrength {
    fn from(raw: u8) -> Self {
        match raw {
            0 => AiStrength::Easy,
            1 => AiStrength::Normal,
            2 => AiStrength::Insane,
            other => AiStrength::Other(other),
        }
    }
}

/// Ladder data from an 8-byte additional-data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LadderInfo {
    /// Client runtime in milliseconds.
    pub runtime_ms: u32,
    /// Declared race.
    pub race: Race,
}

/// A player record from the game setup, before reconciliation with slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerEntry {
    /// Record id (0x00 host, 0x16 joined player).
    pub record_id: u8,
    /// Player id.
    pub player_id: u8,
    /// Player name.
    pub name: String,
    /// Declared length of the additional data.
    pub additional_len: u8,
    /// Ladder fields, when the additional data is 8 bytes long.
    pub ladder: Option<LadderInfo>,
}

impl PlayerEntry {
    /// Parses a player record at the cursor.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if the record is cut short.
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let record_id = reader.read_u8()?;
        let player_id = reader.read_u8()?;
        let name = reader.read_cstring()?;
        let additional_len = reader.read_u8()?;
        let mut extra = reader.sub_reader(usize::from(additional_len))?;

        let ladder = if additional_len == 8 {
            Some(LadderInfo {
                runtime_ms: extra.read_u32()?,
                race: Race::from_flags(extra.read_u32()?),
            })
        } else {
            if additional_len != 1 {
                debug!(player_id, additional_len, "unusual player record data length");
            }
            None
        };

        Ok(PlayerEntry {
            record_id,
            player_id,
            name,
            additional_len,
            ladder,
        })
    }

    /// True for the host's record.
    #[must_use]
    pub fn is_host(&self) -> bool {
        self.record_id == HOST_RECORD_ID
    }
}

/// Profile data that Reforged attaches to each player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReforgedPlayerMetadata {
    /// Player id the profile belongs to.
    pub player_id: u8,
    /// Battle tag, e.g. `Happy#2384`.
    pub battle_tag: String,
    /// Clan tag, empty when none.
    pub clan: String,
    /// Portrait id.
    pub portrait: String,
}

/// Metadata reader for layouts without Reforged metadata.
///
/// # Errors
///
/// Never fails.
pub fn no_reforged_metadata(_reader: &mut ByteReader<'_>) -> Result<Vec<ReforgedPlayerMetadata>> {
    Ok(Vec::new())
}

/// Reads consecutive `0x39` metadata records at the cursor.
///
/// Subtype `0x03` holds one protobuf-encoded player profile; other subtypes
/// are skipped by their declared length. A profile that fails to decode is
/// logged and dropped. Zero records is not an error.
///
/// # Errors
///
/// Returns `OutOfBounds` if a record's declared length runs past the end
/// of the buffer.
pub fn read_reforged_metadata(reader: &mut ByteReader<'_>) -> Result<Vec<ReforgedPlayerMetadata>> {
    let mut profiles = Vec::new();
    while reader.peek_u8() == Some(REFORGED_METADATA_MARKER) {
        reader.skip(1)?;
        let subtype = reader.read_u8()?;
        let len = reader.read_u32()? as usize;
        let mut body = reader.sub_reader(len)?;
        if subtype != REFORGED_PLAYER_SUBTYPE {
            continue;
        }
        let offset = body.position();
        match decode_profile(&mut body) {
            Ok(profile) => profiles.push(profile),
            Err(e) => warn!(offset, error = %e, "dropping undecodable player profile"),
        }
    }
    debug!(count = profiles.len(), "read Reforged player metadata");
    Ok(profiles)
}

fn decode_profile(body: &mut ByteReader<'_>) -> Result<ReforgedPlayerMetadata> {
    let mut profile = ReforgedPlayerMetadata::default();
    while !body.is_empty() {
        let key_offset = body.position();
        let key = body.read_varint()?;
        match key & 0x07 {
            0 => {
                let value = body.read_varint()?;
                if key >> 3 == 1 {
                    profile.player_id = u8::try_from(value).map_err(|_| {
                        ParserError::malformed(key_offset, format!("player id {value} out of range"))
                    })?;
                }
            }
            1 => body.skip(8)?,
            2 => {
                let len = usize::try_from(body.read_varint()?).unwrap_or(usize::MAX);
                let text = crate::text::decode_best_effort(body.read_bytes(len)?);
                match key >> 3 {
                    2 => profile.battle_tag = text,
                    3 => profile.clan = text,
                    4 => profile.portrait = text,
                    _ => {}
                }
            }
            5 => body.skip(4)?,
            wire => {
                return Err(ParserError::malformed(
                    key_offset,
                    format!("unsupported protobuf wire type {wire}"),
                ))
            }
        }
    }
    Ok(profile)
}

/// One entry of the slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotRecord {
    /// Position in the slot table.
    pub index: u8,
    /// Player id, 0 for empty and computer slots.
    pub player_id: u8,
    /// Map download progress (0xFF when unknown).
    pub download_percent: u8,
    /// Occupancy.
    pub status: SlotStatus,
    /// Human or computer.
    pub controller: Controller,
    /// Team number.
    pub team: u8,
    /// Player color.
    pub color: Color,
    /// Race, with the two high flag bits cleared.
    pub race: Race,
    /// Computer difficulty (records of 8 bytes or more).
    pub ai_strength: Option<AiStrength>,
    /// Handicap in percent (9-byte records).
    pub handicap: Option<u8>,
    /// True when the slot sits in the observer team.
    pub observer: bool,
}

impl SlotRecord {
    fn parse(reader: &mut ByteReader<'_>, index: u8, size: usize, observer_team: u8) -> Result<Self> {
        let player_id = reader.read_u8()?;
        let download_percent = reader.read_u8()?;
        let status = SlotStatus::from(reader.read_u8()?);
        let controller = if reader.read_u8()? == 0 {
            Controller::Human
        } else {
            Controller::Computer
        };
        let team = reader.read_u8()?;
        let color = Color(reader.read_u8()?);
        let race = Race::from_flags(u32::from(reader.read_u8()?));
        let ai_strength = if size >= 8 {
            Some(AiStrength::from(reader.read_u8()?))
        } else {
            None
        };
        let handicap = if size >= 9 {
            Some(reader.read_u8()?)
        } else {
            None
        };

        if color.name().is_none() {
            warn!(slot = index, color = color.0, "unknown slot color id");
        }

        Ok(SlotRecord {
            index,
            player_id,
            download_percent,
            status,
            controller,
            team,
            color,
            race,
            ai_strength,
            handicap,
            observer: team == observer_team,
        })
    }

    /// True when someone (player or computer) occupies the slot.
    #[must_use]
    pub fn is_used(&self) -> bool {
        self.status == SlotStatus::Used
    }
}

/// The decoded slot table record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotTable {
    /// Slots in table order.
    pub slots: Vec<SlotRecord>,
    /// Size of each slot record in bytes.
    pub record_size: usize,
    /// Game random seed.
    pub random_seed: u32,
    /// Team/race selection mode.
    pub select_mode: u8,
    /// Number of start positions on the map.
    pub start_spot_count: u8,
}

impl SlotTable {
    /// Parses the slot table at the cursor, which must be on the 0x19
    /// marker. The cursor ends right after the record's declared length.
    ///
    /// # Errors
    ///
    /// - `MalformedRecord` if the marker is wrong or the slot record size
    ///   is not 7, 8 or 9 bytes
    /// - `OutOfBounds` if the record runs past the end of the buffer
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let offset = reader.position();
        let marker = reader.read_u8()?;
        if marker != SLOT_TABLE_MARKER {
            return Err(ParserError::malformed(
                offset,
                format!("expected slot table marker 0x19, found {marker:#04x}"),
            ));
        }
        let byte_count = usize::from(reader.read_u16()?);
        let mut body = reader.sub_reader(byte_count)?;
        let slot_count = body.read_u8()?;
        let record_size = slot_record_size(byte_count, slot_count).ok_or_else(|| {
            ParserError::malformed(
                offset,
                format!("{slot_count} slots do not fit a {byte_count}-byte slot table"),
            )
        })?;

        let observer_team = if slot_count > 12 { 24 } else { 12 };
        let mut slots = Vec::with_capacity(usize::from(slot_count));
        for index in 0..slot_count {
            let mut record = body.sub_reader(record_size)?;
            slots.push(SlotRecord::parse(&mut record, index, record_size, observer_team)?);
        }

        let random_seed = body.read_u32()?;
        let select_mode = body.read_u8()?;
        let start_spot_count = body.read_u8()?;
        debug!(slots = slots.len(), record_size, "parsed slot table");

        Ok(SlotTable {
            slots,
            record_size,
            random_seed,
            select_mode,
            start_spot_count,
        })
    }
}

/// Size of each slot record for a table of `byte_count` bytes, if valid.
///
/// Leftover bytes that do not make a whole record are ignored; the
/// table's declared byte count still decides where the next record starts.
#[must_use]
pub fn slot_record_size(byte_count: usize, slot_count: u8) -> Option<usize> {
    let slot_bytes = byte_count.checked_sub(SLOT_TABLE_FIXED_BYTES)?;
    if slot_count == 0 {
        return (slot_bytes == 0).then_some(0);
    }
    let count = usize::from(slot_count);
    let size = slot_bytes / count;
    (7..=9).contains(&size).then_some(size)
}

/// Finds the first plausible slot table at or after the cursor.
///
/// A candidate is a 0x19 byte whose length field and slot count describe
/// a valid table that fits in the buffer.
#[must_use]
pub fn find_slot_table(data: &[u8], from: usize) -> Option<usize> {
    (from..data.len()).find(|&pos| {
        data[pos] == SLOT_TABLE_MARKER
            && data.len() > pos + 3
            && {
                let byte_count = usize::from(u16::from_le_bytes([data[pos + 1], data[pos + 2]]));
                let slot_count = data[pos + 3];
                slot_count > 0
                    && pos + 3 + byte_count <= data.len()
                    && slot_record_size(byte_count, slot_count).is_some()
            }
    })
}
