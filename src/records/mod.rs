//! Decompressed data record parsing for W3G replay files.
//!
//! This module provides parsers for the record types found in the decoded
//! replay payload:
//!
//! - **Game setup**: host player, game name, encoded settings
//! - **Player records**: one per joined player
//! - **Reforged metadata**: player profiles in newer replays
//! - **Slot table**: team, color and race per slot
//! - **Event stream**: time slots with actions, chat, leave records
//!
//! # Record Structure Overview
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Unknown prefix (usually 0x00000110) |
//! | 4 | var | Host player record |
//! | var | var | Game name (null-terminated) and one null byte |
//! | var | var | Encoded settings string (null-terminated) |
//! | var | 4 | Player count |
//! | var | 1 | Game type |
//! | var | 1 | Private flag (0x08 private, 0x00 public) |
//! | var | 2 | Unknown |
//! | var | 4 | Language id |
//! | var | var | Player records (0x16), each followed by 4 bytes |
//! | var | var | Reforged metadata records (0x39) |
//! | var | var | Slot table (0x19) |
//! | var | var | Event stream |
//!
//! # Example
//!
//! ```ignore
//! use w3g_replay::decompress::decompress;
//! use w3g_replay::header::ReplayHeader;
//! use w3g_replay::records::GameRecord;
//!
//! let header = ReplayHeader::parse(&data)?;
//! let inflated = decompress(&data, &header)?;
//! let record = GameRecord::parse(&inflated.data, header.layout()?)?;
//! println!("Host: {}", record.metadata.host_name);
//! ```

pub mod event;
pub mod game_header;
pub mod player;
pub mod roster;
pub mod stream;

pub use event::{
    format_clock, ChatMessage, ChatMode, Countdown, CountdownMode, Event, EventKind, LeaveGame,
    LeaveOutcome, LeaveReason, PlayerResult,
};
pub use game_header::{GameMetadata, GameSettings, GameSpeed, GameType, ObserverMode, Visibility};
pub use player::{
    AiStrength, Color, Controller, LadderInfo, PlayerEntry, Race, ReforgedPlayerMetadata,
    SlotRecord, SlotStatus, SlotTable,
};
pub use roster::{PlayerLeave, PlayerRecord, Roster};
pub use stream::{read_record, EventStream, LengthRule, Record, StreamContext};

use tracing::{debug, warn};

use crate::binary::ByteReader;
use crate::error::{ParserError, Result};
use crate::format::Layout;
use player::{find_slot_table, PLAYER_RECORD_MARKER, SLOT_TABLE_MARKER};

/// Usual value of the 4-byte prefix of the decoded payload.
pub const GAME_RECORD_PREFIX: u32 = 0x0000_0110;

/// Private flag value for private games.
const PRIVATE_GAME: u8 = 0x08;

/// Everything in the decoded payload before the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    /// The 4-byte prefix.
    pub prefix: u32,

    /// Player records in order, host first.
    pub players: Vec<PlayerEntry>,

    /// Match-level metadata.
    pub metadata: GameMetadata,

    /// Reforged player profiles.
    pub reforged: Vec<ReforgedPlayerMetadata>,

    /// The slot table.
    pub slots: SlotTable,

    /// Offset where the event stream begins.
    pub stream_offset: usize,
}

impl GameRecord {
    /// Parses the setup records of a decoded payload.
    ///
    /// # Errors
    ///
    /// - `OutOfBounds` if a record is cut short
    /// - `MalformedRecord` if the settings or the slot table are malformed,
    ///   or no slot table can be found
    pub fn parse(data: &[u8], layout: &Layout) -> Result<Self> {
        let mut reader = ByteReader::new(data);

        let prefix = reader.read_u32()?;
        if prefix != GAME_RECORD_PREFIX {
            debug!(prefix = format_args!("{prefix:#010x}"), "unusual game record prefix");
        }

        let host = PlayerEntry::parse(&mut reader)?;
        let game_name = reader.read_cstring()?;
        reader.skip(1)?;

        let settings_offset = reader.position();
        let encoded = reader.read_cstring_bytes()?;
        let settings = GameSettings::decode(encoded, settings_offset)?;

        let player_count = reader.read_u32()?;
        let game_type = GameType::from(reader.read_u8()?);
        let private = reader.read_u8()? == PRIVATE_GAME;
        reader.skip(2)?;
        let language_id = reader.read_u32()?;

        let mut players = vec![host];
        while reader.peek_u8() == Some(PLAYER_RECORD_MARKER) {
            players.push(PlayerEntry::parse(&mut reader)?);
            reader.skip(4)?;
        }
        debug!(players = players.len(), game = %game_name, "parsed player records");

        let reforged = (layout.read_reforged_metadata)(&mut reader)?;

        if reader.peek_u8() != Some(SLOT_TABLE_MARKER) {
            let from = reader.position();
            let found = find_slot_table(data, from).ok_or_else(|| {
                ParserError::malformed(from, "no slot table after player records")
            })?;
            warn!(
                expected = from,
                found,
                skipped = found - from,
                "unrecognized bytes before slot table; resynchronized"
            );
            reader = ByteReader::at(data, found)?;
        }
        let slots = SlotTable::parse(&mut reader)?;

        let metadata = GameMetadata {
            game_name,
            host_name: players[0].name.clone(),
            settings,
            game_type,
            private,
            player_count,
            language_id,
            random_seed: slots.random_seed,
            select_mode: slots.select_mode,
            start_spot_count: slots.start_spot_count,
        };

        Ok(GameRecord {
            prefix,
            players,
            metadata,
            reforged,
            slots,
            stream_offset: reader.position(),
        })
    }

    /// The host's player record.
    #[must_use]
    pub fn host(&self) -> &PlayerEntry {
        &self.players[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatVersion;
    use crate::records::game_header::encode_string;

    fn settings_string() -> Vec<u8> {
        let mut raw = vec![0x02, 0b0100_1000, 0b0000_0110, 0b0000_0001, 0, 0, 0, 0, 0];
        raw.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        raw.extend_from_slice(b"Maps\\(2)EchoIsles.w3x\0Creator\0");
        let mut encoded = encode_string(&raw);
        encoded.push(0);
        encoded
    }

    fn player(record_id: u8, id: u8, name: &str, extra: &[u8]) -> Vec<u8> {
        let mut data = vec![record_id, id];
        data.extend_from_slice(name.as_bytes());
        data.push(0);
        data.push(u8::try_from(extra.len()).unwrap());
        data.extend_from_slice(extra);
        data
    }

    fn setup(extra_players: &[(u8, &str, &[u8])], between: &[u8]) -> Vec<u8> {
        let mut data = GAME_RECORD_PREFIX.to_le_bytes().to_vec();
        data.extend(player(0x00, 1, "Host", &[0]));
        data.extend_from_slice(b"Game\0\0");
        data.extend(settings_string());
        data.extend_from_slice(&2u32.to_le_bytes());
        data.push(0x09);
        data.push(0x08);
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&0x0409u32.to_le_bytes());
        for (id, name, extra) in extra_players {
            data.extend(player(0x16, *id, name, extra));
            data.extend_from_slice(&[0; 4]);
        }
        data.extend_from_slice(between);

        // slot table with two 9-byte slots
        data.push(0x19);
        data.extend_from_slice(&25u16.to_le_bytes());
        data.push(2);
        data.extend_from_slice(&[1, 100, 2, 0, 0, 0, 0x01, 1, 100]);
        data.extend_from_slice(&[2, 100, 2, 0, 1, 1, 0x08, 1, 100]);
        data.extend_from_slice(&7u32.to_le_bytes());
        data.push(0);
        data.push(2);
        data
    }

    #[test]
    fn test_parse_setup() {
        let data = setup(&[(2, "Guest", &[0][..])], &[]);
        let record = GameRecord::parse(&data, FormatVersion::Classic.layout().unwrap()).unwrap();

        assert_eq!(record.prefix, GAME_RECORD_PREFIX);
        assert_eq!(record.players.len(), 2);
        assert_eq!(record.host().name, "Host");
        assert_eq!(record.metadata.game_name, "Game");
        assert_eq!(record.metadata.host_name, "Host");
        assert_eq!(record.metadata.map_name(), "(2)EchoIsles.w3x");
        assert_eq!(record.metadata.settings.creator, "Creator");
        assert_eq!(record.metadata.game_type, GameType::Custom);
        assert!(record.metadata.private);
        assert_eq!(record.metadata.random_seed, 7);
        assert_eq!(record.slots.slots.len(), 2);
        assert_eq!(record.slots.slots[1].race, Race::Undead);
        assert_eq!(record.stream_offset, data.len());
    }

    #[test]
    fn test_custom_or_ladder_two_keeps_alignment() {
        let data = setup(&[(2, "Odd", &[0xAA, 0xBB][..]), (3, "Next", &[0][..])], &[]);
        let record = GameRecord::parse(&data, FormatVersion::Classic.layout().unwrap()).unwrap();
        assert_eq!(record.players.len(), 3);
        assert_eq!(record.players[1].additional_len, 2);
        assert_eq!(record.players[2].name, "Next");
        assert_eq!(record.slots.slots.len(), 2);
    }

    #[test]
    fn test_reforged_metadata_skipped_by_length() {
        let mut meta = vec![0x39, 0x04];
        meta.extend_from_slice(&3u32.to_le_bytes());
        meta.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let data = setup(&[(2, "Guest", &[0][..])], &meta);

        let record = GameRecord::parse(&data, FormatVersion::Reforged.layout().unwrap()).unwrap();
        assert!(record.reforged.is_empty());
        assert_eq!(record.slots.slots.len(), 2);
    }

    #[test]
    fn test_resync_on_unknown_bytes() {
        let data = setup(&[(2, "Guest", &[0][..])], &[0x55, 0x66, 0x77]);
        let record = GameRecord::parse(&data, FormatVersion::Classic.layout().unwrap()).unwrap();
        assert_eq!(record.slots.slots.len(), 2);
        assert_eq!(record.stream_offset, data.len());
    }

    #[test]
    fn test_missing_slot_table() {
        let mut data = setup(&[], &[]);
        let slot_start = data.len() - 28;
        data.truncate(slot_start);
        let err = GameRecord::parse(&data, FormatVersion::Classic.layout().unwrap()).unwrap_err();
        assert!(matches!(err, ParserError::MalformedRecord { .. }));
    }
}
