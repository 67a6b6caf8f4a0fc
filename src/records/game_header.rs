//! Game settings and match metadata.
//!
//! The game setup record stores its settings as an "encoded string": every
//! eighth byte (starting with the first) is a mask, and each following byte
//! was incremented by one unless its bit in the mask is set. This keeps
//! the string free of zero bytes. The decoded string is:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 1 | Game speed (bits 0-1) |
//! | 1 | 1 | Visibility (bits 0-3), observers (bits 4-5), teams together (bit 6) |
//! | 2 | 1 | Fixed teams (bits 1-2) |
//! | 3 | 1 | Shared unit control (bit 0), random hero (bit 1), random races (bit 2), observer referees (bit 6) |
//! | 4 | 5 | Unknown |
//! | 9 | 4 | Map checksum |
//! | 13 | var | Map path (null-terminated) |
//! | var | var | Creator name (null-terminated) |

use std::fmt;

use serde::Serialize;

use crate::binary::{bit, bit_field, ByteReader};
use crate::error::{ParserError, Result};

/// Length of the fixed settings block inside the decoded string.
pub const SETTINGS_LEN: usize = 13;

/// Game speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GameSpeed {
    /// Slow (0).
    Slow,
    /// Normal (1).
    Normal,
    /// Fast (2).
    Fast,
    /// Any other value.
    Unknown(u8),
}

impl From<u8> for GameSpeed {
    fn from(raw: u8) -> Self {
        match raw {
            0 => GameSpeed::Slow,
            1 => GameSpeed::Normal,
            2 => GameSpeed::Fast,
            other => GameSpeed::Unknown(other),
        }
    }
}

impl fmt::Display for GameSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameSpeed::Slow => write!(f, "slow"),
            GameSpeed::Normal => write!(f, "normal"),
            GameSpeed::Fast => write!(f, "fast"),
            GameSpeed::Unknown(raw) => write!(f, "speed {raw}"),
        }
    }
}

/// Map visibility setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Visibility {
    /// Hide terrain.
    HideTerrain,
    /// Map explored.
    MapExplored,
    /// Always visible.
    AlwaysVisible,
    /// Default fog of war.
    Default,
    /// No single visibility bit set.
    Unknown(u8),
}

impl Visibility {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0b0001 => Visibility::HideTerrain,
            0b0010 => Visibility::MapExplored,
            0b0100 => Visibility::AlwaysVisible,
            0b1000 => Visibility::Default,
            other => Visibility::Unknown(other),
        }
    }
}

/// Observer setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObserverMode {
    /// No observers.
    Off,
    /// Value 1, not used by the game.
    Unused,
    /// Defeated players become observers.
    OnDefeat,
    /// Full observers allowed.
    Full,
}

impl ObserverMode {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => ObserverMode::Off,
            1 => ObserverMode::Unused,
            2 => ObserverMode::OnDefeat,
            _ => ObserverMode::Full,
        }
    }
}

/// Settings decoded from the encoded string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameSettings {
    /// Game speed.
    pub speed: GameSpeed,
    /// Map visibility.
    pub visibility: Visibility,
    /// Observer mode.
    pub observers: ObserverMode,
    /// Allies are placed together.
    pub teams_together: bool,
    /// Teams are locked.
    pub fixed_teams: bool,
    /// Allies share full unit control.
    pub full_shared_unit_control: bool,
    /// Heroes are picked at random.
    pub random_hero: bool,
    /// Races are picked at random.
    pub random_races: bool,
    /// Observers act as referees.
    pub observer_referees: bool,
    /// Map checksum.
    pub map_checksum: u32,
    /// Map path, e.g. `Maps\FrozenThrone\(2)EchoIsles.w3x`.
    pub map_path: String,
    /// Name of the player who created the game.
    pub creator: String,
}

impl GameSettings {
    /// Decodes settings from the raw encoded string.
    ///
    /// `offset` is the position of the encoded string in the payload and is
    /// only used for error reporting.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if the decoded string is shorter than the
    /// fixed settings block.
    pub fn decode(encoded: &[u8], offset: usize) -> Result<Self> {
        let decoded = decode_encoded_string(encoded);
        if decoded.len() < SETTINGS_LEN {
            return Err(ParserError::malformed(
                offset,
                format!("encoded settings decode to {} bytes", decoded.len()),
            ));
        }

        let mut tail = ByteReader::new(&decoded[SETTINGS_LEN..]);
        let map_path = tail.read_cstring().unwrap_or_default();
        let creator = if tail.is_empty() {
            String::new()
        } else {
            tail.read_cstring()?
        };

        Ok(GameSettings {
            speed: GameSpeed::from(bit_field(decoded[0], 0, 2)),
            visibility: Visibility::from_bits(bit_field(decoded[1], 0, 4)),
            observers: ObserverMode::from_bits(bit_field(decoded[1], 4, 2)),
            teams_together: bit(decoded[1], 6),
            fixed_teams: bit_field(decoded[2], 1, 2) != 0,
            full_shared_unit_control: bit(decoded[3], 0),
            random_hero: bit(decoded[3], 1),
            random_races: bit(decoded[3], 2),
            observer_referees: bit(decoded[3], 6),
            map_checksum: u32::from_le_bytes([decoded[9], decoded[10], decoded[11], decoded[12]]),
            map_path,
            creator,
        })
    }
}

/// Decodes the mask-byte encoding used for the settings string.
///
/// ```
/// use w3g_replay::records::game_header::decode_encoded_string;
///
/// // Mask 0b0000_0100: byte 2 is stored as-is, byte 1 was incremented.
/// assert_eq!(decode_encoded_string(&[0x04, 0x02, 0x07]), vec![0x01, 0x07]);
/// ```
#[must_use]
pub fn decode_encoded_string(encoded: &[u8]) -> Vec<u8> {
    let mut decoded = Vec::with_capacity(encoded.len());
    let mut mask = 0u8;
    for (index, &byte) in encoded.iter().enumerate() {
        let position = (index % 8) as u8;
        if position == 0 {
            mask = byte;
        } else if bit(mask, position) {
            decoded.push(byte);
        } else {
            decoded.push(byte.wrapping_sub(1));
        }
    }
    decoded
}

/// Encodes bytes with the mask-byte scheme. Zero bytes are stored with a
/// cleared mask bit, every other byte as-is.
#[must_use]
pub fn encode_string(raw: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(raw.len() + raw.len() / 7 + 1);
    for chunk in raw.chunks(7) {
        let mut mask = 1u8;
        for (i, &byte) in chunk.iter().enumerate() {
            if byte != 0 {
                mask |= 1 << (i + 1);
            }
        }
        encoded.push(mask);
        for &byte in chunk {
            encoded.push(if byte == 0 { 1 } else { byte });
        }
    }
    encoded
}

/// Kind of game, from the setup record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GameType {
    /// 0x00.
    Unknown,
    /// 0x01, ladder 1on1 or free for all.
    Ladder,
    /// 0x09, custom game.
    Custom,
    /// 0x1D, single player game.
    SinglePlayer,
    /// 0x20, ladder team game.
    LadderTeam,
    /// Any other value.
    Other(u8),
}

impl From<u8> for GameType {
    fn from(raw: u8) -> Self {
        match raw {
            0x00 => GameType::Unknown,
            0x01 => GameType::Ladder,
            0x09 => GameType::Custom,
            0x1D => GameType::SinglePlayer,
            0x20 => GameType::LadderTeam,
            other => GameType::Other(other),
        }
    }
}

/// Describes a select mode byte from the slot table.
#[must_use]
pub fn select_mode_name(mode: u8) -> &'static str {
    match mode {
        0x00 => "team & race selectable",
        0x01 => "team not selectable",
        0x03 => "team & race not selectable",
        0x04 => "race fixed to random",
        0xCC => "automated match making",
        0xAC => "automated match making (Reforged)",
        _ => "unknown",
    }
}

/// Match-level metadata. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameMetadata {
    /// Game name as shown in the lobby.
    pub game_name: String,
    /// Name of the hosting player.
    pub host_name: String,
    /// Decoded settings, including map path and creator.
    pub settings: GameSettings,
    /// Kind of game.
    pub game_type: GameType,
    /// Private (0x08) or public (0x00) game.
    pub private: bool,
    /// Player count declared by the setup record.
    pub player_count: u32,
    /// Client language id.
    pub language_id: u32,
    /// Random seed from the slot table.
    pub random_seed: u32,
    /// Team/race selection mode from the slot table.
    pub select_mode: u8,
    /// Number of start positions on the map.
    pub start_spot_count: u8,
}

impl GameMetadata {
    /// Map path from the settings.
    #[must_use]
    pub fn map_path(&self) -> &str {
        &self.settings.map_path
    }

    /// Map file name without its directory.
    #[must_use]
    pub fn map_name(&self) -> &str {
        let path = self.map_path();
        path.rsplit(['\\', '/']).next().unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_settings() -> Vec<u8> {
        let mut raw = vec![
            0x02,        // fast
            0b0100_1000, // default visibility, teams together
            0b0000_0110, // fixed teams
            0b0000_0101, // shared control, random races
            0, 0, 0, 0, 0,
        ];
        raw.extend_from_slice(&0x1234_5678u32.to_le_bytes());
        raw.extend_from_slice(b"Maps\\(2)EchoIsles.w3x\0");
        raw.extend_from_slice(b"Battle.net\0\0");
        raw
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let raw = raw_settings();
        let encoded = encode_string(&raw);
        assert!(!encoded.contains(&0));
        assert_eq!(decode_encoded_string(&encoded), raw);
    }

    #[test]
    fn test_decode_settings() {
        let settings = GameSettings::decode(&encode_string(&raw_settings()), 0).unwrap();
        assert_eq!(settings.speed, GameSpeed::Fast);
        assert_eq!(settings.visibility, Visibility::Default);
        assert_eq!(settings.observers, ObserverMode::Off);
        assert!(settings.teams_together);
        assert!(settings.fixed_teams);
        assert!(settings.full_shared_unit_control);
        assert!(!settings.random_hero);
        assert!(settings.random_races);
        assert!(!settings.observer_referees);
        assert_eq!(settings.map_checksum, 0x1234_5678);
        assert_eq!(settings.map_path, "Maps\\(2)EchoIsles.w3x");
        assert_eq!(settings.creator, "Battle.net");
    }

    #[test]
    fn test_observer_bits() {
        let mut raw = raw_settings();
        raw[1] = 0b0011_0001;
        let settings = GameSettings::decode(&encode_string(&raw), 0).unwrap();
        assert_eq!(settings.observers, ObserverMode::Full);
        assert_eq!(settings.visibility, Visibility::HideTerrain);
        assert!(!settings.teams_together);
    }

    #[test]
    fn test_short_settings_rejected() {
        let err = GameSettings::decode(&encode_string(&[1, 2, 3]), 40).unwrap_err();
        assert!(matches!(err, ParserError::MalformedRecord { offset: 40, .. }));
    }

    #[test]
    fn test_game_type_and_select_mode() {
        assert_eq!(GameType::from(0x09), GameType::Custom);
        assert_eq!(GameType::from(0x42), GameType::Other(0x42));
        assert_eq!(select_mode_name(0xCC), "automated match making");
    }
}
