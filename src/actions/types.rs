//! Core action types and structures.
//!
//! This module defines the main `Action` struct and `ActionType` enum that
//! represent decoded player actions.

use std::fmt;

use serde::Serialize;

use super::ability::{AbilityAction, AbilityCode};
use super::hotkey::HotkeyAction;
use super::selection::{SelectionAction, Subgroup};
use crate::binary::ByteReader;
use crate::error::Result;
use crate::records::game_header::GameSpeed;
use crate::records::player::Race;

/// An in-game object handle: two ids that together name one unit, item or
/// building. Both ids are `0xFFFFFFFF` for "no object" (ground).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectId {
    /// First id.
    pub id1: u32,
    /// Second id.
    pub id2: u32,
}

impl ObjectId {
    /// Reads an 8-byte object handle.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBounds` if fewer than 8 bytes remain.
    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        Ok(ObjectId {
            id1: reader.read_u32()?,
            id2: reader.read_u32()?,
        })
    }

    /// True for the "no object" handle.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.id1 == u32::MAX && self.id2 == u32::MAX
    }
}

/// A decoded action from a time slot's command block.
///
/// Actions represent individual commands issued by players during gameplay.
/// Each action has a player ID, timestamp, and action-specific data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    /// Player ID who issued this action.
    pub player_id: u8,

    /// Action type with parsed data.
    pub action_type: ActionType,

    /// Timestamp in milliseconds from game start.
    pub timestamp_ms: u32,
}

impl Action {
    /// Creates a new action with the given parameters.
    #[must_use]
    pub fn new(player_id: u8, action_type: ActionType, timestamp_ms: u32) -> Self {
        Self {
            player_id,
            action_type,
            timestamp_ms,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[P{} @{}ms] {}",
            self.player_id, self.timestamp_ms, self.action_type
        )
    }
}

/// Enumeration of all known action types.
///
/// Unknown actions preserve their raw data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ActionType {
    /// Pause game (0x01).
    Pause,
    /// Resume game (0x02).
    Resume,
    /// Set game speed (0x03).
    SetGameSpeed(GameSpeed),
    /// Increase game speed (0x04).
    IncreaseGameSpeed,
    /// Decrease game speed (0x05).
    DecreaseGameSpeed,
    /// Save game (0x06).
    SaveGame {
        /// Save file name.
        name: String,
    },
    /// Saving finished (0x07).
    SaveGameFinished,
    /// Ability use (0x10-0x14).
    Ability(AbilityAction),
    /// Change selection (0x16).
    ChangeSelection(SelectionAction),
    /// Assign or select a control group (0x17, 0x18).
    Hotkey(HotkeyAction),
    /// Select subgroup (0x19).
    SelectSubgroup(Subgroup),
    /// Pre-subselection (0x1A from 1.14b).
    PreSubselect,
    /// Select a ground item.
    SelectGroundItem {
        /// The item.
        object: ObjectId,
    },
    /// Cancel hero revival.
    CancelHeroRevival {
        /// The hero.
        hero: ObjectId,
    },
    /// Remove a unit from a building queue.
    RemoveFromQueue {
        /// Queue position.
        position: u8,
        /// Unit type.
        unit: AbilityCode,
    },
    /// Single-player cheat (0x20, 0x22-0x32).
    Cheat {
        /// Action id of the cheat.
        id: u8,
        /// Cheat arguments.
        payload: Vec<u8>,
    },
    /// Change ally options (0x50).
    ChangeAllyOptions {
        /// Slot of the other player.
        slot: u8,
        /// Alliance flags.
        flags: u32,
    },
    /// Transfer resources (0x51).
    TransferResources {
        /// Slot of the receiving player.
        slot: u8,
        /// Gold sent.
        gold: u32,
        /// Lumber sent.
        lumber: u32,
    },
    /// Map trigger chat command (0x60).
    MapTriggerChat {
        /// The typed text.
        command: String,
    },
    /// ESC key press (0x61).
    EscapeKey,
    /// Scenario trigger (0x62).
    ScenarioTrigger,
    /// Hero skill submenu opened.
    HeroSkillSubmenu,
    /// Building submenu opened.
    BuildingSubmenu,
    /// Minimap signal.
    MinimapPing {
        /// X coordinate.
        x: f32,
        /// Y coordinate.
        y: f32,
    },
    /// Continue game after a game-over dialog.
    ContinueGame,
    /// Fixed-size action whose meaning is unknown.
    Opaque {
        /// Action id.
        id: u8,
        /// Body bytes.
        payload: Vec<u8>,
    },
    /// Unknown action id; the rest of the command block.
    Unknown {
        /// Action id.
        id: u8,
        /// Remaining bytes of the command block.
        data: Vec<u8>,
    },
}

impl ActionType {
    /// True for actions that count toward APM.
    ///
    /// Selection changes always return true here; the rule that a select
    /// directly after the same player's deselect is not counted needs the
    /// previous action and is applied by the metrics engine.
    #[must_use]
    pub fn counts_toward_apm(&self) -> bool {
        match self {
            ActionType::Ability(_)
            | ActionType::ChangeSelection(_)
            | ActionType::Hotkey(_)
            | ActionType::SelectGroundItem { .. }
            | ActionType::CancelHeroRevival { .. }
            | ActionType::RemoveFromQueue { .. }
            | ActionType::EscapeKey
            | ActionType::HeroSkillSubmenu
            | ActionType::BuildingSubmenu => true,
            ActionType::SelectSubgroup(subgroup) => subgroup.is_player_initiated(),
            _ => false,
        }
    }

    /// The race this action reveals, if it trains a worker or builds a
    /// town hall.
    #[must_use]
    pub fn race_hint(&self) -> Option<Race> {
        match self {
            ActionType::Ability(ability) => ability.race_hint(),
            _ => None,
        }
    }

    /// Short name of the action type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            ActionType::Pause => "Pause",
            ActionType::Resume => "Resume",
            ActionType::SetGameSpeed(_) => "SetGameSpeed",
            ActionType::IncreaseGameSpeed => "IncreaseGameSpeed",
            ActionType::DecreaseGameSpeed => "DecreaseGameSpeed",
            ActionType::SaveGame { .. } => "SaveGame",
            ActionType::SaveGameFinished => "SaveGameFinished",
            ActionType::Ability(_) => "Ability",
            ActionType::ChangeSelection(_) => "ChangeSelection",
            ActionType::Hotkey(_) => "Hotkey",
            ActionType::SelectSubgroup(_) => "SelectSubgroup",
            ActionType::PreSubselect => "PreSubselect",
            ActionType::SelectGroundItem { .. } => "SelectGroundItem",
            ActionType::CancelHeroRevival { .. } => "CancelHeroRevival",
            ActionType::RemoveFromQueue { .. } => "RemoveFromQueue",
            ActionType::Cheat { .. } => "Cheat",
            ActionType::ChangeAllyOptions { .. } => "ChangeAllyOptions",
            ActionType::TransferResources { .. } => "TransferResources",
            ActionType::MapTriggerChat { .. } => "MapTriggerChat",
            ActionType::EscapeKey => "EscapeKey",
            ActionType::ScenarioTrigger => "ScenarioTrigger",
            ActionType::HeroSkillSubmenu => "HeroSkillSubmenu",
            ActionType::BuildingSubmenu => "BuildingSubmenu",
            ActionType::MinimapPing { .. } => "MinimapPing",
            ActionType::ContinueGame => "ContinueGame",
            ActionType::Opaque { .. } => "Opaque",
            ActionType::Unknown { .. } => "Unknown",
        }
    }
}

/// Name of a cheat action id.
#[must_use]
pub fn cheat_name(id: u8) -> &'static str {
    match id {
        0x20 => "TheDudeAbides",
        0x22 => "SomebodySetUpUsTheBomb",
        0x23 => "WarpTen",
        0x24 => "IocainePowder",
        0x25 => "PointBreak",
        0x26 => "WhosYourDaddy",
        0x27 => "KeyserSoze",
        0x28 => "LeafItToMe",
        0x29 => "ThereIsNoSpoon",
        0x2A => "StrengthAndHonor",
        0x2B => "itvexesme",
        0x2C => "WhoIsJohnGalt",
        0x2D => "GreedIsGood",
        0x2E => "DayLightSavings",
        0x2F => "ISeeDeadPeople",
        0x30 => "Synergy",
        0x31 => "SharpAndShiny",
        0x32 => "AllYourBaseAreBelongToUs",
        _ => "unknown cheat",
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::SetGameSpeed(speed) => write!(f, "SetGameSpeed({speed})"),
            ActionType::SaveGame { name } => write!(f, "SaveGame({name})"),
            ActionType::Ability(ability) => write!(f, "Ability({})", ability.ability_code),
            ActionType::ChangeSelection(selection) => write!(
                f,
                "ChangeSelection({:?}, {} objects)",
                selection.mode,
                selection.objects.len()
            ),
            ActionType::Hotkey(hotkey) => {
                write!(f, "Hotkey({:?} {})", hotkey.operation, hotkey.key())
            }
            ActionType::RemoveFromQueue { position, unit } => {
                write!(f, "RemoveFromQueue({unit} #{position})")
            }
            ActionType::Cheat { id, .. } => write!(f, "Cheat({})", cheat_name(*id)),
            ActionType::TransferResources {
                slot, gold, lumber, ..
            } => write!(f, "TransferResources(slot {slot}: {gold} gold, {lumber} lumber)"),
            ActionType::MapTriggerChat { command } => write!(f, "MapTriggerChat({command})"),
            ActionType::Opaque { id, .. } => write!(f, "Opaque({id:#04x})"),
            ActionType::Unknown { id, data } => {
                write!(f, "Unknown({id:#04x}, {} bytes)", data.len())
            }
            other => f.write_str(other.type_name()),
        }
    }
}
