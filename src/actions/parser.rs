//! Action dispatch and the command-block iterator.
//!
//! A command block holds one player's actions for one time slot, packed
//! back to back with no separators. Each action starts with its id byte;
//! its length depends on the id and, for some ids, on the game build:
//!
//! | Ids | Build split | Meaning |
//! |-----|-------------|---------|
//! | 0x1A-0x1E | 1.14b (6040) | queue and selection helpers shift up by one |
//! | 0x65-0x6A | 1.06 (4656) | submenus, minimap ping and continue shift up by one |
//! | 0x62 | 1.07 (6031) | scenario trigger grows from 8 to 12 body bytes |
//!
//! An id the table does not know ends the block: its length is unknown, so
//! the remaining bytes are kept as [`ActionType::Unknown`].

use std::collections::{HashMap, HashSet};

use tracing::warn;

use super::ability::{AbilityAction, AbilityCode, AbilityKind, BUILD_1_07};
use super::hotkey::HotkeyAction;
use super::selection::{SelectionAction, Subgroup, BUILD_1_14B};
use super::types::{Action, ActionType, ObjectId};
use crate::binary::ByteReader;
use crate::error::Result;
use crate::records::game_header::GameSpeed;

/// Last build using the old submenu ids (1.06).
pub const BUILD_1_06: u16 = 4656;

/// Context for parsing one command block.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionContext {
    /// Build number from the replay header.
    pub build_number: u16,

    /// Player who owns the command block.
    pub player_id: u8,

    /// Game clock when the block was issued.
    pub timestamp_ms: u32,
}

impl ActionContext {
    /// Creates a new action context.
    #[must_use]
    pub fn new(build_number: u16, player_id: u8, timestamp_ms: u32) -> Self {
        Self {
            build_number,
            player_id,
            timestamp_ms,
        }
    }
}

/// Iterator over the actions in one command block.
///
/// Yields every action in order. An unknown id, or an action whose body
/// runs past the end of the block, becomes a final
/// [`ActionType::Unknown`] holding the rest of the block.
pub struct ActionIterator<'a> {
    /// Cursor over the command block.
    reader: ByteReader<'a>,

    /// Build, player and clock for the block.
    context: ActionContext,

    /// Whether iteration has finished.
    finished: bool,
}

impl<'a> ActionIterator<'a> {
    /// Creates an iterator over a command block.
    #[must_use]
    pub fn new(reader: ByteReader<'a>, context: ActionContext) -> Self {
        Self {
            reader,
            context,
            finished: false,
        }
    }

    /// Returns the absolute offset of the next action.
    #[must_use]
    pub fn current_offset(&self) -> usize {
        self.reader.position()
    }

    /// Returns the remaining bytes to parse.
    #[must_use]
    pub fn remaining_bytes(&self) -> usize {
        self.reader.remaining()
    }

    /// Returns whether iteration is finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn unknown(&mut self, id: u8, start: &ByteReader<'a>, reason: &str) -> ActionType {
        let data = start.rest().get(1..).unwrap_or_default().to_vec();
        warn!(
            player = self.context.player_id,
            offset = start.position(),
            id = format_args!("{id:#04x}"),
            bytes = data.len(),
            "{reason}; skipping rest of command block"
        );
        self.finished = true;
        ActionType::Unknown { id, data }
    }
}

impl Iterator for ActionIterator<'_> {
    type Item = Action;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let start = self.reader.clone();
        let Ok(id) = self.reader.read_u8() else {
            self.finished = true;
            return None;
        };

        let action_type = match parse_action_body(id, &mut self.reader, self.context.build_number)
        {
            Ok(Some(action_type)) => action_type,
            Ok(None) => self.unknown(id, &start, "unknown action id"),
            Err(_) => self.unknown(id, &start, "action body overruns command block"),
        };

        Some(Action::new(
            self.context.player_id,
            action_type,
            self.context.timestamp_ms,
        ))
    }
}

/// Decodes the body of action `id` for the given build.
///
/// Returns `Ok(None)` for ids that have no known layout in that build.
///
/// # Errors
///
/// Returns `OutOfBounds` if the body is cut short.
pub fn parse_action_body(
    id: u8,
    reader: &mut ByteReader<'_>,
    build: u16,
) -> Result<Option<ActionType>> {
    let action = match id {
        0x01 => ActionType::Pause,
        0x02 => ActionType::Resume,
        0x03 => ActionType::SetGameSpeed(GameSpeed::from(reader.read_u8()?)),
        0x04 => ActionType::IncreaseGameSpeed,
        0x05 => ActionType::DecreaseGameSpeed,
        0x06 => ActionType::SaveGame {
            name: reader.read_cstring()?,
        },
        0x07 => {
            reader.skip(4)?;
            ActionType::SaveGameFinished
        }
        0x10 => ability(reader, AbilityKind::NoTarget, build)?,
        0x11 => ability(reader, AbilityKind::Point, build)?,
        0x12 => ability(reader, AbilityKind::Object, build)?,
        0x13 => ability(reader, AbilityKind::GiveItem, build)?,
        0x14 => ability(reader, AbilityKind::Double, build)?,
        0x16 => ActionType::ChangeSelection(SelectionAction::parse(reader)?),
        0x17 => ActionType::Hotkey(HotkeyAction::parse_assign(reader)?),
        0x18 => ActionType::Hotkey(HotkeyAction::parse_select(reader)?),
        0x19 => ActionType::SelectSubgroup(Subgroup::parse(reader, build)?),
        0x1A..=0x1E => return queue_action(id, reader, build),
        0x20 | 0x22..=0x32 => ActionType::Cheat {
            id,
            payload: reader.read_bytes(cheat_payload_len(id))?.to_vec(),
        },
        0x21 => ActionType::Opaque {
            id,
            payload: reader.read_bytes(8)?.to_vec(),
        },
        0x50 => ActionType::ChangeAllyOptions {
            slot: reader.read_u8()?,
            flags: reader.read_u32()?,
        },
        0x51 => ActionType::TransferResources {
            slot: reader.read_u8()?,
            gold: reader.read_u32()?,
            lumber: reader.read_u32()?,
        },
        0x60 => {
            reader.skip(8)?;
            ActionType::MapTriggerChat {
                command: reader.read_cstring()?,
            }
        }
        0x61 => ActionType::EscapeKey,
        0x62 => {
            reader.skip(if build >= BUILD_1_07 { 12 } else { 8 })?;
            ActionType::ScenarioTrigger
        }
        0x65..=0x6A => return submenu_action(id, reader, build),
        0x75 => ActionType::Opaque {
            id,
            payload: reader.read_bytes(1)?.to_vec(),
        },
        _ => return Ok(None),
    };
    Ok(Some(action))
}

fn ability(reader: &mut ByteReader<'_>, kind: AbilityKind, build: u16) -> Result<ActionType> {
    Ok(ActionType::Ability(AbilityAction::parse(reader, kind, build)?))
}

/// Body length of a cheat action.
fn cheat_payload_len(id: u8) -> usize {
    match id {
        0x27 | 0x28 | 0x2D => 5,
        0x2E => 4,
        _ => 0,
    }
}

/// Ids 0x1A-0x1E: 1.14b inserted pre-subselect at 0x1A.
fn queue_action(id: u8, reader: &mut ByteReader<'_>, build: u16) -> Result<Option<ActionType>> {
    let legacy_id = if build <= BUILD_1_14B {
        id
    } else if id == 0x1A {
        return Ok(Some(ActionType::PreSubselect));
    } else {
        id - 1
    };

    let action = match legacy_id {
        0x1A => ActionType::Opaque {
            id,
            payload: reader.read_bytes(9)?.to_vec(),
        },
        0x1B => {
            reader.skip(1)?;
            ActionType::SelectGroundItem {
                object: ObjectId::parse(reader)?,
            }
        }
        0x1C => ActionType::CancelHeroRevival {
            hero: ObjectId::parse(reader)?,
        },
        0x1D => ActionType::RemoveFromQueue {
            position: reader.read_u8()?,
            unit: AbilityCode::from_raw(reader.read_array()?),
        },
        _ => return Ok(None),
    };
    Ok(Some(action))
}

/// Ids 0x65-0x6A: 1.07 shifted these up by one.
fn submenu_action(id: u8, reader: &mut ByteReader<'_>, build: u16) -> Result<Option<ActionType>> {
    let legacy_id = if build <= BUILD_1_06 { id } else { id - 1 };

    let action = match legacy_id {
        0x65 => ActionType::HeroSkillSubmenu,
        0x66 => ActionType::BuildingSubmenu,
        0x67 => {
            let x = reader.read_f32()?;
            let y = reader.read_f32()?;
            reader.skip(4)?;
            ActionType::MinimapPing { x, y }
        }
        0x68 | 0x69 => {
            reader.skip(16)?;
            ActionType::ContinueGame
        }
        _ => return Ok(None),
    };
    Ok(Some(action))
}

/// Statistics about parsed actions.
#[derive(Debug, Clone, Default)]
pub struct ActionStatistics {
    /// Total number of actions parsed.
    pub total_actions: u32,

    /// Number of actions that count toward APM.
    pub apm_actions: u32,

    /// Number of selection actions.
    pub selection_actions: u32,

    /// Number of ability actions (all kinds).
    pub ability_actions: u32,

    /// Number of hotkey actions.
    pub hotkey_actions: u32,

    /// Number of unknown actions.
    pub unknown_actions: u32,

    /// Actions per player (keyed by player ID).
    pub actions_per_player: HashMap<u8, u32>,

    /// Unique ability codes seen.
    pub unique_ability_codes: HashSet<[u8; 4]>,
}

impl ActionStatistics {
    /// Creates new empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an action in the statistics.
    pub fn record(&mut self, action: &Action) {
        self.total_actions += 1;
        *self.actions_per_player.entry(action.player_id).or_insert(0) += 1;
        if action.action_type.counts_toward_apm() {
            self.apm_actions += 1;
        }

        match &action.action_type {
            ActionType::ChangeSelection(_) | ActionType::SelectSubgroup(_) => {
                self.selection_actions += 1;
            }
            ActionType::Ability(ability) => {
                self.ability_actions += 1;
                self.unique_ability_codes
                    .insert(ability.ability_code.canonical());
            }
            ActionType::Hotkey(_) => self.hotkey_actions += 1,
            ActionType::Unknown { .. } => self.unknown_actions += 1,
            _ => {}
        }
    }

    /// Returns the number of unique ability codes.
    #[must_use]
    pub fn unique_ability_count(&self) -> usize {
        self.unique_ability_codes.len()
    }
}
