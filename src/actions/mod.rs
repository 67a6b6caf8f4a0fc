//! Action parsing for W3G replay files.
//!
//! This module decodes the player actions carried in the command blocks of
//! time-slot records.
//!
//! # Overview
//!
//! Actions represent individual commands issued by players during gameplay.
//! Each action has:
//! - A player ID identifying who issued the command
//! - An action type with parsed data specific to that action
//! - A timestamp inherited from the game clock of the containing time slot
//!
//! # Action Types
//!
//! | Id | Description |
//! |----|-------------|
//! | 0x01-0x07 | Pause, resume, game speed, save game |
//! | 0x10-0x14 | Ability use (no target, point, object, give item, double) |
//! | 0x16 | Change selection |
//! | 0x17, 0x18 | Assign / select control group |
//! | 0x19 | Select subgroup |
//! | 0x1A-0x1E | Pre-subselect, ground item, hero revival, queue removal |
//! | 0x20-0x32 | Single-player cheats |
//! | 0x50, 0x51 | Alliance options, resource transfer |
//! | 0x60-0x62 | Trigger chat, ESC, scenario trigger |
//! | 0x65-0x6A | Submenus, minimap ping, continue game |
//!
//! # Example
//!
//! ```ignore
//! use w3g_replay::actions::{ActionContext, ActionIterator};
//! use w3g_replay::binary::ByteReader;
//!
//! let ctx = ActionContext::new(6059, 1, 1000);
//! for action in ActionIterator::new(ByteReader::new(block), ctx) {
//!     println!("{action}");
//! }
//! ```

mod ability;
mod hotkey;
mod parser;
mod selection;
mod types;

pub use ability::{AbilityAction, AbilityCode, AbilityKind, AbilityTarget, BUILD_1_07, BUILD_1_13};
pub use hotkey::{HotkeyAction, HotkeyOperation};
pub use parser::{parse_action_body, ActionContext, ActionIterator, ActionStatistics, BUILD_1_06};
pub use selection::{SelectionAction, SelectionMode, Subgroup, BUILD_1_14B};
pub use types::{cheat_name, Action, ActionType, ObjectId};
