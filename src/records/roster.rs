//! Reconciles player records with the slot table and the leave records.
//!
//! Player records and slot records are joined on player id. A player without
//! a matching slot keeps the race from its ladder data, if any. Slots that
//! no player claims (open, closed and computer slots) are kept separately.

use serde::Serialize;
use tracing::{debug, warn};

use super::event::{Event, EventKind, LeaveOutcome, LeaveReason, PlayerResult};
use super::player::{
    Color, Controller, LadderInfo, PlayerEntry, Race, ReforgedPlayerMetadata, SlotRecord,
};

/// How and when a player left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlayerLeave {
    /// Game clock of the leave record.
    pub time_ms: u32,
    /// Reason, with undocumented codes kept verbatim.
    pub reason: LeaveReason,
    /// Raw result code.
    pub result_code: u32,
    /// Raw counter field.
    pub unknown_flag: u32,
    /// Interpretation of the result code.
    pub outcome: LeaveOutcome,
}

/// A player of the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRecord {
    /// Player id.
    pub id: u8,
    /// Player name.
    pub name: String,
    /// True for the hosting player.
    pub is_host: bool,
    /// Declared race; may be `Random`.
    pub race: Race,
    /// Human or computer.
    pub controller: Controller,
    /// Ladder fields from the player record.
    pub ladder: Option<LadderInfo>,
    /// Reforged profile, if present.
    pub reforged: Option<ReforgedPlayerMetadata>,
    /// The player's slot. Observers in old replays may have none.
    pub slot: Option<SlotRecord>,
    /// Final result.
    pub result: PlayerResult,
    /// Leave record, if the player left.
    pub leave: Option<PlayerLeave>,
}

impl PlayerRecord {
    /// Slot color, if the player has a slot.
    #[must_use]
    pub fn color(&self) -> Option<Color> {
        self.slot.map(|slot| slot.color)
    }

    /// Team number, if the player has a slot.
    #[must_use]
    pub fn team(&self) -> Option<u8> {
        self.slot.map(|slot| slot.team)
    }

    /// Handicap in percent, if recorded.
    #[must_use]
    pub fn handicap(&self) -> Option<u8> {
        self.slot.and_then(|slot| slot.handicap)
    }

    /// True when the player's slot is in the observer team.
    #[must_use]
    pub fn is_observer(&self) -> bool {
        self.slot.is_some_and(|slot| slot.observer)
    }

    /// True when the declared race is random.
    #[must_use]
    pub fn is_random(&self) -> bool {
        self.race == Race::Random
    }
}

/// Players and slots after reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Roster {
    /// Players in record order, host first.
    pub players: Vec<PlayerRecord>,
    /// Slots no player claimed.
    pub unmatched_slots: Vec<SlotRecord>,
}

impl Roster {
    /// Joins player records with slots and Reforged profiles.
    ///
    /// Duplicate player ids keep the first record.
    #[must_use]
    pub fn build(
        entries: &[PlayerEntry],
        slots: &[SlotRecord],
        reforged: &[ReforgedPlayerMetadata],
    ) -> Self {
        let mut players: Vec<PlayerRecord> = Vec::with_capacity(entries.len());
        let mut claimed = vec![false; slots.len()];

        for entry in entries {
            if players.iter().any(|p| p.id == entry.player_id) {
                warn!(
                    player_id = entry.player_id,
                    name = %entry.name,
                    "duplicate player id; keeping first record"
                );
                continue;
            }

            let slot_index = slots.iter().zip(&claimed).position(|(slot, &taken)| {
                !taken && slot.is_used() && slot.player_id == entry.player_id
            });
            let slot = slot_index.map(|i| {
                claimed[i] = true;
                slots[i]
            });

            let race = slot
                .map(|s| s.race)
                .or(entry.ladder.map(|ladder| ladder.race))
                .unwrap_or(Race::Unknown(0));

            players.push(PlayerRecord {
                id: entry.player_id,
                name: entry.name.clone(),
                is_host: entry.is_host(),
                race,
                controller: slot.map_or(Controller::Human, |s| s.controller),
                ladder: entry.ladder,
                reforged: reforged
                    .iter()
                    .find(|meta| meta.player_id == entry.player_id)
                    .cloned(),
                slot,
                result: PlayerResult::Unknown,
                leave: None,
            });
        }

        let unmatched_slots: Vec<SlotRecord> = slots
            .iter()
            .zip(&claimed)
            .filter(|(_, &taken)| !taken)
            .map(|(slot, _)| *slot)
            .collect();

        debug!(
            players = players.len(),
            unmatched = unmatched_slots.len(),
            "reconciled roster"
        );
        Roster {
            players,
            unmatched_slots,
        }
    }

    /// Records each player's first leave and the result it implies.
    pub fn apply_leaves(&mut self, events: &[Event]) {
        let leaves: Vec<(u32, _)> = events
            .iter()
            .filter_map(|event| match &event.kind {
                EventKind::LeftGame(leave) => Some((event.time_ms, leave)),
                _ => None,
            })
            .collect();
        let last = leaves.len().saturating_sub(1);

        for (index, (time_ms, leave)) in leaves.iter().enumerate() {
            let Some(player) = self.players.iter_mut().find(|p| p.id == leave.player_id) else {
                debug!(player_id = leave.player_id, "leave record for unknown player");
                continue;
            };
            if player.leave.is_some() {
                debug!(player_id = leave.player_id, "repeated leave record ignored");
                continue;
            }
            let outcome = leave.outcome(index == last);
            player.result = PlayerResult::from(outcome);
            player.leave = Some(PlayerLeave {
                time_ms: *time_ms,
                reason: leave.reason,
                result_code: leave.result_code,
                unknown_flag: leave.unknown_flag,
                outcome,
            });
        }
    }

    /// Looks up a player by id.
    #[must_use]
    pub fn player(&self, id: u8) -> Option<&PlayerRecord> {
        self.players.iter().find(|p| p.id == id)
    }
}
