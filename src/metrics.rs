//! Derived statistics: APM, per-player timelines, winner and random-race
//! resolution.
//!
//! Everything here is computed from the decoded players and events and
//! never modifies them.
//!
//! # APM
//!
//! A player's APM is the number of APM-relevant actions divided by the game
//! length in minutes, where the game length is the final clock of the event
//! stream. A selection that directly follows a deselect by the same player
//! is one click in the game UI and is only counted once.

use serde::{Deserialize, Serialize};

use crate::actions::{Action, ActionType, SelectionMode};
use crate::records::{Event, EventKind, LeaveOutcome, PlayerRecord, PlayerResult, Race};

/// Default timeline bucket width: one minute.
pub const DEFAULT_BUCKET_MS: u32 = 60_000;

/// Settings for [`ReplayMetrics::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Width of a timeline bucket in milliseconds.
    pub bucket_ms: u32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            bucket_ms: DEFAULT_BUCKET_MS,
        }
    }
}

/// How the winner was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Winner {
    /// A player carries a win result.
    Explicit(u8),
    /// The last participant standing, or the last to leave.
    Inferred(u8),
    /// Not determinable.
    Unknown,
}

impl Winner {
    /// The winning player's id, if any.
    #[must_use]
    pub fn player_id(&self) -> Option<u8> {
        match self {
            Winner::Explicit(id) | Winner::Inferred(id) => Some(*id),
            Winner::Unknown => None,
        }
    }
}

/// Statistics for one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerMetrics {
    /// Player id.
    pub player_id: u8,
    /// APM-relevant actions.
    pub action_count: u32,
    /// Actions per minute.
    pub apm: f64,
    /// APM-relevant actions per bucket, from game start to the final clock.
    pub timeline: Vec<u32>,
    /// Declared race, or the race revealed by the player's first worker or
    /// town hall when the declared race is random.
    pub resolved_race: Race,
}

/// Statistics for a whole replay. Owned separately from the replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayMetrics {
    /// Final clock of the event stream.
    pub duration_ms: u32,
    /// Bucket width used for the timelines.
    pub bucket_ms: u32,
    /// Per-player statistics, in player order.
    pub players: Vec<PlayerMetrics>,
    /// The winner.
    pub winner: Winner,
}

impl ReplayMetrics {
    /// Computes all statistics.
    #[must_use]
    pub fn compute(
        players: &[PlayerRecord],
        events: &[Event],
        duration_ms: u32,
        config: &MetricsConfig,
    ) -> Self {
        let bucket_ms = config.bucket_ms.max(1);
        let bucket_count = (duration_ms / bucket_ms) as usize + 1;

        let mut metrics: Vec<PlayerMetrics> = players
            .iter()
            .map(|player| PlayerMetrics {
                player_id: player.id,
                action_count: 0,
                apm: 0.0,
                timeline: vec![0; bucket_count],
                resolved_race: resolve_race(player, events),
            })
            .collect();

        for action in apm_actions(events) {
            let Some(entry) = metrics.iter_mut().find(|m| m.player_id == action.player_id) else {
                continue;
            };
            entry.action_count += 1;
            let bucket = (action.timestamp_ms / bucket_ms) as usize;
            if let Some(slot) = entry.timeline.get_mut(bucket) {
                *slot += 1;
            }
        }
        for entry in &mut metrics {
            entry.apm = apm(entry.action_count, duration_ms);
        }

        ReplayMetrics {
            duration_ms,
            bucket_ms,
            players: metrics,
            winner: determine_winner(players, events),
        }
    }

    /// Statistics for one player.
    #[must_use]
    pub fn player(&self, player_id: u8) -> Option<&PlayerMetrics> {
        self.players.iter().find(|m| m.player_id == player_id)
    }
}

/// Actions per minute for `count` actions over `duration_ms`.
///
/// Returns 0.0 for a zero duration.
#[must_use]
pub fn apm(count: u32, duration_ms: u32) -> f64 {
    if duration_ms == 0 {
        return 0.0;
    }
    f64::from(count) * 60_000.0 / f64::from(duration_ms)
}

/// Iterates over the actions that count toward APM.
///
/// A select directly after the same player's deselect (ignoring time slot
/// markers) is skipped.
pub fn apm_actions(events: &[Event]) -> impl Iterator<Item = &Action> {
    let mut previous: Option<&Action> = None;
    events.iter().filter_map(move |event| {
        let prior = match &event.kind {
            EventKind::TimeSlot { .. } => return None,
            EventKind::Action(action) => previous.replace(action),
            _ => previous.take(),
        };
        let EventKind::Action(action) = &event.kind else {
            return None;
        };
        if !action.action_type.counts_toward_apm() {
            return None;
        }
        if is_reselect(action, prior) {
            return None;
        }
        Some(action)
    })
}

fn is_reselect(action: &Action, prior: Option<&Action>) -> bool {
    let ActionType::ChangeSelection(selection) = &action.action_type else {
        return false;
    };
    if selection.mode != SelectionMode::Select {
        return false;
    }
    matches!(
        prior,
        Some(Action {
            player_id,
            action_type: ActionType::ChangeSelection(previous),
            ..
        }) if *player_id == action.player_id && previous.mode == SelectionMode::Deselect
    )
}

/// APM-relevant action count per player id.
#[must_use]
pub fn action_count(events: &[Event], player_id: u8) -> u32 {
    let count = apm_actions(events)
        .filter(|action| action.player_id == player_id)
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Resolves a random race from the player's first race-revealing action.
///
/// Concrete declared races are returned unchanged; a random player with no
/// revealing action stays `Random`.
#[must_use]
pub fn resolve_race(player: &PlayerRecord, events: &[Event]) -> Race {
    if player.race != Race::Random {
        return player.race;
    }
    events
        .iter()
        .filter_map(Event::as_action)
        .filter(|action| action.player_id == player.id)
        .find_map(|action| action.action_type.race_hint())
        .unwrap_or(Race::Random)
}

/// Determines the winner.
///
/// An explicit win result decides. Otherwise the participants are the
/// players in a non-observer slot, or every player when none has a slot.
/// A participant is ruled out by a loss result, or by leaving with a
/// `left` outcome after typing "g" or "gg". Among the rest:
///
/// 1. if losers were ruled out and one candidate is left, it wins;
/// 2. the only candidate who never left wins;
/// 3. if every candidate left, the last to leave wins.
///
/// Anything else is [`Winner::Unknown`].
#[must_use]
pub fn determine_winner(players: &[PlayerRecord], events: &[Event]) -> Winner {
    if let Some(player) = players.iter().find(|p| p.result == PlayerResult::Win) {
        return Winner::Explicit(player.id);
    }

    let seated: Vec<&PlayerRecord> = players
        .iter()
        .filter(|p| p.slot.is_some_and(|slot| !slot.observer))
        .collect();
    let participants: Vec<&PlayerRecord> = if seated.is_empty() {
        players.iter().collect()
    } else {
        seated
    };

    let candidates: Vec<&PlayerRecord> = participants
        .iter()
        .copied()
        .filter(|p| !is_loser(p, events))
        .collect();
    if candidates.len() < participants.len() {
        if let [only] = candidates.as_slice() {
            return Winner::Inferred(only.id);
        }
    }

    let is_candidate = |id: u8| candidates.iter().any(|p| p.id == id);
    let left: Vec<u8> = events
        .iter()
        .filter_map(|event| match &event.kind {
            EventKind::LeftGame(leave) if is_candidate(leave.player_id) => Some(leave.player_id),
            _ => None,
        })
        .collect();

    let remaining: Vec<u8> = candidates
        .iter()
        .map(|p| p.id)
        .filter(|id| !left.contains(id))
        .collect();

    match remaining.as_slice() {
        [only] => Winner::Inferred(*only),
        [] => left.last().map_or(Winner::Unknown, |&id| Winner::Inferred(id)),
        _ => Winner::Unknown,
    }
}

fn is_loser(player: &PlayerRecord, events: &[Event]) -> bool {
    if player.result == PlayerResult::Loss {
        return true;
    }
    let quit = player
        .leave
        .is_some_and(|leave| leave.outcome == LeaveOutcome::Left);
    quit && events.iter().any(|event| match &event.kind {
        EventKind::Chat(chat) if chat.player_id == player.id => {
            let text = chat.message.trim();
            text.eq_ignore_ascii_case("g") || text.eq_ignore_ascii_case("gg")
        }
        _ => false,
    })
}
