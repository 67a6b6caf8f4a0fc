//! Integration tests for APM, timelines, winners and race resolution.

mod common;

use common::{race, ReplayBuilder};
use w3g_replay::records::{PlayerResult, Race};
use w3g_replay::{MetricsConfig, Replay, Winner};

fn duel() -> ReplayBuilder {
    ReplayBuilder::new()
        .player(1, "Alice")
        .player(2, "Bob")
        .slot(1, 0, 0, race::HUMAN)
        .slot(2, 1, 1, race::RANDOM)
}

fn three_way() -> ReplayBuilder {
    ReplayBuilder::new()
        .player(1, "Alice")
        .player(2, "Bob")
        .player(3, "Carol")
        .slot(1, 0, 0, race::HUMAN)
        .slot(2, 1, 1, race::ORC)
        .slot(3, 2, 2, race::UNDEAD)
}

fn busy_minute() -> Replay {
    Replay::parse(
        &duel()
            .time_slot(
                30_000,
                &[(1, common::train(b"hpea")), (1, common::select_group(1))],
            )
            .time_slot(30_000, &[(1, common::right_click(10.0, 20.0))])
            .build(),
    )
    .unwrap()
}

// ============================================================================
// APM
// ============================================================================

#[test]
fn test_apm_over_stream_duration() {
    let replay = busy_minute();
    assert_eq!(replay.duration_ms(), 60_000);

    let apm = replay.player_apm(1).unwrap();
    assert!((apm - 3.0).abs() < 1e-9, "apm = {apm}");
    assert_eq!(replay.player_apm(2), Some(0.0));
    assert_eq!(replay.player_apm(9), None);
}

#[test]
fn test_zero_duration_apm_is_zero() {
    let replay = Replay::parse(&duel().chat(1, "anyone there?").build()).unwrap();
    assert_eq!(replay.duration_ms(), 0);
    assert_eq!(replay.player_apm(1), Some(0.0));

    let metrics = replay.metrics(&MetricsConfig::default());
    assert!(metrics.players.iter().all(|p| p.apm == 0.0));
    assert_eq!(metrics.player(1).unwrap().timeline, [0]);
}

#[test]
fn test_deselect_then_select_counts_once() {
    let replay = Replay::parse(
        &duel()
            .time_slot(
                60_000,
                &[
                    (1, common::selection(2, &[(1, 1)])),
                    (1, common::selection(1, &[(2, 2)])),
                    (2, common::selection(1, &[(3, 3)])),
                ],
            )
            .build(),
    )
    .unwrap();

    let metrics = replay.metrics(&MetricsConfig::default());
    assert_eq!(metrics.player(1).unwrap().action_count, 1);
    assert_eq!(metrics.player(2).unwrap().action_count, 1);
}

// ============================================================================
// Timeline
// ============================================================================

#[test]
fn test_timeline_buckets() {
    let replay = busy_minute();

    let default = replay.metrics(&MetricsConfig::default());
    assert_eq!(default.bucket_ms, 60_000);
    assert_eq!(default.player(1).unwrap().timeline, [0, 3]);

    let fine = replay.metrics(&MetricsConfig { bucket_ms: 30_000 });
    assert_eq!(fine.player(1).unwrap().timeline, [0, 2, 1]);
    assert_eq!(fine.player(2).unwrap().timeline, [0, 0, 0]);
    let total: u32 = fine.player(1).unwrap().timeline.iter().sum();
    assert_eq!(total, fine.player(1).unwrap().action_count);
}

#[test]
fn test_metrics_serialize_to_json() {
    let replay = Replay::parse(
        &duel()
            .time_slot(1000, &[(1, common::escape())])
            .leave(0x01, 2, 0x01, 1)
            .build(),
    )
    .unwrap();

    let json = serde_json::to_value(replay.metrics(&MetricsConfig::default())).unwrap();
    assert_eq!(json["duration_ms"], 1000);
    assert_eq!(json["players"][0]["action_count"], 1);
    assert_eq!(json["winner"]["Inferred"], 1);
}

// ============================================================================
// Winner
// ============================================================================

#[test]
fn test_explicit_winner() {
    let replay = Replay::parse(
        &duel()
            .time_slot(1000, &[(1, common::escape())])
            .leave(0x01, 2, 0x08, 1)
            .leave(0x0C, 1, 0x09, 2)
            .build(),
    )
    .unwrap();
    assert_eq!(replay.winner(), Winner::Explicit(1));
}

#[test]
fn test_last_remaining_player_wins() {
    let replay = Replay::parse(
        &three_way()
            .time_slot(500, &[(1, common::escape())])
            .leave(0x01, 2, 0x01, 1)
            .time_slot(500, &[])
            .leave(0x01, 3, 0x01, 2)
            .build(),
    )
    .unwrap();
    assert_eq!(replay.winner(), Winner::Inferred(1));
    assert_eq!(replay.winner().player_id(), Some(1));
}

#[test]
fn test_last_to_leave_wins_when_everyone_left() {
    let replay = Replay::parse(
        &duel()
            .leave(0x01, 2, 0x01, 1)
            .time_slot(100, &[])
            .leave(0x0C, 1, 0x01, 2)
            .build(),
    )
    .unwrap();
    assert_eq!(replay.winner(), Winner::Inferred(1));
}

#[test]
fn test_player_with_loss_is_never_winner() {
    let replay = Replay::parse(
        &duel()
            .time_slot(500, &[(1, common::escape())])
            .leave(0x01, 2, 0x01, 1)
            .time_slot(500, &[])
            .leave(0x0C, 1, 0x08, 2)
            .build(),
    )
    .unwrap();

    assert_eq!(replay.player(1).unwrap().result, PlayerResult::Loss);
    assert_eq!(replay.player(2).unwrap().result, PlayerResult::Unknown);
    assert_eq!(replay.winner(), Winner::Inferred(2));
}

#[test]
fn test_loss_names_the_remaining_opponent() {
    let duel_replay = Replay::parse(
        &duel()
            .time_slot(500, &[(2, common::escape())])
            .leave(0x01, 1, 0x08, 1)
            .build(),
    )
    .unwrap();
    assert_eq!(duel_replay.winner(), Winner::Inferred(2));

    let crowded = Replay::parse(&three_way().leave(0x01, 3, 0x08, 1).build()).unwrap();
    assert_eq!(crowded.winner(), Winner::Unknown);
}

#[test]
fn test_gg_before_leaving_concedes() {
    let replay = Replay::parse(
        &duel()
            .time_slot(500, &[(1, common::escape())])
            .leave(0x01, 1, 0x01, 1)
            .chat(2, "GG")
            .time_slot(500, &[])
            .leave(0x01, 2, 0x01, 2)
            .build(),
    )
    .unwrap();

    assert_eq!(replay.winner(), Winner::Inferred(1));
}

#[test]
fn test_winner_unknown_while_several_remain() {
    let replay = Replay::parse(&three_way().leave(0x01, 3, 0x01, 1).build()).unwrap();
    assert_eq!(replay.winner(), Winner::Unknown);
    assert_eq!(replay.winner().player_id(), None);
}

#[test]
fn test_observer_is_not_a_participant() {
    let replay = Replay::parse(
        &ReplayBuilder::new()
            .player(1, "Alice")
            .player(2, "Bob")
            .player(3, "Watcher")
            .slot(1, 0, 0, race::HUMAN)
            .slot(2, 1, 1, race::ORC)
            .slot(3, 12, 24, race::RANDOM)
            .leave(0x01, 2, 0x01, 1)
            .build(),
    )
    .unwrap();

    assert!(replay.player(3).unwrap().is_observer());
    assert_eq!(replay.winner(), Winner::Inferred(1));
}

// ============================================================================
// Race Resolution
// ============================================================================

#[test]
fn test_random_race_resolved_from_first_worker() {
    let replay = Replay::parse(
        &duel()
            .time_slot(
                100,
                &[(1, common::train(b"hpea")), (2, common::train(b"opeo"))],
            )
            .time_slot(100, &[(2, common::train(b"uaco"))])
            .build(),
    )
    .unwrap();

    assert_eq!(replay.player(2).unwrap().race, Race::Random);
    assert_eq!(replay.resolved_race(2), Some(Race::Orc));
    assert_eq!(replay.resolved_race(1), Some(Race::Human));

    let metrics = replay.metrics(&MetricsConfig::default());
    assert_eq!(metrics.player(2).unwrap().resolved_race, Race::Orc);
}

#[test]
fn test_random_race_without_hint_stays_random() {
    let replay = Replay::parse(
        &duel()
            .time_slot(100, &[(2, common::escape())])
            .build(),
    )
    .unwrap();
    assert_eq!(replay.resolved_race(2), Some(Race::Random));
    assert_eq!(replay.resolved_race(7), None);
}
