//! Warcraft 3 replay (.w3g) decoder CLI
//!
//! ## Commands
//!
//! - `info` - Header, settings, players with race and APM, winner
//! - `events` - Chronological event listing
//! - `json` - JSON dump of the replay summary and metrics
//!
//! Log output goes to stderr and is controlled with `RUST_LOG`
//! (default `warn`).

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use w3g_replay::actions::ActionStatistics;
use w3g_replay::header::ReplayHeader;
use w3g_replay::metrics::{MetricsConfig, ReplayMetrics, Winner};
use w3g_replay::records::game_header::select_mode_name;
use w3g_replay::records::{Event, EventKind, GameMetadata, PlayerRecord, SlotRecord};
use w3g_replay::{ParserError, Replay};

/// Warcraft 3 replay (.w3g) decoder
#[derive(Parser)]
#[command(name = "w3g-replay")]
#[command(about = "Warcraft 3 replay (.w3g) decoder", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display replay information
    Info {
        /// Path to the replay file
        file: PathBuf,
    },
    /// List the event stream
    Events {
        /// Path to the replay file
        file: PathBuf,
        /// Only list chat messages
        #[arg(long)]
        chat: bool,
    },
    /// Dump the replay as JSON
    Json {
        /// Path to the replay file
        file: PathBuf,
        /// Include every event
        #[arg(long)]
        events: bool,
        /// Timeline bucket width in milliseconds
        #[arg(long)]
        bucket_ms: Option<u32>,
    },
}

// ============================================================================
// Serializable Output Structures
// ============================================================================

#[derive(Serialize)]
struct JsonOutput<'a> {
    header: &'a ReplayHeader,
    metadata: &'a GameMetadata,
    duration_ms: u32,
    players: &'a [PlayerRecord],
    unmatched_slots: &'a [SlotRecord],
    metrics: ReplayMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<&'a [Event]>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { file } => run(&file, print_info),
        Commands::Events { file, chat } => run(&file, |replay| print_events(replay, chat)),
        Commands::Json {
            file,
            events,
            bucket_ms,
        } => {
            let mut config = MetricsConfig::default();
            if let Some(bucket_ms) = bucket_ms {
                config.bucket_ms = bucket_ms;
            }
            run(&file, |replay| print_json(replay, &config, events))
        }
    }
}

/// Loads the replay and hands it to `render`.
///
/// A replay cut short by an unrecoverable tag is still rendered, but the
/// exit code reports the failure.
fn run(file: &Path, render: impl FnOnce(&Replay)) -> ExitCode {
    let data = match std::fs::read(file) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error reading {}: {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match Replay::parse(&data) {
        Ok(replay) => {
            render(&replay);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error [{}]: {}", error_kind(&err), err);
            if let Some(partial) = err.partial() {
                eprintln!(
                    "Showing {} events decoded before the failure",
                    partial.events().len()
                );
                render(partial);
            }
            ExitCode::FAILURE
        }
    }
}

fn error_kind(err: &ParserError) -> &'static str {
    match err {
        ParserError::UnsupportedFormat { .. } => "unsupported-format",
        ParserError::TruncatedInput { .. } => "truncated-input",
        ParserError::CorruptBlock { .. } => "corrupt-block",
        ParserError::OutOfBounds { .. } => "out-of-bounds",
        ParserError::MalformedRecord { .. } => "malformed-record",
        ParserError::UnrecoverableTag { .. } => "unrecoverable-tag",
    }
}

// ============================================================================
// Info Command Implementation
// ============================================================================

fn print_info(replay: &Replay) {
    let header = replay.header();
    let metadata = replay.metadata();
    let settings = &metadata.settings;

    println!("=== Replay Information ===\n");

    println!("File:");
    println!("  Container: {:?}", header.container);
    println!("  Format: {:?}", header.format);
    println!(
        "  Version: {} (build {})",
        header.version_string(),
        header.build_number
    );
    println!("  Duration: {}", header.duration_string());
    println!(
        "  Decompressed Size: {} bytes in {} blocks",
        header.decompressed_size, header.block_count
    );

    println!();

    println!("Game:");
    println!("  Name: {}", metadata.game_name);
    println!("  Host: {}", metadata.host_name);
    println!("  Map: {}", metadata.map_path());
    println!("  Creator: {}", settings.creator);
    println!("  Type: {:?}{}", metadata.game_type, if metadata.private { " (private)" } else { "" });
    println!("  Speed: {}", settings.speed);
    println!("  Observers: {:?}", settings.observers);
    println!("  Select Mode: {}", select_mode_name(metadata.select_mode));

    println!();

    let metrics = replay.metrics(&MetricsConfig::default());
    println!("Players:");
    for player in replay.players() {
        let stats = metrics.player(player.id);
        let race = stats.map_or(player.race, |s| s.resolved_race);
        let apm = stats.map_or(0.0, |s| s.apm);
        let team = player
            .team()
            .map_or_else(|| "-".to_string(), |team| team.to_string());
        let result = player
            .leave
            .map_or_else(|| "still in game".to_string(), |leave| leave.outcome.to_string());
        println!(
            "  [{}] {:<16} team {:<2} {:<9} {:>6.1} APM  {}",
            player.id, player.name, team, race.to_string(), apm, result
        );
    }
    for slot in replay.unmatched_slots() {
        println!("  (slot {}) {:?} {:?}", slot.index, slot.status, slot.controller);
    }

    println!();

    match metrics.winner {
        Winner::Explicit(id) | Winner::Inferred(id) => {
            let name = replay.player(id).map_or("?", |p| p.name.as_str());
            let how = if matches!(metrics.winner, Winner::Explicit(_)) {
                "recorded"
            } else {
                "inferred"
            };
            println!("Winner: {name} ({how})");
        }
        Winner::Unknown => println!("Winner: unknown"),
    }

    let mut stats = ActionStatistics::new();
    for action in replay.events().iter().filter_map(Event::as_action) {
        stats.record(action);
    }
    println!();
    println!("Actions:");
    println!("  Total: {}", stats.total_actions);
    println!("  Counted for APM: {}", stats.apm_actions);
    println!("  Selections: {}", stats.selection_actions);
    println!("  Abilities: {} ({} distinct)", stats.ability_actions, stats.unique_ability_count());
    println!("  Hotkeys: {}", stats.hotkey_actions);
    if stats.unknown_actions > 0 {
        println!("  Unknown: {}", stats.unknown_actions);
    }
}

// ============================================================================
// Events Command Implementation
// ============================================================================

fn print_events(replay: &Replay, chat_only: bool) {
    for event in replay.events() {
        match &event.kind {
            EventKind::TimeSlot { .. } => {}
            EventKind::Chat(_) => println!("{event}"),
            _ if chat_only => {}
            _ => println!("{event}"),
        }
    }
}

// ============================================================================
// JSON Command Implementation
// ============================================================================

fn print_json(replay: &Replay, config: &MetricsConfig, include_events: bool) {
    let output = JsonOutput {
        header: replay.header(),
        metadata: replay.metadata(),
        duration_ms: replay.duration_ms(),
        players: replay.players(),
        unmatched_slots: replay.unmatched_slots(),
        metrics: replay.metrics(config),
        events: include_events.then(|| replay.events()),
    };
    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error serializing output: {e}"),
    }
}
