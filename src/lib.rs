//! # W3G Replay
//!
//! A decoder for Warcraft III replay (.w3g) files.
//!
//! The library turns a replay file into typed match data: the header, game
//! settings, players and slots, the chronological event stream with every
//! player action, and derived statistics such as APM and the winner.
//! Both container families are supported:
//! - **Classic** (RoC/TFT before 1.32) with block-based compression
//! - **Reforged** (1.32+), including the GRBN wrapper
//!
//! ## Quick Start
//!
//! ```no_run
//! use w3g_replay::{MetricsConfig, Replay};
//!
//! let data = std::fs::read("replay.w3g").unwrap();
//! let replay = Replay::parse(&data)?;
//!
//! println!("{} on {}", replay.metadata().game_name, replay.metadata().map_name());
//! let metrics = replay.metrics(&MetricsConfig::default());
//! for player in &metrics.players {
//!     println!("P{}: {:.1} APM as {}", player.player_id, player.apm, player.resolved_race);
//! }
//! println!("winner: {:?}", replay.winner());
//! # Ok::<(), w3g_replay::ParserError>(())
//! ```
//!
//! ## Module Overview
//!
//! - [`error`] - Error kinds and result alias
//! - [`binary`] - Little-endian cursor over byte slices
//! - [`text`] - Best-effort UTF-8 decoding of stored strings
//! - [`format`] - Container detection and per-version layouts
//! - [`header`] - File header parsing
//! - [`decompress`] - Block decompression
//! - [`records`] - Setup records, roster and the event stream
//! - [`actions`] - Player action decoding
//! - [`metrics`] - APM, timelines, winner and race resolution
//! - [`replay`] - The decoded replay
//!
//! All multi-byte integers are stored in little-endian byte order.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod actions;
pub mod binary;
pub mod decompress;
pub mod error;
pub mod format;
pub mod header;
pub mod metrics;
pub mod records;
pub mod replay;
pub mod text;

pub use actions::{Action, ActionType};
pub use error::{ParserError, Result};
pub use header::ReplayHeader;
pub use metrics::{MetricsConfig, ReplayMetrics, Winner};
pub use records::{Event, EventKind, EventStream, PlayerRecord, PlayerResult, Race};
pub use replay::Replay;
