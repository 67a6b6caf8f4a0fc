//! Decoded replay events.
//!
//! Every record of the event stream becomes one or more [`Event`]s stamped
//! with the game clock. A time slot yields a [`EventKind::TimeSlot`] marker
//! followed by one [`EventKind::Action`] per decoded action.

use std::fmt;

use serde::Serialize;

use crate::actions::Action;

/// Reason code of a leave closed by the remote side.
pub const LEAVE_REMOTE: u32 = 0x01;

/// Reason code of a leave closed locally.
pub const LEAVE_LOCAL: u32 = 0x0C;

/// A single event in the replay's chronological stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Game clock in milliseconds when the event occurred.
    pub time_ms: u32,
    /// Offset of the originating record in the decoded stream.
    pub offset: usize,
    /// What happened.
    pub kind: EventKind,
}

impl Event {
    /// The player this event belongs to, if any.
    #[must_use]
    pub fn player_id(&self) -> Option<u8> {
        match &self.kind {
            EventKind::Action(action) => Some(action.player_id),
            EventKind::Chat(chat) => Some(chat.player_id),
            EventKind::LeftGame(leave) => Some(leave.player_id),
            _ => None,
        }
    }

    /// Returns the action if this is an action event.
    #[must_use]
    pub fn as_action(&self) -> Option<&Action> {
        match &self.kind {
            EventKind::Action(action) => Some(action),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clock = format_clock(self.time_ms);
        match &self.kind {
            EventKind::TimeSlot { delta_ms } => write!(f, "[{clock}] time slot +{delta_ms}ms"),
            EventKind::Action(action) => {
                write!(f, "[{clock}] P{} {}", action.player_id, action.action_type)
            }
            EventKind::Chat(chat) => write!(f, "[{clock}] {chat}"),
            EventKind::LeftGame(leave) => write!(f, "[{clock}] {leave}"),
            EventKind::Checksum(bytes) => write!(f, "[{clock}] checksum ({} bytes)", bytes.len()),
            EventKind::Countdown(countdown) => write!(f, "[{clock}] {countdown}"),
            EventKind::Opaque { tag, payload } => {
                write!(f, "[{clock}] record {tag:#04x} ({} bytes)", payload.len())
            }
        }
    }
}

/// Formats a game clock as `mm:ss`, or `h:mm:ss` past the hour.
#[must_use]
pub fn format_clock(time_ms: u32) -> String {
    let total = time_ms / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Event payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EventKind {
    /// A time slot advanced the clock.
    TimeSlot {
        /// Milliseconds added to the clock.
        delta_ms: u16,
    },
    /// A player action from a command block.
    Action(Action),
    /// A chat message.
    Chat(ChatMessage),
    /// A player left the game.
    LeftGame(LeaveGame),
    /// Checksum / sync check bytes.
    Checksum(Vec<u8>),
    /// Forced-end countdown.
    Countdown(Countdown),
    /// A record with a known length but no decoded meaning.
    Opaque {
        /// Record tag.
        tag: u8,
        /// Bytes after the tag.
        payload: Vec<u8>,
    },
}

/// Who a chat message was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChatMode {
    /// Sent in the lobby before the game started.
    Startup,
    /// All players.
    All,
    /// Allies only.
    Allies,
    /// Observers only.
    Observers,
    /// Private message to the given player id.
    Private(u32),
}

impl ChatMode {
    /// Interprets the `u32` mode field.
    #[must_use]
    pub fn from_mode(mode: u32) -> Self {
        match mode {
            0 => ChatMode::All,
            1 => ChatMode::Allies,
            2 => ChatMode::Observers,
            other => ChatMode::Private(other - 3),
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatMode::Startup => f.write_str("startup"),
            ChatMode::All => f.write_str("all"),
            ChatMode::Allies => f.write_str("allies"),
            ChatMode::Observers => f.write_str("observers"),
            ChatMode::Private(player) => write!(f, "player{player}"),
        }
    }
}

/// A chat message record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Sender.
    pub player_id: u8,
    /// Flags byte (`0x10` for lobby messages).
    pub flags: u8,
    /// Addressees.
    pub mode: ChatMode,
    /// Message text.
    pub message: String,
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> P{}: {}", self.mode, self.player_id, self.message)
    }
}

/// How a leave record was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LeaveReason {
    /// Connection closed by the remote side (0x01).
    Remote,
    /// Connection closed locally (0x0C).
    Local,
    /// Any other reason code. Its meaning is not known, so it is kept
    /// verbatim and never interpreted.
    Undocumented(u32),
}

impl LeaveReason {
    /// The raw reason code.
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            LeaveReason::Remote => LEAVE_REMOTE,
            LeaveReason::Local => LEAVE_LOCAL,
            LeaveReason::Undocumented(raw) => *raw,
        }
    }

    /// True for the undocumented variant.
    #[must_use]
    pub fn is_undocumented(&self) -> bool {
        matches!(self, LeaveReason::Undocumented(_))
    }
}

impl From<u32> for LeaveReason {
    fn from(raw: u32) -> Self {
        match raw {
            LEAVE_REMOTE => LeaveReason::Remote,
            LEAVE_LOCAL => LeaveReason::Local,
            other => LeaveReason::Undocumented(other),
        }
    }
}

/// What a leave record means for the leaving player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LeaveOutcome {
    /// Left without a result.
    Left,
    /// Lost connection.
    Disconnected,
    /// Lost the game.
    Lost,
    /// Won the game.
    Won,
    /// Draw.
    Draw,
    /// Documented reason with a result code outside the known tables.
    Unrecognized,
    /// Undocumented reason; no meaning is asserted.
    Unverified,
}

impl fmt::Display for LeaveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LeaveOutcome::Left => "left",
            LeaveOutcome::Disconnected => "disconnected",
            LeaveOutcome::Lost => "lost",
            LeaveOutcome::Won => "won",
            LeaveOutcome::Draw => "draw",
            LeaveOutcome::Unrecognized => "unrecognized result",
            LeaveOutcome::Unverified => "unverified",
        };
        f.write_str(text)
    }
}

/// A leave-game record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeaveGame {
    /// Player who left.
    pub player_id: u8,
    /// Reason code.
    pub reason: LeaveReason,
    /// Raw result code.
    pub result_code: u32,
    /// Raw counter field following the result.
    pub unknown_flag: u32,
    /// Whether the counter advanced by one since the previous leave.
    /// Always false for the first leave and true in games of two or fewer
    /// players.
    pub incremented: bool,
}

impl LeaveGame {
    /// Interprets the result code. `is_last` is true for the final leave
    /// record of the replay.
    #[must_use]
    pub fn outcome(&self, is_last: bool) -> LeaveOutcome {
        match self.reason {
            LeaveReason::Remote => match self.result_code {
                0x01 | 0x07 | 0x0B | 0x0D => LeaveOutcome::Left,
                0x08 => LeaveOutcome::Lost,
                0x09 => LeaveOutcome::Won,
                0x0A => LeaveOutcome::Draw,
                _ => LeaveOutcome::Unrecognized,
            },
            LeaveReason::Local if is_last => match self.result_code {
                0x01 => LeaveOutcome::Disconnected,
                0x08 => LeaveOutcome::Lost,
                0x09 => LeaveOutcome::Won,
                0x07 | 0x0B if self.incremented => LeaveOutcome::Won,
                0x07 | 0x0B => LeaveOutcome::Lost,
                _ => LeaveOutcome::Unrecognized,
            },
            LeaveReason::Local => match self.result_code {
                0x01 => LeaveOutcome::Disconnected,
                0x07 => LeaveOutcome::Left,
                0x08 | 0x0B => LeaveOutcome::Lost,
                0x09 => LeaveOutcome::Won,
                0x0A => LeaveOutcome::Draw,
                _ => LeaveOutcome::Unrecognized,
            },
            LeaveReason::Undocumented(_) => LeaveOutcome::Unverified,
        }
    }
}

impl fmt::Display for LeaveGame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            LeaveReason::Undocumented(raw) => write!(
                f,
                "P{} left game (undocumented reason {raw:#x}, result {:#x})",
                self.player_id, self.result_code
            ),
            reason => write!(
                f,
                "P{} left game ({reason:?}, result {:#x})",
                self.player_id, self.result_code
            ),
        }
    }
}

/// Final result of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlayerResult {
    /// Won.
    Win,
    /// Lost.
    Loss,
    /// No result recorded or not interpretable.
    Unknown,
}

impl From<LeaveOutcome> for PlayerResult {
    fn from(outcome: LeaveOutcome) -> Self {
        match outcome {
            LeaveOutcome::Won => PlayerResult::Win,
            LeaveOutcome::Lost => PlayerResult::Loss,
            _ => PlayerResult::Unknown,
        }
    }
}

/// Countdown state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CountdownMode {
    /// Counting down.
    Running,
    /// Finished.
    Over,
}

/// Forced-end countdown record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Countdown {
    /// Running or over.
    pub mode: CountdownMode,
    /// Seconds left.
    pub remaining_secs: u32,
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            CountdownMode::Running => "running",
            CountdownMode::Over => "over",
        };
        write!(
            f,
            "game countdown {mode}, {:02}:{:02} left",
            self.remaining_secs / 60,
            self.remaining_secs % 60
        )
    }
}
