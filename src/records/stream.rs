//! Event stream decoding.
//!
//! The stream after the slot table is a sequence of tagged records. Every
//! tag has a length rule, so unknown payloads can be skipped, but a tag
//! without a rule makes the rest of the stream unreadable.
//!
//! | Tag | Record | Total length |
//! |-----|--------|--------------|
//! | 0x00 | end of stream | - |
//! | 0x17 | leave game | 14 |
//! | 0x1A-0x1C | startup records | 5 |
//! | 0x1E, 0x1F | time slot | 3 + `u16` at offset 1 |
//! | 0x20 | chat message | 4 + `u16` at offset 2 |
//! | 0x22 | checksum | 2 + `u8` at offset 1 |
//! | 0x23 | unknown | 11 |
//! | 0x2F | forced-end countdown | 9 |
//!
//! [`read_record`] decodes one record at an offset without side effects;
//! [`EventStream`] walks the records, keeps the game clock and expands them
//! into [`Event`]s.

use std::collections::VecDeque;

use tracing::{debug, trace};

use super::event::{
    ChatMessage, ChatMode, Countdown, CountdownMode, Event, EventKind, LeaveGame, LeaveReason,
};
use crate::actions::{Action, ActionContext, ActionIterator};
use crate::binary::ByteReader;
use crate::error::{ParserError, Result};

/// End-of-stream padding.
pub const TAG_END: u8 = 0x00;
/// Leave game record.
pub const TAG_LEAVE: u8 = 0x17;
/// First startup record.
pub const TAG_STARTUP_FIRST: u8 = 0x1A;
/// Last startup record.
pub const TAG_STARTUP_LAST: u8 = 0x1C;
/// Time slot record used by old builds.
pub const TAG_TIME_SLOT_OLD: u8 = 0x1E;
/// Time slot record.
pub const TAG_TIME_SLOT: u8 = 0x1F;
/// Chat message record.
pub const TAG_CHAT: u8 = 0x20;
/// Checksum record.
pub const TAG_CHECKSUM: u8 = 0x22;
/// Unknown fixed-size record.
pub const TAG_UNKNOWN_23: u8 = 0x23;
/// Forced-end countdown record.
pub const TAG_COUNTDOWN: u8 = 0x2F;

/// Chat flags value for lobby messages, which carry no mode field.
const CHAT_FLAGS_STARTUP: u8 = 0x10;

/// How the total length of a record is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthRule {
    /// Fixed total length, tag included.
    Fixed(usize),
    /// `u8` length at `offset`, plus `base` bytes.
    U8At {
        /// Offset of the length byte from the tag.
        offset: usize,
        /// Bytes up to and including the length field.
        base: usize,
    },
    /// `u16` length at `offset`, plus `base` bytes.
    U16At {
        /// Offset of the length field from the tag.
        offset: usize,
        /// Bytes up to and including the length field.
        base: usize,
    },
}

impl LengthRule {
    /// The rule for `tag`, or `None` if the tag is unknown.
    #[must_use]
    pub fn for_tag(tag: u8) -> Option<Self> {
        match tag {
            TAG_LEAVE => Some(LengthRule::Fixed(14)),
            TAG_STARTUP_FIRST..=TAG_STARTUP_LAST => Some(LengthRule::Fixed(5)),
            TAG_TIME_SLOT_OLD | TAG_TIME_SLOT => Some(LengthRule::U16At { offset: 1, base: 3 }),
            TAG_CHAT => Some(LengthRule::U16At { offset: 2, base: 4 }),
            TAG_CHECKSUM => Some(LengthRule::U8At { offset: 1, base: 2 }),
            TAG_UNKNOWN_23 => Some(LengthRule::Fixed(11)),
            TAG_COUNTDOWN => Some(LengthRule::Fixed(9)),
            _ => None,
        }
    }

    /// Total record length for a record starting at `record[0]`.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedInput` if the length field itself is cut off.
    pub fn total_len(&self, record: &[u8]) -> Result<usize> {
        match *self {
            LengthRule::Fixed(len) => Ok(len),
            LengthRule::U8At { offset, base } => record
                .get(offset)
                .map(|&len| base + usize::from(len))
                .ok_or_else(|| ParserError::truncated(offset + 1, record.len())),
            LengthRule::U16At { offset, base } => record
                .get(offset..offset + 2)
                .map(|len| base + usize::from(u16::from_le_bytes([len[0], len[1]])))
                .ok_or_else(|| ParserError::truncated(offset + 2, record.len())),
        }
    }
}

/// State needed to decode one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamContext {
    /// Build number from the replay header.
    pub build_number: u16,
    /// Game clock before the record.
    pub clock_ms: u32,
}

/// One decoded stream record.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Time slot with its actions, stamped with the advanced clock.
    TimeSlot {
        /// Milliseconds this slot adds to the clock.
        delta_ms: u16,
        /// Actions from all command blocks, in order.
        actions: Vec<Action>,
    },
    /// Chat message.
    Chat(ChatMessage),
    /// Leave game. `incremented` is left false; it depends on the
    /// previous leave and is filled in by [`EventStream`].
    Leave(LeaveGame),
    /// Checksum bytes.
    Checksum(Vec<u8>),
    /// Forced-end countdown.
    Countdown(Countdown),
    /// Known length, no decoded meaning.
    Opaque {
        /// Record tag.
        tag: u8,
        /// Bytes after the tag.
        payload: Vec<u8>,
    },
}

/// Decodes the record at `offset`.
///
/// Returns the record and the offset of the next one, or `None` at the end
/// of the stream (a zero tag or the end of the buffer).
///
/// # Errors
///
/// - `UnrecoverableTag` (without partial data) for a tag with no length rule
/// - `TruncatedInput` if the record's length runs past the buffer
/// - `MalformedRecord` for inconsistent inner lengths
pub fn read_record(
    data: &[u8],
    offset: usize,
    context: &StreamContext,
) -> Result<Option<(Record, usize)>> {
    let Some(&tag) = data.get(offset) else {
        return Ok(None);
    };
    if tag == TAG_END {
        return Ok(None);
    }

    let rule = LengthRule::for_tag(tag).ok_or(ParserError::UnrecoverableTag {
        tag,
        offset,
        partial: None,
    })?;
    let available = data.len() - offset;
    let total = rule.total_len(&data[offset..])?;
    if total > available {
        return Err(ParserError::truncated(total, available));
    }

    let mut reader = ByteReader::at(&data[..offset + total], offset + 1)?;
    let record = match tag {
        TAG_TIME_SLOT_OLD | TAG_TIME_SLOT => read_time_slot(&mut reader, offset, context)?,
        TAG_CHAT => Record::Chat(read_chat(&mut reader)?),
        TAG_LEAVE => Record::Leave(LeaveGame {
            reason: LeaveReason::from(reader.read_u32()?),
            player_id: reader.read_u8()?,
            result_code: reader.read_u32()?,
            unknown_flag: reader.read_u32()?,
            incremented: false,
        }),
        TAG_CHECKSUM => {
            reader.skip(1)?;
            Record::Checksum(reader.rest().to_vec())
        }
        TAG_COUNTDOWN => {
            let mode = if reader.read_u32()? == 0 {
                CountdownMode::Running
            } else {
                CountdownMode::Over
            };
            Record::Countdown(Countdown {
                mode,
                remaining_secs: reader.read_u32()?,
            })
        }
        _ => Record::Opaque {
            tag,
            payload: reader.rest().to_vec(),
        },
    };

    trace!(offset, tag = format_args!("{tag:#04x}"), total, "stream record");
    Ok(Some((record, offset + total)))
}

fn read_time_slot(
    reader: &mut ByteReader<'_>,
    offset: usize,
    context: &StreamContext,
) -> Result<Record> {
    let n = reader.read_u16()?;
    if n < 2 {
        return Err(ParserError::malformed(
            offset,
            format!("time slot length {n} too short for its delta"),
        ));
    }
    let delta_ms = reader.read_u16()?;
    let clock_ms = context.clock_ms.wrapping_add(u32::from(delta_ms));

    let mut actions = Vec::new();
    while !reader.is_empty() {
        let block_offset = reader.position();
        let player_id = reader.read_u8()?;
        let len = usize::from(reader.read_u16()?);
        let block = reader.sub_reader(len).map_err(|_| {
            ParserError::malformed(
                block_offset,
                format!("command block of {len} bytes overruns its time slot"),
            )
        })?;
        let ctx = ActionContext::new(context.build_number, player_id, clock_ms);
        actions.extend(ActionIterator::new(block, ctx));
    }

    Ok(Record::TimeSlot { delta_ms, actions })
}

fn read_chat(reader: &mut ByteReader<'_>) -> Result<ChatMessage> {
    let player_id = reader.read_u8()?;
    reader.skip(2)?;
    let flags = reader.read_u8()?;
    let mode = if flags == CHAT_FLAGS_STARTUP {
        ChatMode::Startup
    } else {
        ChatMode::from_mode(reader.read_u32()?)
    };
    let message = if reader.is_empty() {
        String::new()
    } else {
        reader.read_cstring()?
    };
    Ok(ChatMessage {
        player_id,
        flags,
        mode,
        message,
    })
}

/// Lazy iterator over the events of a decoded stream.
///
/// Yields `Ok(Event)` until the end of the stream. A decoding error is
/// yielded once and ends the iteration.
pub struct EventStream<'a> {
    data: &'a [u8],
    offset: usize,
    context: StreamContext,
    player_count: usize,
    last_leave_flag: Option<u32>,
    pending: VecDeque<Event>,
    finished: bool,
}

impl<'a> EventStream<'a> {
    /// Creates a stream over `data` starting at `offset`.
    ///
    /// `player_count` is the number of player records; it decides how the
    /// leave counter is interpreted.
    #[must_use]
    pub fn new(data: &'a [u8], offset: usize, build_number: u16, player_count: usize) -> Self {
        Self {
            data,
            offset,
            context: StreamContext {
                build_number,
                clock_ms: 0,
            },
            player_count,
            last_leave_flag: None,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Game clock after the records read so far.
    #[must_use]
    pub fn clock_ms(&self) -> u32 {
        self.context.clock_ms
    }

    /// Offset of the next record.
    #[must_use]
    pub fn current_offset(&self) -> usize {
        self.offset
    }

    /// Returns whether iteration is finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished && self.pending.is_empty()
    }

    fn expand(&mut self, record: Record, offset: usize) {
        let event = |time_ms, kind| Event {
            time_ms,
            offset,
            kind,
        };
        match record {
            Record::TimeSlot { delta_ms, actions } => {
                self.context.clock_ms = self.context.clock_ms.wrapping_add(u32::from(delta_ms));
                let clock = self.context.clock_ms;
                self.pending
                    .push_back(event(clock, EventKind::TimeSlot { delta_ms }));
                self.pending.extend(
                    actions
                        .into_iter()
                        .map(|action| event(clock, EventKind::Action(action))),
                );
            }
            Record::Leave(mut leave) => {
                leave.incremented = match self.last_leave_flag {
                    None => false,
                    Some(_) if self.player_count <= 2 => true,
                    Some(previous) => leave.unknown_flag == previous.wrapping_add(1),
                };
                self.last_leave_flag = Some(leave.unknown_flag);
                self.pending
                    .push_back(event(self.context.clock_ms, EventKind::LeftGame(leave)));
            }
            Record::Chat(chat) => self
                .pending
                .push_back(event(self.context.clock_ms, EventKind::Chat(chat))),
            Record::Checksum(bytes) => self
                .pending
                .push_back(event(self.context.clock_ms, EventKind::Checksum(bytes))),
            Record::Countdown(countdown) => self
                .pending
                .push_back(event(self.context.clock_ms, EventKind::Countdown(countdown))),
            Record::Opaque { tag, payload } => self.pending.push_back(event(
                self.context.clock_ms,
                EventKind::Opaque { tag, payload },
            )),
        }
    }
}

impl Iterator for EventStream<'_> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            match read_record(self.data, self.offset, &self.context) {
                Ok(Some((record, next))) => {
                    let offset = self.offset;
                    self.offset = next;
                    self.expand(record, offset);
                }
                Ok(None) => {
                    debug!(offset = self.offset, clock_ms = self.context.clock_ms, "end of stream");
                    self.finished = true;
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionType;

    const BUILD: u16 = 6059;

    fn time_slot(delta: u16, blocks: &[(u8, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&delta.to_le_bytes());
        for (player, actions) in blocks {
            body.push(*player);
            body.extend_from_slice(&u16::try_from(actions.len()).unwrap().to_le_bytes());
            body.extend_from_slice(actions);
        }
        let mut record = vec![TAG_TIME_SLOT];
        record.extend_from_slice(&u16::try_from(body.len()).unwrap().to_le_bytes());
        record.extend_from_slice(&body);
        record
    }

    fn leave_record(player: u8, reason: u32, result: u32, flag: u32) -> Vec<u8> {
        let mut record = vec![TAG_LEAVE];
        record.extend_from_slice(&reason.to_le_bytes());
        record.push(player);
        record.extend_from_slice(&result.to_le_bytes());
        record.extend_from_slice(&flag.to_le_bytes());
        record
    }

    fn collect(data: &[u8], players: usize) -> Result<Vec<Event>> {
        EventStream::new(data, 0, BUILD, players).collect()
    }

    // ========================================================================
    // Length Rules
    // ========================================================================

    #[test]
    fn test_length_rules() {
        assert_eq!(LengthRule::for_tag(0x17), Some(LengthRule::Fixed(14)));
        assert_eq!(LengthRule::for_tag(0x1B), Some(LengthRule::Fixed(5)));
        assert_eq!(LengthRule::for_tag(0x99), None);

        let rule = LengthRule::for_tag(TAG_CHAT).unwrap();
        assert_eq!(rule.total_len(&[0x20, 0x01, 0x06, 0x00]).unwrap(), 10);

        let rule = LengthRule::for_tag(TAG_CHECKSUM).unwrap();
        assert_eq!(rule.total_len(&[0x22, 0x04]).unwrap(), 6);
        assert!(rule.total_len(&[0x22]).is_err());
    }

    // ========================================================================
    // Record Decoding
    // ========================================================================

    #[test]
    fn test_read_time_slot_is_pure() {
        let data = time_slot(250, &[(1, &[0x61][..])]);
        let context = StreamContext {
            build_number: BUILD,
            clock_ms: 1000,
        };
        let (record, next) = read_record(&data, 0, &context).unwrap().unwrap();
        assert_eq!(next, data.len());
        match record {
            Record::TimeSlot { delta_ms, actions } => {
                assert_eq!(delta_ms, 250);
                assert_eq!(actions.len(), 1);
                assert_eq!(actions[0].timestamp_ms, 1250);
                assert_eq!(actions[0].player_id, 1);
            }
            other => panic!("unexpected record {other:?}"),
        }
        assert_eq!(context.clock_ms, 1000);
    }

    #[test]
    fn test_read_chat() {
        let mut data = vec![TAG_CHAT, 0x02, 0x00, 0x00, 0x00];
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(b"gl hf\0");
        let n = u16::try_from(data.len() - 4).unwrap();
        data[2..4].copy_from_slice(&n.to_le_bytes());
        data[4] = 0x20;

        let (record, next) = read_record(&data, 0, &StreamContext::default())
            .unwrap()
            .unwrap();
        assert_eq!(next, data.len());
        assert_eq!(
            record,
            Record::Chat(ChatMessage {
                player_id: 2,
                flags: 0x20,
                mode: ChatMode::Allies,
                message: "gl hf".to_string(),
            })
        );
    }

    #[test]
    fn test_startup_chat_has_no_mode() {
        let mut data = vec![TAG_CHAT, 0x01, 0x00, 0x00, CHAT_FLAGS_STARTUP];
        data.extend_from_slice(b"hi\0");
        let n = u16::try_from(data.len() - 4).unwrap();
        data[2..4].copy_from_slice(&n.to_le_bytes());
        let (record, _) = read_record(&data, 0, &StreamContext::default())
            .unwrap()
            .unwrap();
        match record {
            Record::Chat(chat) => {
                assert_eq!(chat.mode, ChatMode::Startup);
                assert_eq!(chat.message, "hi");
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn test_end_of_stream() {
        assert!(read_record(&[0x00, 0x17], 0, &StreamContext::default())
            .unwrap()
            .is_none());
        assert!(read_record(&[0x1A], 1, &StreamContext::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unknown_tag() {
        let err = read_record(&[0x1A, 0, 0, 0, 0, 0x99], 5, &StreamContext::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ParserError::UnrecoverableTag {
                tag: 0x99,
                offset: 5,
                partial: None
            }
        ));
    }

    #[test]
    fn test_truncated_record() {
        let err = read_record(&[0x17, 0x01, 0x00], 0, &StreamContext::default()).unwrap_err();
        assert!(matches!(
            err,
            ParserError::TruncatedInput {
                expected: 14,
                available: 3
            }
        ));
    }

    #[test]
    fn test_block_overrunning_slot() {
        let mut data = time_slot(0, &[(1, &[0x61][..])]);
        // claim the block is longer than the slot
        data[6] = 0x05;
        let err = read_record(&data, 0, &StreamContext::default()).unwrap_err();
        assert!(matches!(err, ParserError::MalformedRecord { offset: 5, .. }));
    }

    // ========================================================================
    // Event Stream
    // ========================================================================

    #[test]
    fn test_clock_accumulates() {
        let mut data = time_slot(100, &[]);
        data.extend(time_slot(200, &[(1, &[0x61][..])]));
        data.extend_from_slice(&[TAG_STARTUP_FIRST, 0, 0, 0, 0]);

        let mut stream = EventStream::new(&data, 0, BUILD, 2);
        let events: Vec<Event> = stream.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].time_ms, 100);
        assert_eq!(events[1].kind, EventKind::TimeSlot { delta_ms: 200 });
        assert_eq!(events[2].time_ms, 300);
        assert_eq!(
            events[2].as_action().map(|a| &a.action_type),
            Some(&ActionType::EscapeKey)
        );
        assert!(matches!(events[3].kind, EventKind::Opaque { tag: 0x1A, .. }));
        assert_eq!(stream.clock_ms(), 300);
        assert!(stream.is_finished());
    }

    #[test]
    fn test_unknown_action_resumes_next_block() {
        let data = time_slot(0, &[(1, &[0x99, 0x01][..]), (2, &[0x61][..])]);
        let events = collect(&data, 2).unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[1].as_action().map(|a| &a.action_type),
            Some(ActionType::Unknown { id: 0x99, .. })
        ));
        assert_eq!(events[2].player_id(), Some(2));
    }

    #[test]
    fn test_leave_increment_two_players() {
        let mut data = leave_record(1, 0x01, 0x08, 5);
        data.extend(leave_record(2, 0x0C, 0x09, 0));
        let events = collect(&data, 2).unwrap();
        let leaves: Vec<&LeaveGame> = events
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::LeftGame(leave) => Some(leave),
                _ => None,
            })
            .collect();
        assert!(!leaves[0].incremented);
        assert!(leaves[1].incremented);
    }

    #[test]
    fn test_leave_increment_counter() {
        let mut data = leave_record(1, 0x0C, 0x07, 3);
        data.extend(leave_record(2, 0x0C, 0x07, 4));
        data.extend(leave_record(3, 0x0C, 0x07, 9));
        let events = collect(&data, 4).unwrap();
        let flags: Vec<bool> = events
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::LeftGame(leave) => Some(leave.incremented),
                _ => None,
            })
            .collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn test_error_ends_stream() {
        let mut data = time_slot(50, &[]);
        data.push(0x99);
        let mut stream = EventStream::new(&data, 0, BUILD, 2);
        assert!(stream.next().unwrap().is_ok());
        assert!(stream.next().unwrap().is_err());
        assert!(stream.next().is_none());
    }
}
