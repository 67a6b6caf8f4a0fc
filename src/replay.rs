//! The decoded replay.
//!
//! [`Replay::parse`] runs the whole pipeline: header, block decompression,
//! setup records, roster reconciliation and the event stream. The result
//! owns everything it decoded and is read-only afterwards.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::decompress::decompress;
use crate::error::{ParserError, Result};
use crate::header::ReplayHeader;
use crate::metrics::{self, MetricsConfig, ReplayMetrics, Winner};
use crate::records::{
    Event, EventStream, GameMetadata, GameRecord, PlayerRecord, Race, Roster, SlotRecord,
    SlotTable,
};

/// The decoded payload, kept for re-iterating the event stream.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    /// The decoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decoded size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for an empty payload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({} bytes)", self.0.len())
    }
}

/// A fully decoded replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Replay {
    header: ReplayHeader,
    metadata: GameMetadata,
    players: Vec<PlayerRecord>,
    slots: SlotTable,
    unmatched_slots: Vec<SlotRecord>,
    events: Vec<Event>,
    duration_ms: u32,
    stream_offset: usize,
    #[serde(skip)]
    payload: Payload,
}

impl Replay {
    /// Decodes a replay file.
    ///
    /// # Errors
    ///
    /// Any [`ParserError`]. `UnrecoverableTag` carries the replay decoded
    /// up to the offending tag.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use w3g_replay::Replay;
    ///
    /// let data = std::fs::read("replay.w3g").unwrap();
    /// let replay = Replay::parse(&data)?;
    /// for player in replay.players() {
    ///     println!("{} ({})", player.name, player.race);
    /// }
    /// # Ok::<(), w3g_replay::ParserError>(())
    /// ```
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = ReplayHeader::parse(data)?;
        debug!(
            format = ?header.format,
            build = header.build_number,
            blocks = header.block_count,
            "parsed header"
        );
        let inflated = decompress(data, &header)?;
        let record = GameRecord::parse(&inflated.data, header.layout()?)?;
        let mut roster = Roster::build(&record.players, &record.slots.slots, &record.reforged);

        let mut stream = EventStream::new(
            &inflated.data,
            record.stream_offset,
            header.build_number,
            record.players.len(),
        );
        let mut events = Vec::new();
        let mut failure = None;
        for item in stream.by_ref() {
            match item {
                Ok(event) => events.push(event),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        let duration_ms = stream.clock_ms();
        if duration_ms != header.duration_ms {
            debug!(
                header_ms = header.duration_ms,
                stream_ms = duration_ms,
                "stream clock differs from header duration"
            );
        }

        roster.apply_leaves(&events);
        let replay = Replay {
            header,
            metadata: record.metadata,
            players: roster.players,
            slots: record.slots,
            unmatched_slots: roster.unmatched_slots,
            events,
            duration_ms,
            stream_offset: record.stream_offset,
            payload: Payload(inflated.data),
        };

        match failure {
            None => {
                info!(
                    players = replay.players.len(),
                    events = replay.events.len(),
                    duration_ms,
                    "decoded replay"
                );
                Ok(replay)
            }
            Some(ParserError::UnrecoverableTag { tag, offset, .. }) => {
                warn!(
                    tag = format_args!("{tag:#04x}"),
                    offset,
                    events = replay.events.len(),
                    "stopped at unrecoverable tag"
                );
                Err(ParserError::UnrecoverableTag {
                    tag,
                    offset,
                    partial: Some(Box::new(replay)),
                })
            }
            Some(err) => Err(err),
        }
    }

    /// The file header.
    #[must_use]
    pub fn header(&self) -> &ReplayHeader {
        &self.header
    }

    /// Match-level metadata.
    #[must_use]
    pub fn metadata(&self) -> &GameMetadata {
        &self.metadata
    }

    /// Players in record order, host first.
    #[must_use]
    pub fn players(&self) -> &[PlayerRecord] {
        &self.players
    }

    /// The slot table as recorded.
    #[must_use]
    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    /// Slots no player claimed.
    #[must_use]
    pub fn unmatched_slots(&self) -> &[SlotRecord] {
        &self.unmatched_slots
    }

    /// Final game clock of the event stream.
    #[must_use]
    pub fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    /// Offset of the event stream in the payload.
    #[must_use]
    pub fn stream_offset(&self) -> usize {
        self.stream_offset
    }

    /// Looks up a player by id.
    #[must_use]
    pub fn player(&self, id: u8) -> Option<&PlayerRecord> {
        self.players.iter().find(|p| p.id == id)
    }

    /// The hosting player.
    #[must_use]
    pub fn host(&self) -> Option<&PlayerRecord> {
        self.players.iter().find(|p| p.is_host)
    }

    /// Events in stream order.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Decodes the event stream again, lazily.
    #[must_use]
    pub fn event_stream(&self) -> EventStream<'_> {
        EventStream::new(
            self.payload.as_bytes(),
            self.stream_offset,
            self.header.build_number,
            self.players.len(),
        )
    }

    /// The decoded payload.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The winner, explicit or inferred.
    #[must_use]
    pub fn winner(&self) -> Winner {
        metrics::determine_winner(&self.players, &self.events)
    }

    /// APM of one player over the whole game.
    #[must_use]
    pub fn player_apm(&self, id: u8) -> Option<f64> {
        self.player(id)?;
        let count = metrics::action_count(&self.events, id);
        Some(metrics::apm(count, self.duration_ms))
    }

    /// Declared race, or the revealed race for a random player.
    #[must_use]
    pub fn resolved_race(&self, id: u8) -> Option<Race> {
        self.player(id)
            .map(|player| metrics::resolve_race(player, &self.events))
    }

    /// All derived statistics.
    #[must_use]
    pub fn metrics(&self, config: &MetricsConfig) -> ReplayMetrics {
        ReplayMetrics::compute(&self.players, &self.events, self.duration_ms, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_debug_prints_length() {
        let payload = Payload(vec![0; 300]);
        assert_eq!(format!("{payload:?}"), "Payload(300 bytes)");
        assert_eq!(payload.len(), 300);
        assert!(Payload::default().is_empty());
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_results_are_send_and_sync() {
        assert_send_sync::<Replay>();
        assert_send_sync::<ParserError>();
        assert_send_sync::<ReplayMetrics>();
    }

    #[test]
    fn test_parse_rejects_unknown_signature() {
        let err = Replay::parse(b"not a replay at all, just some bytes").unwrap_err();
        assert!(matches!(err, ParserError::UnsupportedFormat { .. }));
    }
}
