//! Synthetic replay files for the integration tests.
//!
//! [`ReplayBuilder`] assembles a decoded payload (setup records followed by
//! an event stream), splits it into 8 KiB blocks, compresses each block with
//! zlib and writes a classic header in front. [`FileParts`] exposes the
//! compressed blocks so tests can drop or damage them before assembly.

#![allow(dead_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use w3g_replay::format::CLASSIC_MAGIC;
use w3g_replay::records::game_header::encode_string;

/// Build used for classic replays (1.26).
pub const CLASSIC_BUILD: u16 = 6059;

/// Build used for Reforged replays.
pub const REFORGED_BUILD: u16 = 6105;

/// Decompressed size of every block.
pub const BLOCK_SIZE: usize = 8192;

/// Slot status byte for an occupied slot.
pub const SLOT_USED: u8 = 0x02;

/// Slot status byte for a closed slot.
pub const SLOT_CLOSED: u8 = 0x01;

/// Race flag bytes as stored in slot records.
pub mod race {
    pub const HUMAN: u8 = 0x01;
    pub const ORC: u8 = 0x02;
    pub const NIGHT_ELF: u8 = 0x04;
    pub const UNDEAD: u8 = 0x08;
    pub const RANDOM: u8 = 0x20;
}

/// One compressed block and its sub-header values.
#[derive(Debug, Clone)]
pub struct Block {
    /// Compressed size written to the sub-header.
    pub declared_compressed: u32,
    /// Decompressed size written to the sub-header.
    pub declared_decompressed: u32,
    /// The zlib bytes.
    pub data: Vec<u8>,
}

/// A replay file before assembly.
#[derive(Debug, Clone)]
pub struct FileParts {
    /// Game version number.
    pub version: u32,
    /// Build number.
    pub build: u16,
    /// Recorded duration.
    pub duration_ms: u32,
    /// Declared total decompressed size.
    pub decompressed_size: u32,
    /// Declared block count.
    pub block_count: u32,
    /// The blocks, in file order.
    pub blocks: Vec<Block>,
}

impl FileParts {
    /// True for Reforged version numbers, which use 12-byte sub-headers.
    fn long_block_headers(&self) -> bool {
        self.version >= 10000
    }

    /// Writes the classic header and every block.
    pub fn assemble(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for block in &self.blocks {
            if self.long_block_headers() {
                body.extend_from_slice(&block.declared_compressed.to_le_bytes());
                body.extend_from_slice(&block.declared_decompressed.to_le_bytes());
            } else {
                body.extend_from_slice(&(block.declared_compressed as u16).to_le_bytes());
                body.extend_from_slice(&(block.declared_decompressed as u16).to_le_bytes());
            }
            body.extend_from_slice(&0u32.to_le_bytes());
            body.extend_from_slice(&block.data);
        }

        let mut file = Vec::with_capacity(0x44 + body.len());
        file.extend_from_slice(CLASSIC_MAGIC);
        file.extend_from_slice(&0x44u32.to_le_bytes());
        file.extend_from_slice(&((0x44 + body.len()) as u32).to_le_bytes());
        file.extend_from_slice(&1u32.to_le_bytes());
        file.extend_from_slice(&self.decompressed_size.to_le_bytes());
        file.extend_from_slice(&self.block_count.to_le_bytes());
        file.extend_from_slice(b"PX3W");
        file.extend_from_slice(&self.version.to_le_bytes());
        file.extend_from_slice(&self.build.to_le_bytes());
        file.extend_from_slice(&0x8000u16.to_le_bytes());
        file.extend_from_slice(&self.duration_ms.to_le_bytes());
        file.extend_from_slice(&0u32.to_le_bytes());
        file.extend_from_slice(&body);
        file
    }

    /// Wraps the assembled classic file in a GRBN container.
    pub fn assemble_grbn(&self) -> Vec<u8> {
        let mut file = vec![0u8; 128];
        file[..4].copy_from_slice(b"GRBN");
        file[4..8].copy_from_slice(&2u32.to_le_bytes());
        file.extend_from_slice(&compress(b"metadata"));
        file.extend_from_slice(&[0u8; 16]);
        file.extend(self.assemble());
        file
    }
}

/// Compresses `data` as one zlib stream.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

struct PlayerSpec {
    id: u8,
    name: String,
    extra: Vec<u8>,
}

/// Builds synthetic replay files.
pub struct ReplayBuilder {
    version: u32,
    build: u16,
    duration_ms: u32,
    game_name: String,
    map_path: String,
    creator: String,
    players: Vec<PlayerSpec>,
    before_slots: Vec<u8>,
    slots: Vec<[u8; 9]>,
    stream: Vec<u8>,
}

impl Default for ReplayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayBuilder {
    /// A classic 1.26 replay with no players and an empty stream.
    pub fn new() -> Self {
        Self {
            version: 26,
            build: CLASSIC_BUILD,
            duration_ms: 0,
            game_name: "Synthetic Game".to_string(),
            map_path: "Maps\\FrozenThrone\\(2)EchoIsles.w3x".to_string(),
            creator: "Builder".to_string(),
            players: Vec::new(),
            before_slots: Vec::new(),
            slots: Vec::new(),
            stream: Vec::new(),
        }
    }

    /// Switches to a Reforged version number and build.
    pub fn reforged(mut self) -> Self {
        self.version = 10032;
        self.build = REFORGED_BUILD;
        self
    }

    /// Overrides the build number.
    pub fn build_number(mut self, build: u16) -> Self {
        self.build = build;
        self
    }

    /// Sets the header duration.
    pub fn duration(mut self, duration_ms: u32) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Adds a player record. The first player is the host.
    pub fn player(self, id: u8, name: &str) -> Self {
        self.player_with_extra(id, name, &[0])
    }

    /// Adds a player record with explicit additional data.
    pub fn player_with_extra(mut self, id: u8, name: &str, extra: &[u8]) -> Self {
        self.players.push(PlayerSpec {
            id,
            name: name.to_string(),
            extra: extra.to_vec(),
        });
        self
    }

    /// Adds a player record with 8-byte ladder data.
    pub fn ladder_player(self, id: u8, name: &str, race_flags: u32) -> Self {
        let mut extra = 120_000u32.to_le_bytes().to_vec();
        extra.extend_from_slice(&race_flags.to_le_bytes());
        self.player_with_extra(id, name, &extra)
    }

    /// Adds an occupied human slot.
    pub fn slot(mut self, player_id: u8, team: u8, color: u8, race_flags: u8) -> Self {
        self.slots
            .push([player_id, 100, SLOT_USED, 0, team, color, race_flags, 1, 100]);
        self
    }

    /// Adds a computer slot.
    pub fn computer_slot(mut self, team: u8, color: u8, race_flags: u8) -> Self {
        self.slots
            .push([0, 100, SLOT_USED, 1, team, color, race_flags, 1, 100]);
        self
    }

    /// Adds a closed slot.
    pub fn closed_slot(mut self, team: u8, color: u8) -> Self {
        self.slots
            .push([0, 0, SLOT_CLOSED, 0, team, color, race::RANDOM, 1, 100]);
        self
    }

    /// Raw bytes between the player records and the slot table.
    pub fn before_slots(mut self, bytes: &[u8]) -> Self {
        self.before_slots.extend_from_slice(bytes);
        self
    }

    /// Adds a Reforged player profile record.
    pub fn reforged_profile(self, player_id: u8, battle_tag: &str, clan: &str) -> Self {
        let mut body = vec![0x08, player_id];
        body.push(0x12);
        body.push(battle_tag.len() as u8);
        body.extend_from_slice(battle_tag.as_bytes());
        body.push(0x1A);
        body.push(clan.len() as u8);
        body.extend_from_slice(clan.as_bytes());

        let mut record = vec![0x39, 0x03];
        record.extend_from_slice(&(body.len() as u32).to_le_bytes());
        record.extend(body);
        self.before_slots(&record)
    }

    /// Appends a time slot with the given command blocks.
    pub fn time_slot(mut self, delta_ms: u16, blocks: &[(u8, Vec<u8>)]) -> Self {
        let mut body = delta_ms.to_le_bytes().to_vec();
        for (player_id, actions) in blocks {
            body.push(*player_id);
            body.extend_from_slice(&(actions.len() as u16).to_le_bytes());
            body.extend_from_slice(actions);
        }
        self.stream.push(0x1F);
        self.stream
            .extend_from_slice(&(body.len() as u16).to_le_bytes());
        self.stream.extend(body);
        self
    }

    /// Appends a chat message to all players.
    pub fn chat(mut self, player_id: u8, message: &str) -> Self {
        let n = 1 + 4 + message.len() + 1;
        self.stream.push(0x20);
        self.stream.push(player_id);
        self.stream.extend_from_slice(&(n as u16).to_le_bytes());
        self.stream.push(0x20);
        self.stream.extend_from_slice(&0u32.to_le_bytes());
        self.stream.extend_from_slice(message.as_bytes());
        self.stream.push(0);
        self
    }

    /// Appends a leave record.
    pub fn leave(mut self, reason: u32, player_id: u8, result: u32, counter: u32) -> Self {
        self.stream.push(0x17);
        self.stream.extend_from_slice(&reason.to_le_bytes());
        self.stream.push(player_id);
        self.stream.extend_from_slice(&result.to_le_bytes());
        self.stream.extend_from_slice(&counter.to_le_bytes());
        self
    }

    /// Appends a checksum record.
    pub fn checksum(mut self, bytes: &[u8]) -> Self {
        self.stream.push(0x22);
        self.stream.push(bytes.len() as u8);
        self.stream.extend_from_slice(bytes);
        self
    }

    /// Appends raw stream bytes.
    pub fn raw_stream(mut self, bytes: &[u8]) -> Self {
        self.stream.extend_from_slice(bytes);
        self
    }

    fn setup_records(&self) -> Vec<u8> {
        let mut data = 0x0000_0110u32.to_le_bytes().to_vec();
        match self.players.first() {
            Some(host) => write_player(&mut data, 0x00, host),
            None => write_player(
                &mut data,
                0x00,
                &PlayerSpec {
                    id: 1,
                    name: "Host".to_string(),
                    extra: vec![0],
                },
            ),
        }

        data.extend_from_slice(self.game_name.as_bytes());
        data.extend_from_slice(&[0, 0]);

        let mut settings = vec![0x02, 0b0100_0000, 0b0000_0110, 0b0000_0001, 0, 0, 0, 0, 0];
        settings.extend_from_slice(&0x1234_5678u32.to_le_bytes());
        settings.extend_from_slice(self.map_path.as_bytes());
        settings.push(0);
        settings.extend_from_slice(self.creator.as_bytes());
        settings.push(0);
        data.extend(encode_string(&settings));
        data.push(0);

        data.extend_from_slice(&(self.slots.len().max(self.players.len()) as u32).to_le_bytes());
        data.push(0x09);
        data.push(0x00);
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&0x0409u32.to_le_bytes());

        for player in self.players.iter().skip(1) {
            write_player(&mut data, 0x16, player);
            data.extend_from_slice(&[0; 4]);
        }
        data.extend_from_slice(&self.before_slots);

        data.push(0x19);
        data.extend_from_slice(&((7 + 9 * self.slots.len()) as u16).to_le_bytes());
        data.push(self.slots.len() as u8);
        for slot in &self.slots {
            data.extend_from_slice(slot);
        }
        data.extend_from_slice(&0xCAFE_F00Du32.to_le_bytes());
        data.push(0x00);
        data.push(self.slots.len() as u8);
        data
    }

    /// Offset of the event stream in the decoded payload.
    pub fn stream_offset(&self) -> usize {
        self.setup_records().len()
    }

    /// The decoded payload: setup records followed by the stream.
    pub fn payload(&self) -> Vec<u8> {
        let mut payload = self.setup_records();
        payload.extend_from_slice(&self.stream);
        payload
    }

    /// Splits, pads and compresses the payload.
    pub fn parts(&self) -> FileParts {
        let payload = self.payload();
        let blocks: Vec<Block> = payload
            .chunks(BLOCK_SIZE)
            .map(|chunk| {
                let mut padded = chunk.to_vec();
                padded.resize(BLOCK_SIZE, 0);
                let data = compress(&padded);
                Block {
                    declared_compressed: data.len() as u32,
                    declared_decompressed: BLOCK_SIZE as u32,
                    data,
                }
            })
            .collect();
        FileParts {
            version: self.version,
            build: self.build,
            duration_ms: self.duration_ms,
            decompressed_size: payload.len() as u32,
            block_count: blocks.len() as u32,
            blocks,
        }
    }

    /// The complete replay file.
    pub fn build(&self) -> Vec<u8> {
        self.parts().assemble()
    }
}

fn write_player(data: &mut Vec<u8>, record_id: u8, player: &PlayerSpec) {
    data.push(record_id);
    data.push(player.id);
    data.extend_from_slice(player.name.as_bytes());
    data.push(0);
    data.push(player.extra.len() as u8);
    data.extend_from_slice(&player.extra);
}

// ============================================================================
// Action Bytes
// ============================================================================

/// Ability without target (ids 0x10) for builds from 1.13 on.
pub fn train(fourcc: &[u8; 4]) -> Vec<u8> {
    let mut data = vec![0x10, 0x40, 0x00];
    data.extend(fourcc.iter().rev());
    data.extend_from_slice(&[0xFF; 8]);
    data
}

/// Right-click on the ground (ability with point target).
pub fn right_click(x: f32, y: f32) -> Vec<u8> {
    let mut data = vec![0x11, 0x00, 0x00, 0x03, 0x00, 0x0D, 0x00];
    data.extend_from_slice(&[0xFF; 8]);
    data.extend_from_slice(&x.to_le_bytes());
    data.extend_from_slice(&y.to_le_bytes());
    data
}

/// Change selection; mode 1 selects, 2 deselects.
pub fn selection(mode: u8, objects: &[(u32, u32)]) -> Vec<u8> {
    let mut data = vec![0x16, mode];
    data.extend_from_slice(&(objects.len() as u16).to_le_bytes());
    for (id1, id2) in objects {
        data.extend_from_slice(&id1.to_le_bytes());
        data.extend_from_slice(&id2.to_le_bytes());
    }
    data
}

/// Select a hotkey group.
pub fn select_group(group: u8) -> Vec<u8> {
    vec![0x18, group, 0x03]
}

/// Escape key.
pub fn escape() -> Vec<u8> {
    vec![0x61]
}

/// Pause (not counted for APM).
pub fn pause() -> Vec<u8> {
    vec![0x01]
}
