//! # Transfer
//!
//! Packs the first-person view of a kill into a compressed [`FpStream`]
//! payload and moves it to the viewer in fragments.
//!
//! ```text
//! ┌──────────────┬──────────────────┬───────────┬─────────────┐
//! │ FpChar ...   │ VictimPosition.. │ actions.. │ time offset │ ──► lz4 ──► fragments
//! └──────────────┴──────────────────┴───────────┴─────────────┘
//! ```

pub mod simplify;
pub mod stream;

use killcam_shared::{EntityId, Vec3};
use tracing::debug;

use crate::error::{RecordingError, RecordingResult};
use crate::packet::{
    decode_stream, encode_stream, ByteOrder, FpChar, KillHitPosition, Packet, PlaybackTimeOffset,
    VictimPosition,
};
use crate::recorder::Recorder;

pub use simplify::{simplify_victim_positions, MIN_SAMPLE_SPACING, POSITION_TOLERANCE};
pub use stream::{StreamKey, StreamMessage, StreamReassembly, Streamer};

/// What to pack into an [`FpStream`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FpStreamRequest {
    /// Victim whose positions are included
    pub victim: EntityId,
    /// Window start
    pub from: f32,
    /// Window end, exclusive for first-person data
    pub to: f32,
    /// Time of death, kept exactly in the victim path
    pub death_time: f32,
    /// Include the kill hit position
    pub bullet_time: bool,
    /// Shift applied to the playback window on the viewer
    pub time_offset: f32,
}

/// First-person data for one playback
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FpStream {
    /// Camera samples, oldest first
    pub samples: Vec<FpChar>,
    /// Simplified victim path
    pub victim_positions: Vec<VictimPosition>,
    /// Flashes, chatter, hit feedback and the kill hit position
    pub actions: Vec<Packet>,
    /// Playback window shift
    pub time_offset: f32,
}

impl FpStream {
    /// Collects the stream for `request` from the recorder's buffers
    #[must_use]
    pub fn build(recorder: &Recorder, request: &FpStreamRequest) -> Self {
        let in_window = |time: f32| time >= request.from && time < request.to;
        let mut stream = Self { time_offset: request.time_offset, ..Self::default() };

        for packet in recorder.fp_buffer().iter() {
            match packet {
                Packet::FpChar(sample) if in_window(sample.frame_time) => stream.samples.push(*sample),
                Packet::KillHitPosition(hit) => {
                    if request.bullet_time && hit.victim == request.victim && in_window(hit.frame_time) {
                        stream.actions.push(packet.clone());
                    }
                }
                Packet::Flashed(_)
                | Packet::RenderNearest(_)
                | Packet::BattleChatter(_)
                | Packet::PlayerHealthEffect(_) => {
                    if packet.timestamp().is_some_and(in_window) {
                        stream.actions.push(packet.clone());
                    }
                }
                _ => {}
            }
        }

        let path: Vec<VictimPosition> = recorder
            .tp_buffer()
            .iter_timed()
            .filter(|(time, _)| *time >= request.from && *time <= request.to)
            .filter_map(|(time, packet)| match packet {
                Packet::TpChar(chr) if chr.entity == request.victim => {
                    Some(VictimPosition { frame_time: time, position: chr.location.t })
                }
                _ => None,
            })
            .collect();
        stream.victim_positions = simplify_victim_positions(&path, request.death_time);
        debug!(
            samples = stream.samples.len(),
            victim_positions = stream.victim_positions.len(),
            raw_victim_positions = path.len(),
            actions = stream.actions.len(),
            "first-person stream built"
        );
        stream
    }

    /// True when there is no camera sample
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time of the first camera sample on the recording machine
    #[must_use]
    pub fn start_time(&self) -> Option<f32> {
        self.samples.first().map(|sample| sample.frame_time)
    }

    /// Kill hit position of the stream, when present
    #[must_use]
    pub fn kill_hit(&self) -> Option<KillHitPosition> {
        self.actions.iter().find_map(|packet| match packet {
            Packet::KillHitPosition(hit) => Some(*hit),
            _ => None,
        })
    }

    /// Victim position at `time`, lerped along the simplified path
    #[must_use]
    pub fn victim_position_at(&self, time: f32) -> Option<Vec3> {
        let first = self.victim_positions.first()?;
        if time <= first.frame_time {
            return Some(first.position);
        }
        for pair in self.victim_positions.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if time <= b.frame_time {
                let span = b.frame_time - a.frame_time;
                let frac = if span > 0.0 { (time - a.frame_time) / span } else { 1.0 };
                return Some(Vec3::lerp(a.position, b.position, frac));
            }
        }
        self.victim_positions.last().map(|last| last.position)
    }

    /// Records in stream order
    #[must_use]
    pub fn to_packets(&self) -> Vec<Packet> {
        let mut packets: Vec<Packet> = self.samples.iter().copied().map(Packet::FpChar).collect();
        packets.extend(self.victim_positions.iter().copied().map(Packet::VictimPosition));
        packets.extend(self.actions.iter().cloned());
        if self.time_offset != 0.0 {
            packets.push(Packet::PlaybackTimeOffset(PlaybackTimeOffset { offset: self.time_offset }));
        }
        packets
    }

    /// Sorts decoded records back into their sections
    #[must_use]
    pub fn from_packets(packets: impl IntoIterator<Item = Packet>) -> Self {
        let mut stream = Self::default();
        for packet in packets {
            match packet {
                Packet::FpChar(sample) => stream.samples.push(sample),
                Packet::VictimPosition(position) => stream.victim_positions.push(position),
                Packet::PlaybackTimeOffset(offset) => stream.time_offset = offset.offset,
                other => stream.actions.push(other),
            }
        }
        stream
    }

    /// Serializes and compresses the stream.
    ///
    /// # Errors
    ///
    /// Propagates codec errors for unencodable packets.
    pub fn encode(&self, order: ByteOrder) -> RecordingResult<Vec<u8>> {
        let raw = encode_stream(&self.to_packets(), order)?;
        Ok(lz4_flex::compress_prepend_size(&raw))
    }

    /// Decompresses and decodes a stream produced by [`FpStream::encode`].
    ///
    /// # Errors
    ///
    /// [`RecordingError::Decompress`] for corrupt payloads, or any codec
    /// error for malformed records.
    pub fn decode(bytes: &[u8], order: ByteOrder) -> RecordingResult<Self> {
        let raw = lz4_flex::decompress_size_prepended(bytes)
            .map_err(|err| RecordingError::Decompress(err.to_string()))?;
        Ok(Self::from_packets(decode_stream(&raw, order)?))
    }
}
