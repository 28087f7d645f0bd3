//! # Recording Buffer
//!
//! Bounded, append-only packet store that evicts whole leading frames.
//!
//! ```text
//!   oldest                                               newest
//!   | F 10.00 | a b c | F 10.05 | d e | F 10.10 | f g h ...      |
//!   '------ frame ----'                 '-- open frame ---'
//!        evicted first                    never evicted by a
//!                                         non-frame packet
//! ```
//!
//! Capacity is accounted in encoded record bytes. Frames are the unit of
//! eviction, so a reader never sees a torn frame. Every evicted packet is
//! handed to a [`DiscardSink`] together with the time of its frame.

use std::collections::VecDeque;

use tracing::warn;

use crate::error::{RecordingError, RecordingResult};
use crate::packet::{Packet, PacketKind};

/// Receives packets evicted from a [`RecordingBuffer`]
pub trait DiscardSink {
    /// Called once per evicted packet, oldest first
    fn discard(&mut self, packet: Packet, frame_time: f32);
}

/// Sink that drops evicted packets
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiscardSink for NullSink {
    #[inline]
    fn discard(&mut self, _packet: Packet, _frame_time: f32) {}
}

/// Which packets open a new frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameRule {
    /// Only frame markers
    Markers,
    /// Frame markers and first-person samples, each of which carries its own time
    SelfTimed,
}

#[derive(Debug, Clone)]
struct Stored {
    packet: Packet,
    size: u16,
}

/// Bounded whole-frame-evicting packet store
#[derive(Debug, Clone)]
pub struct RecordingBuffer {
    name: &'static str,
    packets: VecDeque<Stored>,
    used: usize,
    capacity: usize,
    frame_rule: FrameRule,
    openers: usize,
}

impl RecordingBuffer {
    /// Creates an empty buffer holding at most `capacity` encoded bytes
    #[must_use]
    pub fn new(name: &'static str, capacity: usize, frame_rule: FrameRule) -> Self {
        Self {
            name,
            packets: VecDeque::new(),
            used: 0,
            capacity,
            frame_rule,
            openers: 0,
        }
    }

    /// Buffer name used in diagnostics
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Capacity in bytes
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Encoded bytes in use
    #[must_use]
    pub const fn len_bytes(&self) -> usize {
        self.used
    }

    /// Free bytes
    #[must_use]
    pub const fn free_bytes(&self) -> usize {
        self.capacity - self.used
    }

    /// Number of stored packets
    #[must_use]
    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }

    /// Number of frames
    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.openers
    }

    /// True when nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// True when `packet` starts a new frame in this buffer
    #[must_use]
    pub fn opens_frame(&self, packet: &Packet) -> bool {
        match self.frame_rule {
            FrameRule::Markers => packet.kind() == PacketKind::FrameMarker,
            FrameRule::SelfTimed => {
                matches!(packet.kind(), PacketKind::FrameMarker | PacketKind::FpChar)
            }
        }
    }

    fn frame_time_of(&self, packet: &Packet) -> Option<f32> {
        if self.opens_frame(packet) {
            packet.timestamp()
        } else {
            None
        }
    }

    /// Appends `packet` at the tail, evicting closed leading frames until it
    /// fits. Returns the number of evicted frames.
    ///
    /// The frame being written is only evicted when `packet` itself opens a
    /// new frame.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError::PacketTooLarge`] for records the size byte
    /// cannot describe and [`RecordingError::BufferFull`] when the packet
    /// does not fit after maximal eviction. The packet is dropped in both
    /// cases and the buffer keeps whatever eviction already happened.
    pub fn append(&mut self, packet: Packet, sink: &mut impl DiscardSink) -> RecordingResult<usize> {
        let size = packet.byte_size();
        if size > usize::from(u8::MAX) {
            warn!(buffer = self.name, kind = ?packet.kind(), size, "packet too large, dropped");
            return Err(RecordingError::PacketTooLarge { kind: packet.kind(), size });
        }
        let stored_size = size as u16;

        let opens = self.opens_frame(&packet);
        let mut evicted = 0;
        while self.used + size > self.capacity && self.can_evict_front(opens) {
            self.evict_front_frame(sink);
            evicted += 1;
        }

        if self.used + size > self.capacity {
            warn!(
                buffer = self.name,
                kind = ?packet.kind(),
                size,
                free = self.free_bytes(),
                "recording buffer full, packet dropped"
            );
            return Err(RecordingError::BufferFull {
                needed: size,
                capacity: self.capacity,
                free: self.free_bytes(),
            });
        }

        if opens {
            self.openers += 1;
        }
        self.used += size;
        self.packets.push_back(Stored { packet, size: stored_size });
        Ok(evicted)
    }

    fn can_evict_front(&self, incoming_opens: bool) -> bool {
        let Some(front) = self.packets.front() else {
            return false;
        };
        let front_is_opener = self.opens_frame(&front.packet);
        let later_openers = self.openers - usize::from(front_is_opener);
        later_openers > 0 || incoming_opens
    }

    /// Drops the oldest frame: every packet up to, not including, the next
    /// frame opener. Returns the number of packets removed.
    pub fn remove_oldest_frame(&mut self, sink: &mut impl DiscardSink) -> usize {
        self.evict_front_frame(sink)
    }

    fn evict_front_frame(&mut self, sink: &mut impl DiscardSink) -> usize {
        let Some(front) = self.packets.front() else {
            return 0;
        };
        let frame_time = match self.frame_time_of(&front.packet) {
            Some(time) => time,
            // Headless leading packets take the time of the frame that follows them
            None => self
                .packets
                .iter()
                .find_map(|stored| self.frame_time_of(&stored.packet))
                .unwrap_or(0.0),
        };

        let mut removed = 0;
        while let Some(stored) = self.packets.pop_front() {
            if self.opens_frame(&stored.packet) {
                self.openers -= 1;
            }
            self.used -= usize::from(stored.size);
            removed += 1;
            sink.discard(stored.packet, frame_time);
            if self.packets.front().map_or(true, |next| self.opens_frame(&next.packet)) {
                break;
            }
        }
        removed
    }

    /// Drops everything without notifying a sink
    pub fn clear(&mut self) {
        self.packets.clear();
        self.used = 0;
        self.openers = 0;
    }

    /// Packets from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Packet> + '_ {
        self.packets.iter().map(|stored| &stored.packet)
    }

    /// Packets paired with the time of the frame they belong to.
    ///
    /// Packets preceding the first frame report the first frame's time,
    /// or 0 when the buffer holds no frame at all.
    pub fn iter_timed(&self) -> impl Iterator<Item = (f32, &Packet)> + '_ {
        let first = self.oldest_time().unwrap_or(0.0);
        let mut current = first;
        self.packets.iter().map(move |stored| {
            if let Some(time) = self.frame_time_of(&stored.packet) {
                current = time;
            }
            (current, &stored.packet)
        })
    }

    /// Times of every frame, oldest first
    pub fn frame_times(&self) -> impl Iterator<Item = f32> + '_ {
        self.packets.iter().filter_map(|stored| self.frame_time_of(&stored.packet))
    }

    /// Time of the oldest frame
    #[must_use]
    pub fn oldest_time(&self) -> Option<f32> {
        self.frame_times().next()
    }

    /// Time of the newest frame
    #[must_use]
    pub fn newest_time(&self) -> Option<f32> {
        self.packets.iter().rev().find_map(|stored| self.frame_time_of(&stored.packet))
    }

    /// Seconds covered by the stored frames
    #[must_use]
    pub fn buffer_length_seconds(&self) -> f32 {
        match (self.oldest_time(), self.newest_time()) {
            (Some(oldest), Some(newest)) => newest - oldest,
            _ => 0.0,
        }
    }

    /// Copies every frame whose time is at or after `from_time`
    #[must_use]
    pub fn copy_range(&self, from_time: f32) -> Vec<Packet> {
        self.copy_range_between(from_time, f32::INFINITY)
    }

    /// Copies every frame whose time lies in `from_time..=to_time`.
    ///
    /// Cloning a packet adds a reference to each resource handle it carries.
    #[must_use]
    pub fn copy_range_between(&self, from_time: f32, to_time: f32) -> Vec<Packet> {
        self.iter_timed()
            .filter(|(time, _)| *time >= from_time && *time <= to_time)
            .map(|(_, packet)| packet.clone())
            .collect()
    }
}
