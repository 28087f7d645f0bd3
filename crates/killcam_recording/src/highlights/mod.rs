//! # Highlights
//!
//! A fixed pool of the most fun kills of the match.
//!
//! ```text
//!  local kill ──► HighlightQueue ──(kick-in time)──► analyse ──► HighlightPool
//!                  extends on further kills            score        [0] [1] [2] [3]
//!                                                                   min evicted only by
//!                                                                   a strictly higher score
//! ```
//!
//! An admitted highlight owns a deep copy of its third-person frames and
//! its compressed first-person stream. The buffers keep evicting; the
//! copy keeps its resource handles alive until the slot is cleaned up.

pub mod scoring;

use killcam_shared::MAX_HIGHLIGHTS;
use tracing::{info, warn};

use crate::config::HighlightRules;
use crate::kill::KillInfo;
use crate::packet::ByteOrder;
use crate::recorder::{Recorder, TpSnapshot};
use crate::transfer::{FpStream, FpStreamRequest};

pub use scoring::{analyse, analyse_recorder, Analysis, Candidate, SpecialCases};

/// Longest clip a queued save may be extended to, in seconds
pub const MAX_HIGHLIGHT_DURATION: f32 = 8.0;

/// A saved clip
#[derive(Clone, Debug)]
pub struct Highlight {
    /// First kill of the clip
    pub kill: KillInfo,
    /// Kills inside the clip
    pub kill_count: u32,
    /// Clip start
    pub start: f32,
    /// Clip end
    pub end: f32,
    /// Fun score
    pub score: f32,
    /// Third-person frames from `start`
    pub tp: TpSnapshot,
    /// Compressed first-person stream
    pub fp_stream: Vec<u8>,
}

impl Highlight {
    /// Clip length in seconds
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.end - self.start
    }
}

/// Outcome of offering a score to the pool
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Stored in a free slot
    Filled(usize),
    /// Replaced the lowest-scoring slot
    Replaced(usize),
    /// Not stored
    Rejected,
}

/// Fixed-capacity highlight storage
#[derive(Debug)]
pub struct HighlightPool {
    slots: [Option<Highlight>; MAX_HIGHLIGHTS],
}

impl Default for HighlightPool {
    fn default() -> Self {
        Self::new()
    }
}

impl HighlightPool {
    /// Empty pool
    #[must_use]
    pub fn new() -> Self {
        Self { slots: std::array::from_fn(|_| None) }
    }

    /// Where a clip scoring `score` would go
    #[must_use]
    pub fn admission_for(&self, score: f32) -> Admission {
        if let Some(free) = self.slots.iter().position(Option::is_none) {
            return Admission::Filled(free);
        }
        let lowest = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|h| (i, h.score)))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match lowest {
            Some((index, lowest)) if score > lowest => Admission::Replaced(index),
            _ => Admission::Rejected,
        }
    }

    /// Offers a finished highlight. Ties keep the existing clip.
    pub fn admit(&mut self, highlight: Highlight) -> Admission {
        let admission = self.admission_for(highlight.score);
        match admission {
            Admission::Filled(index) | Admission::Replaced(index) => self.slots[index] = Some(highlight),
            Admission::Rejected => {}
        }
        admission
    }

    /// Scores a queued save against the recorder and stores it when it
    /// makes the cut. The clip ends at `now`.
    pub fn save(
        &mut self,
        recorder: &Recorder,
        rules: &HighlightRules,
        queued: &QueuedSave,
        now: f32,
        order: ByteOrder,
    ) -> Admission {
        let candidate =
            Candidate { kill: queued.kill, kill_count: queued.kill_count, start: queued.start, end: now };
        let analysis = analyse_recorder(rules, &candidate, recorder);
        if analysis.earliest_time > queued.kill.death_time {
            info!(
                earliest = analysis.earliest_time,
                death_time = queued.kill.death_time,
                "highlight rejected, not enough recorded data"
            );
            return Admission::Rejected;
        }
        let start = analysis.earliest_time.max(queued.start);

        let admission = self.admission_for(analysis.fun);
        if admission == Admission::Rejected {
            info!(score = analysis.fun, "highlight rejected, pool holds better clips");
            return admission;
        }

        let request = FpStreamRequest {
            victim: queued.kill.victim,
            from: start,
            to: now,
            death_time: queued.kill.death_time,
            bullet_time: queued.kill.bullet_time,
            time_offset: 0.0,
        };
        let fp_stream = match FpStream::build(recorder, &request).encode(order) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, "highlight first-person stream dropped");
                Vec::new()
            }
        };
        let highlight = Highlight {
            kill: queued.kill,
            kill_count: queued.kill_count,
            start,
            end: now,
            score: analysis.fun,
            tp: recorder.snapshot(start),
            fp_stream,
        };
        let admission = self.admit(highlight);
        info!(?admission, score = analysis.fun, start, end = now, kills = queued.kill_count, "highlight saved");
        admission
    }

    /// Highlight in `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Highlight> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Used slots with their index
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Highlight)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| slot.as_ref().map(|h| (i, h)))
    }

    /// Number of used slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// True when no slot is used
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every slot and the resources its packets hold
    pub fn clear(&mut self) {
        self.slots = std::array::from_fn(|_| None);
    }

    /// Summed length of every saved clip
    #[must_use]
    pub fn reel_length(&self) -> f32 {
        self.iter().map(|(_, h)| h.duration()).sum()
    }

    /// Used slot indices by ascending end time
    #[must_use]
    pub fn play_order(&self) -> Vec<usize> {
        let mut order: Vec<(usize, f32)> = self.iter().map(|(i, h)| (i, h.end)).collect();
        order.sort_by(|a, b| a.1.total_cmp(&b.1));
        order.into_iter().map(|(i, _)| i).collect()
    }
}

// =============================================================================
// SAVE QUEUE
// =============================================================================

/// A save waiting for its kick-in time
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueuedSave {
    /// First kill
    pub kill: KillInfo,
    /// Kills so far
    pub kill_count: u32,
    /// Requested clip start
    pub start: f32,
    /// Seconds until the save happens
    pub timer: f32,
}

/// Delays highlight saves so that follow-up kills join the same clip
#[derive(Clone, Debug, Default)]
pub struct HighlightQueue {
    pending: Option<QueuedSave>,
}

impl HighlightQueue {
    /// Empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a save for `kill`, or extends the pending one. Returns
    /// false when the extension would make the clip too long.
    pub fn queue_kill(&mut self, kill: &KillInfo, now: f32, kick_in_time: f32, length: f32) -> bool {
        if let Some(pending) = &mut self.pending {
            let duration = now + kick_in_time - pending.start;
            if duration > MAX_HIGHLIGHT_DURATION {
                info!(duration, "queued highlight not extended, too long");
                return false;
            }
            pending.timer = kick_in_time;
            pending.kill_count += 1;
            info!(duration, kills = pending.kill_count, "queued highlight extended");
            return true;
        }
        let mut kill = *kill;
        kill.winning_kill = false;
        self.pending =
            Some(QueuedSave { kill, kill_count: 1, start: now + kick_in_time - length, timer: kick_in_time });
        true
    }

    /// Counts down and returns the save once it is due
    pub fn update(&mut self, dt: f32) -> Option<QueuedSave> {
        let pending = self.pending.as_mut()?;
        pending.timer -= dt;
        if pending.timer <= 0.0 {
            self.pending.take()
        } else {
            None
        }
    }

    /// Pending save
    #[must_use]
    pub const fn pending(&self) -> Option<&QueuedSave> {
        self.pending.as_ref()
    }

    /// Drops the pending save
    pub fn clear(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BufferConfig;
    use crate::discarded::DiscardedState;
    use crate::packet::{FpChar, FpFlags, Packet};
    use killcam_shared::{EntityId, QuatT, Vec3};

    fn kill(death_time: f32) -> KillInfo {
        KillInfo::new(EntityId::new(1), EntityId::new(2), death_time)
    }

    fn highlight(score: f32, end: f32) -> Highlight {
        Highlight {
            kill: kill(end - 1.0),
            kill_count: 1,
            start: end - 4.0,
            end,
            score,
            tp: TpSnapshot { discarded: DiscardedState::new(), packets: Vec::new() },
            fp_stream: Vec::new(),
        }
    }

    fn full_pool() -> HighlightPool {
        let mut pool = HighlightPool::new();
        for (i, score) in [3.0, 1.0, 2.0, 4.0].into_iter().enumerate() {
            assert_eq!(pool.admit(highlight(score, 10.0 * (i + 1) as f32)), Admission::Filled(i));
        }
        pool
    }

    #[test]
    fn test_higher_score_replaces_exactly_the_minimum() {
        let mut pool = full_pool();
        assert_eq!(pool.admit(highlight(1.5, 50.0)), Admission::Replaced(1));
        let scores: Vec<f32> = pool.iter().map(|(_, h)| h.score).collect();
        assert_eq!(scores, vec![3.0, 1.5, 2.0, 4.0]);
        assert_eq!(pool.len(), MAX_HIGHLIGHTS);
    }

    #[test]
    fn test_lower_or_equal_score_changes_nothing() {
        let mut pool = full_pool();
        assert_eq!(pool.admit(highlight(1.0, 50.0)), Admission::Rejected);
        assert_eq!(pool.admit(highlight(0.5, 60.0)), Admission::Rejected);
        let ends: Vec<f32> = pool.iter().map(|(_, h)| h.end).collect();
        assert_eq!(ends, vec![10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_reel_and_play_order() {
        let mut pool = HighlightPool::new();
        pool.admit(highlight(1.0, 30.0));
        pool.admit(highlight(1.0, 10.0));
        pool.admit(highlight(1.0, 20.0));
        assert_eq!(pool.play_order(), vec![1, 2, 0]);
        assert_eq!(pool.reel_length(), 12.0);
        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.reel_length(), 0.0);
    }

    #[test]
    fn test_queue_extends_within_limit() {
        let mut queue = HighlightQueue::new();
        let mut first = kill(10.0);
        first.winning_kill = true;
        assert!(queue.queue_kill(&first, 10.0, 2.0, 4.0));
        let pending = *queue.pending().unwrap();
        assert_eq!(pending.start, 8.0);
        assert!(!pending.kill.winning_kill);

        assert!(queue.update(1.5).is_none());
        assert!(queue.queue_kill(&kill(11.5), 11.5, 2.0, 4.0));
        assert_eq!(queue.pending().unwrap().kill_count, 2);
        assert_eq!(queue.pending().unwrap().timer, 2.0);

        // 14.5 + 2 - 8 = 8.5 s is too long
        assert!(!queue.queue_kill(&kill(14.5), 14.5, 2.0, 4.0));
        assert_eq!(queue.pending().unwrap().kill_count, 2);

        assert!(queue.update(1.0).is_none());
        let due = queue.update(1.0).unwrap();
        assert_eq!(due.kill_count, 2);
        assert_eq!(due.kill.death_time, 10.0);
        assert!(queue.pending().is_none());
    }

    #[test]
    fn test_save_rejects_clip_older_than_buffers() {
        let recorder = Recorder::new(&BufferConfig::default());
        let mut pool = HighlightPool::new();
        let queued = QueuedSave { kill: kill(5.0), kill_count: 1, start: 3.0, timer: 0.0 };
        let admission = pool.save(&recorder, &HighlightRules::default(), &queued, 7.0, ByteOrder::Little);
        assert_eq!(admission, Admission::Rejected);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_saved_stream_decodes() {
        let stream = FpStream {
            samples: vec![FpChar {
                frame_time: 1.0,
                camera: QuatT::from_translation(Vec3::new(0.0, 0.0, 1.7)),
                relative: QuatT::IDENTITY,
                fov: 1.0,
                flags: FpFlags::ON_GROUND,
            }],
            ..FpStream::default()
        };
        let mut h = highlight(2.0, 10.0);
        h.fp_stream = stream.encode(ByteOrder::Little).unwrap();
        let mut pool = HighlightPool::new();
        pool.admit(h);
        let saved = pool.get(0).unwrap();
        let decoded = FpStream::decode(&saved.fp_stream, ByteOrder::Little).unwrap();
        assert_eq!(decoded.to_packets(), vec![Packet::FpChar(stream.samples[0])]);
    }
}
