//! Fragmented stream transfer.
//!
//! The sender splits a payload into fragments and releases a few per
//! update. The receiver accepts fragments in any order and reports
//! completion once the declared size has arrived; callers poll.

use std::collections::{HashMap, VecDeque};

use killcam_shared::EntityId;
use tracing::{debug, warn};

use crate::error::{RecordingError, RecordingResult};

/// Identifies one transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey {
    /// Entity sending the data (the killer)
    pub sender: EntityId,
    /// Entity the data is for (the victim)
    pub victim: EntityId,
}

/// Message handed to the host transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessage {
    /// Declares the final size, sent before the first fragment
    Header {
        /// Transfer
        key: StreamKey,
        /// Payload size in bytes
        total_size: usize,
    },
    /// Slice of the payload
    Fragment {
        /// Transfer
        key: StreamKey,
        /// Byte offset into the payload
        offset: usize,
        /// Fragment bytes
        data: Vec<u8>,
    },
}

// =============================================================================
// SENDER
// =============================================================================

#[derive(Debug)]
struct Outgoing {
    key: StreamKey,
    data: Vec<u8>,
    sent: usize,
    announced: bool,
}

/// Releases queued payloads a few fragments at a time
#[derive(Debug)]
pub struct Streamer {
    pending: VecDeque<Outgoing>,
    outbox: Vec<StreamMessage>,
    fragment_bytes: usize,
    fragments_per_update: usize,
}

impl Streamer {
    /// Creates an idle streamer
    #[must_use]
    pub fn new(fragment_bytes: usize, fragments_per_update: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            outbox: Vec::new(),
            fragment_bytes: fragment_bytes.max(1),
            fragments_per_update: fragments_per_update.max(1),
        }
    }

    /// Queues a payload. A payload queued again for the same key replaces
    /// whatever of the old one was not yet released.
    pub fn queue(&mut self, key: StreamKey, data: Vec<u8>) {
        self.pending.retain(|outgoing| outgoing.key != key);
        debug!(sender = %key.sender, victim = %key.victim, bytes = data.len(), "stream queued");
        self.pending.push_back(Outgoing { key, data, sent: 0, announced: false });
    }

    /// Moves up to `fragments_per_update` fragments into the outbox
    pub fn update(&mut self) {
        let mut budget = self.fragments_per_update;
        while budget > 0 {
            let Some(outgoing) = self.pending.front_mut() else {
                break;
            };
            if !outgoing.announced {
                outgoing.announced = true;
                self.outbox.push(StreamMessage::Header { key: outgoing.key, total_size: outgoing.data.len() });
            }
            if outgoing.sent < outgoing.data.len() {
                let end = (outgoing.sent + self.fragment_bytes).min(outgoing.data.len());
                self.outbox.push(StreamMessage::Fragment {
                    key: outgoing.key,
                    offset: outgoing.sent,
                    data: outgoing.data[outgoing.sent..end].to_vec(),
                });
                outgoing.sent = end;
                budget -= 1;
            }
            if outgoing.sent >= outgoing.data.len() {
                self.pending.pop_front();
            }
        }
    }

    /// Drains the outbox
    pub fn take_outgoing(&mut self) -> Vec<StreamMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// True when nothing is queued or waiting in the outbox
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.outbox.is_empty()
    }

    /// Drops every queued payload
    pub fn clear(&mut self) {
        self.pending.clear();
        self.outbox.clear();
    }
}

// =============================================================================
// RECEIVER
// =============================================================================

#[derive(Debug, Default)]
struct Incoming {
    declared: Option<usize>,
    data: Vec<u8>,
    present: Vec<bool>,
    received: usize,
}

impl Incoming {
    /// End of a fragment, checked against the declared size or, before the
    /// header, against `limit`
    fn fragment_end(&self, offset: usize, len: usize, limit: usize) -> RecordingResult<usize> {
        let too_large = RecordingError::StreamTooLarge { offset, len, limit };
        let end = offset.checked_add(len).ok_or_else(|| too_large.clone())?;
        match self.declared {
            Some(declared) if end > declared => Err(RecordingError::StreamOverflow { offset, len, declared }),
            None if end > limit => Err(too_large),
            _ => Ok(end),
        }
    }

    fn is_complete(&self) -> bool {
        self.declared.is_some_and(|declared| self.received == declared)
    }
}

/// Reassembles expected streams from fragments.
///
/// Every stream is bounded by `max_bytes`, both its declared size and
/// the extent of fragments that arrive before the header.
#[derive(Debug)]
pub struct StreamReassembly {
    incoming: HashMap<StreamKey, Incoming>,
    max_bytes: usize,
}

impl StreamReassembly {
    /// Creates a receiver with no expectations that accepts streams of up
    /// to `max_bytes`
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self { incoming: HashMap::new(), max_bytes }
    }

    /// Largest accepted stream
    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Starts accepting data for `key`, discarding anything received before
    pub fn expect(&mut self, key: StreamKey) {
        self.incoming.insert(key, Incoming::default());
    }

    /// Stops accepting data for `key`
    pub fn cancel(&mut self, key: StreamKey) {
        self.incoming.remove(&key);
    }

    /// Drops every expectation
    pub fn clear(&mut self) {
        self.incoming.clear();
    }

    /// Number of open expectations
    #[must_use]
    pub fn expected_count(&self) -> usize {
        self.incoming.len()
    }

    /// True while `key` is expected
    #[must_use]
    pub fn is_expected(&self, key: StreamKey) -> bool {
        self.incoming.contains_key(&key)
    }

    /// Records the declared final size of `key`.
    ///
    /// # Errors
    ///
    /// [`RecordingError::StreamNotExpected`] for unknown keys,
    /// [`RecordingError::StreamTooLarge`] past the size limit and
    /// [`RecordingError::StreamOverflow`] when fragments already received
    /// extend past the declared size or a second header disagrees.
    pub fn receive_header(&mut self, key: StreamKey, total_size: usize) -> RecordingResult<()> {
        let limit = self.max_bytes;
        let incoming = self.incoming_mut(key)?;
        let result = if total_size > limit {
            Err(RecordingError::StreamTooLarge { offset: 0, len: total_size, limit })
        } else if incoming.data.len() > total_size || incoming.declared.is_some_and(|d| d != total_size) {
            Err(RecordingError::StreamOverflow { offset: 0, len: incoming.data.len(), declared: total_size })
        } else {
            Ok(())
        };
        if let Err(err) = result {
            warn!(%err, sender = %key.sender, "stream header rejected");
            return Err(err);
        }
        incoming.declared = Some(total_size);
        incoming.data.resize(total_size, 0);
        incoming.present.resize(total_size, false);
        Ok(())
    }

    /// Stores a fragment. Bytes already received are left untouched.
    /// Returns whether the stream is now complete.
    ///
    /// # Errors
    ///
    /// [`RecordingError::StreamNotExpected`] for unknown keys,
    /// [`RecordingError::StreamOverflow`] for fragments past the declared
    /// size and [`RecordingError::StreamTooLarge`] for fragments past the
    /// size limit before the header arrived.
    pub fn receive_fragment(&mut self, key: StreamKey, offset: usize, bytes: &[u8]) -> RecordingResult<bool> {
        let limit = self.max_bytes;
        let incoming = self.incoming_mut(key)?;
        let end = match incoming.fragment_end(offset, bytes.len(), limit) {
            Ok(end) => end,
            Err(err) => {
                warn!(%err, sender = %key.sender, "stream fragment rejected");
                return Err(err);
            }
        };
        if incoming.data.len() < end {
            incoming.data.resize(end, 0);
            incoming.present.resize(end, false);
        }
        for (i, &byte) in bytes.iter().enumerate() {
            let at = offset + i;
            if !incoming.present[at] {
                incoming.present[at] = true;
                incoming.data[at] = byte;
                incoming.received += 1;
            }
        }
        Ok(incoming.is_complete())
    }

    /// True once every declared byte of `key` has arrived
    #[must_use]
    pub fn is_complete(&self, key: StreamKey) -> bool {
        self.incoming.get(&key).is_some_and(Incoming::is_complete)
    }

    /// Bytes received so far for `key`
    #[must_use]
    pub fn received_bytes(&self, key: StreamKey) -> usize {
        self.incoming.get(&key).map_or(0, |incoming| incoming.received)
    }

    /// Removes and returns a completed payload
    pub fn take(&mut self, key: StreamKey) -> Option<Vec<u8>> {
        if !self.is_complete(key) {
            return None;
        }
        self.incoming.remove(&key).map(|incoming| incoming.data)
    }

    fn incoming_mut(&mut self, key: StreamKey) -> RecordingResult<&mut Incoming> {
        self.incoming
            .get_mut(&key)
            .ok_or(RecordingError::StreamNotExpected { sender: key.sender })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const KEY: StreamKey = StreamKey { sender: EntityId(1), victim: EntityId(2) };
    const LIMIT: usize = 4096;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn test_streamer_rate_limits_fragments() {
        let mut streamer = Streamer::new(100, 2);
        streamer.queue(KEY, payload(450));
        streamer.update();
        let first = streamer.take_outgoing();
        assert_eq!(first.len(), 3);
        assert_eq!(first[0], StreamMessage::Header { key: KEY, total_size: 450 });

        let mut fragments = 2;
        while !streamer.is_idle() {
            streamer.update();
            fragments += streamer.take_outgoing().len();
        }
        assert_eq!(fragments, 5);
    }

    #[test]
    fn test_out_of_order_reassembly_with_duplicates() {
        let data = payload(1000);
        let mut streamer = Streamer::new(64, 100);
        streamer.queue(KEY, data.clone());
        streamer.update();
        let mut messages = streamer.take_outgoing();
        let header = messages.remove(0);
        let duplicate = messages[3].clone();
        messages.push(duplicate);
        messages.shuffle(&mut ChaCha8Rng::seed_from_u64(7));

        let mut receiver = StreamReassembly::new(LIMIT);
        receiver.expect(KEY);
        if let StreamMessage::Header { key, total_size } = header {
            receiver.receive_header(key, total_size).unwrap();
        }
        assert!(!receiver.is_complete(KEY));
        for message in messages {
            if let StreamMessage::Fragment { key, offset, data } = message {
                receiver.receive_fragment(key, offset, &data).unwrap();
            }
        }
        assert!(receiver.is_complete(KEY));
        assert_eq!(receiver.take(KEY), Some(data));
        assert_eq!(receiver.expected_count(), 0);
    }

    #[test]
    fn test_overflow_and_unexpected() {
        let mut receiver = StreamReassembly::new(LIMIT);
        assert_eq!(
            receiver.receive_fragment(KEY, 0, &[1, 2]),
            Err(RecordingError::StreamNotExpected { sender: EntityId(1) })
        );
        receiver.expect(KEY);
        receiver.receive_header(KEY, 4).unwrap();
        assert_eq!(
            receiver.receive_fragment(KEY, 3, &[1, 2]),
            Err(RecordingError::StreamOverflow { offset: 3, len: 2, declared: 4 })
        );
        assert!(!receiver.receive_fragment(KEY, 0, &[1, 2]).unwrap());
        assert!(receiver.receive_fragment(KEY, 2, &[3, 4]).unwrap());
    }

    #[test]
    fn test_incomplete_stream_never_ready() {
        let mut receiver = StreamReassembly::new(LIMIT);
        receiver.expect(KEY);
        receiver.receive_header(KEY, 10).unwrap();
        receiver.receive_fragment(KEY, 0, &[0; 9]).unwrap();
        assert!(!receiver.is_complete(KEY));
        assert_eq!(receiver.received_bytes(KEY), 9);
        assert_eq!(receiver.take(KEY), None);
    }

    #[test]
    fn test_fragment_before_header_is_bounded() {
        let mut receiver = StreamReassembly::new(LIMIT);
        receiver.expect(KEY);
        assert_eq!(
            receiver.receive_fragment(KEY, usize::MAX - 1, &[1, 2, 3]),
            Err(RecordingError::StreamTooLarge { offset: usize::MAX - 1, len: 3, limit: LIMIT })
        );
        assert_eq!(
            receiver.receive_fragment(KEY, LIMIT, &[1]),
            Err(RecordingError::StreamTooLarge { offset: LIMIT, len: 1, limit: LIMIT })
        );
        assert_eq!(receiver.received_bytes(KEY), 0);

        // early fragments inside the limit are kept for the header
        assert!(!receiver.receive_fragment(KEY, 2, &[3, 4]).unwrap());
        receiver.receive_header(KEY, 4).unwrap();
        assert!(receiver.receive_fragment(KEY, 0, &[1, 2]).unwrap());
        assert_eq!(receiver.take(KEY), Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_hostile_header_sizes_rejected() {
        let mut receiver = StreamReassembly::new(LIMIT);
        receiver.expect(KEY);
        assert_eq!(
            receiver.receive_header(KEY, usize::MAX),
            Err(RecordingError::StreamTooLarge { offset: 0, len: usize::MAX, limit: LIMIT })
        );
        receiver.receive_fragment(KEY, 0, &[0; 8]).unwrap();
        assert_eq!(
            receiver.receive_header(KEY, 4),
            Err(RecordingError::StreamOverflow { offset: 0, len: 8, declared: 4 })
        );
        receiver.receive_header(KEY, 16).unwrap();
        assert!(receiver.receive_header(KEY, 32).is_err());
        assert_eq!(
            receiver.receive_fragment(KEY, usize::MAX, &[1]),
            Err(RecordingError::StreamTooLarge { offset: usize::MAX, len: 1, limit: LIMIT })
        );
        assert!(!receiver.is_complete(KEY));
    }
}
