//! # Recording Error Types
//!
//! All errors that can occur while recording, encoding or transferring
//! killcam data. None of them is allowed to escape the frame update; the
//! system logs them and degrades.

use killcam_shared::EntityId;
use thiserror::Error;

use crate::packet::{CacheKind, PacketKind};

/// Errors that can occur in the recording system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    /// A packet does not fit even after evicting every closed frame.
    #[error("recording buffer full: need {needed} bytes, capacity {capacity}, free {free}")]
    BufferFull {
        /// Record size of the rejected packet.
        needed: usize,
        /// Buffer capacity.
        capacity: usize,
        /// Free bytes after maximal eviction.
        free: usize,
    },

    /// A packet payload exceeds what the size byte can describe.
    #[error("packet {kind:?} too large: {size} bytes")]
    PacketTooLarge {
        /// Kind of the packet.
        kind: PacketKind,
        /// Record size it would need.
        size: usize,
    },

    /// Unknown kind byte in a record.
    #[error("unknown packet kind {0}")]
    UnknownPacketKind(u8),

    /// Size byte smaller than the record header.
    #[error("invalid size {size} for packet {kind:?}")]
    InvalidPacketSize {
        /// Kind of the record.
        kind: PacketKind,
        /// Declared size.
        size: usize,
    },

    /// Record overruns the input.
    #[error("truncated record: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// Payload length does not match the kind's layout.
    #[error("payload mismatch for {kind:?}: layout needs {expected} bytes, record has {actual}")]
    PayloadMismatch {
        /// Kind of the record.
        kind: PacketKind,
        /// Bytes the layout consumed.
        expected: usize,
        /// Payload bytes present.
        actual: usize,
    },

    /// A field holds a value its layout forbids.
    #[error("invalid field {field} in {kind:?}")]
    InvalidField {
        /// Kind of the record.
        kind: PacketKind,
        /// Field name.
        field: &'static str,
    },

    /// String cache has no room for another entry.
    #[error("{kind:?} string cache full: {used}/{capacity} bytes")]
    StringCacheFull {
        /// Which cache.
        kind: CacheKind,
        /// Bytes in use.
        used: usize,
        /// Capacity.
        capacity: usize,
    },

    /// Compressed stream could not be decompressed.
    #[error("decompression failed: {0}")]
    Decompress(String),

    /// Stream fragment extends past the declared size.
    #[error("stream fragment at {offset}+{len} overruns declared size {declared}")]
    StreamOverflow {
        /// Fragment offset.
        offset: usize,
        /// Fragment length.
        len: usize,
        /// Declared final size.
        declared: usize,
    },

    /// Stream extent exceeds what a receiver accepts.
    #[error("stream extent {offset}+{len} exceeds the {limit} byte limit")]
    StreamTooLarge {
        /// Offset of the offending data.
        offset: usize,
        /// Length of the offending data.
        len: usize,
        /// Largest accepted stream.
        limit: usize,
    },

    /// Stream data arrived from a sender nobody expects.
    #[error("no stream expected from {sender}")]
    StreamNotExpected {
        /// Sending entity.
        sender: EntityId,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("configuration io: {0}")]
    ConfigIo(String),
}

/// Result type for recording operations.
pub type RecordingResult<T> = Result<T, RecordingError>;
