//! # KILLCAM Recording
//!
//! Capture side of the killcam: a bounded binary event log of the live
//! match, the highlight pool and the first-person transfer to the victim.
//!
//! ## Data Flow
//!
//! ```text
//!  game hooks ──► Recorder ──► tp buffer ──evict──► DiscardedState
//!                    │
//!                    └──────► fp buffer
//!
//!  kill ──► HighlightQueue ──► analyse ──► HighlightPool (4 slots)
//!   │
//!   └────► FpStream::build ──► lz4 ──► Streamer ══fragments══► StreamReassembly
//! ```
//!
//! ## Failure Model
//!
//! Nothing here may abort a match. Fallible building blocks return
//! [`RecordingResult`]; frame-driven code logs through `tracing` and
//! drops the affected cosmetic element.
//!
//! ## Example
//!
//! ```rust,ignore
//! use killcam_recording::{KillCamConfig, Recorder};
//!
//! let config = KillCamConfig::load("killcam.toml")?;
//! let mut recorder = Recorder::new(&config.buffers);
//! recorder.start(&world, now);
//! recorder.update(&world, now, dt); // every frame
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod discarded;
pub mod error;
pub mod highlights;
pub mod kill;
pub mod packet;
pub mod raycast;
pub mod recorder;
pub mod transfer;
pub mod world;

pub use buffer::{DiscardSink, FrameRule, NullSink, RecordingBuffer};
pub use config::{
    BufferConfig, BulletTimeConfig, CameraConfig, HighlightRules, KillCamConfig, Modifier,
    RuleEntry, RuleTable, SpecialCase, StreamConfig,
};
pub use discarded::{
    DiscardedParticle, DiscardedSound, DiscardedSpawn, DiscardedState, PlayerInitialState, MAX_FRAGMENT_TRIGGERS,
};
pub use error::{RecordingError, RecordingResult};
pub use highlights::{Admission, Highlight, HighlightPool, HighlightQueue, QueuedSave, MAX_HIGHLIGHT_DURATION};
pub use kill::{KillEvent, KillInfo, ProjectileKind};
pub use packet::{ByteOrder, ClassId, EmitterId, FpFlags, Packet, PacketKind, SoundId, TpFlags};
pub use raycast::RaycastQueue;
pub use recorder::{ParticleEvent, Recorder, RecorderState, TpSnapshot};
pub use transfer::{FpStream, FpStreamRequest, StreamKey, StreamMessage, StreamReassembly, Streamer};
pub use world::ReplayWorld;
