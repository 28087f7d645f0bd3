//! # KILLCAM
//!
//! Replays the last seconds before a death from the killer's point of
//! view, and keeps a small pool of highlight clips per match.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        RecordingSystem                           │
//! │                                                                  │
//! │   hooks ──► Recorder ──► tp / fp buffers ──► HighlightPool       │
//! │                │                                                 │
//! │                └──► FpStream ──► Streamer ══► host transport     │
//! │                                                                  │
//! │   host transport ══► StreamReassembly ──┐                        │
//! │                                         ▼                        │
//! │                     PlaybackEngine: Queued → Setup → Playing     │
//! │                                         │                        │
//! │                                         ▼                        │
//! │                             ReplayWorld clones + camera          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on the simulation thread, one [`RecordingSystem::update`]
//! per tick. Nothing in here returns an error out of `update`; damaged or
//! missing data costs the affected cosmetic element only.
//!
//! ## Example
//!
//! ```rust,ignore
//! use killcam::{KillCamConfig, RecordingSystem};
//!
//! let mut killcam = RecordingSystem::new(KillCamConfig::load("killcam.toml")?);
//! killcam.set_local_player(player);
//! killcam.start_recording(&mut world);
//!
//! loop {
//!     killcam.update(&mut world, dt);
//!     if let Some(camera) = killcam.camera() {
//!         renderer.set_camera(camera.location, camera.fov);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod listener;
pub mod playback;
pub mod system;

pub use error::{KillCamError, KillCamResult};
pub use listener::{KillCamListener, PlaybackEvent};
pub use playback::{
    CameraParams, FpSource, HighlightClip, PlaybackEngine, PlaybackPhase, PlaybackRequest, PlaybackWindow,
    SetupStage, ViewMode,
};
pub use system::RecordingSystem;

pub use killcam_recording::{KillCamConfig, KillEvent, KillInfo, ProjectileKind, ReplayWorld, StreamKey, StreamMessage};
