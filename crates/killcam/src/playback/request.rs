//! What to play and when.

use killcam_shared::EntityId;

use killcam_recording::{KillCamConfig, KillInfo, StreamKey, TpSnapshot};

/// Time window of a playback, in the viewer's recording clock
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackWindow {
    /// First shown moment
    pub start: f32,
    /// Last shown moment
    pub end: f32,
    /// Moment of death
    pub death: f32,
}

impl PlaybackWindow {
    /// Window of a live killcam requested at `now`, the moment of death.
    ///
    /// The clip ends `kick_in_time` after the death so the aftermath is
    /// part of it.
    #[must_use]
    pub fn live(config: &KillCamConfig, now: f32, bullet_time: bool) -> Self {
        let end = now + config.kick_in_time;
        Self { start: end - config.clip_length(bullet_time), end, death: now }
    }

    /// Death time relative to the window start
    #[must_use]
    pub fn rel_death(&self) -> f32 {
        self.death - self.start
    }

    /// Shown duration
    #[must_use]
    pub fn length(&self) -> f32 {
        self.end - self.start
    }

    /// Same window moved by `offset` seconds
    #[must_use]
    pub fn shifted(self, offset: f32) -> Self {
        Self { start: self.start + offset, end: self.end + offset, death: self.death + offset }
    }
}

/// A saved highlight handed to the engine
#[derive(Clone, Debug)]
pub struct HighlightClip {
    /// Pool slot it was copied from
    pub index: usize,
    /// Third-person data from the clip start
    pub tp: TpSnapshot,
    /// Compressed first-person stream
    pub fp_stream: Vec<u8>,
}

/// Where the first-person half of a playback comes from
#[derive(Clone, Debug)]
pub enum FpSource {
    /// The local first-person buffer, read when the clip starts
    Local,
    /// Streamed by `sender` and reassembled here
    Remote {
        /// Killer whose view is streamed
        sender: EntityId,
    },
    /// A saved highlight
    Highlight(Box<HighlightClip>),
}

/// A request to show one kill
#[derive(Clone, Debug)]
pub struct PlaybackRequest {
    /// The kill
    pub kill: KillInfo,
    /// Seconds to wait after the window end
    pub delay: f32,
    /// First-person data source
    pub source: FpSource,
    /// Explicit window, derived from the configuration when `None`
    pub window: Option<PlaybackWindow>,
}

impl PlaybackRequest {
    /// Live killcam of `kill` streamed by its killer
    #[must_use]
    pub fn remote(kill: KillInfo, delay: f32) -> Self {
        Self { kill, delay, source: FpSource::Remote { sender: kill.killer }, window: None }
    }

    /// Killcam of `kill` from the local first-person buffer
    #[must_use]
    pub fn local(kill: KillInfo, delay: f32) -> Self {
        Self { kill, delay, source: FpSource::Local, window: None }
    }

    /// Stream this request waits for, if any
    #[must_use]
    pub fn stream_key(&self) -> Option<StreamKey> {
        match self.source {
            FpSource::Remote { sender } => Some(StreamKey { sender, victim: self.kill.victim }),
            FpSource::Local | FpSource::Highlight(_) => None,
        }
    }

    /// Pool slot of a highlight request
    #[must_use]
    pub fn highlight_index(&self) -> Option<usize> {
        match &self.source {
            FpSource::Highlight(clip) => Some(clip.index),
            FpSource::Local | FpSource::Remote { .. } => None,
        }
    }
}
