//! # Playback Engine
//!
//! Shows one kill at a time in a replay world built from recorded frames.
//!
//! ```text
//!            request                 due && fp ready
//!  ┌──────┐ ───────► ┌────────┐ ─────────────────────► ┌───────┐ ────► ┌─────────┐
//!  │ Idle │          │ Queued │                        │ Setup │       │ Playing │
//!  └──────┘ ◄─────── └────────┘                        └───────┘       └─────────┘
//!      ▲     timeout                                                       │
//!      └───────────────────────────── reset ◄──────── frames exhausted ◄───┘
//! ```
//!
//! Every way out of a playback goes through [`PlaybackEngine::reset`],
//! which leaves the world as it found it.

pub mod apply;
pub mod bullet_time;
pub mod camera;
pub mod interpolate;
pub mod request;
pub mod session;
pub mod setup;

use tracing::{debug, info, warn};

use killcam_recording::{
    ByteOrder, FpStream, FpStreamRequest, KillCamConfig, RaycastQueue, Recorder, ReplayWorld,
    StreamReassembly, TpSnapshot,
};
use killcam_recording::world::UiEvent;

use crate::error::KillCamResult;
use crate::listener::PlaybackEvent;

pub use bullet_time::{BulletPhase, BulletTime};
pub use camera::{CameraParams, ViewMode};
pub use request::{FpSource, HighlightClip, PlaybackRequest, PlaybackWindow};
pub use session::{PlaybackSession, RaycastPurpose, ReplayClones, SessionPhase, SessionStep};
pub use setup::SetupStage;

/// Engine lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// Nothing requested
    Idle,
    /// Waiting for the start time or the first-person stream
    Queued,
    /// Building the replay world
    Setup(SetupStage),
    /// Replay running
    Playing,
}

#[derive(Debug)]
struct QueuedPlayback {
    request: PlaybackRequest,
    window: PlaybackWindow,
    expected: f32,
}

/// Killcam playback state machine
#[derive(Debug)]
pub struct PlaybackEngine {
    config: KillCamConfig,
    queued: Option<QueuedPlayback>,
    session: Option<PlaybackSession>,
    winning_unblocked: bool,
    reassembly: StreamReassembly,
    raycasts: RaycastQueue<RaycastPurpose>,
    events: Vec<PlaybackEvent>,
}

impl PlaybackEngine {
    /// Idle engine
    #[must_use]
    pub fn new(config: KillCamConfig) -> Self {
        Self {
            reassembly: StreamReassembly::new(config.streaming.max_stream_bytes),
            config,
            queued: None,
            session: None,
            winning_unblocked: false,
            raycasts: RaycastQueue::new(),
            events: Vec::new(),
        }
    }

    /// Lifecycle phase
    #[must_use]
    pub fn phase(&self) -> PlaybackPhase {
        match (&self.session, &self.queued) {
            (Some(session), _) => match session.phase() {
                SessionPhase::Setup(stage) => PlaybackPhase::Setup(stage),
                SessionPhase::Playing => PlaybackPhase::Playing,
            },
            (None, Some(_)) => PlaybackPhase::Queued,
            (None, None) => PlaybackPhase::Idle,
        }
    }

    /// True while anything is queued or running
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.phase() != PlaybackPhase::Idle
    }

    /// True while the replay clock runs
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.phase() == PlaybackPhase::Playing
    }

    /// Running session
    #[must_use]
    pub const fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// Replay clock of the running session
    #[must_use]
    pub fn clock(&self) -> Option<f32> {
        self.session.as_ref().map(PlaybackSession::clock)
    }

    /// Camera of the last playing update
    #[must_use]
    pub fn camera(&self) -> Option<&CameraParams> {
        self.session.as_ref().and_then(PlaybackSession::camera)
    }

    /// Deferred raycasts still in flight
    #[must_use]
    pub fn pending_raycasts(&self) -> usize {
        self.raycasts.pending_count()
    }

    /// Incoming first-person streams
    pub fn reassembly_mut(&mut self) -> &mut StreamReassembly {
        &mut self.reassembly
    }

    /// Notifications raised since the last call
    pub fn take_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }

    /// Queues `request`, tearing down whatever was queued or playing.
    ///
    /// `now` is the viewer's recording clock.
    pub fn request(&mut self, world: &mut dyn ReplayWorld, recorder: &mut Recorder, request: PlaybackRequest, now: f32) {
        self.reset(world, recorder);
        let window = request
            .window
            .unwrap_or_else(|| PlaybackWindow::live(&self.config, now, request.kill.bullet_time));
        let expected = window.end + request.delay;
        if let Some(key) = request.stream_key() {
            self.reassembly.expect(key);
        }
        info!(
            killer = %request.kill.killer,
            victim = %request.kill.victim,
            start = window.start,
            end = window.end,
            winning = request.kill.winning_kill,
            "playback requested"
        );
        self.events.push(PlaybackEvent::Requested(request.kill));
        self.queued = Some(QueuedPlayback { request, window, expected });
    }

    /// Lets a queued winning kill start
    pub fn unblock_winning_kill(&mut self) {
        self.winning_unblocked = true;
    }

    /// Advances the engine by one frame
    pub fn update(&mut self, world: &mut dyn ReplayWorld, recorder: &mut Recorder, now: f32, dt: f32) {
        for (purpose, hit) in self.raycasts.poll() {
            let RaycastPurpose::BloodSplat { target, facing } = purpose;
            let (point, normal) = hit.map_or((target, facing), |hit| (hit.point, hit.normal));
            world.spawn_hit_effect(point, normal);
        }

        if self.queued.is_some() {
            self.update_queued(recorder, now);
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.advance(world, recorder, &mut self.raycasts, &self.config, dt) {
            SessionStep::Continue => {}
            SessionStep::Started => {
                info!(killer = %session.kill().killer, victim = %session.kill().victim, "playback started");
                self.events.push(PlaybackEvent::Started(*session.kill()));
            }
            SessionStep::Finished => {
                debug!(clock = session.clock(), "playback frames exhausted");
                self.reset(world, recorder);
            }
        }
    }

    fn update_queued(&mut self, recorder: &mut Recorder, now: f32) {
        let Some(queued) = &self.queued else {
            return;
        };
        let key = queued.request.stream_key();
        let ready = key.map_or(true, |key| self.reassembly.is_complete(key));
        let winning = queued.request.kill.winning_kill;
        let due = if winning { self.winning_unblocked } else { now > queued.expected };

        if due && ready {
            if let Some(queued) = self.queued.take() {
                self.start(recorder, queued);
            }
            return;
        }

        let timed_out = now > queued.expected + self.config.streaming.timeout;
        if !ready && timed_out && (!winning || self.winning_unblocked) {
            debug!(victim = %queued.request.kill.victim, "first-person stream timed out, playback dropped");
            if let Some(key) = key {
                self.reassembly.cancel(key);
            }
            self.queued = None;
        }
    }

    fn start(&mut self, recorder: &mut Recorder, queued: QueuedPlayback) {
        let QueuedPlayback { request, window, .. } = queued;
        let highlight = request.highlight_index();
        let (fp, pending_tp) = match self.load_fp(recorder, &request, window) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(error = %err, victim = %request.kill.victim, "first-person data unusable, playback dropped");
                return;
            }
        };
        recorder.set_paused(true);
        debug!(samples = fp.samples.len(), highlight = ?highlight, "playback setup begins");
        // the first setup stage runs in this same update
        self.session = Some(PlaybackSession::new(request.kill, highlight, window, fp, pending_tp));
    }

    fn load_fp(
        &mut self,
        recorder: &Recorder,
        request: &PlaybackRequest,
        window: PlaybackWindow,
    ) -> KillCamResult<(FpStream, Option<TpSnapshot>)> {
        match &request.source {
            FpSource::Local => {
                let build = FpStreamRequest {
                    victim: request.kill.victim,
                    from: window.start,
                    to: window.end,
                    death_time: window.death,
                    bullet_time: request.kill.bullet_time,
                    time_offset: 0.0,
                };
                Ok((FpStream::build(recorder, &build), None))
            }
            FpSource::Remote { .. } => {
                let bytes = request.stream_key().and_then(|key| self.reassembly.take(key)).unwrap_or_default();
                Ok((FpStream::decode(&bytes, ByteOrder::Little)?, None))
            }
            FpSource::Highlight(clip) => {
                Ok((FpStream::decode(&clip.fp_stream, ByteOrder::Little)?, Some(clip.tp.clone())))
            }
        }
    }

    /// Stops whatever is queued or playing
    pub fn stop(&mut self, world: &mut dyn ReplayWorld, recorder: &mut Recorder) {
        self.reset(world, recorder);
    }

    /// Restores the world and returns to `Idle`.
    ///
    /// Safe at any point of a playback and a no-op when idle.
    pub fn reset(&mut self, world: &mut dyn ReplayWorld, recorder: &mut Recorder) {
        if let Some(mut session) = self.session.take() {
            session.teardown(world);
            if session.is_started() {
                world.emit_ui_event(UiEvent::KillCamEnded);
                info!(victim = %session.kill().victim, clock = session.clock(), "playback ended");
                self.events.push(PlaybackEvent::Ended(*session.kill()));
            }
        }
        self.queued = None;
        self.raycasts.cancel_all(world);
        self.reassembly.clear();
        recorder.set_paused(false);
        self.winning_unblocked = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_engine_is_idle() {
        let engine = PlaybackEngine::new(KillCamConfig::default());
        assert_eq!(engine.phase(), PlaybackPhase::Idle);
        assert!(!engine.is_active());
        assert!(engine.camera().is_none());
        assert_eq!(engine.pending_raycasts(), 0);
    }
}
