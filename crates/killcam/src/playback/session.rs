//! # Playback Session
//!
//! One running killcam: the replay clones it owns, the third-person frames
//! still to play and the virtual clock driving them.
//!
//! ```text
//!  tp: [F0 ....][F1 ....][F2 ....][F3 ....]
//!       ▲front   ▲
//!       │        └─ upper: clock < upper ⇒ interpolate F0 → F1
//!       └─ played_frame ⇒ dropped by the next play_frame
//! ```

use std::collections::BTreeMap;

use killcam_shared::{EntityId, QuatT, Vec3};
use tracing::debug;

use killcam_recording::packet::{ClassId, FpChar, StringCache, StringRef};
use killcam_recording::world::{RaycastRequest, SpawnKind, SpawnParams, ViewEffect};
use killcam_recording::{
    DiscardedState, EmitterId, FpStream, KillCamConfig, KillInfo, Packet, RaycastQueue, Recorder, ReplayWorld,
    SoundId, TpSnapshot,
};

use super::bullet_time::{BulletAction, BulletTime};
use super::camera::{CameraInputs, CameraParams, ViewMode, ViewState};
use super::interpolate::{bracketing_pairs, fp_camera_at, frame_end, frame_times, lerp_factor, LocationSource};
use super::request::PlaybackWindow;
use super::setup::SetupStage;

/// Blood ray length as a multiple of the bullet path
const IMPACT_PROBE_SCALE: f32 = 1.1;

/// What a deferred raycast was issued for
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RaycastPurpose {
    /// Blood effect at the bullet-time impact
    BloodSplat {
        /// Placement when the ray hits nothing
        target: Vec3,
        /// Effect normal when the ray hits nothing
        facing: Vec3,
    },
}

// ============================================================================
// REPLAY CLONES
// ============================================================================

/// Every world object a session spawned, keyed by what it stands in for
#[derive(Clone, Debug, Default)]
pub struct ReplayClones {
    /// Plain entity clones
    pub entities: BTreeMap<EntityId, EntityId>,
    /// Replay actors
    pub actors: BTreeMap<EntityId, EntityId>,
    /// Corpse clones
    pub corpses: BTreeMap<EntityId, EntityId>,
    /// Replay particle emitters
    pub particles: BTreeMap<EmitterId, EmitterId>,
    /// Replay sounds
    pub sounds: BTreeMap<SoundId, SoundId>,
    /// Bullet-time stand-in
    pub bullet: Option<EntityId>,
}

impl ReplayClones {
    /// Clone standing in for `original`
    #[must_use]
    pub fn clone_of(&self, original: EntityId) -> Option<EntityId> {
        self.actors
            .get(&original)
            .or_else(|| self.entities.get(&original))
            .or_else(|| self.corpses.get(&original))
            .copied()
    }

    /// Clone for `original`, or [`EntityId::NONE`] when `original` is none
    #[must_use]
    pub fn map_optional(&self, original: EntityId) -> Option<EntityId> {
        if original.is_none() {
            Some(EntityId::NONE)
        } else {
            self.clone_of(original)
        }
    }

    /// Spawned world entities, the bullet included
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len() + self.actors.len() + self.corpses.len() + usize::from(self.bullet.is_some())
    }

    /// True when nothing is left in the world
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entity_count() == 0 && self.particles.is_empty() && self.sounds.is_empty()
    }

    /// Removes every clone from the world
    pub fn remove_all(&mut self, world: &mut dyn ReplayWorld) {
        for (_, sound) in std::mem::take(&mut self.sounds) {
            world.stop_sound(sound);
        }
        for (_, emitter) in std::mem::take(&mut self.particles) {
            world.remove_particle(emitter);
        }
        let entities = std::mem::take(&mut self.entities);
        let actors = std::mem::take(&mut self.actors);
        let corpses = std::mem::take(&mut self.corpses);
        for id in entities.into_values().chain(actors.into_values()).chain(corpses.into_values()) {
            world.remove_entity(id);
        }
        if let Some(bullet) = self.bullet.take() {
            world.remove_entity(bullet);
        }
    }

    pub(crate) fn clone_for_location(&self, original: EntityId, source: LocationSource) -> Option<EntityId> {
        match source {
            LocationSource::Actor => self.actors.get(&original).copied(),
            LocationSource::Object => self.entities.get(&original).copied(),
        }
    }
}

/// Resolves cached names for replayed packets
#[derive(Clone, Copy, Debug)]
pub struct Names<'a> {
    models: &'a StringCache,
    sounds: &'a StringCache,
}

impl<'a> Names<'a> {
    /// Caches of the recorder the packets came from
    #[must_use]
    pub fn of(recorder: &'a Recorder) -> Self {
        Self { models: recorder.model_cache(), sounds: recorder.sound_cache() }
    }

    /// Model path
    #[must_use]
    pub fn model(&self, name: Option<StringRef>) -> Option<String> {
        name.and_then(|r| self.models.resolve(r)).map(str::to_owned)
    }

    /// Sound name
    #[must_use]
    pub fn sound(&self, name: Option<StringRef>) -> Option<String> {
        name.and_then(|r| self.sounds.resolve(r)).map(str::to_owned)
    }
}

/// Spawn parameters of a clone at `location` with default appearance
pub(crate) fn clone_params(kind: SpawnKind, original: EntityId, class: ClassId, location: QuatT) -> SpawnParams {
    SpawnParams {
        kind,
        original,
        class,
        location,
        scale: Vec3::new(1.0, 1.0, 1.0),
        model: None,
        geometry: None,
        material: None,
        hidden: false,
        age: 0.0,
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// Session lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// Running the setup stage
    Setup(SetupStage),
    /// Clock running
    Playing,
}

/// Result of one session update
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStep {
    /// Nothing to report
    Continue,
    /// The replay took over the screen this update
    Started,
    /// Frames exhausted or window over
    Finished,
}

/// A running killcam
#[derive(Debug)]
pub struct PlaybackSession {
    pub(crate) kill: KillInfo,
    pub(crate) highlight: Option<usize>,
    pub(crate) window: PlaybackWindow,
    pub(crate) rel_death: f32,
    pub(crate) phase: SessionPhase,

    pub(crate) fp: FpStream,
    pub(crate) remote_start: f32,
    pub(crate) next_action: usize,

    pub(crate) tp: Vec<Packet>,
    pub(crate) front: usize,
    pub(crate) played_frame: bool,
    pub(crate) pending_tp: Option<TpSnapshot>,
    pub(crate) discarded: DiscardedState,

    pub(crate) clones: ReplayClones,
    pub(crate) hidden: Vec<EntityId>,

    pub(crate) clock: f32,
    pub(crate) time_scale: f32,
    pub(crate) fp_camera: Option<FpChar>,
    pub(crate) bullet: Option<BulletTime>,
    pub(crate) view: ViewState,
    pub(crate) camera: Option<CameraParams>,
    pub(crate) started: bool,
}

impl PlaybackSession {
    /// Session over `window`, ready for its first setup stage.
    ///
    /// `pending_tp` carries the frames of a saved highlight; live sessions
    /// snapshot the recorder during setup.
    #[must_use]
    pub fn new(
        kill: KillInfo,
        highlight: Option<usize>,
        window: PlaybackWindow,
        mut fp: FpStream,
        pending_tp: Option<TpSnapshot>,
    ) -> Self {
        fp.actions.sort_by(|a, b| a.timestamp().unwrap_or(0.0).total_cmp(&b.timestamp().unwrap_or(0.0)));
        let remote_start = fp.start_time().unwrap_or(0.0);
        Self {
            kill,
            highlight,
            window,
            rel_death: window.rel_death(),
            phase: SessionPhase::Setup(SetupStage::AudioAndTracers),
            fp,
            remote_start,
            next_action: 0,
            tp: Vec::new(),
            front: 0,
            played_frame: false,
            pending_tp,
            discarded: DiscardedState::new(),
            clones: ReplayClones::default(),
            hidden: Vec::new(),
            clock: 0.0,
            time_scale: 1.0,
            fp_camera: None,
            bullet: None,
            view: ViewState::new(),
            camera: None,
            started: false,
        }
    }

    /// The kill being shown
    #[must_use]
    pub const fn kill(&self) -> &KillInfo {
        &self.kill
    }

    /// Window in the viewer's recording clock
    #[must_use]
    pub const fn window(&self) -> PlaybackWindow {
        self.window
    }

    /// Lifecycle phase
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Replay seconds since the window start
    #[must_use]
    pub const fn clock(&self) -> f32 {
        self.clock
    }

    /// Current replay time scale
    #[must_use]
    pub const fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Clones spawned so far
    #[must_use]
    pub const fn clones(&self) -> &ReplayClones {
        &self.clones
    }

    /// Live entities hidden by this session
    #[must_use]
    pub fn hidden_entities(&self) -> &[EntityId] {
        &self.hidden
    }

    /// Bullet-time state of a bullet-time kill
    #[must_use]
    pub const fn bullet(&self) -> Option<&BulletTime> {
        self.bullet.as_ref()
    }

    /// Interpolated first-person sample of the last update
    #[must_use]
    pub const fn fp_camera(&self) -> Option<&FpChar> {
        self.fp_camera.as_ref()
    }

    /// Camera of the last update
    #[must_use]
    pub const fn camera(&self) -> Option<&CameraParams> {
        self.camera.as_ref()
    }

    /// True once the session handed the screen to the replay
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Runs one setup stage or one playing update
    pub fn advance(
        &mut self,
        world: &mut dyn ReplayWorld,
        recorder: &Recorder,
        raycasts: &mut RaycastQueue<RaycastPurpose>,
        config: &KillCamConfig,
        dt: f32,
    ) -> SessionStep {
        match self.phase {
            SessionPhase::Setup(stage) => {
                self.run_stage(stage, world, recorder, config);
                let next = stage.next();
                self.phase = if next == SetupStage::Done { SessionPhase::Playing } else { SessionPhase::Setup(next) };
                if stage == SetupStage::AudioAndTracers {
                    self.started = true;
                    SessionStep::Started
                } else {
                    SessionStep::Continue
                }
            }
            SessionPhase::Playing => {
                if self.is_finished() {
                    return SessionStep::Finished;
                }
                self.play(world, recorder, raycasts, config, dt);
                SessionStep::Continue
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.front >= self.tp.len() || self.clock > self.window.length()
    }

    fn play(
        &mut self,
        world: &mut dyn ReplayWorld,
        recorder: &Recorder,
        raycasts: &mut RaycastQueue<RaycastPurpose>,
        config: &KillCamConfig,
        dt: f32,
    ) {
        self.advance_clock(dt);
        self.update_bullet(world, raycasts, config);

        self.fp_camera = fp_camera_at(&self.fp.samples, self.remote_start, self.clock);
        self.apply_fp_actions(world);
        if let Some(fp) = self.fp_camera {
            self.view.follow_fp_flags(fp.flags);
        }

        self.step_tp(world, Names::of(recorder), config);
        self.update_camera(world, config, dt);
    }

    fn advance_clock(&mut self, dt: f32) {
        let previous = self.clock;
        self.clock += dt * self.time_scale;
        if let Some(bullet) = &self.bullet {
            let hover_start = bullet.path.hover_start;
            if previous < hover_start && self.clock > hover_start {
                self.clock = hover_start;
            }
        }
    }

    fn update_bullet(
        &mut self,
        world: &mut dyn ReplayWorld,
        raycasts: &mut RaycastQueue<RaycastPurpose>,
        config: &KillCamConfig,
    ) {
        let Some(bullet) = self.bullet.as_mut() else {
            return;
        };
        let path = bullet.path;
        let actions = bullet.update(self.clock, self.rel_death, &config.bullet_time);
        for action in actions {
            match action {
                BulletAction::Spawn => {
                    let params =
                        clone_params(SpawnKind::Bullet, EntityId::NONE, ClassId(0), QuatT::new(path.orientation, path.origin));
                    self.clones.bullet = world.spawn_entity(&params);
                    self.view.set_mode(ViewMode::BulletTime);
                }
                BulletAction::Move(position) => {
                    if let Some(id) = self.clones.bullet {
                        world.set_world_transform(id, QuatT::new(path.orientation, position));
                    }
                }
                BulletAction::SetTimeScale(scale) => {
                    self.time_scale = scale;
                    world.set_time_scale(scale);
                }
                BulletAction::EmitTracer { from, to } => world.emit_tracer(from, to, false),
                BulletAction::Remove => {
                    if let Some(id) = self.clones.bullet.take() {
                        world.remove_entity(id);
                    }
                }
                BulletAction::Impact => {
                    let request = RaycastRequest {
                        origin: path.origin,
                        direction: (path.target - path.origin) * IMPACT_PROBE_SCALE,
                        ignore: Vec::new(),
                    };
                    let facing = -path.orientation.column1();
                    raycasts.queue(world, request, RaycastPurpose::BloodSplat { target: path.target, facing });
                }
            }
        }
    }

    fn apply_fp_actions(&mut self, world: &mut dyn ReplayWorld) {
        let now = self.remote_start + self.clock;
        while let Some(packet) = self.fp.actions.get(self.next_action) {
            if packet.timestamp().is_some_and(|t| t > now) {
                break;
            }
            self.next_action += 1;
            let effect = match packet {
                Packet::Flashed(p) => ViewEffect::Flashed { duration: p.duration, blind_amount: p.blind_amount },
                Packet::RenderNearest(p) => ViewEffect::RenderNearest(p.enabled),
                Packet::BattleChatter(p) => match self.clones.clone_of(p.entity) {
                    Some(entity) => ViewEffect::BattleChatter { entity, chatter: p.chatter, variation: p.variation },
                    None => continue,
                },
                Packet::PlayerHealthEffect(p) => {
                    ViewEffect::HealthEffect { direction: p.direction, strength: p.strength, speed: p.speed }
                }
                _ => continue,
            };
            world.apply_view_effect(&effect);
        }
    }

    fn step_tp(&mut self, world: &mut dyn ReplayWorld, names: Names<'_>, config: &KillCamConfig) {
        let origin = self.window.start;
        let remaining = &self.tp[self.front..];
        let (lower, upper) = frame_times(remaining, origin);
        if let (Some(lower), Some(upper)) = (lower, upper) {
            if self.clock < upper {
                let split = frame_end(remaining, 0);
                let next = frame_end(remaining, split);
                let t = lerp_factor(self.clock, lower, upper);
                for pair in bracketing_pairs(&remaining[..split], &remaining[split..next]) {
                    if let Some(clone) = self.clones.clone_for_location(pair.entity, pair.source) {
                        world.set_world_transform(clone, pair.at(t));
                    }
                }
                return;
            }
        }

        let mut upper = upper.unwrap_or(0.0);
        for _ in 0..config.max_frames_to_play_at_once {
            if self.clock < upper || self.front >= self.tp.len() {
                break;
            }
            upper = self.play_frame(world, names);
        }
    }

    /// Drops the previously played frame and applies the next one.
    ///
    /// Returns the relative time of the frame after it, or of the applied
    /// frame when it is the last.
    fn play_frame(&mut self, world: &mut dyn ReplayWorld, names: Names<'_>) -> f32 {
        if self.played_frame {
            self.front = frame_end(&self.tp, self.front);
            self.played_frame = false;
        }
        if self.front >= self.tp.len() {
            return 0.0;
        }

        let end = frame_end(&self.tp, self.front);
        for index in self.front..end {
            let packet = &self.tp[index];
            if self.clones.apply(world, names, packet).is_none() {
                debug!(kind = ?packet.kind(), "replay clone missing, packet skipped");
            }
        }
        self.played_frame = true;

        let origin = self.window.start;
        let (current, next) = frame_times(&self.tp[self.front..], origin);
        next.or(current).unwrap_or(0.0)
    }

    fn update_camera(&mut self, world: &mut dyn ReplayWorld, config: &KillCamConfig, dt: f32) {
        let projectile = self
            .clones
            .clone_of(self.kill.projectile)
            .filter(|&id| !world.is_hidden(id))
            .and_then(|id| world.world_transform(id))
            .map(|location| location.t)
            .filter(|&position| position != Vec3::ZERO);
        let inputs = CameraInputs {
            fp: self.fp_camera.as_ref(),
            projectile,
            projectile_kind: self.kill.projectile_kind,
            victim: self.clones.clone_of(self.kill.victim),
            bullet: self.bullet.as_ref(),
            clock: self.clock,
            rel_death: self.rel_death,
            dt,
        };
        self.camera = Some(self.view.update(world, &inputs, config));
    }

    /// Removes every clone and shows the hidden live entities again
    pub fn teardown(&mut self, world: &mut dyn ReplayWorld) {
        self.clones.remove_all(world);
        for id in self.hidden.drain(..) {
            if world.entity_exists(id) {
                world.set_hidden(id, false);
            }
        }
        self.time_scale = 1.0;
        world.set_time_scale(1.0);
    }
}
