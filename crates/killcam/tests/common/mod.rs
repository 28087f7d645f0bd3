//! Shared mock world for the killcam integration tests.
//!
//! Live entities move in straight lines, replay clones are plain map
//! entries, deferred raycasts are held until the test answers or the
//! engine cancels them.

#![allow(dead_code)]

use std::collections::BTreeMap;

use crossbeam_channel::Sender;
use killcam::{KillCamConfig, RecordingSystem};
use killcam_recording::packet::{ClassId, EmitterId, FpFlags, TpFlags};
use killcam_recording::world::{
    ActorEvent, ActorSample, EntityDescription, EntityKind, LocalView, ParticleParams, RayHit, RaycastId,
    RaycastRequest, RaycastResult, SpawnKind, SpawnParams, UiEvent,
};
use killcam_recording::ReplayWorld;
use killcam_shared::{EntityId, Quat, QuatT, Vec3};

/// Simulation step, one recorded frame per update
pub const DT: f32 = 0.05;

/// Live actors of the standard scenario
pub const ACTORS: [u32; 5] = [1, 2, 3, 4, 5];

/// Live objects of the standard scenario
pub const OBJECTS: [u32; 5] = [11, 12, 13, 14, 15];

/// First id handed to replay clones
pub const FIRST_CLONE_ID: u32 = 1000;

/// Eye height of the local player's camera
pub const EYE_HEIGHT: f32 = 1.7;

#[derive(Clone, Debug)]
pub struct MockEntity {
    pub kind: EntityKind,
    pub origin: Vec3,
    pub velocity: Vec3,
    pub yaw_rate: f32,
    pub location: QuatT,
    pub hidden: bool,
    /// Kind and original of a replay clone, `None` for live entities
    pub replay: Option<(SpawnKind, EntityId)>,
}

#[derive(Debug)]
pub struct MockWorld {
    pub entities: BTreeMap<EntityId, MockEntity>,
    pub particles: BTreeMap<EmitterId, ParticleParams>,
    pub pending_raycasts: Vec<(RaycastId, Sender<RaycastResult>)>,
    pub cancelled_raycasts: Vec<RaycastId>,
    pub ui_events: Vec<UiEvent>,
    pub actor_events: usize,
    pub ragdolls: Vec<EntityId>,
    pub hit_effects: usize,
    pub time_scale: f32,
    pub local_player: Option<EntityId>,
    next_clone: u32,
    next_emitter: u32,
}

impl MockWorld {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            particles: BTreeMap::new(),
            pending_raycasts: Vec::new(),
            cancelled_raycasts: Vec::new(),
            ui_events: Vec::new(),
            actor_events: 0,
            ragdolls: Vec::new(),
            hit_effects: 0,
            time_scale: 1.0,
            local_player: None,
            next_clone: FIRST_CLONE_ID,
            next_emitter: 1,
        }
    }

    /// Five actors and five objects, each on its own straight line
    pub fn scenario() -> Self {
        let mut world = Self::new();
        for (i, &id) in ACTORS.iter().enumerate() {
            let offset = i as f32;
            world.add_live(
                id,
                EntityKind::Actor,
                Vec3::new(offset * 4.0, 0.0, 0.0),
                Vec3::new(0.5, 1.0 + offset * 0.25, 0.0),
                0.2 + offset * 0.1,
            );
        }
        for (i, &id) in OBJECTS.iter().enumerate() {
            let offset = i as f32;
            world.add_live(
                id,
                EntityKind::Object,
                Vec3::new(-10.0, offset * 3.0, 1.0),
                Vec3::new(1.5, -0.5, 0.125 * offset),
                0.0,
            );
        }
        world
    }

    pub fn add_live(&mut self, id: u32, kind: EntityKind, origin: Vec3, velocity: Vec3, yaw_rate: f32) {
        self.entities.insert(
            EntityId::new(id),
            MockEntity {
                kind,
                origin,
                velocity,
                yaw_rate,
                location: QuatT::from_translation(origin),
                hidden: false,
                replay: None,
            },
        );
    }

    /// Puts every live entity where its line is at `time`
    pub fn move_to(&mut self, time: f32) {
        for entity in self.entities.values_mut().filter(|e| e.replay.is_none()) {
            entity.location = QuatT::new(Quat::from_rotation_z(entity.yaw_rate * time), entity.origin + entity.velocity * time);
        }
    }

    pub fn location(&self, id: EntityId) -> Option<QuatT> {
        self.entities.get(&id).map(|e| e.location)
    }

    pub fn clone_ids(&self) -> Vec<EntityId> {
        self.entities.iter().filter(|(_, e)| e.replay.is_some()).map(|(&id, _)| id).collect()
    }

    pub fn clone_count(&self) -> usize {
        self.clone_ids().len()
    }

    pub fn hidden_live_count(&self) -> usize {
        self.entities.values().filter(|e| e.replay.is_none() && e.hidden).count()
    }

    pub fn ui_count(&self, wanted: fn(&UiEvent) -> bool) -> usize {
        self.ui_events.iter().filter(|e| wanted(e)).count()
    }
}

impl ReplayWorld for MockWorld {
    fn recordable_entities(&self) -> Vec<EntityId> {
        self.entities.iter().filter(|(_, e)| e.replay.is_none()).map(|(&id, _)| id).collect()
    }

    fn describe_entity(&self, id: EntityId) -> Option<EntityDescription> {
        let entity = self.entities.get(&id)?;
        Some(EntityDescription {
            kind: entity.kind,
            class: ClassId(if entity.kind == EntityKind::Actor { 1 } else { 2 }),
            location: entity.location,
            scale: Vec3::new(1.0, 1.0, 1.0),
            hidden: entity.hidden,
            model: None,
            geometry: None,
            material: None,
            team: 1,
        })
    }

    fn entity_exists(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    fn spawn_entity(&mut self, params: &SpawnParams) -> Option<EntityId> {
        let id = EntityId::new(self.next_clone);
        self.next_clone += 1;
        let kind = if params.kind == SpawnKind::Actor { EntityKind::Actor } else { EntityKind::Object };
        self.entities.insert(
            id,
            MockEntity {
                kind,
                origin: params.location.t,
                velocity: Vec3::ZERO,
                yaw_rate: 0.0,
                location: params.location,
                hidden: params.hidden,
                replay: Some((params.kind, params.original)),
            },
        );
        Some(id)
    }

    fn remove_entity(&mut self, id: EntityId) {
        self.entities.remove(&id);
    }

    fn world_transform(&self, id: EntityId) -> Option<QuatT> {
        self.location(id)
    }

    fn set_world_transform(&mut self, id: EntityId, location: QuatT) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.location = location;
        }
    }

    fn is_hidden(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|e| e.hidden)
    }

    fn set_hidden(&mut self, id: EntityId, hidden: bool) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.hidden = hidden;
        }
    }

    fn attach(&mut self, parent: EntityId, child: EntityId, _socket: Option<&str>) -> bool {
        self.entity_exists(parent) && self.entity_exists(child)
    }

    fn detach(&mut self, _parent: EntityId, _child: EntityId) {}

    fn actor_sample(&self, id: EntityId) -> Option<ActorSample> {
        let entity = self.entities.get(&id).filter(|e| e.kind == EntityKind::Actor)?;
        Some(ActorSample {
            location: entity.location,
            velocity: entity.velocity,
            flags: TpFlags::ON_GROUND,
            layer_effects: 0,
        })
    }

    fn apply_actor_event(&mut self, actor: EntityId, _event: &ActorEvent) -> bool {
        self.actor_events += 1;
        self.entity_exists(actor)
    }

    fn ragdollize(&mut self, actor: EntityId) {
        self.ragdolls.push(actor);
    }

    fn create_particle(&mut self, params: &ParticleParams) -> Option<EmitterId> {
        let id = EmitterId(self.next_emitter);
        self.next_emitter += 1;
        self.particles.insert(id, params.clone());
        Some(id)
    }

    fn remove_particle(&mut self, emitter: EmitterId) {
        self.particles.remove(&emitter);
    }

    fn spawn_hit_effect(&mut self, _point: Vec3, _normal: Vec3) {
        self.hit_effects += 1;
    }

    fn raycast(&self, _request: &RaycastRequest) -> Option<RayHit> {
        None
    }

    fn queue_raycast(&mut self, id: RaycastId, _request: RaycastRequest, reply: Sender<RaycastResult>) {
        self.pending_raycasts.push((id, reply));
    }

    fn cancel_raycast(&mut self, id: RaycastId) {
        self.cancelled_raycasts.push(id);
        self.pending_raycasts.retain(|(pending, _)| *pending != id);
    }

    fn local_view(&self) -> Option<LocalView> {
        let player = self.local_player?;
        let entity = self.entities.get(&player)?;
        Some(LocalView {
            player,
            camera: QuatT::new(Quat::IDENTITY, entity.location.t + Vec3::Z * EYE_HEIGHT),
            entity_location: entity.location,
            fov: 1.0,
            flags: FpFlags::ON_GROUND,
        })
    }

    fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale;
    }

    fn emit_ui_event(&mut self, event: UiEvent) {
        self.ui_events.push(event);
    }
}

/// What the live world looked like at every recorded update
#[derive(Debug, Default)]
pub struct Recording {
    /// Recording clock after each update, the time of its frame marker
    pub times: Vec<f32>,
    /// Live transforms sampled in that frame
    pub samples: Vec<BTreeMap<EntityId, QuatT>>,
}

impl Recording {
    /// Index of the recorded frame closest to `time`
    pub fn index_near(&self, time: f32) -> usize {
        self.times
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - time).abs().total_cmp(&(b.1 - time).abs()))
            .map_or(0, |(i, _)| i)
    }
}

/// Config with room for the whole standard scenario
pub fn roomy_config() -> KillCamConfig {
    let mut config = KillCamConfig::default();
    config.buffers.tp_bytes = 512 * 1024;
    config.buffers.fp_bytes = 64 * 1024;
    config
}

/// Moves the world and updates the system `updates` times
pub fn record(system: &mut RecordingSystem, world: &mut MockWorld, updates: usize) -> Recording {
    let mut recording = Recording::default();
    for _ in 0..updates {
        let now = system.now() + DT;
        world.move_to(now);
        system.update(world, DT);
        assert_eq!(system.now(), now);
        recording.times.push(now);
        recording.samples.push(
            world
                .entities
                .iter()
                .filter(|(_, e)| e.replay.is_none())
                .map(|(&id, e)| (id, e.location))
                .collect(),
        );
    }
    recording
}

/// Runs zero-length updates until the playback clock runs
pub fn run_until_playing(system: &mut RecordingSystem, world: &mut MockWorld) {
    for _ in 0..32 {
        if system.is_playing() {
            return;
        }
        system.update(world, 0.0);
    }
    panic!("playback never reached playing, phase {:?}", system.phase());
}

/// Updates until the engine is idle again
pub fn run_until_idle(system: &mut RecordingSystem, world: &mut MockWorld, dt: f32) {
    for _ in 0..4096 {
        if !system.engine().is_active() {
            return;
        }
        system.update(world, dt);
    }
    panic!("playback never finished, phase {:?}", system.phase());
}
