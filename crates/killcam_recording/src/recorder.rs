//! # Recorder
//!
//! Samples the live world into the two recording buffers.
//!
//! ```text
//!             every frame                    every 1/20 s
//!  hooks ──► tp buffer (open frame)     ┌──► frame marker
//!  queued ─► immediate queue ──drain──► │    tracked entity deltas
//!  view  ──► fp buffer (own 1/20 s timer, forced on flicks and shots)
//! ```
//!
//! The third-person buffer evicts into the [`DiscardedState`], so entities
//! spawned long ago can still be reconstructed. Nothing is recorded while
//! the recorder is paused for a playback.

use std::collections::BTreeMap;

use killcam_shared::{EntityId, Quat, QuatT, Vec3, RECORDING_TICK_INTERVAL};
use tracing::{info, warn};

use crate::buffer::{FrameRule, NullSink, RecordingBuffer};
use crate::config::BufferConfig;
use crate::discarded::DiscardedState;
use crate::packet::{
    AnimObjectUpdated, BattleChatter, BulletTrail, CacheKind, ClassId, CorpseRemoved,
    CorpseSpawned, DrawSlotChange, EmitterId, EntityAttached, EntityDetached, EntityHide,
    EntityLocation, EntityRemoved, EntitySpawn, FiremodeChanged, Flashed, FpChar, FpFlags,
    InteractiveObjectFinishedUse, ItemSwitchHand, KillHitPosition, MannEvent, MannHistoryItem,
    MannSetParam, MannSetParamFloat, MannSetSlaveController, MountedGun, MountedGunAnimation,
    MountedGunRotate, ObjectCloakSync, OnShoot, Packet, ParticleCreated, ParticleDeleted,
    ParticleLocation, ParticleTarget, PickAndThrowUsed, PlaySound, PlayerChangedModel,
    PlayerHealthEffect, PlayerJoined, PlayerLeft, ProceduralBreakHappened, RagdollImpulse,
    RenderNearest, ResourceHandle, SoundId, SoundParameter, SpawnCustomParticle, StatObjChange,
    StopSound, StringCache, SubObjHideMask, TeamChange, TpAnim, TpChar, WeaponAccessories,
    WeaponSelect,
};
use crate::world::{ActorSample, AnimState, EntityKind, LocalView, ParticleTargetParams, ReplayWorld};

/// Rotation acceleration that forces a first-person sample, in rad/s
pub const ROTATION_ACCELERATION_THRESHOLD: f32 = 60.0 * (std::f32::consts::PI / 180.0);

/// Recorder lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    /// Buffers are empty and hooks are ignored
    NotRecording,
    /// Sampling and hooks are live
    Recording,
}

/// Particle creation arguments for [`Recorder::on_particle_created`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleEvent<'a> {
    /// Effect name
    pub effect: Option<&'a str>,
    /// World transform, or local when attached
    pub location: QuatT,
    /// Uniform scale
    pub scale: f32,
    /// Owning entity, [`EntityId::NONE`] for free emitters
    pub attached_to: EntityId,
    /// Slot on the owning entity
    pub slot: u8,
    /// Emitter outlives its spawn effect
    pub persistent: bool,
}

/// Third-person data from a start time onwards, with everything older
/// folded into a discarded-state snapshot
#[derive(Clone, Debug)]
pub struct TpSnapshot {
    /// State of everything before the window
    pub discarded: DiscardedState,
    /// Frames at or after the window start
    pub packets: Vec<Packet>,
}

#[derive(Clone, Copy, Debug)]
struct Tracked {
    kind: EntityKind,
    location: Option<QuatT>,
    actor: Option<ActorSample>,
    anim: Option<AnimState>,
}

impl Tracked {
    const fn new(kind: EntityKind) -> Self {
        Self { kind, location: None, actor: None, anim: None }
    }
}

/// Transform of the player entity relative to the camera.
///
/// The translation stays in world axes so its height tracks crouching
/// regardless of view pitch.
#[must_use]
pub fn relative_to_camera(camera: QuatT, entity: QuatT) -> QuatT {
    QuatT::new(camera.q.conjugate() * entity.q, entity.t - camera.t)
}

/// Live capture into the third- and first-person buffers
#[derive(Debug)]
pub struct Recorder {
    state: RecorderState,
    paused: bool,
    tp: RecordingBuffer,
    fp: RecordingBuffer,
    discarded: DiscardedState,
    sounds: StringCache,
    models: StringCache,
    tracked: BTreeMap<EntityId, Tracked>,
    queue: Vec<Packet>,
    queue_used: usize,
    queue_capacity: usize,
    tick_timer: f32,
    fp_timer: f32,
    last_view: Option<Quat>,
    last_rotation_speed: f32,
    local_player: EntityId,
    local_shot: bool,
    now: f32,
}

impl Recorder {
    /// Allocates both buffers and the string caches
    #[must_use]
    pub fn new(config: &BufferConfig) -> Self {
        Self {
            state: RecorderState::NotRecording,
            paused: false,
            tp: RecordingBuffer::new("tp", config.tp_bytes, FrameRule::Markers),
            fp: RecordingBuffer::new("fp", config.fp_bytes, FrameRule::SelfTimed),
            discarded: DiscardedState::new(),
            sounds: StringCache::new(CacheKind::Sound, config.sound_cache_bytes),
            models: StringCache::new(CacheKind::Model, config.model_cache_bytes),
            tracked: BTreeMap::new(),
            queue: Vec::new(),
            queue_used: 0,
            queue_capacity: config.queue_bytes,
            tick_timer: 0.0,
            fp_timer: 0.0,
            last_view: None,
            last_rotation_speed: 0.0,
            local_player: EntityId::NONE,
            local_shot: false,
            now: 0.0,
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> RecorderState {
        self.state
    }

    /// True while recording
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// True while recording and not paused
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.is_recording() && !self.paused
    }

    /// Pauses capture while a playback drives the replay world
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// True while paused for a playback
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Sets which entity is the local player
    pub fn set_local_player(&mut self, player: EntityId) {
        self.local_player = player;
    }

    /// Local player entity
    #[must_use]
    pub const fn local_player(&self) -> EntityId {
        self.local_player
    }

    /// Time of the latest update
    #[must_use]
    pub const fn now(&self) -> f32 {
        self.now
    }

    /// Starts a session: resets every buffer and records the current world
    pub fn start(&mut self, world: &dyn ReplayWorld, now: f32) {
        self.clear_session();
        self.state = RecorderState::Recording;
        self.now = now;
        self.add_packet(Packet::frame(now));
        for id in world.recordable_entities() {
            self.on_entity_spawned(world, id);
        }
        info!(now, tracked = self.tracked.len(), "recording started");
    }

    /// Ends the session and drops every recorded packet
    pub fn stop(&mut self) {
        if self.is_recording() {
            info!(now = self.now, "recording stopped");
        }
        self.clear_session();
        self.state = RecorderState::NotRecording;
    }

    /// Drops the string caches. Only valid once nothing references them.
    pub fn clear_string_caches(&mut self) {
        self.sounds.clear();
        self.models.clear();
    }

    fn clear_session(&mut self) {
        self.tp.clear();
        self.fp.clear();
        self.discarded.clear();
        self.tracked.clear();
        self.queue.clear();
        self.queue_used = 0;
        self.tick_timer = 0.0;
        self.fp_timer = 0.0;
        self.last_view = None;
        self.last_rotation_speed = 0.0;
        self.local_shot = false;
        self.paused = false;
    }

    /// Advances to `now`. Runs the capture tick when due, drains the
    /// immediate queue and samples the local view.
    pub fn update(&mut self, world: &dyn ReplayWorld, now: f32, dt: f32) {
        self.now = now;
        if !self.is_capturing() {
            return;
        }

        self.tick_timer += dt;
        if self.tick_timer >= RECORDING_TICK_INTERVAL {
            self.add_packet(Packet::frame(now));
            self.sample_tracked(world);
            self.tick_timer = 0.0;
        }

        let queued = std::mem::take(&mut self.queue);
        self.queue_used = 0;
        for packet in queued {
            self.add_packet(packet);
        }

        if let Some(view) = world.local_view() {
            self.sample_first_person(&view, dt);
        }
    }

    fn sample_tracked(&mut self, world: &dyn ReplayWorld) {
        let mut packets = Vec::new();
        let mut vanished = Vec::new();
        for (&id, tracked) in &mut self.tracked {
            if !world.entity_exists(id) {
                vanished.push(id);
                continue;
            }
            match tracked.kind {
                EntityKind::Actor => {
                    let Some(sample) = world.actor_sample(id) else {
                        continue;
                    };
                    if tracked.actor != Some(sample) {
                        tracked.actor = Some(sample);
                        packets.push(Packet::TpChar(TpChar {
                            entity: id,
                            location: sample.location,
                            velocity: sample.velocity,
                            flags: sample.flags,
                            layer_effects: sample.layer_effects,
                        }));
                    }
                }
                EntityKind::Object | EntityKind::Item | EntityKind::AnimObject => {
                    let held = tracked.kind == EntityKind::Item && world.item_selected(id);
                    if !held && !world.is_hidden(id) {
                        if let Some(location) = world.world_transform(id) {
                            if tracked.location != Some(location) {
                                tracked.location = Some(location);
                                packets.push(Packet::EntityLocation(EntityLocation { entity: id, location }));
                            }
                        }
                    }
                    if tracked.kind == EntityKind::AnimObject {
                        let anim = world.anim_state(id);
                        if let Some(state) = anim.filter(|_| anim != tracked.anim) {
                            packets.push(Packet::AnimObjectUpdated(AnimObjectUpdated {
                                entity: id,
                                anim: state.anim,
                                time: state.time,
                            }));
                        }
                        tracked.anim = anim;
                    }
                }
            }
        }

        for packet in packets {
            self.add_packet(packet);
        }
        for id in vanished {
            self.tracked.remove(&id);
            self.add_packet(Packet::EntityRemoved(EntityRemoved { entity: id }));
        }
    }

    fn sample_first_person(&mut self, view: &LocalView, dt: f32) {
        self.fp_timer += dt;
        let rotation_speed = match self.last_view {
            Some(last) if dt > 0.0 => Quat::angle_between(last, view.camera.q) / dt,
            _ => 0.0,
        };
        let flick = (rotation_speed - self.last_rotation_speed).abs() > ROTATION_ACCELERATION_THRESHOLD;

        if self.fp_timer >= RECORDING_TICK_INTERVAL || flick || self.local_shot {
            let mut flags = FpFlags(view.flags.0 & !FpFlags::FIRED_SHOT.0);
            if self.local_shot {
                flags = flags.union(FpFlags::FIRED_SHOT);
                self.local_shot = false;
            }
            let sample = FpChar {
                frame_time: self.now,
                camera: view.camera,
                relative: relative_to_camera(view.camera, view.entity_location),
                fov: view.fov,
                flags,
            };
            let _ = self.fp.append(Packet::FpChar(sample), &mut NullSink);
            self.fp_timer = 0.0;
        }

        self.last_view = Some(view.camera.q);
        self.last_rotation_speed = rotation_speed;
    }

    // =========================================================================
    // WRITING
    // =========================================================================

    fn add_packet(&mut self, packet: Packet) {
        // failures are logged by the buffer and never interrupt the match
        let _ = self.tp.append(packet, &mut self.discarded);
    }

    fn record(&mut self, packet: Packet) {
        if self.is_capturing() {
            self.add_packet(packet);
        }
    }

    fn queue_packet(&mut self, packet: Packet) {
        if !self.is_capturing() {
            return;
        }
        let size = packet.byte_size();
        if self.queue_used + size > self.queue_capacity {
            warn!(kind = ?packet.kind(), size, used = self.queue_used, "immediate queue full, packet dropped");
            return;
        }
        self.queue_used += size;
        self.queue.push(packet);
    }

    fn record_first_person(&mut self, packet: Packet) {
        if self.is_capturing() {
            let _ = self.fp.append(packet, &mut NullSink);
        }
    }

    fn cache_model(&mut self, name: Option<&str>) -> Option<crate::packet::StringRef> {
        name.and_then(|name| self.models.cache(name))
    }

    // =========================================================================
    // ENTITY HOOKS
    // =========================================================================

    /// Starts tracking `id` and records its spawn
    pub fn on_entity_spawned(&mut self, world: &dyn ReplayWorld, id: EntityId) {
        if !self.is_capturing() {
            return;
        }
        let Some(desc) = world.describe_entity(id) else {
            return;
        };
        self.tracked.insert(id, Tracked::new(desc.kind));
        let model = self.cache_model(desc.model.as_deref());
        let packet = match desc.kind {
            EntityKind::Actor => Packet::PlayerJoined(PlayerJoined {
                player: id,
                class: desc.class,
                team: desc.team,
                model,
            }),
            _ => Packet::EntitySpawn(EntitySpawn {
                entity: id,
                class: desc.class,
                location: desc.location,
                scale: desc.scale,
                model,
                geometry: desc.geometry,
                material: desc.material,
                hidden: desc.hidden,
                slot_flags: 0,
                hide_mask: 0,
            }),
        };
        self.add_packet(packet);
    }

    /// Records a removal and stops tracking
    pub fn on_entity_removed(&mut self, id: EntityId) {
        if self.is_capturing() && self.tracked.remove(&id).is_some() {
            self.add_packet(Packet::EntityRemoved(EntityRemoved { entity: id }));
        }
    }

    /// Records a hide or unhide
    pub fn on_entity_hidden(&mut self, entity: EntityId, hidden: bool) {
        self.record(Packet::EntityHide(EntityHide { entity, hidden }));
    }

    /// Records an attachment
    pub fn on_entity_attached(&mut self, parent: EntityId, child: EntityId, socket: Option<&str>) {
        if self.is_capturing() {
            let socket = self.cache_model(socket);
            self.add_packet(Packet::EntityAttached(EntityAttached { parent, child, socket }));
        }
    }

    /// Records a detachment
    pub fn on_entity_detached(&mut self, parent: EntityId, child: EntityId) {
        self.record(Packet::EntityDetached(EntityDetached { parent, child }));
    }

    /// Records a slot render flag change
    pub fn on_draw_slot_changed(&mut self, entity: EntityId, slot: u8, flags: u32) {
        self.record(Packet::DrawSlotChange(DrawSlotChange { entity, slot, flags }));
    }

    /// Records a slot geometry change
    pub fn on_stat_obj_changed(&mut self, entity: EntityId, slot: u8, geometry: Option<ResourceHandle>) {
        self.record(Packet::StatObjChange(StatObjChange { entity, slot, geometry }));
    }

    /// Records a sub-object hide mask
    pub fn on_sub_obj_hide_mask(&mut self, entity: EntityId, slot: u8, mask: u64) {
        self.record(Packet::SubObjHideMask(SubObjHideMask { entity, slot, mask }));
    }

    // =========================================================================
    // WEAPON HOOKS
    // =========================================================================

    /// Records a weapon selection
    pub fn on_weapon_select(&mut self, owner: EntityId, weapon: EntityId, class: ClassId) {
        self.record(Packet::WeaponSelect(WeaponSelect { owner, weapon, class }));
    }

    /// Records a firemode change
    pub fn on_firemode_changed(&mut self, owner: EntityId, weapon: EntityId, firemode: u8) {
        self.record(Packet::FiremodeChanged(FiremodeChanged { owner, weapon, firemode }));
    }

    /// Records the accessory set of a weapon
    pub fn on_weapon_accessories(&mut self, weapon: EntityId, accessories: &[ClassId]) {
        self.record(Packet::WeaponAccessories(WeaponAccessories::new(weapon, accessories)));
    }

    /// Records a discharge. A local shot also forces a first-person sample.
    pub fn on_shoot(&mut self, shooter: EntityId, weapon: EntityId) {
        if !self.is_capturing() {
            return;
        }
        if shooter == self.local_player && !shooter.is_none() {
            self.local_shot = true;
        }
        self.add_packet(Packet::OnShoot(OnShoot { shooter, weapon }));
    }

    // =========================================================================
    // EFFECT HOOKS
    // =========================================================================

    /// Queues a particle creation
    pub fn on_particle_created(&mut self, emitter: EmitterId, event: &ParticleEvent<'_>) {
        if !self.is_capturing() {
            return;
        }
        let effect = self.cache_model(event.effect);
        self.queue_packet(Packet::ParticleCreated(ParticleCreated {
            emitter,
            effect,
            location: event.location,
            scale: event.scale,
            attached_to: event.attached_to,
            slot: event.slot,
            persistent: event.persistent,
        }));
    }

    /// Records a particle removal
    pub fn on_particle_deleted(&mut self, emitter: EmitterId) {
        self.record(Packet::ParticleDeleted(ParticleDeleted { emitter }));
    }

    /// Records a particle move
    pub fn on_particle_moved(&mut self, emitter: EmitterId, location: QuatT) {
        self.record(Packet::ParticleLocation(ParticleLocation { emitter, location }));
    }

    /// Records a sound start
    pub fn on_sound_played(
        &mut self,
        sound: SoundId,
        name: Option<&str>,
        position: Vec3,
        entity: EntityId,
        looping: bool,
    ) {
        if !self.is_capturing() {
            return;
        }
        let name = name.and_then(|name| self.sounds.cache(name));
        self.add_packet(Packet::PlaySound(PlaySound { sound, name, position, entity, looping }));
    }

    /// Records a sound stop
    pub fn on_sound_stopped(&mut self, sound: SoundId) {
        self.record(Packet::StopSound(StopSound { sound }));
    }

    /// Records a sound parameter change
    pub fn on_sound_parameter(&mut self, sound: SoundId, index: u8, value: f32) {
        self.record(Packet::SoundParameter(SoundParameter { sound, index, value }));
    }

    /// Records a new homing target of an emitter
    pub fn on_particle_target(&mut self, emitter: EmitterId, target: &ParticleTargetParams) {
        self.record(Packet::ParticleTarget(ParticleTarget {
            emitter,
            target: target.target,
            velocity: target.velocity,
            radius: target.radius,
            has_target: target.has_target,
            priority: target.priority,
        }));
    }

    /// Records a one-shot effect
    pub fn on_custom_particle(&mut self, effect: &str, location: QuatT) {
        if self.is_capturing() {
            let effect = self.cache_model(Some(effect));
            self.add_packet(Packet::SpawnCustomParticle(SpawnCustomParticle { effect, location }));
        }
    }

    /// Records a bullet tracer
    pub fn on_bullet_trail(&mut self, start: Vec3, end: Vec3, friendly: bool) {
        self.record(Packet::BulletTrail(BulletTrail { start, end, friendly }));
    }

    /// Records a procedural break
    pub fn on_break(&mut self, index: u32) {
        self.record(Packet::ProceduralBreakHappened(ProceduralBreakHappened { index }));
    }

    // =========================================================================
    // ACTOR HOOKS
    // =========================================================================

    /// Records an animation fragment
    pub fn on_animation(&mut self, entity: EntityId, fragment: u32, speed: f32) {
        self.record(Packet::TpAnim(TpAnim { entity, fragment, speed }));
    }

    /// Records a corpse spawn
    pub fn on_corpse_spawned(&mut self, corpse: EntityId, player: EntityId) {
        self.record(Packet::CorpseSpawned(CorpseSpawned { corpse, player }));
    }

    /// Records a corpse removal
    pub fn on_corpse_removed(&mut self, corpse: EntityId) {
        self.record(Packet::CorpseRemoved(CorpseRemoved { corpse }));
    }

    /// Queues a ragdoll impulse
    pub fn on_ragdoll_impulse(&mut self, entity: EntityId, impulse: Vec3, point: Vec3, part: i16) {
        self.queue_packet(Packet::RagdollImpulse(RagdollImpulse { entity, impulse, point, part }));
    }

    /// Records a ragdoll the host forced, together with its push
    pub fn on_forced_ragdoll(&mut self, entity: EntityId, impulse: Vec3, point: Vec3, part: i16) {
        self.record(Packet::ForcedRagdollAndImpulse(RagdollImpulse { entity, impulse, point, part }));
    }

    /// Records a history item of an actor's animation controller
    pub fn on_mannequin_event(&mut self, entity: EntityId, item: MannHistoryItem) {
        self.record(Packet::MannEvent(MannEvent { entity, item }));
    }

    /// Records a quaternion controller parameter
    pub fn on_mannequin_param(&mut self, entity: EntityId, param: u32, value: QuatT) {
        self.record(Packet::MannSetParam(MannSetParam { entity, param, value }));
    }

    /// Records a float controller parameter
    pub fn on_mannequin_param_float(&mut self, entity: EntityId, param: u32, value: f32) {
        self.record(Packet::MannSetParamFloat(MannSetParamFloat { entity, param, value }));
    }

    /// Records one controller enslaving or releasing another
    pub fn on_slave_controller(&mut self, master: EntityId, slave: EntityId, context: u8, enslave: bool, database: u32) {
        self.record(Packet::MannSetSlaveController(MannSetSlaveController {
            master,
            slave,
            context,
            enslave,
            database,
        }));
    }

    /// Records a player leaving
    pub fn on_player_left(&mut self, player: EntityId) {
        if self.is_capturing() {
            self.tracked.remove(&player);
            self.add_packet(Packet::PlayerLeft(PlayerLeft { player }));
        }
    }

    /// Records a team change
    pub fn on_team_changed(&mut self, entity: EntityId, team: u8) {
        self.record(Packet::TeamChange(TeamChange { entity, team }));
    }

    /// Records a model change
    pub fn on_model_changed(&mut self, player: EntityId, model: Option<&str>) {
        if self.is_capturing() {
            let model = self.cache_model(model);
            self.add_packet(Packet::PlayerChangedModel(PlayerChangedModel { player, model }));
        }
    }

    /// Records a cloak change
    pub fn on_cloak_changed(&mut self, entity: EntityId, cloaked: bool) {
        self.record(Packet::ObjectCloakSync(ObjectCloakSync { entity, cloaked }));
    }

    /// Records entering or leaving a mounted gun
    pub fn on_mounted_gun(&mut self, owner: EntityId, gun: EntityId, entered: bool) {
        let packet = MountedGun { owner, gun };
        self.record(if entered { Packet::MountedGunEnter(packet) } else { Packet::MountedGunLeave(packet) });
    }

    /// Records the aim pose of an actor on a mounted gun
    pub fn on_mounted_gun_aim(&mut self, owner: EntityId, aim: f32, aim_up: f32, aim_down: f32) {
        self.record(Packet::MountedGunAnimation(MountedGunAnimation { owner, aim, aim_up, aim_down }));
    }

    /// Records a mounted gun turning
    pub fn on_mounted_gun_rotated(&mut self, gun: EntityId, rotation: Quat) {
        self.record(Packet::MountedGunRotate(MountedGunRotate { gun, rotation }));
    }

    /// Records an item moving to another hand
    pub fn on_item_switch_hand(&mut self, item: EntityId, hand: u8) {
        self.record(Packet::ItemSwitchHand(ItemSwitchHand { item, hand }));
    }

    /// Records a pick up or throw
    pub fn on_pick_and_throw(&mut self, owner: EntityId, object: EntityId, picked_up: bool) {
        self.record(Packet::PickAndThrowUsed(PickAndThrowUsed { owner, object, picked_up }));
    }

    /// Records an interactive object use
    pub fn on_interactive_object_used(&mut self, object: EntityId, interaction: u32) {
        self.record(Packet::InteractiveObjectFinishedUse(InteractiveObjectFinishedUse {
            object,
            interaction,
        }));
    }

    // =========================================================================
    // FIRST-PERSON HOOKS
    // =========================================================================

    /// Records a flashbang on the local player
    pub fn on_flashed(&mut self, duration: f32, blind_amount: f32) {
        let frame_time = self.now;
        self.record_first_person(Packet::Flashed(Flashed { frame_time, duration, blind_amount }));
    }

    /// Records a nearest-render toggle
    pub fn on_render_nearest(&mut self, enabled: bool) {
        let frame_time = self.now;
        self.record_first_person(Packet::RenderNearest(RenderNearest { frame_time, enabled }));
    }

    /// Records a battle chatter line heard by the local player
    pub fn on_battle_chatter(&mut self, entity: EntityId, chatter: u8, variation: u8) {
        let frame_time = self.now;
        self.record_first_person(Packet::BattleChatter(BattleChatter {
            frame_time,
            entity,
            chatter,
            variation,
        }));
    }

    /// Records hit feedback on the local player
    pub fn on_health_effect(&mut self, direction: Vec3, strength: f32, speed: f32) {
        let frame_time = self.now;
        self.record_first_person(Packet::PlayerHealthEffect(PlayerHealthEffect {
            frame_time,
            direction,
            strength,
            speed,
        }));
    }

    /// Records where the killing shot hit, relative to the victim
    pub fn record_kill_hit_position(&mut self, victim: EntityId, hit_relative: Vec3) {
        let frame_time = self.now;
        self.record_first_person(Packet::KillHitPosition(KillHitPosition {
            frame_time,
            victim,
            hit_relative,
        }));
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Third-person buffer
    #[must_use]
    pub const fn tp_buffer(&self) -> &RecordingBuffer {
        &self.tp
    }

    /// First-person buffer
    #[must_use]
    pub const fn fp_buffer(&self) -> &RecordingBuffer {
        &self.fp
    }

    /// Summary of evicted third-person packets
    #[must_use]
    pub const fn discarded(&self) -> &DiscardedState {
        &self.discarded
    }

    /// Sound name cache
    #[must_use]
    pub const fn sound_cache(&self) -> &StringCache {
        &self.sounds
    }

    /// Model, effect and socket name cache
    #[must_use]
    pub const fn model_cache(&self) -> &StringCache {
        &self.models
    }

    /// True when `id` is sampled every tick
    #[must_use]
    pub fn is_tracked(&self, id: EntityId) -> bool {
        self.tracked.contains_key(&id)
    }

    /// Every tracked entity
    pub fn tracked_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.tracked.keys().copied()
    }

    /// Copies third-person data from `from_time` without touching the live buffer
    #[must_use]
    pub fn snapshot(&self, from_time: f32) -> TpSnapshot {
        let mut discarded = self.discarded.clone();
        for (time, packet) in self.tp.iter_timed() {
            if time < from_time {
                discarded.apply(packet.clone(), time);
            }
        }
        TpSnapshot { discarded, packets: self.tp.copy_range(from_time) }
    }

    /// Weapon `player` held at `at_time`
    #[must_use]
    pub fn find_weapon_at_time(&self, player: EntityId, at_time: f32) -> Option<(EntityId, ClassId)> {
        let mut weapon = self.discarded.player(player).map(|state| (state.weapon, state.weapon_class));
        for (time, packet) in self.tp.iter_timed() {
            if time > at_time {
                break;
            }
            if let Packet::WeaponSelect(select) = packet {
                if select.owner == player {
                    weapon = Some((select.weapon, select.class));
                }
            }
        }
        weapon.filter(|(id, _)| !id.is_none())
    }
}
