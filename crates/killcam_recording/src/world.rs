//! # World Interface
//!
//! The host game implements [`ReplayWorld`] so the recorder can sample it
//! and the playback engine can drive replay clones through it.
//!
//! ```text
//! killcam defines:        host implements:
//! ┌──────────────────┐    ┌──────────────────┐
//! │ trait ReplayWorld│ ←─ │ impl ReplayWorld │
//! └──────────────────┘    └──────────────────┘
//! ```
//!
//! Only entity bookkeeping, actor sampling, particles and raycasts are
//! required. Everything cosmetic has a no-op default.

use crossbeam_channel::Sender;
use killcam_shared::{EntityId, QuatT, Vec3};

use crate::packet::{ClassId, EmitterId, FpFlags, MannHistoryItem, ResourceHandle, SoundId, TpFlags};

// ============================================================================
// DATA TYPES
// ============================================================================

/// How the recorder samples an entity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Player or AI actor, sampled into character packets
    Actor,
    /// Physical object, sampled into location packets
    Object,
    /// Pickup item, not sampled while an owner holds it
    Item,
    /// Object with a looping animation
    AnimObject,
}

/// Snapshot of a live entity
#[derive(Clone, Debug, PartialEq)]
pub struct EntityDescription {
    /// Sampling kind
    pub kind: EntityKind,
    /// Entity class
    pub class: ClassId,
    /// World transform
    pub location: QuatT,
    /// Scale
    pub scale: Vec3,
    /// Hidden state
    pub hidden: bool,
    /// Model path
    pub model: Option<String>,
    /// Geometry resource
    pub geometry: Option<ResourceHandle>,
    /// Material resource
    pub material: Option<ResourceHandle>,
    /// Team index
    pub team: u8,
}

/// Per-tick actor state
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActorSample {
    /// World transform
    pub location: QuatT,
    /// Linear velocity
    pub velocity: Vec3,
    /// Player state bits
    pub flags: TpFlags,
    /// Material layer blend bits
    pub layer_effects: u8,
}

/// Local player's view, sampled every render frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalView {
    /// Local player entity
    pub player: EntityId,
    /// Camera world transform
    pub camera: QuatT,
    /// Player entity world transform
    pub entity_location: QuatT,
    /// Field of view in radians
    pub fov: f32,
    /// Camera state bits, except [`FpFlags::FIRED_SHOT`] which the recorder sets
    pub flags: FpFlags,
}

/// Animation state of an animated object
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimState {
    /// Current animation id
    pub anim: u32,
    /// Normalized time
    pub time: f32,
}

/// What a spawned replay entity stands in for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpawnKind {
    /// Plain entity clone
    Entity,
    /// Actor with a replay animation controller
    Actor,
    /// Ragdoll corpse
    Corpse,
    /// Bullet-time projectile stand-in
    Bullet,
}

/// Parameters for [`ReplayWorld::spawn_entity`]
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnParams {
    /// Clone kind
    pub kind: SpawnKind,
    /// Live entity being cloned, [`EntityId::NONE`] for the bullet
    pub original: EntityId,
    /// Entity class
    pub class: ClassId,
    /// World transform
    pub location: QuatT,
    /// Scale
    pub scale: Vec3,
    /// Model path
    pub model: Option<String>,
    /// Geometry resource
    pub geometry: Option<ResourceHandle>,
    /// Material resource
    pub material: Option<ResourceHandle>,
    /// Spawn hidden
    pub hidden: bool,
    /// Seconds the original had existed at the start of the replay
    pub age: f32,
}

/// Parameters for [`ReplayWorld::create_particle`]
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleParams {
    /// Effect name
    pub effect: Option<String>,
    /// World transform, or local when attached
    pub location: QuatT,
    /// Uniform scale
    pub scale: f32,
    /// Replay entity to attach to, [`EntityId::NONE`] for free emitters
    pub attached_to: EntityId,
    /// Slot on the owning entity
    pub slot: u8,
    /// Seconds the emitter had been alive
    pub age: f32,
}

/// Parameters for [`ReplayWorld::play_sound`]
#[derive(Clone, Debug, PartialEq)]
pub struct SoundParams {
    /// Sound name
    pub name: Option<String>,
    /// World position
    pub position: Vec3,
    /// Replay entity owning the sound, [`EntityId::NONE`] for positional sounds
    pub entity: EntityId,
    /// Sound loops until stopped
    pub looping: bool,
    /// Seconds into the sound to start at
    pub offset: f32,
}

/// Parameters for [`ReplayWorld::set_particle_target`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleTargetParams {
    /// Target position
    pub target: Vec3,
    /// Target velocity
    pub velocity: Vec3,
    /// Target radius
    pub radius: f32,
    /// Particles home in on the target
    pub has_target: bool,
    /// Target overrides the effect's own target
    pub priority: bool,
}

/// Appearance or state change applied to a replay entity
#[derive(Clone, Debug, PartialEq)]
pub enum EntityChange {
    /// Slot render flags
    DrawSlot {
        /// Slot index
        slot: u8,
        /// Render flags
        flags: u32,
    },
    /// Slot geometry
    Geometry {
        /// Slot index
        slot: u8,
        /// New geometry
        geometry: Option<ResourceHandle>,
    },
    /// Sub-object hide mask
    HideMask {
        /// Slot index
        slot: u8,
        /// Hidden sub-object bits
        mask: u64,
    },
    /// Weapon accessory set
    Accessories(Vec<ClassId>),
    /// Animated object state
    Animation(AnimState),
    /// Item held in another hand
    Hand(u8),
}

/// Event applied to a replay actor
#[derive(Clone, Debug, PartialEq)]
pub enum ActorEvent {
    /// Per-tick state bits and velocity
    State {
        /// Player state bits
        flags: TpFlags,
        /// Material layer blend bits
        layer_effects: u8,
        /// Linear velocity
        velocity: Vec3,
    },
    /// Weapon selection (weapon is a replay entity)
    SelectWeapon {
        /// Replay weapon, [`EntityId::NONE`] for empty hands
        weapon: EntityId,
        /// Weapon class
        class: ClassId,
    },
    /// Firemode change
    Firemode {
        /// Replay weapon
        weapon: EntityId,
        /// Firemode index
        firemode: u8,
    },
    /// Weapon discharge
    Shoot {
        /// Replay weapon
        weapon: EntityId,
    },
    /// Team change
    Team(u8),
    /// Model change
    Model(Option<String>),
    /// Cloak change
    Cloak(bool),
    /// Enter a mounted gun (replay entity)
    MountGun(EntityId),
    /// Leave a mounted gun (replay entity)
    LeaveGun(EntityId),
    /// Pick up or throw an object (replay entity)
    PickAndThrow {
        /// Held object
        object: EntityId,
        /// True on pick up
        picked_up: bool,
    },
    /// Animation fragment
    Animation {
        /// Fragment id
        fragment: u32,
        /// Playback speed
        speed: f32,
    },
    /// Ragdoll impulse
    RagdollImpulse {
        /// Impulse vector
        impulse: Vec3,
        /// Point of application
        point: Vec3,
        /// Physics part
        part: i16,
    },
    /// Aim pose on a mounted gun
    MountedGunAim {
        /// Horizontal aim in radians
        aim: f32,
        /// Upward blend
        aim_up: f32,
        /// Downward blend
        aim_down: f32,
    },
    /// Animation controller history item
    Mannequin(MannHistoryItem),
    /// Quaternion controller parameter
    MannParam {
        /// Parameter name hash
        param: u32,
        /// Value
        value: QuatT,
    },
    /// Float controller parameter
    MannParamFloat {
        /// Parameter name hash
        param: u32,
        /// Value
        value: f32,
    },
    /// Enslave or release another controller
    SlaveController {
        /// Replay actor or entity, [`EntityId::NONE`] when releasing a missing one
        slave: EntityId,
        /// Scope context
        context: u8,
        /// True to enslave
        enslave: bool,
        /// Optional animation database hash
        database: u32,
    },
}

/// First-person effect replayed on the viewer
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewEffect {
    /// Flashbang
    Flashed {
        /// Duration
        duration: f32,
        /// Blind strength
        blind_amount: f32,
    },
    /// Nearest-render toggle
    RenderNearest(bool),
    /// Battle chatter line from a replay actor
    BattleChatter {
        /// Speaking replay actor
        entity: EntityId,
        /// Chatter category
        chatter: u8,
        /// Variation
        variation: u8,
    },
    /// Hit feedback
    HealthEffect {
        /// Hit direction
        direction: Vec3,
        /// Strength
        strength: f32,
        /// Speed
        speed: f32,
    },
}

/// UI notifications
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiEvent {
    /// Killcam takes over the HUD
    KillCamStarted {
        /// Killer entity
        killer: EntityId,
        /// Victim entity
        victim: EntityId,
        /// Playing a saved highlight
        highlight: bool,
    },
    /// Killcam hands the HUD back
    KillCamEnded,
}

/// Ray query
#[derive(Clone, Debug, PartialEq)]
pub struct RaycastRequest {
    /// Ray origin
    pub origin: Vec3,
    /// Ray direction scaled to its length
    pub direction: Vec3,
    /// Entities the ray passes through
    pub ignore: Vec<EntityId>,
}

/// Ray query hit
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Hit point
    pub point: Vec3,
    /// Surface normal
    pub normal: Vec3,
    /// Distance from the origin
    pub distance: f32,
}

/// Identifier of a deferred raycast
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RaycastId(pub u32);

/// Deferred raycast answer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaycastResult {
    /// Request the answer belongs to
    pub id: RaycastId,
    /// Hit, `None` when the ray reached its end
    pub hit: Option<RayHit>,
}

// ============================================================================
// WORLD TRAIT
// ============================================================================

/// Interface to the host's live world and replay world.
///
/// Replay clones are ordinary entities spawned through this trait. The
/// recorder never records events the host reports while a playback runs.
pub trait ReplayWorld {
    // ------------------------------------------------------------------------
    // ENTITIES
    // ------------------------------------------------------------------------

    /// Entities the recorder should track when recording starts
    fn recordable_entities(&self) -> Vec<EntityId>;

    /// Describes a live entity, `None` when it no longer exists
    fn describe_entity(&self, id: EntityId) -> Option<EntityDescription>;

    /// True while the entity exists
    fn entity_exists(&self, id: EntityId) -> bool;

    /// Spawns a replay entity, returning its id
    fn spawn_entity(&mut self, params: &SpawnParams) -> Option<EntityId>;

    /// Removes an entity
    fn remove_entity(&mut self, id: EntityId);

    /// World transform of an entity
    fn world_transform(&self, id: EntityId) -> Option<QuatT>;

    /// Moves an entity
    fn set_world_transform(&mut self, id: EntityId, location: QuatT);

    /// Hidden state of an entity
    fn is_hidden(&self, id: EntityId) -> bool;

    /// Hides or shows an entity
    fn set_hidden(&mut self, id: EntityId, hidden: bool);

    /// Attaches `child` to `parent`, at a named socket when given
    fn attach(&mut self, parent: EntityId, child: EntityId, socket: Option<&str>) -> bool;

    /// Detaches `child` from `parent`
    fn detach(&mut self, parent: EntityId, child: EntityId);

    /// Applies an appearance change
    fn apply_entity_change(&mut self, _id: EntityId, _change: &EntityChange) {}

    /// True while an owner holds the item
    fn item_selected(&self, _id: EntityId) -> bool {
        false
    }

    /// Animation state of an animated object
    fn anim_state(&self, _id: EntityId) -> Option<AnimState> {
        None
    }

    // ------------------------------------------------------------------------
    // ACTORS
    // ------------------------------------------------------------------------

    /// Samples an actor, `None` when the entity is not an actor
    fn actor_sample(&self, id: EntityId) -> Option<ActorSample>;

    /// Applies an event to a replay actor. Returns false when it could not be applied.
    fn apply_actor_event(&mut self, actor: EntityId, event: &ActorEvent) -> bool;

    /// Turns a replay actor into a ragdoll
    fn ragdollize(&mut self, _actor: EntityId) {}

    // ------------------------------------------------------------------------
    // EFFECTS
    // ------------------------------------------------------------------------

    /// Creates a particle emitter
    fn create_particle(&mut self, params: &ParticleParams) -> Option<EmitterId>;

    /// Removes a particle emitter
    fn remove_particle(&mut self, emitter: EmitterId);

    /// Moves a particle emitter
    fn move_particle(&mut self, _emitter: EmitterId, _location: QuatT) {}

    /// Sets the homing target of a particle emitter
    fn set_particle_target(&mut self, _emitter: EmitterId, _target: &ParticleTargetParams) {}

    /// Spawns a one-shot effect the replay does not track
    fn spawn_custom_particle(&mut self, _effect: &str, _location: QuatT) {}

    /// Starts a sound
    fn play_sound(&mut self, _params: &SoundParams) -> Option<SoundId> {
        None
    }

    /// Stops a sound
    fn stop_sound(&mut self, _sound: SoundId) {}

    /// Changes a parameter of a playing sound
    fn set_sound_parameter(&mut self, _sound: SoundId, _index: u8, _value: f32) {}

    /// Draws a bullet tracer
    fn emit_tracer(&mut self, _start: Vec3, _end: Vec3, _friendly: bool) {}

    /// Spawns the blood or impact effect at a hit point
    fn spawn_hit_effect(&mut self, _point: Vec3, _normal: Vec3) {}

    /// Restores breakable objects to their state at `time`
    fn revert_breaks(&mut self, _time: f32) {}

    /// Replays one recorded break
    fn apply_break(&mut self, _index: u32) {}

    /// Replays a first-person effect on the viewer
    fn apply_view_effect(&mut self, _effect: &ViewEffect) {}

    // ------------------------------------------------------------------------
    // PHYSICS
    // ------------------------------------------------------------------------

    /// Immediate ray query against static geometry
    fn raycast(&self, request: &RaycastRequest) -> Option<RayHit>;

    /// Deferred ray query. The answer is sent on `reply` on a later tick,
    /// or never when cancelled.
    fn queue_raycast(&mut self, id: RaycastId, request: RaycastRequest, reply: Sender<RaycastResult>);

    /// Cancels a deferred ray query
    fn cancel_raycast(&mut self, id: RaycastId);

    // ------------------------------------------------------------------------
    // VIEW / TIME / UI
    // ------------------------------------------------------------------------

    /// Local player's view, `None` without a local player
    fn local_view(&self) -> Option<LocalView> {
        None
    }

    /// Global time scale
    fn set_time_scale(&mut self, _scale: f32) {}

    /// UI notification
    fn emit_ui_event(&mut self, _event: UiEvent) {}
}
