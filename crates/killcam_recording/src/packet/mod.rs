//! # Packet Model
//!
//! Every replayable event is one [`Packet`]. A packet is a closed sum type
//! with one variant per [`PacketKind`]; the [`codec`] turns it into a
//! self-delimiting record:
//!
//! ```text
//! +--------+--------+---------------------------+
//! | kind   | size   | payload (size - 2 bytes)  |
//! | u8     | u8     | kind-specific fields      |
//! +--------+--------+---------------------------+
//! ```
//!
//! Packets never embed strings. Names go into a [`StringCache`] and the
//! packet keeps a [`StringRef`] offset. Engine resources travel as
//! [`ResourceHandle`]s, which keep the resource alive for as long as any
//! buffer or highlight holds the packet.

pub mod codec;
pub mod handle;
pub mod strings;

use killcam_shared::{EntityId, Quat, QuatT, Vec3, MAX_WEAPON_ACCESSORIES};

pub use codec::{
    decode, decode_stream, encode_into, encode_stream, encoded_len, records, swap_byte_order,
    ByteOrder, Records, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use handle::{ResourceHandle, ResourceKind};
pub use strings::{CacheKind, StringCache, StringRef};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Entity class identifier as registered by the host
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(pub u32);

/// Particle emitter identifier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmitterId(pub u32);

/// Sound instance identifier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SoundId(pub u32);

// =============================================================================
// FLAGS
// =============================================================================

/// Third-person player state bits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TpFlags(pub u8);

impl TpFlags {
    /// Player is dead
    pub const DEAD: Self = Self(1 << 0);
    /// Player is not rendered
    pub const INVISIBLE: Self = Self(1 << 1);
    /// Player is cloaked
    pub const CLOAKED: Self = Self(1 << 2);
    /// Player is ragdollized
    pub const RAGDOLL: Self = Self(1 << 3);
    /// Player stands on ground
    pub const ON_GROUND: Self = Self(1 << 4);
    /// Aim IK is active
    pub const AIM_IK: Self = Self(1 << 5);
    /// Player performs a stealth kill
    pub const STEALTH_KILLING: Self = Self(1 << 6);

    /// True when every bit of `other` is set
    #[must_use]
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of both flag sets
    #[must_use]
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// First-person camera state bits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FpFlags(pub u8);

impl FpFlags {
    /// A shot was fired since the previous sample
    pub const FIRED_SHOT: Self = Self(1 << 0);
    /// Player stands on ground
    pub const ON_GROUND: Self = Self(1 << 1);
    /// Player is sprinting
    pub const SPRINTING: Self = Self(1 << 2);
    /// View is third person
    pub const THIRD_PERSON: Self = Self(1 << 3);
    /// Zoom started this sample
    pub const START_ZOOM: Self = Self(1 << 4);
    /// Night vision is active
    pub const NIGHT_VISION: Self = Self(1 << 5);

    /// True when every bit of `other` is set
    #[must_use]
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of both flag sets
    #[must_use]
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Material layer blend bits carried by [`TpChar`]
pub mod layer_effects {
    /// Frozen layer
    pub const FROZEN: u8 = 1 << 0;
    /// Wet layer
    pub const WET: u8 = 1 << 1;
    /// Cloak layer
    pub const CLOAK: u8 = 1 << 2;
    /// Dynamic frozen layer
    pub const DYNAMIC_FROZEN: u8 = 1 << 3;
}

// =============================================================================
// PACKET KIND
// =============================================================================

/// Packet kind discriminator, written as the first byte of every record
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PacketKind {
    /// Capture tick boundary
    FrameMarker = 0,
    /// Third-person character sample
    TpChar = 1,
    /// Non-actor entity transform
    EntityLocation = 2,
    /// Entity came into existence
    EntitySpawn = 3,
    /// Entity was removed
    EntityRemoved = 4,
    /// Entity visibility changed
    EntityHide = 5,
    /// Render slot flags changed
    DrawSlotChange = 6,
    /// Slot geometry changed
    StatObjChange = 7,
    /// Sub-object hide mask changed
    SubObjHideMask = 8,
    /// Child attached to parent
    EntityAttached = 9,
    /// Child detached from parent
    EntityDetached = 10,
    /// Weapon accessory set changed
    WeaponAccessories = 11,
    /// Actor selected a weapon
    WeaponSelect = 12,
    /// Weapon firemode changed
    FiremodeChanged = 13,
    /// Weapon fired
    OnShoot = 14,
    /// Particle emitter spawned
    ParticleCreated = 15,
    /// Particle emitter removed
    ParticleDeleted = 16,
    /// Particle emitter moved
    ParticleLocation = 17,
    /// Sound started
    PlaySound = 18,
    /// Sound stopped
    StopSound = 19,
    /// Bullet tracer
    BulletTrail = 20,
    /// Breakable object broke
    ProceduralBreakHappened = 21,
    /// Third-person animation fragment
    TpAnim = 22,
    /// Animated object state
    AnimObjectUpdated = 23,
    /// Corpse spawned for a player
    CorpseSpawned = 24,
    /// Corpse removed
    CorpseRemoved = 25,
    /// Impulse applied to a ragdoll
    RagdollImpulse = 26,
    /// Player joined the match
    PlayerJoined = 27,
    /// Player left the match
    PlayerLeft = 28,
    /// Entity team changed
    TeamChange = 29,
    /// Player model changed
    PlayerChangedModel = 30,
    /// Cloak state changed
    ObjectCloakSync = 31,
    /// Actor mounted a gun
    MountedGunEnter = 32,
    /// Actor left a mounted gun
    MountedGunLeave = 33,
    /// Actor picked or threw an object
    PickAndThrowUsed = 34,
    /// Interactive object use finished
    InteractiveObjectFinishedUse = 35,
    /// Host forced a ragdoll and pushed it
    ForcedRagdollAndImpulse = 36,
    /// Aim pose of an actor on a mounted gun
    MountedGunAnimation = 37,
    /// Mounted gun turned
    MountedGunRotate = 38,
    /// Particle emitter target changed
    ParticleTarget = 39,
    /// Sound parameter changed
    SoundParameter = 40,
    /// One-shot effect without a tracked emitter
    SpawnCustomParticle = 41,
    /// Item moved to the other hand
    ItemSwitchHand = 42,
    /// Animation controller history item
    MannEvent = 43,
    /// Animation controller quaternion parameter
    MannSetParam = 44,
    /// Animation controller float parameter
    MannSetParamFloat = 45,
    /// Animation controller enslaved or released another
    MannSetSlaveController = 46,
    /// First-person camera sample
    FpChar = 64,
    /// Simplified victim position
    VictimPosition = 65,
    /// Kill hit location relative to the victim
    KillHitPosition = 66,
    /// Time offset between killer and victim clocks
    PlaybackTimeOffset = 67,
    /// Player was flashed
    Flashed = 68,
    /// Nearest-render toggle
    RenderNearest = 69,
    /// Battle chatter line
    BattleChatter = 70,
    /// Hit feedback effect
    PlayerHealthEffect = 71,
}

impl PacketKind {
    /// Every kind in discriminant order
    pub const ALL: [Self; 55] = [
        Self::FrameMarker,
        Self::TpChar,
        Self::EntityLocation,
        Self::EntitySpawn,
        Self::EntityRemoved,
        Self::EntityHide,
        Self::DrawSlotChange,
        Self::StatObjChange,
        Self::SubObjHideMask,
        Self::EntityAttached,
        Self::EntityDetached,
        Self::WeaponAccessories,
        Self::WeaponSelect,
        Self::FiremodeChanged,
        Self::OnShoot,
        Self::ParticleCreated,
        Self::ParticleDeleted,
        Self::ParticleLocation,
        Self::PlaySound,
        Self::StopSound,
        Self::BulletTrail,
        Self::ProceduralBreakHappened,
        Self::TpAnim,
        Self::AnimObjectUpdated,
        Self::CorpseSpawned,
        Self::CorpseRemoved,
        Self::RagdollImpulse,
        Self::PlayerJoined,
        Self::PlayerLeft,
        Self::TeamChange,
        Self::PlayerChangedModel,
        Self::ObjectCloakSync,
        Self::MountedGunEnter,
        Self::MountedGunLeave,
        Self::PickAndThrowUsed,
        Self::InteractiveObjectFinishedUse,
        Self::ForcedRagdollAndImpulse,
        Self::MountedGunAnimation,
        Self::MountedGunRotate,
        Self::ParticleTarget,
        Self::SoundParameter,
        Self::SpawnCustomParticle,
        Self::ItemSwitchHand,
        Self::MannEvent,
        Self::MannSetParam,
        Self::MannSetParamFloat,
        Self::MannSetSlaveController,
        Self::FpChar,
        Self::VictimPosition,
        Self::KillHitPosition,
        Self::PlaybackTimeOffset,
        Self::Flashed,
        Self::RenderNearest,
        Self::BattleChatter,
        Self::PlayerHealthEffect,
    ];

    /// Converts from the wire byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| *kind as u8 == value)
    }

    /// True for kinds stored in the first-person buffer
    #[must_use]
    #[inline]
    pub const fn is_first_person(self) -> bool {
        self as u8 >= Self::FpChar as u8
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Third-person character sample
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TpChar {
    /// Sampled actor
    pub entity: EntityId,
    /// World transform
    pub location: QuatT,
    /// Linear velocity
    pub velocity: Vec3,
    /// Player state bits
    pub flags: TpFlags,
    /// Material layer blend bits, see [`layer_effects`]
    pub layer_effects: u8,
}

/// Non-actor entity transform
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntityLocation {
    /// Moved entity
    pub entity: EntityId,
    /// World transform
    pub location: QuatT,
}

/// Entity spawn record.
///
/// The discarded-state summary keeps one of these per live entity and
/// updates it in place, so it carries every piece of appearance state a
/// later packet may change.
#[derive(Clone, Debug, PartialEq)]
pub struct EntitySpawn {
    /// Spawned entity
    pub entity: EntityId,
    /// Entity class
    pub class: ClassId,
    /// World transform
    pub location: QuatT,
    /// Scale
    pub scale: Vec3,
    /// Model path in the model cache
    pub model: Option<StringRef>,
    /// Geometry resource
    pub geometry: Option<ResourceHandle>,
    /// Material resource
    pub material: Option<ResourceHandle>,
    /// Hidden at record time
    pub hidden: bool,
    /// Render flags of slot 0
    pub slot_flags: u32,
    /// Sub-object hide mask of slot 0
    pub hide_mask: u64,
}

/// Entity removal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityRemoved {
    /// Removed entity
    pub entity: EntityId,
}

/// Visibility change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityHide {
    /// Affected entity
    pub entity: EntityId,
    /// New hidden state
    pub hidden: bool,
}

/// Render slot flag change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawSlotChange {
    /// Affected entity
    pub entity: EntityId,
    /// Slot index
    pub slot: u8,
    /// New render flags
    pub flags: u32,
}

/// Slot geometry change
#[derive(Clone, Debug, PartialEq)]
pub struct StatObjChange {
    /// Affected entity
    pub entity: EntityId,
    /// Slot index
    pub slot: u8,
    /// New geometry, `None` clears the slot
    pub geometry: Option<ResourceHandle>,
}

/// Sub-object hide mask change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubObjHideMask {
    /// Affected entity
    pub entity: EntityId,
    /// Slot index
    pub slot: u8,
    /// Hidden sub-object bits
    pub mask: u64,
}

/// Attachment of one entity to another
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityAttached {
    /// Parent entity
    pub parent: EntityId,
    /// Attached child
    pub child: EntityId,
    /// Socket name in the model cache
    pub socket: Option<StringRef>,
}

/// Detachment of one entity from another
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityDetached {
    /// Parent entity
    pub parent: EntityId,
    /// Detached child
    pub child: EntityId,
}

/// Weapon accessory set, at most [`MAX_WEAPON_ACCESSORIES`] entries
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeaponAccessories {
    /// Weapon entity
    pub weapon: EntityId,
    /// Attached accessory classes
    pub accessories: Vec<ClassId>,
}

impl WeaponAccessories {
    /// Builds the packet, keeping the first [`MAX_WEAPON_ACCESSORIES`] entries
    #[must_use]
    pub fn new(weapon: EntityId, accessories: &[ClassId]) -> Self {
        let count = accessories.len().min(MAX_WEAPON_ACCESSORIES);
        Self { weapon, accessories: accessories[..count].to_vec() }
    }
}

/// Weapon selection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeaponSelect {
    /// Selecting actor
    pub owner: EntityId,
    /// Selected weapon, [`EntityId::NONE`] for empty hands
    pub weapon: EntityId,
    /// Weapon class
    pub class: ClassId,
}

/// Firemode change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FiremodeChanged {
    /// Weapon owner
    pub owner: EntityId,
    /// Weapon entity
    pub weapon: EntityId,
    /// New firemode index
    pub firemode: u8,
}

/// Weapon discharge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OnShoot {
    /// Shooting actor
    pub shooter: EntityId,
    /// Weapon entity
    pub weapon: EntityId,
}

/// Particle emitter spawn
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleCreated {
    /// Emitter id
    pub emitter: EmitterId,
    /// Effect name in the model cache
    pub effect: Option<StringRef>,
    /// World transform, or local transform when attached
    pub location: QuatT,
    /// Uniform scale
    pub scale: f32,
    /// Owning entity, [`EntityId::NONE`] for free emitters
    pub attached_to: EntityId,
    /// Owning entity slot
    pub slot: u8,
    /// Emitter lives until explicitly deleted
    pub persistent: bool,
}

/// Particle emitter removal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParticleDeleted {
    /// Emitter id
    pub emitter: EmitterId,
}

/// Particle emitter movement
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleLocation {
    /// Emitter id
    pub emitter: EmitterId,
    /// New transform
    pub location: QuatT,
}

/// Sound start
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaySound {
    /// Sound instance
    pub sound: SoundId,
    /// Sound name in the sound cache
    pub name: Option<StringRef>,
    /// World position
    pub position: Vec3,
    /// Owning entity, [`EntityId::NONE`] for positional sounds
    pub entity: EntityId,
    /// Sound loops until stopped
    pub looping: bool,
}

/// Sound stop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopSound {
    /// Sound instance
    pub sound: SoundId,
}

/// Bullet tracer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BulletTrail {
    /// Muzzle position
    pub start: Vec3,
    /// Impact position
    pub end: Vec3,
    /// Fired by a team mate of the viewer
    pub friendly: bool,
}

/// Breakable object event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProceduralBreakHappened {
    /// Break index as tracked by the host
    pub index: u32,
}

/// Third-person animation fragment
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TpAnim {
    /// Animated actor
    pub entity: EntityId,
    /// Animation fragment id
    pub fragment: u32,
    /// Playback speed
    pub speed: f32,
}

/// Animated object state
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimObjectUpdated {
    /// Animated object
    pub entity: EntityId,
    /// Current animation id
    pub anim: u32,
    /// Normalized time within the animation
    pub time: f32,
}

/// Corpse creation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CorpseSpawned {
    /// Corpse entity
    pub corpse: EntityId,
    /// Player the corpse belongs to
    pub player: EntityId,
}

/// Corpse removal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CorpseRemoved {
    /// Corpse entity
    pub corpse: EntityId,
}

/// Ragdoll impulse
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RagdollImpulse {
    /// Ragdollized actor
    pub entity: EntityId,
    /// Impulse vector
    pub impulse: Vec3,
    /// World point of application
    pub point: Vec3,
    /// Physics part id, negative for the whole body
    pub part: i16,
}

/// Player join
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerJoined {
    /// Joining player
    pub player: EntityId,
    /// Actor class
    pub class: ClassId,
    /// Team index
    pub team: u8,
    /// Model path in the model cache
    pub model: Option<StringRef>,
}

/// Player leave
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerLeft {
    /// Leaving player
    pub player: EntityId,
}

/// Team change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TeamChange {
    /// Affected entity
    pub entity: EntityId,
    /// New team index
    pub team: u8,
}

/// Player model change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerChangedModel {
    /// Affected player
    pub player: EntityId,
    /// Model path in the model cache
    pub model: Option<StringRef>,
}

/// Cloak state change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectCloakSync {
    /// Affected entity
    pub entity: EntityId,
    /// New cloak state
    pub cloaked: bool,
}

/// Mounted gun usage, shared by enter and leave
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MountedGun {
    /// Using actor
    pub owner: EntityId,
    /// Gun entity
    pub gun: EntityId,
}

/// Pick-and-throw usage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PickAndThrowUsed {
    /// Using actor
    pub owner: EntityId,
    /// Held object
    pub object: EntityId,
    /// True on pick up, false on throw
    pub picked_up: bool,
}

/// End of an interactive object use
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InteractiveObjectFinishedUse {
    /// Interactive object
    pub object: EntityId,
    /// Interaction index
    pub interaction: u32,
}

/// Aim pose of an actor using a mounted gun
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MountedGunAnimation {
    /// Actor on the gun
    pub owner: EntityId,
    /// Horizontal aim in radians
    pub aim: f32,
    /// Upward aim blend
    pub aim_up: f32,
    /// Downward aim blend
    pub aim_down: f32,
}

/// Mounted gun orientation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MountedGunRotate {
    /// Gun entity
    pub gun: EntityId,
    /// New world rotation
    pub rotation: Quat,
}

/// Homing target of a particle emitter
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleTarget {
    /// Emitter id
    pub emitter: EmitterId,
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

/// Sound parameter change
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoundParameter {
    /// Sound instance
    pub sound: SoundId,
    /// Parameter index
    pub index: u8,
    /// New value
    pub value: f32,
}

/// Fire-and-forget effect
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnCustomParticle {
    /// Effect name in the model cache
    pub effect: Option<StringRef>,
    /// World transform
    pub location: QuatT,
}

/// Item hand switch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemSwitchHand {
    /// Item entity
    pub item: EntityId,
    /// Hand index
    pub hand: u8,
}

/// What an animation controller history item changes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MannHistoryKind {
    /// Fragment queued on the scopes of `scope_mask`
    Fragment,
    /// Global tag state set
    Tag,
}

impl MannHistoryKind {
    /// Wire byte
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Fragment => 1,
            Self::Tag => 2,
        }
    }

    /// Converts from the wire byte
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Fragment),
            2 => Some(Self::Tag),
            _ => None,
        }
    }
}

/// Animation controller history item
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MannHistoryItem {
    /// Item kind
    pub kind: MannHistoryKind,
    /// Scopes the fragment plays on, zero for tags
    pub scope_mask: u32,
    /// Fragment id
    pub fragment: u32,
    /// Tag bits
    pub tag_state: u64,
    /// Fragment option index
    pub option: u32,
    /// Fragment interrupts whatever runs on its scopes
    pub trumps_previous: bool,
}

/// Animation controller event of an actor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MannEvent {
    /// Animated actor
    pub entity: EntityId,
    /// Recorded item
    pub item: MannHistoryItem,
}

/// Quaternion parameter of an animation controller
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MannSetParam {
    /// Entity owning the controller
    pub entity: EntityId,
    /// Parameter name hash
    pub param: u32,
    /// New value
    pub value: QuatT,
}

/// Float parameter of an animation controller
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MannSetParamFloat {
    /// Entity owning the controller
    pub entity: EntityId,
    /// Parameter name hash
    pub param: u32,
    /// New value
    pub value: f32,
}

/// One animation controller taking over or releasing another
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MannSetSlaveController {
    /// Controlling actor
    pub master: EntityId,
    /// Enslaved actor or entity
    pub slave: EntityId,
    /// Scope context on the master
    pub context: u8,
    /// True to enslave, false to release
    pub enslave: bool,
    /// Hash of the optional animation database, zero for none
    pub database: u32,
}

/// First-person camera sample
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FpChar {
    /// Sample time
    pub frame_time: f32,
    /// Camera world transform
    pub camera: QuatT,
    /// Player entity transform relative to the camera
    pub relative: QuatT,
    /// Field of view in radians
    pub fov: f32,
    /// Camera state bits
    pub flags: FpFlags,
}

/// Victim position sample carried with the first-person stream
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VictimPosition {
    /// Sample time
    pub frame_time: f32,
    /// Victim world position
    pub position: Vec3,
}

/// Fatal hit location
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KillHitPosition {
    /// Time of the hit on the killer's clock
    pub frame_time: f32,
    /// Victim entity
    pub victim: EntityId,
    /// Hit position relative to the victim location
    pub hit_relative: Vec3,
}

/// Clock offset between killer and victim
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackTimeOffset {
    /// Seconds to add to the playback window
    pub offset: f32,
}

/// Flashbang effect on the recording player
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Flashed {
    /// Effect time
    pub frame_time: f32,
    /// Effect duration
    pub duration: f32,
    /// Blind strength in `0..=1`
    pub blind_amount: f32,
}

/// Nearest-render toggle of the first-person weapon
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderNearest {
    /// Toggle time
    pub frame_time: f32,
    /// New state
    pub enabled: bool,
}

/// Battle chatter line
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BattleChatter {
    /// Line time
    pub frame_time: f32,
    /// Speaking actor
    pub entity: EntityId,
    /// Chatter category
    pub chatter: u8,
    /// Chatter variation
    pub variation: u8,
}

/// Hit feedback effect on the recording player
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayerHealthEffect {
    /// Effect time
    pub frame_time: f32,
    /// Direction the hit came from
    pub direction: Vec3,
    /// Effect strength
    pub strength: f32,
    /// Effect speed
    pub speed: f32,
}

// =============================================================================
// PACKET
// =============================================================================

/// A recorded event
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    /// Capture tick boundary at the given time
    FrameMarker {
        /// Tick time
        time: f32,
    },
    /// See [`TpChar`]
    TpChar(TpChar),
    /// See [`EntityLocation`]
    EntityLocation(EntityLocation),
    /// See [`EntitySpawn`]
    EntitySpawn(EntitySpawn),
    /// See [`EntityRemoved`]
    EntityRemoved(EntityRemoved),
    /// See [`EntityHide`]
    EntityHide(EntityHide),
    /// See [`DrawSlotChange`]
    DrawSlotChange(DrawSlotChange),
    /// See [`StatObjChange`]
    StatObjChange(StatObjChange),
    /// See [`SubObjHideMask`]
    SubObjHideMask(SubObjHideMask),
    /// See [`EntityAttached`]
    EntityAttached(EntityAttached),
    /// See [`EntityDetached`]
    EntityDetached(EntityDetached),
    /// See [`WeaponAccessories`]
    WeaponAccessories(WeaponAccessories),
    /// See [`WeaponSelect`]
    WeaponSelect(WeaponSelect),
    /// See [`FiremodeChanged`]
    FiremodeChanged(FiremodeChanged),
    /// See [`OnShoot`]
    OnShoot(OnShoot),
    /// See [`ParticleCreated`]
    ParticleCreated(ParticleCreated),
    /// See [`ParticleDeleted`]
    ParticleDeleted(ParticleDeleted),
    /// See [`ParticleLocation`]
    ParticleLocation(ParticleLocation),
    /// See [`PlaySound`]
    PlaySound(PlaySound),
    /// See [`StopSound`]
    StopSound(StopSound),
    /// See [`BulletTrail`]
    BulletTrail(BulletTrail),
    /// See [`ProceduralBreakHappened`]
    ProceduralBreakHappened(ProceduralBreakHappened),
    /// See [`TpAnim`]
    TpAnim(TpAnim),
    /// See [`AnimObjectUpdated`]
    AnimObjectUpdated(AnimObjectUpdated),
    /// See [`CorpseSpawned`]
    CorpseSpawned(CorpseSpawned),
    /// See [`CorpseRemoved`]
    CorpseRemoved(CorpseRemoved),
    /// See [`RagdollImpulse`]
    RagdollImpulse(RagdollImpulse),
    /// See [`PlayerJoined`]
    PlayerJoined(PlayerJoined),
    /// See [`PlayerLeft`]
    PlayerLeft(PlayerLeft),
    /// See [`TeamChange`]
    TeamChange(TeamChange),
    /// See [`PlayerChangedModel`]
    PlayerChangedModel(PlayerChangedModel),
    /// See [`ObjectCloakSync`]
    ObjectCloakSync(ObjectCloakSync),
    /// Actor mounted a gun
    MountedGunEnter(MountedGun),
    /// Actor left a mounted gun
    MountedGunLeave(MountedGun),
    /// See [`PickAndThrowUsed`]
    PickAndThrowUsed(PickAndThrowUsed),
    /// See [`InteractiveObjectFinishedUse`]
    InteractiveObjectFinishedUse(InteractiveObjectFinishedUse),
    /// Ragdollize the actor, then push it
    ForcedRagdollAndImpulse(RagdollImpulse),
    /// See [`MountedGunAnimation`]
    MountedGunAnimation(MountedGunAnimation),
    /// See [`MountedGunRotate`]
    MountedGunRotate(MountedGunRotate),
    /// See [`ParticleTarget`]
    ParticleTarget(ParticleTarget),
    /// See [`SoundParameter`]
    SoundParameter(SoundParameter),
    /// See [`SpawnCustomParticle`]
    SpawnCustomParticle(SpawnCustomParticle),
    /// See [`ItemSwitchHand`]
    ItemSwitchHand(ItemSwitchHand),
    /// See [`MannEvent`]
    MannEvent(MannEvent),
    /// See [`MannSetParam`]
    MannSetParam(MannSetParam),
    /// See [`MannSetParamFloat`]
    MannSetParamFloat(MannSetParamFloat),
    /// See [`MannSetSlaveController`]
    MannSetSlaveController(MannSetSlaveController),
    /// See [`FpChar`]
    FpChar(FpChar),
    /// See [`VictimPosition`]
    VictimPosition(VictimPosition),
    /// See [`KillHitPosition`]
    KillHitPosition(KillHitPosition),
    /// See [`PlaybackTimeOffset`]
    PlaybackTimeOffset(PlaybackTimeOffset),
    /// See [`Flashed`]
    Flashed(Flashed),
    /// See [`RenderNearest`]
    RenderNearest(RenderNearest),
    /// See [`BattleChatter`]
    BattleChatter(BattleChatter),
    /// See [`PlayerHealthEffect`]
    PlayerHealthEffect(PlayerHealthEffect),
}

impl Packet {
    /// Kind tag of this packet
    #[must_use]
    pub const fn kind(&self) -> PacketKind {
        match self {
            Self::FrameMarker { .. } => PacketKind::FrameMarker,
            Self::TpChar(_) => PacketKind::TpChar,
            Self::EntityLocation(_) => PacketKind::EntityLocation,
            Self::EntitySpawn(_) => PacketKind::EntitySpawn,
            Self::EntityRemoved(_) => PacketKind::EntityRemoved,
            Self::EntityHide(_) => PacketKind::EntityHide,
            Self::DrawSlotChange(_) => PacketKind::DrawSlotChange,
            Self::StatObjChange(_) => PacketKind::StatObjChange,
            Self::SubObjHideMask(_) => PacketKind::SubObjHideMask,
            Self::EntityAttached(_) => PacketKind::EntityAttached,
            Self::EntityDetached(_) => PacketKind::EntityDetached,
            Self::WeaponAccessories(_) => PacketKind::WeaponAccessories,
            Self::WeaponSelect(_) => PacketKind::WeaponSelect,
            Self::FiremodeChanged(_) => PacketKind::FiremodeChanged,
            Self::OnShoot(_) => PacketKind::OnShoot,
            Self::ParticleCreated(_) => PacketKind::ParticleCreated,
            Self::ParticleDeleted(_) => PacketKind::ParticleDeleted,
            Self::ParticleLocation(_) => PacketKind::ParticleLocation,
            Self::PlaySound(_) => PacketKind::PlaySound,
            Self::StopSound(_) => PacketKind::StopSound,
            Self::BulletTrail(_) => PacketKind::BulletTrail,
            Self::ProceduralBreakHappened(_) => PacketKind::ProceduralBreakHappened,
            Self::TpAnim(_) => PacketKind::TpAnim,
            Self::AnimObjectUpdated(_) => PacketKind::AnimObjectUpdated,
            Self::CorpseSpawned(_) => PacketKind::CorpseSpawned,
            Self::CorpseRemoved(_) => PacketKind::CorpseRemoved,
            Self::RagdollImpulse(_) => PacketKind::RagdollImpulse,
            Self::PlayerJoined(_) => PacketKind::PlayerJoined,
            Self::PlayerLeft(_) => PacketKind::PlayerLeft,
            Self::TeamChange(_) => PacketKind::TeamChange,
            Self::PlayerChangedModel(_) => PacketKind::PlayerChangedModel,
            Self::ObjectCloakSync(_) => PacketKind::ObjectCloakSync,
            Self::MountedGunEnter(_) => PacketKind::MountedGunEnter,
            Self::MountedGunLeave(_) => PacketKind::MountedGunLeave,
            Self::PickAndThrowUsed(_) => PacketKind::PickAndThrowUsed,
            Self::InteractiveObjectFinishedUse(_) => PacketKind::InteractiveObjectFinishedUse,
            Self::ForcedRagdollAndImpulse(_) => PacketKind::ForcedRagdollAndImpulse,
            Self::MountedGunAnimation(_) => PacketKind::MountedGunAnimation,
            Self::MountedGunRotate(_) => PacketKind::MountedGunRotate,
            Self::ParticleTarget(_) => PacketKind::ParticleTarget,
            Self::SoundParameter(_) => PacketKind::SoundParameter,
            Self::SpawnCustomParticle(_) => PacketKind::SpawnCustomParticle,
            Self::ItemSwitchHand(_) => PacketKind::ItemSwitchHand,
            Self::MannEvent(_) => PacketKind::MannEvent,
            Self::MannSetParam(_) => PacketKind::MannSetParam,
            Self::MannSetParamFloat(_) => PacketKind::MannSetParamFloat,
            Self::MannSetSlaveController(_) => PacketKind::MannSetSlaveController,
            Self::FpChar(_) => PacketKind::FpChar,
            Self::VictimPosition(_) => PacketKind::VictimPosition,
            Self::KillHitPosition(_) => PacketKind::KillHitPosition,
            Self::PlaybackTimeOffset(_) => PacketKind::PlaybackTimeOffset,
            Self::Flashed(_) => PacketKind::Flashed,
            Self::RenderNearest(_) => PacketKind::RenderNearest,
            Self::BattleChatter(_) => PacketKind::BattleChatter,
            Self::PlayerHealthEffect(_) => PacketKind::PlayerHealthEffect,
        }
    }

    /// Frame marker helper
    #[must_use]
    pub const fn frame(time: f32) -> Self {
        Self::FrameMarker { time }
    }

    /// Time of a frame marker
    #[must_use]
    #[inline]
    pub const fn frame_marker_time(&self) -> Option<f32> {
        match self {
            Self::FrameMarker { time } => Some(*time),
            _ => None,
        }
    }

    /// Own timestamp of self-timed packets (frame markers and first-person data)
    #[must_use]
    pub const fn timestamp(&self) -> Option<f32> {
        match self {
            Self::FrameMarker { time } => Some(*time),
            Self::FpChar(p) => Some(p.frame_time),
            Self::VictimPosition(p) => Some(p.frame_time),
            Self::KillHitPosition(p) => Some(p.frame_time),
            Self::Flashed(p) => Some(p.frame_time),
            Self::RenderNearest(p) => Some(p.frame_time),
            Self::BattleChatter(p) => Some(p.frame_time),
            Self::PlayerHealthEffect(p) => Some(p.frame_time),
            _ => None,
        }
    }

    /// Encoded record size including the header
    #[must_use]
    pub fn byte_size(&self) -> usize {
        encoded_len(self)
    }
}
