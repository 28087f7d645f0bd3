//! # Packet Codec
//!
//! Encodes [`Packet`]s into self-delimiting records and back.
//!
//! ## Design
//!
//! - One payload writer per kind, generic over the byte sink. Sizing a
//!   packet runs the same writer against a byte counter, so the size
//!   accounting of the buffers can never drift from the wire layout.
//! - Multi-byte fields use the caller's [`ByteOrder`]. A stream recorded
//!   on one platform is converted with [`swap_byte_order`].
//! - Decoding is total: unknown kinds, short records and payload size
//!   mismatches are typed errors, never panics.

use killcam_shared::{EntityId, Quat, QuatT, Vec3, MAX_WEAPON_ACCESSORIES};

use super::handle::{ResourceHandle, ResourceKind};
use super::strings::StringRef;
use super::*;
use crate::error::{RecordingError, RecordingResult};

/// Record header: kind byte plus size byte
pub const HEADER_SIZE: usize = 2;

/// Largest payload a record can carry
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize - HEADER_SIZE;

/// Byte order of multi-byte fields
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Little endian
    #[default]
    Little,
    /// Big endian
    Big,
}

impl ByteOrder {
    /// The other byte order
    #[must_use]
    pub const fn swapped(self) -> Self {
        match self {
            Self::Little => Self::Big,
            Self::Big => Self::Little,
        }
    }

    #[inline]
    const fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    #[inline]
    const fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    #[inline]
    const fn u64_bytes(self, value: u64) -> [u8; 8] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    #[inline]
    const fn read_u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            Self::Little => u16::from_le_bytes(bytes),
            Self::Big => u16::from_be_bytes(bytes),
        }
    }

    #[inline]
    const fn read_u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        }
    }

    #[inline]
    const fn read_u64(self, bytes: [u8; 8]) -> u64 {
        match self {
            Self::Little => u64::from_le_bytes(bytes),
            Self::Big => u64::from_be_bytes(bytes),
        }
    }
}

// =============================================================================
// WRITER
// =============================================================================

trait ByteSink {
    fn put(&mut self, bytes: &[u8]);
}

struct ByteCounter(usize);

impl ByteSink for ByteCounter {
    #[inline]
    fn put(&mut self, bytes: &[u8]) {
        self.0 += bytes.len();
    }
}

impl ByteSink for Vec<u8> {
    #[inline]
    fn put(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

struct Writer<'a, S: ByteSink> {
    sink: &'a mut S,
    order: ByteOrder,
}

impl<S: ByteSink> Writer<'_, S> {
    #[inline]
    fn u8(&mut self, value: u8) {
        self.sink.put(&[value]);
    }

    #[inline]
    fn bool(&mut self, value: bool) {
        self.u8(u8::from(value));
    }

    #[inline]
    fn u16(&mut self, value: u16) {
        let bytes = self.order.u16_bytes(value);
        self.sink.put(&bytes);
    }

    #[inline]
    fn i16(&mut self, value: i16) {
        self.u16(u16::from_ne_bytes(value.to_ne_bytes()));
    }

    #[inline]
    fn u32(&mut self, value: u32) {
        let bytes = self.order.u32_bytes(value);
        self.sink.put(&bytes);
    }

    #[inline]
    fn u64(&mut self, value: u64) {
        let bytes = self.order.u64_bytes(value);
        self.sink.put(&bytes);
    }

    #[inline]
    fn f32(&mut self, value: f32) {
        self.u32(value.to_bits());
    }

    fn vec3(&mut self, v: Vec3) {
        self.f32(v.x);
        self.f32(v.y);
        self.f32(v.z);
    }

    fn quat(&mut self, q: Quat) {
        self.f32(q.x);
        self.f32(q.y);
        self.f32(q.z);
        self.f32(q.w);
    }

    fn quatt(&mut self, tm: QuatT) {
        self.quat(tm.q);
        self.vec3(tm.t);
    }

    fn mann_item(&mut self, item: &MannHistoryItem) {
        self.u8(item.kind.to_u8());
        self.u32(item.scope_mask);
        self.u32(item.fragment);
        self.u64(item.tag_state);
        self.u32(item.option);
        self.bool(item.trumps_previous);
    }

    #[inline]
    fn entity(&mut self, id: EntityId) {
        self.u32(id.raw());
    }

    #[inline]
    fn string(&mut self, value: Option<StringRef>) {
        self.u16(StringRef::to_raw(value));
    }

    #[inline]
    fn handle(&mut self, value: Option<&ResourceHandle>) {
        self.u32(value.map_or(0, ResourceHandle::id));
    }
}

#[allow(clippy::too_many_lines)]
fn write_payload<S: ByteSink>(packet: &Packet, w: &mut Writer<'_, S>) {
    match packet {
        Packet::FrameMarker { time } => w.f32(*time),
        Packet::TpChar(p) => {
            w.entity(p.entity);
            w.quatt(p.location);
            w.vec3(p.velocity);
            w.u8(p.flags.0);
            w.u8(p.layer_effects);
        }
        Packet::EntityLocation(p) => {
            w.entity(p.entity);
            w.quatt(p.location);
        }
        Packet::EntitySpawn(p) => {
            w.entity(p.entity);
            w.u32(p.class.0);
            w.quatt(p.location);
            w.vec3(p.scale);
            w.string(p.model);
            w.handle(p.geometry.as_ref());
            w.handle(p.material.as_ref());
            w.bool(p.hidden);
            w.u32(p.slot_flags);
            w.u64(p.hide_mask);
        }
        Packet::EntityRemoved(p) => w.entity(p.entity),
        Packet::EntityHide(p) => {
            w.entity(p.entity);
            w.bool(p.hidden);
        }
        Packet::DrawSlotChange(p) => {
            w.entity(p.entity);
            w.u8(p.slot);
            w.u32(p.flags);
        }
        Packet::StatObjChange(p) => {
            w.entity(p.entity);
            w.u8(p.slot);
            w.handle(p.geometry.as_ref());
        }
        Packet::SubObjHideMask(p) => {
            w.entity(p.entity);
            w.u8(p.slot);
            w.u64(p.mask);
        }
        Packet::EntityAttached(p) => {
            w.entity(p.parent);
            w.entity(p.child);
            w.string(p.socket);
        }
        Packet::EntityDetached(p) => {
            w.entity(p.parent);
            w.entity(p.child);
        }
        Packet::WeaponAccessories(p) => {
            w.entity(p.weapon);
            let count = p.accessories.len().min(MAX_WEAPON_ACCESSORIES);
            w.u8(count as u8);
            for class in &p.accessories[..count] {
                w.u32(class.0);
            }
        }
        Packet::WeaponSelect(p) => {
            w.entity(p.owner);
            w.entity(p.weapon);
            w.u32(p.class.0);
        }
        Packet::FiremodeChanged(p) => {
            w.entity(p.owner);
            w.entity(p.weapon);
            w.u8(p.firemode);
        }
        Packet::OnShoot(p) => {
            w.entity(p.shooter);
            w.entity(p.weapon);
        }
        Packet::ParticleCreated(p) => {
            w.u32(p.emitter.0);
            w.string(p.effect);
            w.quatt(p.location);
            w.f32(p.scale);
            w.entity(p.attached_to);
            w.u8(p.slot);
            w.bool(p.persistent);
        }
        Packet::ParticleDeleted(p) => w.u32(p.emitter.0),
        Packet::ParticleLocation(p) => {
            w.u32(p.emitter.0);
            w.quatt(p.location);
        }
        Packet::PlaySound(p) => {
            w.u32(p.sound.0);
            w.string(p.name);
            w.vec3(p.position);
            w.entity(p.entity);
            w.bool(p.looping);
        }
        Packet::StopSound(p) => w.u32(p.sound.0),
        Packet::BulletTrail(p) => {
            w.vec3(p.start);
            w.vec3(p.end);
            w.bool(p.friendly);
        }
        Packet::ProceduralBreakHappened(p) => w.u32(p.index),
        Packet::TpAnim(p) => {
            w.entity(p.entity);
            w.u32(p.fragment);
            w.f32(p.speed);
        }
        Packet::AnimObjectUpdated(p) => {
            w.entity(p.entity);
            w.u32(p.anim);
            w.f32(p.time);
        }
        Packet::CorpseSpawned(p) => {
            w.entity(p.corpse);
            w.entity(p.player);
        }
        Packet::CorpseRemoved(p) => w.entity(p.corpse),
        Packet::RagdollImpulse(p) | Packet::ForcedRagdollAndImpulse(p) => {
            w.entity(p.entity);
            w.vec3(p.impulse);
            w.vec3(p.point);
            w.i16(p.part);
        }
        Packet::PlayerJoined(p) => {
            w.entity(p.player);
            w.u32(p.class.0);
            w.u8(p.team);
            w.string(p.model);
        }
        Packet::PlayerLeft(p) => w.entity(p.player),
        Packet::TeamChange(p) => {
            w.entity(p.entity);
            w.u8(p.team);
        }
        Packet::PlayerChangedModel(p) => {
            w.entity(p.player);
            w.string(p.model);
        }
        Packet::ObjectCloakSync(p) => {
            w.entity(p.entity);
            w.bool(p.cloaked);
        }
        Packet::MountedGunEnter(p) | Packet::MountedGunLeave(p) => {
            w.entity(p.owner);
            w.entity(p.gun);
        }
        Packet::PickAndThrowUsed(p) => {
            w.entity(p.owner);
            w.entity(p.object);
            w.bool(p.picked_up);
        }
        Packet::InteractiveObjectFinishedUse(p) => {
            w.entity(p.object);
            w.u32(p.interaction);
        }
        Packet::MountedGunAnimation(p) => {
            w.entity(p.owner);
            w.f32(p.aim);
            w.f32(p.aim_up);
            w.f32(p.aim_down);
        }
        Packet::MountedGunRotate(p) => {
            w.entity(p.gun);
            w.quat(p.rotation);
        }
        Packet::ParticleTarget(p) => {
            w.u32(p.emitter.0);
            w.vec3(p.target);
            w.vec3(p.velocity);
            w.f32(p.radius);
            w.bool(p.has_target);
            w.bool(p.priority);
        }
        Packet::SoundParameter(p) => {
            w.u32(p.sound.0);
            w.u8(p.index);
            w.f32(p.value);
        }
        Packet::SpawnCustomParticle(p) => {
            w.string(p.effect);
            w.quatt(p.location);
        }
        Packet::ItemSwitchHand(p) => {
            w.entity(p.item);
            w.u8(p.hand);
        }
        Packet::MannEvent(p) => {
            w.entity(p.entity);
            w.mann_item(&p.item);
        }
        Packet::MannSetParam(p) => {
            w.entity(p.entity);
            w.u32(p.param);
            w.quatt(p.value);
        }
        Packet::MannSetParamFloat(p) => {
            w.entity(p.entity);
            w.u32(p.param);
            w.f32(p.value);
        }
        Packet::MannSetSlaveController(p) => {
            w.entity(p.master);
            w.entity(p.slave);
            w.u8(p.context);
            w.bool(p.enslave);
            w.u32(p.database);
        }
        Packet::FpChar(p) => {
            w.f32(p.frame_time);
            w.quatt(p.camera);
            w.quatt(p.relative);
            w.f32(p.fov);
            w.u8(p.flags.0);
        }
        Packet::VictimPosition(p) => {
            w.f32(p.frame_time);
            w.vec3(p.position);
        }
        Packet::KillHitPosition(p) => {
            w.f32(p.frame_time);
            w.entity(p.victim);
            w.vec3(p.hit_relative);
        }
        Packet::PlaybackTimeOffset(p) => w.f32(p.offset),
        Packet::Flashed(p) => {
            w.f32(p.frame_time);
            w.f32(p.duration);
            w.f32(p.blind_amount);
        }
        Packet::RenderNearest(p) => {
            w.f32(p.frame_time);
            w.bool(p.enabled);
        }
        Packet::BattleChatter(p) => {
            w.f32(p.frame_time);
            w.entity(p.entity);
            w.u8(p.chatter);
            w.u8(p.variation);
        }
        Packet::PlayerHealthEffect(p) => {
            w.f32(p.frame_time);
            w.vec3(p.direction);
            w.f32(p.strength);
            w.f32(p.speed);
        }
    }
}

// =============================================================================
// READER
// =============================================================================

struct Reader<'a> {
    kind: PacketKind,
    data: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> RecordingResult<[u8; N]> {
        let end = self.pos + N;
        let slice = self.data.get(self.pos..end).ok_or(RecordingError::PayloadMismatch {
            kind: self.kind,
            expected: end,
            actual: self.data.len(),
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> RecordingResult<u8> {
        Ok(self.take::<1>()?[0])
    }

    fn bool(&mut self) -> RecordingResult<bool> {
        Ok(self.u8()? != 0)
    }

    fn u16(&mut self) -> RecordingResult<u16> {
        let bytes = self.take::<2>()?;
        Ok(self.order.read_u16(bytes))
    }

    fn i16(&mut self) -> RecordingResult<i16> {
        Ok(i16::from_ne_bytes(self.u16()?.to_ne_bytes()))
    }

    fn u32(&mut self) -> RecordingResult<u32> {
        let bytes = self.take::<4>()?;
        Ok(self.order.read_u32(bytes))
    }

    fn u64(&mut self) -> RecordingResult<u64> {
        let bytes = self.take::<8>()?;
        Ok(self.order.read_u64(bytes))
    }

    fn f32(&mut self) -> RecordingResult<f32> {
        Ok(f32::from_bits(self.u32()?))
    }

    fn vec3(&mut self) -> RecordingResult<Vec3> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    fn quat(&mut self) -> RecordingResult<Quat> {
        Ok(Quat::new(self.f32()?, self.f32()?, self.f32()?, self.f32()?))
    }

    fn quatt(&mut self) -> RecordingResult<QuatT> {
        let q = self.quat()?;
        Ok(QuatT::new(q, self.vec3()?))
    }

    fn mann_item(&mut self) -> RecordingResult<MannHistoryItem> {
        let kind = MannHistoryKind::from_u8(self.u8()?)
            .ok_or(RecordingError::InvalidField { kind: self.kind, field: "history kind" })?;
        Ok(MannHistoryItem {
            kind,
            scope_mask: self.u32()?,
            fragment: self.u32()?,
            tag_state: self.u64()?,
            option: self.u32()?,
            trumps_previous: self.bool()?,
        })
    }

    fn entity(&mut self) -> RecordingResult<EntityId> {
        Ok(EntityId::new(self.u32()?))
    }

    fn ragdoll_impulse(&mut self) -> RecordingResult<RagdollImpulse> {
        Ok(RagdollImpulse { entity: self.entity()?, impulse: self.vec3()?, point: self.vec3()?, part: self.i16()? })
    }

    fn string(&mut self) -> RecordingResult<Option<StringRef>> {
        Ok(StringRef::from_raw(self.u16()?))
    }

    fn handle(&mut self, kind: ResourceKind) -> RecordingResult<Option<ResourceHandle>> {
        let id = self.u32()?;
        Ok((id != 0).then(|| ResourceHandle::new(kind, id)))
    }

    fn finish(&self) -> RecordingResult<()> {
        if self.pos == self.data.len() {
            Ok(())
        } else {
            Err(RecordingError::PayloadMismatch {
                kind: self.kind,
                expected: self.pos,
                actual: self.data.len(),
            })
        }
    }
}

#[allow(clippy::too_many_lines)]
fn read_payload(r: &mut Reader<'_>) -> RecordingResult<Packet> {
    let packet = match r.kind {
        PacketKind::FrameMarker => Packet::FrameMarker { time: r.f32()? },
        PacketKind::TpChar => Packet::TpChar(TpChar {
            entity: r.entity()?,
            location: r.quatt()?,
            velocity: r.vec3()?,
            flags: TpFlags(r.u8()?),
            layer_effects: r.u8()?,
        }),
        PacketKind::EntityLocation => {
            Packet::EntityLocation(EntityLocation { entity: r.entity()?, location: r.quatt()? })
        }
        PacketKind::EntitySpawn => Packet::EntitySpawn(EntitySpawn {
            entity: r.entity()?,
            class: ClassId(r.u32()?),
            location: r.quatt()?,
            scale: r.vec3()?,
            model: r.string()?,
            geometry: r.handle(ResourceKind::Geometry)?,
            material: r.handle(ResourceKind::Material)?,
            hidden: r.bool()?,
            slot_flags: r.u32()?,
            hide_mask: r.u64()?,
        }),
        PacketKind::EntityRemoved => Packet::EntityRemoved(EntityRemoved { entity: r.entity()? }),
        PacketKind::EntityHide => {
            Packet::EntityHide(EntityHide { entity: r.entity()?, hidden: r.bool()? })
        }
        PacketKind::DrawSlotChange => Packet::DrawSlotChange(DrawSlotChange {
            entity: r.entity()?,
            slot: r.u8()?,
            flags: r.u32()?,
        }),
        PacketKind::StatObjChange => Packet::StatObjChange(StatObjChange {
            entity: r.entity()?,
            slot: r.u8()?,
            geometry: r.handle(ResourceKind::Geometry)?,
        }),
        PacketKind::SubObjHideMask => Packet::SubObjHideMask(SubObjHideMask {
            entity: r.entity()?,
            slot: r.u8()?,
            mask: r.u64()?,
        }),
        PacketKind::EntityAttached => Packet::EntityAttached(EntityAttached {
            parent: r.entity()?,
            child: r.entity()?,
            socket: r.string()?,
        }),
        PacketKind::EntityDetached => {
            Packet::EntityDetached(EntityDetached { parent: r.entity()?, child: r.entity()? })
        }
        PacketKind::WeaponAccessories => {
            let weapon = r.entity()?;
            let count = usize::from(r.u8()?);
            if count > MAX_WEAPON_ACCESSORIES {
                return Err(RecordingError::InvalidField { kind: r.kind, field: "accessories" });
            }
            let mut accessories = Vec::with_capacity(count);
            for _ in 0..count {
                accessories.push(ClassId(r.u32()?));
            }
            Packet::WeaponAccessories(WeaponAccessories { weapon, accessories })
        }
        PacketKind::WeaponSelect => Packet::WeaponSelect(WeaponSelect {
            owner: r.entity()?,
            weapon: r.entity()?,
            class: ClassId(r.u32()?),
        }),
        PacketKind::FiremodeChanged => Packet::FiremodeChanged(FiremodeChanged {
            owner: r.entity()?,
            weapon: r.entity()?,
            firemode: r.u8()?,
        }),
        PacketKind::OnShoot => {
            Packet::OnShoot(OnShoot { shooter: r.entity()?, weapon: r.entity()? })
        }
        PacketKind::ParticleCreated => Packet::ParticleCreated(ParticleCreated {
            emitter: EmitterId(r.u32()?),
            effect: r.string()?,
            location: r.quatt()?,
            scale: r.f32()?,
            attached_to: r.entity()?,
            slot: r.u8()?,
            persistent: r.bool()?,
        }),
        PacketKind::ParticleDeleted => {
            Packet::ParticleDeleted(ParticleDeleted { emitter: EmitterId(r.u32()?) })
        }
        PacketKind::ParticleLocation => Packet::ParticleLocation(ParticleLocation {
            emitter: EmitterId(r.u32()?),
            location: r.quatt()?,
        }),
        PacketKind::PlaySound => Packet::PlaySound(PlaySound {
            sound: SoundId(r.u32()?),
            name: r.string()?,
            position: r.vec3()?,
            entity: r.entity()?,
            looping: r.bool()?,
        }),
        PacketKind::StopSound => Packet::StopSound(StopSound { sound: SoundId(r.u32()?) }),
        PacketKind::BulletTrail => Packet::BulletTrail(BulletTrail {
            start: r.vec3()?,
            end: r.vec3()?,
            friendly: r.bool()?,
        }),
        PacketKind::ProceduralBreakHappened => {
            Packet::ProceduralBreakHappened(ProceduralBreakHappened { index: r.u32()? })
        }
        PacketKind::TpAnim => Packet::TpAnim(TpAnim {
            entity: r.entity()?,
            fragment: r.u32()?,
            speed: r.f32()?,
        }),
        PacketKind::AnimObjectUpdated => Packet::AnimObjectUpdated(AnimObjectUpdated {
            entity: r.entity()?,
            anim: r.u32()?,
            time: r.f32()?,
        }),
        PacketKind::CorpseSpawned => {
            Packet::CorpseSpawned(CorpseSpawned { corpse: r.entity()?, player: r.entity()? })
        }
        PacketKind::CorpseRemoved => Packet::CorpseRemoved(CorpseRemoved { corpse: r.entity()? }),
        PacketKind::RagdollImpulse => Packet::RagdollImpulse(r.ragdoll_impulse()?),
        PacketKind::ForcedRagdollAndImpulse => Packet::ForcedRagdollAndImpulse(r.ragdoll_impulse()?),
        PacketKind::PlayerJoined => Packet::PlayerJoined(PlayerJoined {
            player: r.entity()?,
            class: ClassId(r.u32()?),
            team: r.u8()?,
            model: r.string()?,
        }),
        PacketKind::PlayerLeft => Packet::PlayerLeft(PlayerLeft { player: r.entity()? }),
        PacketKind::TeamChange => {
            Packet::TeamChange(TeamChange { entity: r.entity()?, team: r.u8()? })
        }
        PacketKind::PlayerChangedModel => Packet::PlayerChangedModel(PlayerChangedModel {
            player: r.entity()?,
            model: r.string()?,
        }),
        PacketKind::ObjectCloakSync => {
            Packet::ObjectCloakSync(ObjectCloakSync { entity: r.entity()?, cloaked: r.bool()? })
        }
        PacketKind::MountedGunEnter => {
            Packet::MountedGunEnter(MountedGun { owner: r.entity()?, gun: r.entity()? })
        }
        PacketKind::MountedGunLeave => {
            Packet::MountedGunLeave(MountedGun { owner: r.entity()?, gun: r.entity()? })
        }
        PacketKind::PickAndThrowUsed => Packet::PickAndThrowUsed(PickAndThrowUsed {
            owner: r.entity()?,
            object: r.entity()?,
            picked_up: r.bool()?,
        }),
        PacketKind::InteractiveObjectFinishedUse => {
            Packet::InteractiveObjectFinishedUse(InteractiveObjectFinishedUse {
                object: r.entity()?,
                interaction: r.u32()?,
            })
        }
        PacketKind::MountedGunAnimation => Packet::MountedGunAnimation(MountedGunAnimation {
            owner: r.entity()?,
            aim: r.f32()?,
            aim_up: r.f32()?,
            aim_down: r.f32()?,
        }),
        PacketKind::MountedGunRotate => {
            Packet::MountedGunRotate(MountedGunRotate { gun: r.entity()?, rotation: r.quat()? })
        }
        PacketKind::ParticleTarget => Packet::ParticleTarget(ParticleTarget {
            emitter: EmitterId(r.u32()?),
            target: r.vec3()?,
            velocity: r.vec3()?,
            radius: r.f32()?,
            has_target: r.bool()?,
            priority: r.bool()?,
        }),
        PacketKind::SoundParameter => Packet::SoundParameter(SoundParameter {
            sound: SoundId(r.u32()?),
            index: r.u8()?,
            value: r.f32()?,
        }),
        PacketKind::SpawnCustomParticle => Packet::SpawnCustomParticle(SpawnCustomParticle {
            effect: r.string()?,
            location: r.quatt()?,
        }),
        PacketKind::ItemSwitchHand => {
            Packet::ItemSwitchHand(ItemSwitchHand { item: r.entity()?, hand: r.u8()? })
        }
        PacketKind::MannEvent => Packet::MannEvent(MannEvent { entity: r.entity()?, item: r.mann_item()? }),
        PacketKind::MannSetParam => Packet::MannSetParam(MannSetParam {
            entity: r.entity()?,
            param: r.u32()?,
            value: r.quatt()?,
        }),
        PacketKind::MannSetParamFloat => Packet::MannSetParamFloat(MannSetParamFloat {
            entity: r.entity()?,
            param: r.u32()?,
            value: r.f32()?,
        }),
        PacketKind::MannSetSlaveController => Packet::MannSetSlaveController(MannSetSlaveController {
            master: r.entity()?,
            slave: r.entity()?,
            context: r.u8()?,
            enslave: r.bool()?,
            database: r.u32()?,
        }),
        PacketKind::FpChar => Packet::FpChar(FpChar {
            frame_time: r.f32()?,
            camera: r.quatt()?,
            relative: r.quatt()?,
            fov: r.f32()?,
            flags: FpFlags(r.u8()?),
        }),
        PacketKind::VictimPosition => Packet::VictimPosition(VictimPosition {
            frame_time: r.f32()?,
            position: r.vec3()?,
        }),
        PacketKind::KillHitPosition => Packet::KillHitPosition(KillHitPosition {
            frame_time: r.f32()?,
            victim: r.entity()?,
            hit_relative: r.vec3()?,
        }),
        PacketKind::PlaybackTimeOffset => {
            Packet::PlaybackTimeOffset(PlaybackTimeOffset { offset: r.f32()? })
        }
        PacketKind::Flashed => Packet::Flashed(Flashed {
            frame_time: r.f32()?,
            duration: r.f32()?,
            blind_amount: r.f32()?,
        }),
        PacketKind::RenderNearest => Packet::RenderNearest(RenderNearest {
            frame_time: r.f32()?,
            enabled: r.bool()?,
        }),
        PacketKind::BattleChatter => Packet::BattleChatter(BattleChatter {
            frame_time: r.f32()?,
            entity: r.entity()?,
            chatter: r.u8()?,
            variation: r.u8()?,
        }),
        PacketKind::PlayerHealthEffect => Packet::PlayerHealthEffect(PlayerHealthEffect {
            frame_time: r.f32()?,
            direction: r.vec3()?,
            strength: r.f32()?,
            speed: r.f32()?,
        }),
    };
    Ok(packet)
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Record size of `packet` including the header
#[must_use]
pub fn encoded_len(packet: &Packet) -> usize {
    let mut counter = ByteCounter(0);
    write_payload(packet, &mut Writer { sink: &mut counter, order: ByteOrder::Little });
    HEADER_SIZE + counter.0
}

/// Appends the record for `packet` to `out`, returning the record size.
///
/// # Errors
///
/// Returns [`RecordingError::PacketTooLarge`] when the payload does not fit
/// the size byte. Nothing is written in that case.
pub fn encode_into(packet: &Packet, order: ByteOrder, out: &mut Vec<u8>) -> RecordingResult<usize> {
    let size = encoded_len(packet);
    let Ok(size_byte) = u8::try_from(size) else {
        return Err(RecordingError::PacketTooLarge { kind: packet.kind(), size });
    };
    out.reserve(size);
    out.push(packet.kind() as u8);
    out.push(size_byte);
    write_payload(packet, &mut Writer { sink: out, order });
    Ok(size)
}

/// Decodes one record from the start of `bytes`, returning the packet and
/// the number of bytes consumed.
///
/// # Errors
///
/// Fails on unknown kinds, a size below the header, records overrunning the
/// input and payloads that do not match the kind's layout.
pub fn decode(bytes: &[u8], order: ByteOrder) -> RecordingResult<(Packet, usize)> {
    let (kind, payload) = split_record(bytes)?;
    let mut reader = Reader { kind, data: payload, pos: 0, order };
    let packet = read_payload(&mut reader)?;
    reader.finish()?;
    Ok((packet, payload.len() + HEADER_SIZE))
}

/// Encodes every packet back to back.
///
/// # Errors
///
/// Propagates [`RecordingError::PacketTooLarge`].
pub fn encode_stream<'a, I>(packets: I, order: ByteOrder) -> RecordingResult<Vec<u8>>
where
    I: IntoIterator<Item = &'a Packet>,
{
    let mut out = Vec::new();
    for packet in packets {
        encode_into(packet, order, &mut out)?;
    }
    Ok(out)
}

/// Decodes a whole stream of records.
///
/// # Errors
///
/// Fails on the first malformed record.
pub fn decode_stream(mut bytes: &[u8], order: ByteOrder) -> RecordingResult<Vec<Packet>> {
    let mut packets = Vec::new();
    while !bytes.is_empty() {
        let (packet, used) = decode(bytes, order)?;
        packets.push(packet);
        bytes = &bytes[used..];
    }
    Ok(packets)
}

/// Re-encodes a stream written in `from` order into the opposite order.
///
/// # Errors
///
/// Fails on the first malformed record.
pub fn swap_byte_order(bytes: &[u8], from: ByteOrder) -> RecordingResult<Vec<u8>> {
    let packets = decode_stream(bytes, from)?;
    encode_stream(&packets, from.swapped())
}

/// Walks records without decoding their payloads
#[must_use]
pub fn records(bytes: &[u8]) -> Records<'_> {
    Records { data: bytes, pos: 0 }
}

/// Iterator over `(kind, payload)` pairs of a record stream
pub struct Records<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Records<'a> {
    type Item = RecordingResult<(PacketKind, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.data.get(self.pos..)?;
        if rest.is_empty() {
            return None;
        }
        match split_record(rest) {
            Ok((kind, payload)) => {
                self.pos += payload.len() + HEADER_SIZE;
                Some(Ok((kind, payload)))
            }
            Err(err) => {
                self.pos = self.data.len();
                Some(Err(err))
            }
        }
    }
}

fn split_record(bytes: &[u8]) -> RecordingResult<(PacketKind, &[u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(RecordingError::Truncated { needed: HEADER_SIZE, available: bytes.len() });
    }
    let kind = PacketKind::from_u8(bytes[0]).ok_or(RecordingError::UnknownPacketKind(bytes[0]))?;
    let size = usize::from(bytes[1]);
    if size < HEADER_SIZE {
        return Err(RecordingError::InvalidPacketSize { kind, size });
    }
    if size > bytes.len() {
        return Err(RecordingError::Truncated { needed: size, available: bytes.len() });
    }
    Ok((kind, &bytes[HEADER_SIZE..size]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packets() -> Vec<Packet> {
        let tm = QuatT::new(Quat::from_rotation_z(0.4), Vec3::new(1.0, 2.0, 3.0));
        vec![
            Packet::frame(12.5),
            Packet::TpChar(TpChar {
                entity: EntityId::new(7),
                location: tm,
                velocity: Vec3::new(0.0, 4.0, 0.0),
                flags: TpFlags::CLOAKED,
                layer_effects: layer_effects::WET,
            }),
            Packet::EntitySpawn(EntitySpawn {
                entity: EntityId::new(40),
                class: ClassId(3),
                location: tm,
                scale: Vec3::new(1.0, 1.0, 1.0),
                model: Some(StringRef(12)),
                geometry: Some(ResourceHandle::new(ResourceKind::Geometry, 99)),
                material: None,
                hidden: false,
                slot_flags: 0x11,
                hide_mask: 0xFFFF_0000_0000_0001,
            }),
            Packet::WeaponAccessories(WeaponAccessories::new(
                EntityId::new(8),
                &[ClassId(1), ClassId(2)],
            )),
            Packet::RagdollImpulse(RagdollImpulse {
                entity: EntityId::new(7),
                impulse: Vec3::new(0.0, 0.0, 50.0),
                point: Vec3::ZERO,
                part: -1,
            }),
            Packet::FpChar(FpChar {
                frame_time: 12.51,
                camera: tm,
                relative: QuatT::from_translation(Vec3::new(0.0, 0.0, -1.6)),
                fov: 1.2,
                flags: FpFlags::FIRED_SHOT,
            }),
            Packet::PlaybackTimeOffset(PlaybackTimeOffset { offset: -0.25 }),
        ]
    }

    #[test]
    fn test_stream_roundtrip_both_orders() {
        let packets = sample_packets();
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let bytes = encode_stream(&packets, order).unwrap();
            assert_eq!(decode_stream(&bytes, order).unwrap(), packets);
        }
    }

    #[test]
    fn test_encoded_len_matches_bytes() {
        for packet in sample_packets() {
            let mut out = Vec::new();
            let written = encode_into(&packet, ByteOrder::Little, &mut out).unwrap();
            assert_eq!(written, out.len());
            assert_eq!(encoded_len(&packet), out.len());
            assert_eq!(usize::from(out[1]), out.len());
        }
    }

    #[test]
    fn test_swap_byte_order() {
        let packets = sample_packets();
        let little = encode_stream(&packets, ByteOrder::Little).unwrap();
        let big = swap_byte_order(&little, ByteOrder::Little).unwrap();
        assert_ne!(little, big);
        assert_eq!(big, encode_stream(&packets, ByteOrder::Big).unwrap());
        assert_eq!(swap_byte_order(&big, ByteOrder::Big).unwrap(), little);
    }

    #[test]
    fn test_records_walk_without_decoding() {
        let packets = sample_packets();
        let bytes = encode_stream(&packets, ByteOrder::Little).unwrap();
        let kinds: Vec<PacketKind> = records(&bytes).map(|r| r.unwrap().0).collect();
        let expected: Vec<PacketKind> = packets.iter().map(Packet::kind).collect();
        assert_eq!(kinds, expected);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert_eq!(
            decode(&[0], ByteOrder::Little).unwrap_err(),
            RecordingError::Truncated { needed: 2, available: 1 }
        );
        assert_eq!(
            decode(&[250, 6, 0, 0, 0, 0], ByteOrder::Little).unwrap_err(),
            RecordingError::UnknownPacketKind(250)
        );
        assert_eq!(
            decode(&[0, 1], ByteOrder::Little).unwrap_err(),
            RecordingError::InvalidPacketSize { kind: PacketKind::FrameMarker, size: 1 }
        );
        assert_eq!(
            decode(&[0, 6, 0, 0], ByteOrder::Little).unwrap_err(),
            RecordingError::Truncated { needed: 6, available: 4 }
        );
        // frame marker with a 5-byte payload
        assert!(matches!(
            decode(&[0, 7, 0, 0, 0, 0, 0], ByteOrder::Little),
            Err(RecordingError::PayloadMismatch { kind: PacketKind::FrameMarker, .. })
        ));
    }

    fn history_item(kind: MannHistoryKind) -> MannHistoryItem {
        MannHistoryItem {
            kind,
            scope_mask: 0b0110,
            fragment: 17,
            tag_state: 0x8000_0000_0000_0004,
            option: 2,
            trumps_previous: true,
        }
    }

    fn animation_and_effect_packets() -> Vec<Packet> {
        let tm = QuatT::new(Quat::from_rotation_z(-1.1), Vec3::new(-4.0, 0.5, 9.0));
        vec![
            Packet::ForcedRagdollAndImpulse(RagdollImpulse {
                entity: EntityId::new(3),
                impulse: Vec3::new(120.0, 0.0, 15.0),
                point: Vec3::new(1.0, 1.0, 1.2),
                part: 14,
            }),
            Packet::MountedGunAnimation(MountedGunAnimation {
                owner: EntityId::new(3),
                aim: 0.75,
                aim_up: 0.2,
                aim_down: 0.0,
            }),
            Packet::MountedGunRotate(MountedGunRotate {
                gun: EntityId::new(60),
                rotation: Quat::from_rotation_z(2.5),
            }),
            Packet::ParticleTarget(ParticleTarget {
                emitter: EmitterId(8),
                target: Vec3::new(10.0, 0.0, 0.0),
                velocity: Vec3::new(0.0, 3.0, 0.0),
                radius: 0.5,
                has_target: true,
                priority: false,
            }),
            Packet::SoundParameter(SoundParameter { sound: SoundId(21), index: 3, value: 0.125 }),
            Packet::SpawnCustomParticle(SpawnCustomParticle { effect: Some(StringRef(40)), location: tm }),
            Packet::ItemSwitchHand(ItemSwitchHand { item: EntityId::new(70), hand: 1 }),
            Packet::MannEvent(MannEvent { entity: EntityId::new(3), item: history_item(MannHistoryKind::Fragment) }),
            Packet::MannEvent(MannEvent { entity: EntityId::new(4), item: history_item(MannHistoryKind::Tag) }),
            Packet::MannSetParam(MannSetParam { entity: EntityId::new(3), param: 0xDEAD_BEEF, value: tm }),
            Packet::MannSetParamFloat(MannSetParamFloat { entity: EntityId::new(3), param: 0x1234, value: -2.0 }),
            Packet::MannSetSlaveController(MannSetSlaveController {
                master: EntityId::new(3),
                slave: EntityId::new(4),
                context: 5,
                enslave: true,
                database: 0xCAFE,
            }),
        ]
    }

    #[test]
    fn test_animation_and_effect_kinds_roundtrip() {
        for packet in animation_and_effect_packets() {
            for order in [ByteOrder::Little, ByteOrder::Big] {
                let mut out = Vec::new();
                let written = encode_into(&packet, order, &mut out).unwrap();
                assert_eq!(out[0], packet.kind() as u8);
                assert_eq!(written, encoded_len(&packet));
                assert_eq!(decode(&out, order).unwrap(), (packet.clone(), written), "{:?}", packet.kind());
            }
        }
    }

    #[test]
    fn test_forced_ragdoll_keeps_its_own_kind() {
        let impulse = RagdollImpulse { entity: EntityId::new(9), impulse: Vec3::X, point: Vec3::ZERO, part: -1 };
        let plain = encode_stream(&[Packet::RagdollImpulse(impulse)], ByteOrder::Little).unwrap();
        let forced = encode_stream(&[Packet::ForcedRagdollAndImpulse(impulse)], ByteOrder::Little).unwrap();
        assert_eq!(plain[1..], forced[1..]);
        assert_ne!(plain[0], forced[0]);
        assert_eq!(decode_stream(&forced, ByteOrder::Little).unwrap(), vec![Packet::ForcedRagdollAndImpulse(impulse)]);
    }

    #[test]
    fn test_unknown_history_kind_rejected() {
        let packet = Packet::MannEvent(MannEvent { entity: EntityId::new(3), item: history_item(MannHistoryKind::Tag) });
        let mut bytes = encode_stream(&[packet], ByteOrder::Little).unwrap();
        // kind byte follows the header and the entity id
        bytes[HEADER_SIZE + 4] = 9;
        assert_eq!(
            decode(&bytes, ByteOrder::Little).unwrap_err(),
            RecordingError::InvalidField { kind: PacketKind::MannEvent, field: "history kind" }
        );
    }

    #[test]
    fn test_records_stop_after_error() {
        let mut bytes = encode_stream(&[Packet::frame(1.0)], ByteOrder::Little).unwrap();
        bytes.extend_from_slice(&[0, 9]);
        let items: Vec<_> = records(&bytes).collect();
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }
}
