//! Applies recorded third-person packets to the replay clones.
//!
//! Every packet names originals; each arm maps them to clones and returns
//! `None` when one of them has no clone, so the caller can skip that
//! single packet.

use killcam_shared::{EntityId, QuatT};

use killcam_recording::packet::{EntitySpawn, MannSetSlaveController, StringRef};
use killcam_recording::world::{
    ActorEvent, AnimState, EntityChange, ParticleParams, ParticleTargetParams, SoundParams, SpawnKind,
};
use killcam_recording::{ClassId, Packet, ReplayWorld};

use super::session::{clone_params, Names, ReplayClones};

impl ReplayClones {
    /// Spawns a clone of a recorded entity spawn `age` seconds into its life
    pub(crate) fn spawn_entity_clone(
        &mut self,
        world: &mut dyn ReplayWorld,
        names: Names<'_>,
        spawn: &EntitySpawn,
        age: f32,
    ) -> Option<EntityId> {
        let mut params = clone_params(SpawnKind::Entity, spawn.entity, spawn.class, spawn.location);
        params.scale = spawn.scale;
        params.model = names.model(spawn.model);
        params.geometry.clone_from(&spawn.geometry);
        params.material.clone_from(&spawn.material);
        params.hidden = spawn.hidden;
        params.age = age;

        let id = world.spawn_entity(&params)?;
        if spawn.slot_flags != 0 {
            world.apply_entity_change(id, &EntityChange::DrawSlot { slot: 0, flags: spawn.slot_flags });
        }
        if spawn.hide_mask != 0 {
            world.apply_entity_change(id, &EntityChange::HideMask { slot: 0, mask: spawn.hide_mask });
        }
        self.entities.insert(spawn.entity, id);
        Some(id)
    }

    /// Spawns a replay actor for `player` with its team and model
    pub(crate) fn spawn_actor_clone(
        &mut self,
        world: &mut dyn ReplayWorld,
        names: Names<'_>,
        player: EntityId,
        class: ClassId,
        model: Option<StringRef>,
        location: QuatT,
    ) -> Option<EntityId> {
        let mut params = clone_params(SpawnKind::Actor, player, class, location);
        params.model = names.model(model);
        let id = world.spawn_entity(&params)?;
        self.actors.insert(player, id);
        Some(id)
    }

    /// Maps a recorded controller link onto the clones. Releasing a slave
    /// that has no clone still clears the master's scope context.
    pub(crate) fn slave_controller_event(&self, link: &MannSetSlaveController) -> Option<ActorEvent> {
        let slave = match self.clone_of(link.slave) {
            Some(slave) => slave,
            None if !link.enslave => EntityId::NONE,
            None => return None,
        };
        Some(ActorEvent::SlaveController {
            slave,
            context: link.context,
            enslave: link.enslave,
            database: link.database,
        })
    }

    /// Applies one packet. `None` means a referenced clone is missing.
    pub(crate) fn apply(&mut self, world: &mut dyn ReplayWorld, names: Names<'_>, packet: &Packet) -> Option<()> {
        match packet {
            Packet::FrameMarker { .. } => {}
            Packet::TpChar(p) => {
                let actor = *self.actors.get(&p.entity)?;
                world.set_world_transform(actor, p.location);
                world.apply_actor_event(
                    actor,
                    &ActorEvent::State { flags: p.flags, layer_effects: p.layer_effects, velocity: p.velocity },
                );
            }
            Packet::EntityLocation(p) => {
                let entity = *self.entities.get(&p.entity)?;
                world.set_world_transform(entity, p.location);
            }
            Packet::EntitySpawn(p) => {
                if !self.entities.contains_key(&p.entity) {
                    self.spawn_entity_clone(world, names, p, 0.0)?;
                }
            }
            Packet::EntityRemoved(p) => {
                let entity = self.entities.remove(&p.entity)?;
                world.remove_entity(entity);
            }
            Packet::EntityHide(p) => world.set_hidden(self.clone_of(p.entity)?, p.hidden),
            Packet::DrawSlotChange(p) => {
                world.apply_entity_change(self.clone_of(p.entity)?, &EntityChange::DrawSlot { slot: p.slot, flags: p.flags });
            }
            Packet::StatObjChange(p) => {
                let change = EntityChange::Geometry { slot: p.slot, geometry: p.geometry.clone() };
                world.apply_entity_change(self.clone_of(p.entity)?, &change);
            }
            Packet::SubObjHideMask(p) => {
                world.apply_entity_change(self.clone_of(p.entity)?, &EntityChange::HideMask { slot: p.slot, mask: p.mask });
            }
            Packet::EntityAttached(p) => {
                let (parent, child) = (self.clone_of(p.parent)?, self.clone_of(p.child)?);
                let socket = names.model(p.socket);
                world.attach(parent, child, socket.as_deref());
            }
            Packet::EntityDetached(p) => world.detach(self.clone_of(p.parent)?, self.clone_of(p.child)?),
            Packet::WeaponAccessories(p) => {
                let change = EntityChange::Accessories(p.accessories.clone());
                world.apply_entity_change(self.clone_of(p.weapon)?, &change);
            }
            Packet::WeaponSelect(p) => {
                let actor = *self.actors.get(&p.owner)?;
                let weapon = self.map_optional(p.weapon)?;
                world.apply_actor_event(actor, &ActorEvent::SelectWeapon { weapon, class: p.class });
            }
            Packet::FiremodeChanged(p) => {
                let actor = *self.actors.get(&p.owner)?;
                let weapon = self.clone_of(p.weapon)?;
                world.apply_actor_event(actor, &ActorEvent::Firemode { weapon, firemode: p.firemode });
            }
            Packet::OnShoot(p) => {
                let actor = *self.actors.get(&p.shooter)?;
                let weapon = self.map_optional(p.weapon)?;
                world.apply_actor_event(actor, &ActorEvent::Shoot { weapon });
            }
            Packet::ParticleCreated(p) => {
                let params = ParticleParams {
                    effect: names.model(p.effect),
                    location: p.location,
                    scale: p.scale,
                    attached_to: self.map_optional(p.attached_to)?,
                    slot: p.slot,
                    age: 0.0,
                };
                let emitter = world.create_particle(&params)?;
                self.particles.insert(p.emitter, emitter);
            }
            Packet::ParticleDeleted(p) => world.remove_particle(self.particles.remove(&p.emitter)?),
            Packet::ParticleLocation(p) => world.move_particle(*self.particles.get(&p.emitter)?, p.location),
            Packet::PlaySound(p) => {
                let params = SoundParams {
                    name: names.sound(p.name),
                    position: p.position,
                    entity: self.map_optional(p.entity)?,
                    looping: p.looping,
                    offset: 0.0,
                };
                let sound = world.play_sound(&params)?;
                self.sounds.insert(p.sound, sound);
            }
            Packet::StopSound(p) => world.stop_sound(self.sounds.remove(&p.sound)?),
            Packet::BulletTrail(p) => world.emit_tracer(p.start, p.end, p.friendly),
            Packet::ProceduralBreakHappened(p) => world.apply_break(p.index),
            Packet::TpAnim(p) => {
                let actor = *self.actors.get(&p.entity)?;
                world.apply_actor_event(actor, &ActorEvent::Animation { fragment: p.fragment, speed: p.speed });
            }
            Packet::AnimObjectUpdated(p) => {
                let change = EntityChange::Animation(AnimState { anim: p.anim, time: p.time });
                world.apply_entity_change(self.clone_of(p.entity)?, &change);
            }
            Packet::RagdollImpulse(p) => {
                let event = ActorEvent::RagdollImpulse { impulse: p.impulse, point: p.point, part: p.part };
                world.apply_actor_event(self.clone_of(p.entity)?, &event);
            }
            Packet::PlayerJoined(p) => {
                if !self.actors.contains_key(&p.player) {
                    let actor = self.spawn_actor_clone(world, names, p.player, p.class, p.model, QuatT::IDENTITY)?;
                    world.apply_actor_event(actor, &ActorEvent::Team(p.team));
                }
            }
            Packet::TeamChange(p) => {
                world.apply_actor_event(*self.actors.get(&p.entity)?, &ActorEvent::Team(p.team));
            }
            Packet::PlayerChangedModel(p) => {
                world.apply_actor_event(*self.actors.get(&p.player)?, &ActorEvent::Model(names.model(p.model)));
            }
            Packet::ObjectCloakSync(p) => {
                world.apply_actor_event(self.clone_of(p.entity)?, &ActorEvent::Cloak(p.cloaked));
            }
            Packet::MountedGunEnter(p) => {
                let actor = *self.actors.get(&p.owner)?;
                world.apply_actor_event(actor, &ActorEvent::MountGun(self.clone_of(p.gun)?));
            }
            Packet::MountedGunLeave(p) => {
                let actor = *self.actors.get(&p.owner)?;
                world.apply_actor_event(actor, &ActorEvent::LeaveGun(self.clone_of(p.gun)?));
            }
            Packet::PickAndThrowUsed(p) => {
                let actor = *self.actors.get(&p.owner)?;
                let event = ActorEvent::PickAndThrow { object: self.clone_of(p.object)?, picked_up: p.picked_up };
                world.apply_actor_event(actor, &event);
            }
            Packet::ForcedRagdollAndImpulse(p) => {
                let actor = *self.actors.get(&p.entity)?;
                world.ragdollize(actor);
                let event = ActorEvent::RagdollImpulse { impulse: p.impulse, point: p.point, part: p.part };
                world.apply_actor_event(actor, &event);
            }
            Packet::MountedGunAnimation(p) => {
                let actor = *self.actors.get(&p.owner)?;
                let event = ActorEvent::MountedGunAim { aim: p.aim, aim_up: p.aim_up, aim_down: p.aim_down };
                world.apply_actor_event(actor, &event);
            }
            Packet::MountedGunRotate(p) => {
                let gun = self.clone_of(p.gun)?;
                let location = world.world_transform(gun)?;
                world.set_world_transform(gun, QuatT::new(p.rotation, location.t));
            }
            Packet::ParticleTarget(p) => {
                let target = ParticleTargetParams {
                    target: p.target,
                    velocity: p.velocity,
                    radius: p.radius,
                    has_target: p.has_target,
                    priority: p.priority,
                };
                world.set_particle_target(*self.particles.get(&p.emitter)?, &target);
            }
            Packet::SoundParameter(p) => world.set_sound_parameter(*self.sounds.get(&p.sound)?, p.index, p.value),
            Packet::SpawnCustomParticle(p) => {
                let effect = names.model(p.effect)?;
                world.spawn_custom_particle(&effect, p.location);
            }
            Packet::ItemSwitchHand(p) => world.apply_entity_change(self.clone_of(p.item)?, &EntityChange::Hand(p.hand)),
            Packet::MannEvent(p) => {
                world.apply_actor_event(*self.actors.get(&p.entity)?, &ActorEvent::Mannequin(p.item));
            }
            Packet::MannSetParam(p) => {
                let event = ActorEvent::MannParam { param: p.param, value: p.value };
                world.apply_actor_event(self.clone_of(p.entity)?, &event);
            }
            Packet::MannSetParamFloat(p) => {
                let event = ActorEvent::MannParamFloat { param: p.param, value: p.value };
                world.apply_actor_event(self.clone_of(p.entity)?, &event);
            }
            Packet::MannSetSlaveController(p) => {
                let master = *self.actors.get(&p.master)?;
                world.apply_actor_event(master, &self.slave_controller_event(p)?);
            }
            // initial state only, or first-person data
            Packet::CorpseSpawned(_)
            | Packet::CorpseRemoved(_)
            | Packet::PlayerLeft(_)
            | Packet::InteractiveObjectFinishedUse(_)
            | Packet::FpChar(_)
            | Packet::VictimPosition(_)
            | Packet::KillHitPosition(_)
            | Packet::PlaybackTimeOffset(_)
            | Packet::Flashed(_)
            | Packet::RenderNearest(_)
            | Packet::BattleChatter(_)
            | Packet::PlayerHealthEffect(_) => {}
        }
        Some(())
    }
}
