//! # Playback Setup
//!
//! Building the replay world is spread over several updates, one stage per
//! update, so no single frame pays for all of it:
//!
//! ```text
//! AudioAndTracers → HideExistingEntities → SpawnNewEntities → HandleParticles
//!   → SpawnRecordingSystemActors → StartExistingSounds → ApplyBreaks → ReInitHud → Done
//! ```

use killcam_shared::EntityId;
use tracing::debug;

use killcam_recording::world::{ActorEvent, EntityChange, ParticleParams, SoundParams, SpawnKind, UiEvent};
use killcam_recording::{DiscardedState, KillCamConfig, Recorder, ReplayWorld};

use super::bullet_time::{BulletPath, BulletTime};
use super::interpolate::fp_camera_at;
use super::session::{clone_params, Names, PlaybackSession};

/// One setup step
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SetupStage {
    /// Snapshot the frames, apply the time offset, plan bullet time
    AudioAndTracers,
    /// Hide the live entities the replay stands in for
    HideExistingEntities,
    /// Clone entities, corpses and actors alive at the window start
    SpawnNewEntities,
    /// Weapon accessories and running particle effects
    HandleParticles,
    /// Place the replay actors
    SpawnRecordingSystemActors,
    /// Restart looping sounds
    StartExistingSounds,
    /// Breakables and attachments
    ApplyBreaks,
    /// Hand the HUD to the killcam
    ReInitHud,
    /// Setup complete
    Done,
}

impl SetupStage {
    /// Stage after this one
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::AudioAndTracers => Self::HideExistingEntities,
            Self::HideExistingEntities => Self::SpawnNewEntities,
            Self::SpawnNewEntities => Self::HandleParticles,
            Self::HandleParticles => Self::SpawnRecordingSystemActors,
            Self::SpawnRecordingSystemActors => Self::StartExistingSounds,
            Self::StartExistingSounds => Self::ApplyBreaks,
            Self::ApplyBreaks => Self::ReInitHud,
            Self::ReInitHud | Self::Done => Self::Done,
        }
    }
}

impl PlaybackSession {
    pub(crate) fn run_stage(
        &mut self,
        stage: SetupStage,
        world: &mut dyn ReplayWorld,
        recorder: &Recorder,
        config: &KillCamConfig,
    ) {
        let names = Names::of(recorder);
        match stage {
            SetupStage::AudioAndTracers => self.prepare_frames(world, recorder, config),
            SetupStage::HideExistingEntities => {
                for id in recorder.tracked_entities() {
                    if world.entity_exists(id) && !world.is_hidden(id) {
                        world.set_hidden(id, true);
                        self.hidden.push(id);
                    }
                }
            }
            SetupStage::SpawnNewEntities => self.spawn_initial_clones(world, names),
            SetupStage::HandleParticles => self.restore_particles(world, names),
            SetupStage::SpawnRecordingSystemActors => {
                for state in self.discarded.players() {
                    if let Some(&actor) = self.clones.actors.get(&state.player) {
                        world.set_world_transform(actor, state.location);
                    }
                }
            }
            SetupStage::StartExistingSounds => {
                let start = self.window.start;
                for (&original, entry) in &self.discarded.sounds {
                    if !entry.sound.looping {
                        continue;
                    }
                    let Some(entity) = self.clones.map_optional(entry.sound.entity) else {
                        continue;
                    };
                    let params = SoundParams {
                        name: names.sound(entry.sound.name),
                        position: entry.sound.position,
                        entity,
                        looping: true,
                        offset: start - entry.recorded_at,
                    };
                    if let Some(sound) = world.play_sound(&params) {
                        self.clones.sounds.insert(original, sound);
                    }
                }
            }
            SetupStage::ApplyBreaks => {
                world.revert_breaks(self.window.start);
                for attached in &self.discarded.attachments {
                    let parent = self.clones.clone_of(attached.parent);
                    let child = self.clones.clone_of(attached.child);
                    if let (Some(parent), Some(child)) = (parent, child) {
                        let socket = names.model(attached.socket);
                        world.attach(parent, child, socket.as_deref());
                    }
                }
                // nothing after this stage reads the summary
                self.discarded = DiscardedState::new();
            }
            SetupStage::ReInitHud => world.emit_ui_event(UiEvent::KillCamStarted {
                killer: self.kill.killer,
                victim: self.kill.victim,
                highlight: self.highlight.is_some(),
            }),
            SetupStage::Done => {}
        }
        debug!(?stage, clones = self.clones.entity_count(), "playback setup stage done");
    }

    fn prepare_frames(&mut self, world: &mut dyn ReplayWorld, recorder: &Recorder, config: &KillCamConfig) {
        self.window = self.window.shifted(self.fp.time_offset);
        self.rel_death = self.window.rel_death();
        let start = self.window.start;

        let snapshot = self.pending_tp.take().unwrap_or_else(|| recorder.snapshot(start));
        self.discarded = snapshot.discarded;
        self.tp = snapshot.packets;
        let first = self.tp.iter().position(|p| p.frame_marker_time().is_some_and(|t| t >= start));
        self.tp.drain(..first.unwrap_or(self.tp.len()));
        self.front = 0;
        self.played_frame = false;

        if !self.kill.bullet_time {
            return;
        }
        world.set_time_scale(1.0);
        let rel_death = self.rel_death;
        if let Some(last) = self
            .tp
            .iter()
            .filter_map(|p| p.frame_marker_time())
            .map(|t| t - start)
            .filter(|&t| t < rel_death)
            .reduce(f32::max)
        {
            self.rel_death = last;
        }

        let Some(camera) = fp_camera_at(&self.fp.samples, self.remote_start, self.rel_death) else {
            debug!("bullet time without first-person samples");
            return;
        };
        let target = self.fp.kill_hit().and_then(|hit| {
            self.fp
                .victim_position_at(self.remote_start + self.rel_death)
                .map(|victim| victim + hit.hit_relative)
        });
        let path = BulletPath::new(camera.camera.t, camera.camera.q, target, self.rel_death, &config.bullet_time);
        debug!(travel = path.travel_time, hover_start = path.hover_start, "bullet path planned");
        self.bullet = Some(BulletTime::new(path));
    }

    fn spawn_initial_clones(&mut self, world: &mut dyn ReplayWorld, names: Names<'_>) {
        let start = self.window.start;
        for entry in self.discarded.entity_spawns.values() {
            if self.clones.spawn_entity_clone(world, names, &entry.spawn, start - entry.recorded_at).is_none() {
                debug!(entity = %entry.spawn.entity, "entity clone failed to spawn");
            }
        }

        for corpse in self.discarded.corpses.values() {
            let Some(state) = self.discarded.player(corpse.player) else {
                continue;
            };
            let mut params = clone_params(SpawnKind::Corpse, corpse.corpse, state.class, state.location);
            params.model = names.model(state.model);
            if let Some(id) = world.spawn_entity(&params) {
                self.clones.corpses.insert(corpse.corpse, id);
            }
        }

        let players: Vec<_> = self.discarded.players().copied().collect();
        for state in &players {
            let spawned =
                self.clones.spawn_actor_clone(world, names, state.player, state.class, state.model, state.location);
            if spawned.is_none() {
                debug!(player = %state.player, "replay actor failed to spawn");
            }
        }

        for state in &players {
            let Some(&actor) = self.clones.actors.get(&state.player) else {
                continue;
            };
            let clone = |id: EntityId| self.clones.map_optional(id).unwrap_or(EntityId::NONE);
            let mut events = vec![
                ActorEvent::Team(state.team),
                ActorEvent::Model(names.model(state.model)),
                ActorEvent::Cloak(state.cloaked),
                ActorEvent::SelectWeapon { weapon: clone(state.weapon), class: state.weapon_class },
            ];
            if !state.weapon.is_none() {
                events.push(ActorEvent::Firemode { weapon: clone(state.weapon), firemode: state.firemode });
            }
            if !state.mounted_gun.is_none() {
                events.push(ActorEvent::MountGun(clone(state.mounted_gun)));
            }
            if !state.held_object.is_none() {
                events.push(ActorEvent::PickAndThrow { object: clone(state.held_object), picked_up: true });
            }
            events.extend(state.tag.into_iter().chain(state.fragments().copied()).map(ActorEvent::Mannequin));
            if let Some(link) = &state.slave_controller {
                events.extend(self.clones.slave_controller_event(link));
            }
            let applied = events.iter().all(|event| world.apply_actor_event(actor, event));
            if !applied {
                debug!(player = %state.player, "replay actor appearance failed, hidden");
                world.set_hidden(actor, true);
            }
        }
    }

    fn restore_particles(&mut self, world: &mut dyn ReplayWorld, names: Names<'_>) {
        for accessories in self.discarded.weapon_accessories.values() {
            if let Some(weapon) = self.clones.clone_of(accessories.weapon) {
                world.apply_entity_change(weapon, &EntityChange::Accessories(accessories.accessories.clone()));
            }
        }

        let start = self.window.start;
        for (&original, entry) in &self.discarded.particles {
            let Some(attached_to) = self.clones.map_optional(entry.created.attached_to) else {
                continue;
            };
            let params = ParticleParams {
                effect: names.model(entry.created.effect),
                location: entry.created.location,
                scale: entry.created.scale,
                attached_to,
                slot: entry.created.slot,
                age: start - entry.recorded_at,
            };
            match world.create_particle(&params) {
                Some(emitter) => {
                    self.clones.particles.insert(original, emitter);
                }
                None => debug!(emitter = original.0, "replay particle failed, dropped"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_run_in_order() {
        let mut stage = SetupStage::AudioAndTracers;
        let mut seen = vec![stage];
        while stage != SetupStage::Done {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(seen.len(), 9);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(SetupStage::Done.next(), SetupStage::Done);
    }
}
