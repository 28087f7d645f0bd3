//! # Discarded-State Summary
//!
//! Packets that scroll out of the third-person buffer are folded into
//! this summary, so that playback can still reconstruct entities spawned
//! long before the replay window. For every live tracked entity exactly
//! one summary entry exists: created by its first packet, updated in
//! place, removed with the entity.

use std::collections::BTreeMap;

use killcam_shared::{EntityId, QuatT, MAX_RECORDED_PLAYERS};
use tracing::warn;

use crate::buffer::DiscardSink;
use crate::packet::{
    ClassId, CorpseSpawned, EmitterId, EntityAttached, EntitySpawn, MannHistoryItem, MannHistoryKind,
    MannSetSlaveController, Packet, ParticleCreated, PlaySound, SoundId, StringRef, WeaponAccessories,
};

/// Fragments a player initial state remembers, one per disjoint scope set
pub const MAX_FRAGMENT_TRIGGERS: usize = 4;

/// Spawn record plus the time it was recorded
#[derive(Clone, Debug, PartialEq)]
pub struct DiscardedSpawn {
    /// Spawn record kept up to date by later packets
    pub spawn: EntitySpawn,
    /// Frame time of the original spawn
    pub recorded_at: f32,
}

/// Particle spawn plus the time it was recorded
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiscardedParticle {
    /// Spawn record kept up to date by later locations
    pub created: ParticleCreated,
    /// Frame time of the original spawn
    pub recorded_at: f32,
}

/// Sound start plus the time it was recorded
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiscardedSound {
    /// Sound start record
    pub sound: PlaySound,
    /// Frame time of the start
    pub recorded_at: f32,
}

/// Everything needed to spawn a replay actor for a player
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayerInitialState {
    /// Player entity
    pub player: EntityId,
    /// Actor class
    pub class: ClassId,
    /// Team index
    pub team: u8,
    /// Model path in the model cache
    pub model: Option<StringRef>,
    /// Last recorded location
    pub location: QuatT,
    /// Selected weapon
    pub weapon: EntityId,
    /// Selected weapon class
    pub weapon_class: ClassId,
    /// Weapon firemode
    pub firemode: u8,
    /// Cloak state
    pub cloaked: bool,
    /// Mounted gun in use, [`EntityId::NONE`] when none
    pub mounted_gun: EntityId,
    /// Object held by pick-and-throw, [`EntityId::NONE`] when none
    pub held_object: EntityId,
    /// Last tag state set on the animation controller
    pub tag: Option<MannHistoryItem>,
    /// Latest fragment per scope set
    pub fragments: [Option<MannHistoryItem>; MAX_FRAGMENT_TRIGGERS],
    /// Last controller link made by this player
    pub slave_controller: Option<MannSetSlaveController>,
}

impl PlayerInitialState {
    /// State of a freshly joined player
    #[must_use]
    pub const fn joined(player: EntityId, class: ClassId, team: u8, model: Option<StringRef>) -> Self {
        Self {
            player,
            class,
            team,
            model,
            location: QuatT::IDENTITY,
            weapon: EntityId::NONE,
            weapon_class: ClassId(0),
            firemode: 0,
            cloaked: false,
            mounted_gun: EntityId::NONE,
            held_object: EntityId::NONE,
            tag: None,
            fragments: [None; MAX_FRAGMENT_TRIGGERS],
            slave_controller: None,
        }
    }

    /// Remembers a history item. A fragment takes the first free slot or
    /// the first slot sharing a scope with it; later slots sharing a scope
    /// are cleared, so each scope keeps only its newest fragment.
    pub fn record_history(&mut self, item: MannHistoryItem) {
        match item.kind {
            MannHistoryKind::Tag => self.tag = Some(item),
            MannHistoryKind::Fragment => {
                let mut installed = false;
                for slot in &mut self.fragments {
                    let overlaps = slot.map_or(true, |held| held.scope_mask == 0 || held.scope_mask & item.scope_mask != 0);
                    if !overlaps {
                        continue;
                    }
                    *slot = if installed { None } else { Some(item) };
                    installed = true;
                }
            }
        }
    }

    /// Fragments still playing, oldest slot first
    pub fn fragments(&self) -> impl Iterator<Item = &MannHistoryItem> + '_ {
        self.fragments.iter().flatten()
    }
}

/// Summary of every packet evicted from the third-person buffer
#[derive(Clone, Debug)]
pub struct DiscardedState {
    /// Live entities spawned before the buffer window
    pub entity_spawns: BTreeMap<EntityId, DiscardedSpawn>,
    /// Last accessory set per weapon
    pub weapon_accessories: BTreeMap<EntityId, WeaponAccessories>,
    /// Attached or persistent emitters still alive
    pub particles: BTreeMap<EmitterId, DiscardedParticle>,
    /// Sounds still playing
    pub sounds: BTreeMap<SoundId, DiscardedSound>,
    /// Attachments still in place
    pub attachments: Vec<EntityAttached>,
    /// Corpses still in the world
    pub corpses: BTreeMap<EntityId, CorpseSpawned>,
    players: [Option<PlayerInitialState>; MAX_RECORDED_PLAYERS],
}

impl Default for DiscardedState {
    fn default() -> Self {
        Self {
            entity_spawns: BTreeMap::new(),
            weapon_accessories: BTreeMap::new(),
            particles: BTreeMap::new(),
            sounds: BTreeMap::new(),
            attachments: Vec::new(),
            corpses: BTreeMap::new(),
            players: [None; MAX_RECORDED_PLAYERS],
        }
    }
}

impl DiscardedState {
    /// Empty summary
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Initial state of `player`
    #[must_use]
    pub fn player(&self, player: EntityId) -> Option<&PlayerInitialState> {
        self.players.iter().flatten().find(|state| state.player == player)
    }

    fn player_mut(&mut self, player: EntityId) -> Option<&mut PlayerInitialState> {
        self.players.iter_mut().flatten().find(|state| state.player == player)
    }

    /// Every recorded player initial state
    pub fn players(&self) -> impl Iterator<Item = &PlayerInitialState> + '_ {
        self.players.iter().flatten()
    }

    /// Folds one packet into the summary
    pub fn apply(&mut self, packet: Packet, frame_time: f32) {
        match packet {
            Packet::EntitySpawn(spawn) => {
                self.entity_spawns
                    .insert(spawn.entity, DiscardedSpawn { spawn, recorded_at: frame_time });
            }
            Packet::EntityRemoved(p) => self.remove_entity(p.entity),
            Packet::EntityHide(p) => {
                if let Some(entry) = self.entity_spawns.get_mut(&p.entity) {
                    entry.spawn.hidden = p.hidden;
                }
            }
            Packet::EntityLocation(p) => {
                if let Some(entry) = self.entity_spawns.get_mut(&p.entity) {
                    entry.spawn.location = p.location;
                }
            }
            Packet::DrawSlotChange(p) => {
                if let Some(entry) = self.entity_spawns.get_mut(&p.entity) {
                    entry.spawn.slot_flags = p.flags;
                }
            }
            Packet::StatObjChange(p) => {
                if let Some(entry) = self.entity_spawns.get_mut(&p.entity) {
                    entry.spawn.geometry = p.geometry;
                }
            }
            Packet::SubObjHideMask(p) => {
                if let Some(entry) = self.entity_spawns.get_mut(&p.entity) {
                    entry.spawn.hide_mask = p.mask;
                }
            }
            Packet::EntityAttached(p) => {
                self.attachments.retain(|a| a.child != p.child);
                self.attachments.push(p);
            }
            Packet::EntityDetached(p) => {
                self.attachments.retain(|a| !(a.parent == p.parent && a.child == p.child));
            }
            Packet::WeaponAccessories(p) => {
                self.weapon_accessories.insert(p.weapon, p);
            }
            Packet::ParticleCreated(p) => {
                if !p.attached_to.is_none() || p.persistent {
                    self.particles
                        .insert(p.emitter, DiscardedParticle { created: p, recorded_at: frame_time });
                }
            }
            Packet::ParticleLocation(p) => {
                if let Some(entry) = self.particles.get_mut(&p.emitter) {
                    entry.created.location = p.location;
                }
            }
            Packet::ParticleDeleted(p) => {
                self.particles.remove(&p.emitter);
            }
            Packet::PlaySound(p) => {
                self.sounds.insert(p.sound, DiscardedSound { sound: p, recorded_at: frame_time });
            }
            Packet::StopSound(p) => {
                self.sounds.remove(&p.sound);
            }
            Packet::CorpseSpawned(p) => {
                self.corpses.insert(p.corpse, p);
            }
            Packet::CorpseRemoved(p) => {
                self.corpses.remove(&p.corpse);
            }
            Packet::PlayerJoined(p) => self.join_player(PlayerInitialState::joined(
                p.player, p.class, p.team, p.model,
            )),
            Packet::PlayerLeft(p) => {
                if let Some(slot) =
                    self.players.iter_mut().find(|s| s.is_some_and(|state| state.player == p.player))
                {
                    *slot = None;
                }
            }
            Packet::TpChar(p) => {
                if let Some(state) = self.player_mut(p.entity) {
                    state.location = p.location;
                }
            }
            Packet::WeaponSelect(p) => {
                if let Some(state) = self.player_mut(p.owner) {
                    state.weapon = p.weapon;
                    state.weapon_class = p.class;
                }
            }
            Packet::FiremodeChanged(p) => {
                if let Some(state) = self.player_mut(p.owner) {
                    state.firemode = p.firemode;
                }
            }
            Packet::TeamChange(p) => {
                if let Some(state) = self.player_mut(p.entity) {
                    state.team = p.team;
                }
            }
            Packet::PlayerChangedModel(p) => {
                if let Some(state) = self.player_mut(p.player) {
                    state.model = p.model;
                }
            }
            Packet::ObjectCloakSync(p) => {
                if let Some(state) = self.player_mut(p.entity) {
                    state.cloaked = p.cloaked;
                }
            }
            Packet::MountedGunEnter(p) => {
                if let Some(state) = self.player_mut(p.owner) {
                    state.mounted_gun = p.gun;
                }
            }
            Packet::MountedGunLeave(p) => {
                if let Some(state) = self.player_mut(p.owner) {
                    state.mounted_gun = EntityId::NONE;
                }
            }
            Packet::PickAndThrowUsed(p) => {
                if let Some(state) = self.player_mut(p.owner) {
                    state.held_object = if p.picked_up { p.object } else { EntityId::NONE };
                }
            }
            Packet::MannEvent(p) => {
                if let Some(state) = self.player_mut(p.entity) {
                    state.record_history(p.item);
                }
            }
            Packet::MannSetSlaveController(p) => {
                if let Some(state) = self.player_mut(p.master) {
                    state.slave_controller = Some(p);
                }
            }
            _ => {}
        }
    }

    fn join_player(&mut self, state: PlayerInitialState) {
        if let Some(existing) = self.player_mut(state.player) {
            *existing = state;
            return;
        }
        match self.players.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => *slot = Some(state),
            None => warn!(player = %state.player, "player initial state table full"),
        }
    }

    fn remove_entity(&mut self, entity: EntityId) {
        self.entity_spawns.remove(&entity);
        self.weapon_accessories.remove(&entity);
        self.corpses.remove(&entity);
        self.attachments.retain(|a| a.parent != entity && a.child != entity);
    }
}

impl DiscardSink for DiscardedState {
    fn discard(&mut self, packet: Packet, frame_time: f32) {
        self.apply(packet, frame_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{
        EntityHide, EntityRemoved, MannEvent, PlayerJoined, PlayerLeft, ResourceHandle, ResourceKind,
        StatObjChange, WeaponSelect,
    };
    use killcam_shared::Vec3;

    fn spawn(id: u32, geometry: Option<ResourceHandle>) -> Packet {
        Packet::EntitySpawn(EntitySpawn {
            entity: EntityId::new(id),
            class: ClassId(1),
            location: QuatT::IDENTITY,
            scale: Vec3::new(1.0, 1.0, 1.0),
            model: None,
            geometry,
            material: None,
            hidden: false,
            slot_flags: 0,
            hide_mask: 0,
        })
    }

    #[test]
    fn test_spawn_updated_in_place_and_removed() {
        let mut state = DiscardedState::new();
        state.apply(spawn(5, None), 1.0);
        state.apply(
            Packet::EntityHide(EntityHide { entity: EntityId::new(5), hidden: true }),
            1.5,
        );
        let entry = &state.entity_spawns[&EntityId::new(5)];
        assert!(entry.spawn.hidden);
        assert_eq!(entry.recorded_at, 1.0);
        assert_eq!(state.entity_spawns.len(), 1);

        state.apply(Packet::EntityRemoved(EntityRemoved { entity: EntityId::new(5) }), 2.0);
        assert!(state.entity_spawns.is_empty());
    }

    #[test]
    fn test_removal_releases_handles() {
        let geometry = ResourceHandle::new(ResourceKind::Geometry, 77);
        let mut state = DiscardedState::new();
        state.apply(spawn(5, Some(geometry.clone())), 1.0);
        state.apply(
            Packet::StatObjChange(StatObjChange {
                entity: EntityId::new(5),
                slot: 0,
                geometry: Some(geometry.clone()),
            }),
            1.1,
        );
        assert_eq!(geometry.ref_count(), 2);
        state.apply(Packet::EntityRemoved(EntityRemoved { entity: EntityId::new(5) }), 2.0);
        assert_eq!(geometry.ref_count(), 1);
    }

    #[test]
    fn test_only_attached_or_persistent_particles_kept() {
        let mut state = DiscardedState::new();
        let free = ParticleCreated {
            emitter: EmitterId(1),
            effect: None,
            location: QuatT::IDENTITY,
            scale: 1.0,
            attached_to: EntityId::NONE,
            slot: 0,
            persistent: false,
        };
        state.apply(Packet::ParticleCreated(free), 1.0);
        state.apply(
            Packet::ParticleCreated(ParticleCreated { emitter: EmitterId(2), persistent: true, ..free }),
            1.0,
        );
        assert_eq!(state.particles.keys().copied().collect::<Vec<_>>(), vec![EmitterId(2)]);
    }

    #[test]
    fn test_player_table_bounded() {
        let mut state = DiscardedState::new();
        for id in 1..=(MAX_RECORDED_PLAYERS as u32 + 4) {
            state.apply(
                Packet::PlayerJoined(PlayerJoined {
                    player: EntityId::new(id),
                    class: ClassId(9),
                    team: 1,
                    model: None,
                }),
                0.0,
            );
        }
        assert_eq!(state.players().count(), MAX_RECORDED_PLAYERS);

        state.apply(Packet::PlayerLeft(PlayerLeft { player: EntityId::new(3) }), 1.0);
        assert!(state.player(EntityId::new(3)).is_none());
        assert_eq!(state.players().count(), MAX_RECORDED_PLAYERS - 1);

        state.apply(
            Packet::WeaponSelect(WeaponSelect {
                owner: EntityId::new(4),
                weapon: EntityId::new(400),
                class: ClassId(12),
            }),
            1.0,
        );
        let player = state.player(EntityId::new(4)).unwrap();
        assert_eq!(player.weapon, EntityId::new(400));
        assert_eq!(player.weapon_class, ClassId(12));
    }

    fn fragment(scope_mask: u32, fragment: u32) -> MannHistoryItem {
        MannHistoryItem {
            kind: MannHistoryKind::Fragment,
            scope_mask,
            fragment,
            tag_state: 0,
            option: 0,
            trumps_previous: false,
        }
    }

    #[test]
    fn test_fragments_keep_newest_per_scope() {
        let mut state = PlayerInitialState::joined(EntityId::new(1), ClassId(1), 0, None);
        state.record_history(fragment(0b0001, 10));
        state.record_history(fragment(0b0010, 11));
        assert_eq!(state.fragments().map(|f| f.fragment).collect::<Vec<_>>(), vec![10, 11]);

        // overlaps both, replaces the first and clears the second
        state.record_history(fragment(0b0011, 12));
        assert_eq!(state.fragments().map(|f| f.fragment).collect::<Vec<_>>(), vec![12]);

        state.record_history(fragment(0b0100, 13));
        assert_eq!(state.fragments().map(|f| f.fragment).collect::<Vec<_>>(), vec![12, 13]);

        let tag = MannHistoryItem { kind: MannHistoryKind::Tag, tag_state: 0x30, ..fragment(0, 0) };
        state.record_history(tag);
        assert_eq!(state.tag, Some(tag));
        assert_eq!(state.fragments().count(), 2);
    }

    #[test]
    fn test_mannequin_state_folded_for_known_players() {
        let mut state = DiscardedState::new();
        state.apply(
            Packet::PlayerJoined(PlayerJoined { player: EntityId::new(2), class: ClassId(9), team: 0, model: None }),
            0.0,
        );
        state.apply(Packet::MannEvent(MannEvent { entity: EntityId::new(2), item: fragment(1, 5) }), 0.5);
        state.apply(Packet::MannEvent(MannEvent { entity: EntityId::new(8), item: fragment(1, 6) }), 0.5);
        let link = MannSetSlaveController {
            master: EntityId::new(2),
            slave: EntityId::new(30),
            context: 1,
            enslave: true,
            database: 0,
        };
        state.apply(Packet::MannSetSlaveController(link), 0.6);

        let player = state.player(EntityId::new(2)).unwrap();
        assert_eq!(player.fragments().map(|f| f.fragment).collect::<Vec<_>>(), vec![5]);
        assert_eq!(player.slave_controller, Some(link));
        assert!(state.player(EntityId::new(8)).is_none());
    }
}
