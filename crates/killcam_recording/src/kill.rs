//! Kill metadata shared by highlights, transfer and playback.

use killcam_shared::{EntityId, Vec3};
use serde::{Deserialize, Serialize};

/// What killed the victim, as far as the camera cares
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileKind {
    /// Hitscan or melee, nothing to follow
    #[default]
    None,
    /// Thrown grenade
    Grenade,
    /// Rocket or other large projectile
    Rocket,
    /// Placed explosive
    C4,
    /// Any other followed projectile
    Other,
}

impl ProjectileKind {
    /// True for projectiles framed from further away
    #[must_use]
    pub const fn is_large(self) -> bool {
        matches!(self, Self::Rocket)
    }
}

/// One kill, as recorded at the moment of death
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KillInfo {
    /// Shooter
    pub killer: EntityId,
    /// Victim
    pub victim: EntityId,
    /// Host hit type id, keys the hit type rules
    pub hit_type: u32,
    /// Time of death
    pub death_time: f32,
    /// Slow-motion bullet-time kill
    pub bullet_time: bool,
    /// Final kill of a round
    pub winning_kill: bool,
    /// Projectile entity, [`EntityId::NONE`] for hitscan kills
    pub projectile: EntityId,
    /// Kind of `projectile`
    pub projectile_kind: ProjectileKind,
}

impl KillInfo {
    /// Plain hitscan kill
    #[must_use]
    pub const fn new(killer: EntityId, victim: EntityId, death_time: f32) -> Self {
        Self {
            killer,
            victim,
            hit_type: 0,
            death_time,
            bullet_time: false,
            winning_kill: false,
            projectile: EntityId::NONE,
            projectile_kind: ProjectileKind::None,
        }
    }
}

/// A kill reported by the game rules
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KillEvent {
    /// The kill
    pub info: KillInfo,
    /// The game has room to show a killcam right away
    pub display_now: bool,
    /// Seconds to wait after the clip end before starting playback
    pub delay: f32,
    /// Hit point relative to the victim, recorded for bullet-time kills
    pub hit_relative: Option<Vec3>,
}
