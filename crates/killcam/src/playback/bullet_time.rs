//! # Bullet Time
//!
//! A stand-in bullet flies from the killer's camera to the impact point
//! while the replay clock slows down around it:
//!
//! ```text
//!  from_death: -travel ─────────── hover_start ─────── 0 ───────────►
//!  phase:       Approach           Hover   PostHover      PostHit
//!  time scale:  travel_time_scale  hover   post_hover     1.0
//! ```
//!
//! [`BulletTime::update`] is pure; it returns the world actions the
//! session has to carry out.

use killcam_shared::{Quat, Vec3};

use killcam_recording::BulletTimeConfig;

/// Distance used when no impact point was recorded
pub const FALLBACK_TARGET_DISTANCE: f32 = 10.0;

/// Bullet-time phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BulletPhase {
    /// Bullet travels at the travel time scale
    #[default]
    Approach,
    /// Bullet almost stands still just before the impact
    Hover,
    /// Bullet finishes its flight
    PostHover,
    /// Bullet is gone, the camera zooms on the impact
    PostHit,
}

/// Flight path of the stand-in bullet
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BulletPath {
    /// Killer camera at death
    pub origin: Vec3,
    /// Impact point
    pub target: Vec3,
    /// Bullet orientation, forward along the flight
    pub orientation: Quat,
    /// Flight duration in replay seconds
    pub travel_time: f32,
    /// Replay clock value at which the hover begins
    pub hover_start: f32,
}

impl BulletPath {
    /// Path from `camera` at death to `target`.
    ///
    /// Without a target the bullet flies [`FALLBACK_TARGET_DISTANCE`]
    /// along the camera forward axis.
    #[must_use]
    pub fn new(
        origin: Vec3,
        camera: Quat,
        target: Option<Vec3>,
        rel_death: f32,
        config: &BulletTimeConfig,
    ) -> Self {
        let (target, orientation) = match target {
            Some(target) => (target, Quat::look_rotation(target - origin)),
            None => (origin + camera.column1() * FALLBACK_TARGET_DISTANCE, camera),
        };
        let distance = origin.distance(target);
        let (travel_time, hover_start) = if distance > 0.0 && config.speed > 0.0 {
            let travel = distance / config.speed;
            (travel, rel_death - (config.hover_dist / distance) * travel)
        } else {
            (0.0, rel_death)
        };
        Self { origin, target, orientation, travel_time, hover_start }
    }

    /// Point at flight fraction `u`
    #[must_use]
    pub fn position_at(&self, u: f32) -> Vec3 {
        Vec3::lerp(self.origin, self.target, u)
    }
}

/// World action requested by a bullet-time update
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BulletAction {
    /// Spawn the stand-in at the path origin
    Spawn,
    /// Move the stand-in
    Move(Vec3),
    /// Change the replay time scale
    SetTimeScale(f32),
    /// Attach a tracer from the bullet to the target
    EmitTracer {
        /// Tracer start
        from: Vec3,
        /// Tracer end
        to: Vec3,
    },
    /// Remove the stand-in
    Remove,
    /// Place the impact effect
    Impact,
}

/// Bullet-time sub-state of a playback
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BulletTime {
    /// Flight path
    pub path: BulletPath,
    /// Current phase
    pub phase: BulletPhase,
    /// Current bullet position
    pub position: Vec3,
    /// Camera anchor once the bullet stops hovering
    pub post_hit_camera: Vec3,
    spawned: bool,
}

impl BulletTime {
    /// Bullet time along `path`, nothing spawned yet
    #[must_use]
    pub const fn new(path: BulletPath) -> Self {
        Self { path, phase: BulletPhase::Approach, position: path.origin, post_hit_camera: path.origin, spawned: false }
    }

    /// True once the stand-in has been spawned
    #[must_use]
    pub const fn is_spawned(&self) -> bool {
        self.spawned
    }

    /// Advances to replay clock `clock`
    pub fn update(&mut self, clock: f32, rel_death: f32, config: &BulletTimeConfig) -> Vec<BulletAction> {
        let travel = self.path.travel_time;
        let from_death = clock - rel_death;
        if from_death <= -travel {
            return Vec::new();
        }
        if !self.spawned && self.phase == BulletPhase::Approach {
            self.spawned = true;
            self.position = self.path.origin;
            return vec![BulletAction::Spawn, BulletAction::SetTimeScale(config.travel_time_scale)];
        }

        let u = if travel > 0.0 { from_death / travel + 1.0 } else { f32::INFINITY };
        if u > 1.0 {
            if self.phase == BulletPhase::PostHit {
                return Vec::new();
            }
            if self.phase != BulletPhase::PostHover {
                self.post_hit_camera = self.position;
            }
            self.phase = BulletPhase::PostHit;
            return vec![BulletAction::Remove, BulletAction::SetTimeScale(1.0), BulletAction::Impact];
        }

        self.position = self.path.position_at(u);
        let mut actions = vec![BulletAction::Move(self.position)];
        let hover_start = self.path.hover_start;
        if clock >= hover_start {
            if clock < hover_start + config.hover_time * config.hover_time_scale {
                if self.phase != BulletPhase::Hover {
                    self.phase = BulletPhase::Hover;
                    actions.push(BulletAction::SetTimeScale(config.hover_time_scale));
                }
            } else if self.phase != BulletPhase::PostHover {
                self.phase = BulletPhase::PostHover;
                self.post_hit_camera = self.position;
                actions.push(BulletAction::EmitTracer { from: self.position, to: self.path.target });
                actions.push(BulletAction::SetTimeScale(config.post_hover_time_scale));
            }
        }
        actions
    }
}
