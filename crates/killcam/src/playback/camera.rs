//! # Replay Camera
//!
//! Picks the view every frame and turns it into camera parameters:
//!
//! ```text
//!  FirstPerson ◄─flag─► ThirdPerson         killer's recorded view
//!       │
//!       ├─ projectile alive ──► ProjectileFollow ── gone ──► Static
//!       │
//!       └─ bullet spawned ────► BulletTime (approach, hover, post-hit zoom)
//! ```

use killcam_shared::{smooth_cd, EntityId, Quat, QuatT, SmoothState, Vec3};

use killcam_recording::packet::{FpChar, FpFlags};
use killcam_recording::world::RaycastRequest;
use killcam_recording::{CameraConfig, KillCamConfig, ProjectileKind, ReplayWorld};

use super::bullet_time::{BulletPhase, BulletTime};

/// Distance the camera keeps in front of geometry between it and the victim
pub const COLLISION_PUSH: f32 = 0.1;

/// Active replay view
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewMode {
    /// Killer's eyes
    #[default]
    FirstPerson,
    /// Killer's recorded third-person camera
    ThirdPerson,
    /// Behind the killing projectile
    ProjectileFollow,
    /// Fixed position looking at the victim
    Static,
    /// Following the bullet-time stand-in
    BulletTime,
}

/// Camera output for one rendered frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraParams {
    /// World transform of the camera
    pub location: QuatT,
    /// Field of view in radians
    pub fov: f32,
    /// View that produced it
    pub view: ViewMode,
}

/// What the camera can see of the replay this frame
#[derive(Clone, Copy, Debug, Default)]
pub struct CameraInputs<'a> {
    /// Interpolated first-person sample
    pub fp: Option<&'a FpChar>,
    /// Followed projectile clone position
    pub projectile: Option<Vec3>,
    /// Kind of the followed projectile
    pub projectile_kind: ProjectileKind,
    /// Victim clone
    pub victim: Option<EntityId>,
    /// Bullet-time state
    pub bullet: Option<&'a BulletTime>,
    /// Replay seconds since the window start
    pub clock: f32,
    /// Death time relative to the window start
    pub rel_death: f32,
    /// Real seconds since the last frame
    pub dt: f32,
}

/// Camera state carried between frames
#[derive(Clone, Debug, Default)]
pub struct ViewState {
    mode: ViewMode,
    last: Option<QuatT>,
    fov: f32,
    smoothing: bool,
    smooth: SmoothState,
    c4_raise: Option<f32>,
}

impl ViewState {
    /// First-person view, no history
    #[must_use]
    pub fn new() -> Self {
        Self { fov: DEFAULT_FOV, ..Self::default() }
    }

    /// Active view
    #[must_use]
    pub const fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Switches view
    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    /// Follows the recorded camera's third-person flag while in a killer view
    pub fn follow_fp_flags(&mut self, flags: FpFlags) {
        if matches!(self.mode, ViewMode::FirstPerson | ViewMode::ThirdPerson) {
            self.mode = if flags.contains(FpFlags::THIRD_PERSON) {
                ViewMode::ThirdPerson
            } else {
                ViewMode::FirstPerson
            };
        }
    }

    /// True while position smoothing is applied
    #[must_use]
    pub const fn is_smoothing(&self) -> bool {
        self.smoothing
    }

    /// Computes this frame's camera
    pub fn update(&mut self, world: &dyn ReplayWorld, inputs: &CameraInputs<'_>, config: &KillCamConfig) -> CameraParams {
        let camera = &config.camera;
        let victim = inputs.victim.and_then(|id| world.world_transform(id)).map(|l| l.t);

        let mut target = None;
        if let (Some(projectile), Some(victim)) = (inputs.projectile, victim) {
            self.mode = ViewMode::ProjectileFollow;
            target = Some(self.follow_projectile(world, projectile, victim, inputs.projectile_kind, camera));
        }

        let mut adjustment = Vec3::ZERO;
        if self.mode == ViewMode::ProjectileFollow && target.is_none() {
            self.mode = ViewMode::Static;
            self.smoothing = false;
            if inputs.projectile_kind != ProjectileKind::C4 || self.c4_raise.is_none() {
                let from = self.last.map_or(Vec3::ZERO, |l| l.t);
                adjustment.z += safe_raise_distance(world, from, camera.camera_raise_height);
            }
        }

        let last = self.last.unwrap_or(QuatT::IDENTITY);
        let target = match self.mode {
            ViewMode::FirstPerson | ViewMode::ThirdPerson => {
                self.smoothing = false;
                inputs.fp.map_or(last, |fp| {
                    self.fov = fp.fov;
                    fp.camera
                })
            }
            ViewMode::ProjectileFollow => target.unwrap_or(last),
            ViewMode::Static => {
                let position = last.t + adjustment;
                let rotation = victim.map_or(last.q, |victim| {
                    let focus = victim + Vec3::Z * camera.projectile_victim_height_offset;
                    Quat::look_rotation(focus - position)
                });
                QuatT::new(rotation, position)
            }
            ViewMode::BulletTime => match inputs.bullet {
                Some(bullet) => self.bullet_camera(bullet, victim, last, inputs, config),
                None => last,
            },
        };

        let location = self.smoothed(target, inputs.dt, camera.smoothing);
        self.last = Some(location);
        CameraParams { location, fov: self.fov, view: self.mode }
    }

    fn follow_projectile(
        &mut self,
        world: &dyn ReplayWorld,
        projectile: Vec3,
        victim: Vec3,
        kind: ProjectileKind,
        camera: &CameraConfig,
    ) -> QuatT {
        let to_victim = victim - projectile;
        let distance = to_victim.length();
        let direction = to_victim.normalize_or_zero();
        let mut back = if kind.is_large() { camera.large_projectile_distance } else { camera.projectile_distance };
        if back + distance < camera.projectile_minimum_victim_dist {
            back = camera.projectile_minimum_victim_dist - distance;
        }
        let mut position = projectile - direction * back;
        position.z += match kind {
            ProjectileKind::Rocket => camera.large_projectile_height_offset,
            ProjectileKind::C4 => *self
                .c4_raise
                .get_or_insert_with(|| safe_raise_distance(world, position, camera.camera_raise_height)),
            ProjectileKind::None | ProjectileKind::Grenade | ProjectileKind::Other => camera.projectile_height_offset,
        };

        let focus = victim + Vec3::Z * camera.projectile_victim_height_offset;
        let look = focus - position;
        let request = RaycastRequest { origin: focus, direction: -look, ignore: Vec::new() };
        if let Some(hit) = world.raycast(&request) {
            position = hit.point + hit.normal * COLLISION_PUSH;
        }

        if kind == ProjectileKind::Grenade && distance <= camera.grenade_smoothing_dist {
            self.smoothing = true;
        }
        QuatT::new(Quat::look_rotation(look), position)
    }

    fn bullet_camera(
        &mut self,
        bullet: &BulletTime,
        victim: Option<Vec3>,
        last: QuatT,
        inputs: &CameraInputs<'_>,
        config: &KillCamConfig,
    ) -> QuatT {
        let tuning = &config.bullet_time;
        let q = bullet.path.orientation;
        if bullet.phase != BulletPhase::PostHit {
            let offset = q.column0() * tuning.cam_offset.x + q.column1() * tuning.cam_offset.y + q.column2() * tuning.cam_offset.z;
            return QuatT::new(q, bullet.position + offset);
        }

        let from_death = inputs.clock - inputs.rel_death;
        let zoom_time = tuning.zoom_time;
        let zoomed_out = from_death >= zoom_time * (2.0 + tuning.zoom_out_ratio);
        let u = if from_death < zoom_time {
            from_death / zoom_time
        } else if !zoomed_out {
            (2.0 * zoom_time - from_death) / zoom_time
        } else {
            -tuning.zoom_out_ratio
        };
        let position = bullet.post_hit_camera + q.column1() * (u * tuning.zoom_dist);
        let mut rotation = last.q;
        if zoomed_out {
            self.smoothing = true;
            if let Some(victim) = victim {
                rotation = Quat::look_rotation(victim - position);
            }
        }
        QuatT::new(rotation, position)
    }

    fn smoothed(&mut self, target: QuatT, dt: f32, smooth_time: f32) -> QuatT {
        let Some(previous) = self.last.filter(|_| self.smoothing && smooth_time > 0.0) else {
            self.smooth = SmoothState::at(target.t);
            return target;
        };
        self.smooth.value = previous.t;
        smooth_cd(&mut self.smooth, dt, target.t, smooth_time);

        let total = target.t - previous.t;
        let length_sq = total.length_squared();
        if length_sq <= f32::EPSILON {
            return target;
        }
        let inv = 1.0 / length_sq.sqrt();
        let applied = self.smooth.value - previous.t;
        let fraction = (applied * inv).dot(total * inv);
        QuatT::new(Quat::nlerp(previous.q, target.q, fraction), self.smooth.value)
    }
}

/// Field of view before the first recorded sample arrives
pub const DEFAULT_FOV: f32 = 1.0;

/// How far the camera can rise above `position` without entering geometry
pub fn safe_raise_distance(world: &dyn ReplayWorld, position: Vec3, raise_height: f32) -> f32 {
    let request = RaycastRequest { origin: position, direction: Vec3::Z * raise_height, ignore: Vec::new() };
    world.raycast(&request).map_or(raise_height, |hit| hit.distance * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use killcam_recording::world::{
        ActorEvent, EntityDescription, ParticleParams, RayHit, RaycastId, RaycastResult, SpawnParams,
    };
    use killcam_recording::world::ActorSample;
    use killcam_recording::EmitterId;
    use killcam_recording::BulletTimeConfig;
    use crossbeam_channel::Sender;
    use std::collections::BTreeMap;

    use crate::playback::bullet_time::BulletPath;

    /// Open world with a ceiling at `ceiling` when set
    #[derive(Default)]
    struct OpenWorld {
        locations: BTreeMap<EntityId, QuatT>,
        ceiling: Option<f32>,
    }

    impl ReplayWorld for OpenWorld {
        fn recordable_entities(&self) -> Vec<EntityId> {
            Vec::new()
        }
        fn describe_entity(&self, _id: EntityId) -> Option<EntityDescription> {
            None
        }
        fn entity_exists(&self, id: EntityId) -> bool {
            self.locations.contains_key(&id)
        }
        fn spawn_entity(&mut self, _params: &SpawnParams) -> Option<EntityId> {
            None
        }
        fn remove_entity(&mut self, _id: EntityId) {}
        fn world_transform(&self, id: EntityId) -> Option<QuatT> {
            self.locations.get(&id).copied()
        }
        fn set_world_transform(&mut self, id: EntityId, location: QuatT) {
            self.locations.insert(id, location);
        }
        fn is_hidden(&self, _id: EntityId) -> bool {
            false
        }
        fn set_hidden(&mut self, _id: EntityId, _hidden: bool) {}
        fn attach(&mut self, _parent: EntityId, _child: EntityId, _socket: Option<&str>) -> bool {
            true
        }
        fn detach(&mut self, _parent: EntityId, _child: EntityId) {}
        fn actor_sample(&self, _id: EntityId) -> Option<ActorSample> {
            None
        }
        fn apply_actor_event(&mut self, _actor: EntityId, _event: &ActorEvent) -> bool {
            true
        }
        fn create_particle(&mut self, _params: &ParticleParams) -> Option<EmitterId> {
            None
        }
        fn remove_particle(&mut self, _emitter: EmitterId) {}
        fn raycast(&self, request: &RaycastRequest) -> Option<RayHit> {
            let ceiling = self.ceiling?;
            (request.direction.z > 0.0 && request.origin.z < ceiling).then(|| RayHit {
                point: Vec3::new(request.origin.x, request.origin.y, ceiling),
                normal: -Vec3::Z,
                distance: ceiling - request.origin.z,
            })
        }
        fn queue_raycast(&mut self, _id: RaycastId, _request: RaycastRequest, _reply: Sender<RaycastResult>) {}
        fn cancel_raycast(&mut self, _id: RaycastId) {}
    }

    fn fp_sample(flags: FpFlags) -> FpChar {
        FpChar {
            frame_time: 0.0,
            camera: QuatT::new(Quat::from_rotation_z(0.3), Vec3::new(1.0, 2.0, 1.7)),
            relative: QuatT::IDENTITY,
            fov: 1.3,
            flags,
        }
    }

    #[test]
    fn test_follows_recorded_view_and_flag() {
        let world = OpenWorld::default();
        let config = KillCamConfig::default();
        let fp = fp_sample(FpFlags::THIRD_PERSON);
        let mut view = ViewState::new();
        view.follow_fp_flags(fp.flags);
        let params = view.update(&world, &CameraInputs { fp: Some(&fp), dt: 0.016, ..CameraInputs::default() }, &config);
        assert_eq!(params.view, ViewMode::ThirdPerson);
        assert_eq!(params.location, fp.camera);
        assert_eq!(params.fov, 1.3);

        view.follow_fp_flags(FpFlags::ON_GROUND);
        assert_eq!(view.mode(), ViewMode::FirstPerson);
    }

    #[test]
    fn test_projectile_follow_keeps_minimum_distance() {
        let victim = EntityId::new(50);
        let mut world = OpenWorld::default();
        world.locations.insert(victim, QuatT::from_translation(Vec3::new(0.0, 10.0, 0.0)));
        let config = KillCamConfig::default();
        let mut view = ViewState::new();

        let inputs = CameraInputs {
            projectile: Some(Vec3::new(0.0, 8.0, 0.0)),
            projectile_kind: ProjectileKind::Grenade,
            victim: Some(victim),
            dt: 0.016,
            ..CameraInputs::default()
        };
        let params = view.update(&world, &inputs, &config);
        assert_eq!(params.view, ViewMode::ProjectileFollow);
        let camera = &config.camera;
        // 2 m from the victim, pushed back to the minimum distance
        let expected_y = 8.0 - (camera.projectile_minimum_victim_dist - 2.0);
        assert!((params.location.t.y - expected_y).abs() < 1.0e-4);
        assert!((params.location.t.z - camera.projectile_height_offset).abs() < 1.0e-5);
        assert!(view.is_smoothing());

        // projectile exploded: static camera raised by the full ray height
        let gone = CameraInputs { projectile: None, ..inputs };
        let params = view.update(&world, &gone, &config);
        assert_eq!(params.view, ViewMode::Static);
        assert!(!view.is_smoothing());
        assert!(params.location.t.z > camera.projectile_height_offset + 0.9);
    }

    #[test]
    fn test_safe_raise_stops_below_ceiling() {
        let world = OpenWorld { ceiling: Some(0.6), ..OpenWorld::default() };
        assert!((safe_raise_distance(&world, Vec3::ZERO, 1.0) - 0.3).abs() < 1.0e-6);
        let open = OpenWorld::default();
        assert_eq!(safe_raise_distance(&open, Vec3::ZERO, 1.0), 1.0);
    }

    #[test]
    fn test_bullet_camera_rides_the_bullet() {
        let world = OpenWorld::default();
        let config = KillCamConfig::default();
        let path = BulletPath::new(Vec3::ZERO, Quat::IDENTITY, Some(Vec3::new(0.0, 20.0, 0.0)), 2.0, &BulletTimeConfig::default());
        let mut bullet = BulletTime::new(path);
        bullet.position = Vec3::new(0.0, 5.0, 0.0);
        let mut view = ViewState::new();
        view.set_mode(ViewMode::BulletTime);

        let inputs = CameraInputs { bullet: Some(&bullet), clock: 1.9, rel_death: 2.0, dt: 0.016, ..CameraInputs::default() };
        let params = view.update(&world, &inputs, &config);
        let offset = config.bullet_time.cam_offset;
        assert!(params.location.t.approx_eq(Vec3::new(offset.x, 5.0 + offset.y, offset.z), 1.0e-4));
        assert_eq!(params.view, ViewMode::BulletTime);
    }
}
