//! # Frame Bracketing & Interpolation
//!
//! Recorded frames arrive at 20 Hz, the camera renders at whatever the
//! host runs. Between two recorded frames every moving entity is placed
//! on the line between its two samples:
//!
//! ```text
//!  frame k            clock            frame k+1
//!  ───┬─────────────────┼──────────────────┬───
//!     a ─────────────── λ ───────────────► b      λ = (clock - k) / (k+1 - k)
//! ```
//!
//! Frames are found by walking frame markers from the front of the
//! remaining data, so the cost is linear in the size of one frame.

use killcam_shared::{EntityId, QuatT};

use killcam_recording::packet::FpChar;
use killcam_recording::Packet;

/// Index one past the frame starting at `from`
#[must_use]
pub fn frame_end(packets: &[Packet], from: usize) -> usize {
    packets
        .iter()
        .enumerate()
        .skip(from + 1)
        .find(|(_, packet)| packet.frame_marker_time().is_some())
        .map_or(packets.len(), |(index, _)| index)
}

/// Times of the first two frames in `packets`, relative to `origin`
#[must_use]
pub fn frame_times(packets: &[Packet], origin: f32) -> (Option<f32>, Option<f32>) {
    let mut times = packets.iter().filter_map(Packet::frame_marker_time).map(|t| t - origin);
    (times.next(), times.next())
}

/// Interpolation factor of `time` between `lower` and `upper`, clamped to `[0, 1]`
#[must_use]
pub fn lerp_factor(time: f32, lower: f32, upper: f32) -> f32 {
    let span = upper - lower;
    if span <= 0.0 {
        return 1.0;
    }
    ((time - lower) / span).clamp(0.0, 1.0)
}

/// Which clone map a location belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocationSource {
    /// Character sample of an actor
    Actor,
    /// Location of a physical object
    Object,
}

/// One entity's samples in two consecutive frames
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocationPair {
    /// Recorded entity
    pub entity: EntityId,
    /// Sample kind
    pub source: LocationSource,
    /// Sample in the earlier frame
    pub from: QuatT,
    /// Sample in the later frame
    pub to: QuatT,
}

impl LocationPair {
    /// Position lerped and rotation slerped at `t`
    #[must_use]
    pub fn at(&self, t: f32) -> QuatT {
        QuatT::slerp(self.from, self.to, t)
    }
}

fn location_of(packet: &Packet) -> Option<(EntityId, LocationSource, QuatT)> {
    match packet {
        Packet::TpChar(c) => Some((c.entity, LocationSource::Actor, c.location)),
        Packet::EntityLocation(l) => Some((l.entity, LocationSource::Object, l.location)),
        _ => None,
    }
}

/// Pairs every sample in `lower` with the same entity's sample in `upper`.
///
/// Entities without a sample in both frames did not move between them and
/// are left out.
#[must_use]
pub fn bracketing_pairs(lower: &[Packet], upper: &[Packet]) -> Vec<LocationPair> {
    lower
        .iter()
        .filter_map(location_of)
        .filter_map(|(entity, source, from)| {
            upper
                .iter()
                .filter_map(location_of)
                .find(|&(other, other_source, _)| other == entity && other_source == source)
                .map(|(_, _, to)| LocationPair { entity, source, from, to })
        })
        .collect()
}

/// First-person camera at `time`, relative to `origin`.
///
/// Camera and body transforms are nlerped, the field of view lerped, the
/// flags taken from the earlier sample. Before the first sample the first
/// one is returned, after the last sample the last one.
#[must_use]
pub fn fp_camera_at(samples: &[FpChar], origin: f32, time: f32) -> Option<FpChar> {
    let first = samples.first()?;
    let upper = samples.iter().position(|s| s.frame_time - origin > time);
    let (lower, upper) = match upper {
        Some(0) => return Some(*first),
        Some(index) => (&samples[index - 1], &samples[index]),
        None if samples.len() == 1 => return Some(*first),
        None => (&samples[samples.len() - 2], &samples[samples.len() - 1]),
    };
    let t = lerp_factor(time, lower.frame_time - origin, upper.frame_time - origin);
    Some(FpChar {
        frame_time: lower.frame_time + (upper.frame_time - lower.frame_time) * t,
        camera: QuatT::nlerp(lower.camera, upper.camera, t),
        relative: QuatT::nlerp(lower.relative, upper.relative, t),
        fov: lower.fov + (upper.fov - lower.fov) * t,
        flags: lower.flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use killcam_recording::packet::{EntityLocation, FpFlags, TpChar, TpFlags};
    use killcam_shared::{Quat, Vec3};

    fn actor(id: u32, location: QuatT) -> Packet {
        Packet::TpChar(TpChar {
            entity: EntityId::new(id),
            location,
            velocity: Vec3::ZERO,
            flags: TpFlags::ON_GROUND,
            layer_effects: 0,
        })
    }

    fn object(id: u32, x: f32) -> Packet {
        Packet::EntityLocation(EntityLocation {
            entity: EntityId::new(id),
            location: QuatT::from_translation(Vec3::new(x, 0.0, 0.0)),
        })
    }

    fn sample(t: f32, yaw: f32, fov: f32, flags: FpFlags) -> FpChar {
        FpChar {
            frame_time: t,
            camera: QuatT::new(Quat::from_rotation_z(yaw), Vec3::new(t, 0.0, 1.7)),
            relative: QuatT::from_translation(Vec3::new(0.0, 0.0, -1.7)),
            fov,
            flags,
        }
    }

    #[test]
    fn test_frame_walk() {
        let packets = vec![Packet::frame(2.0), object(1, 0.0), object(2, 1.0), Packet::frame(2.05), object(1, 0.5)];
        assert_eq!(frame_end(&packets, 0), 3);
        assert_eq!(frame_end(&packets, 3), 5);
        let (lower, upper) = frame_times(&packets, 2.0);
        assert_eq!(lower, Some(0.0));
        assert!((upper.unwrap_or_default() - 0.05).abs() < 1.0e-6);
        assert_eq!(frame_times(&packets[3..], 2.0).1, None);
    }

    #[test]
    fn test_lerp_factor_clamps() {
        assert_eq!(lerp_factor(0.5, 0.0, 1.0), 0.5);
        assert_eq!(lerp_factor(-1.0, 0.0, 1.0), 0.0);
        assert_eq!(lerp_factor(3.0, 0.0, 1.0), 1.0);
        assert_eq!(lerp_factor(0.0, 1.0, 1.0), 1.0);
    }

    #[test]
    fn test_pairs_match_by_entity_and_kind() {
        let lower = vec![Packet::frame(0.0), object(1, 0.0), object(2, 4.0), actor(1, QuatT::IDENTITY)];
        let upper = vec![Packet::frame(0.05), object(2, 6.0), object(1, 2.0)];
        let pairs = bracketing_pairs(&lower, &upper);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].entity, EntityId::new(1));
        assert_eq!(pairs[0].to.t.x, 2.0);
        assert_eq!(pairs[1].from.t.x, 4.0);
        assert!(pairs.iter().all(|p| p.source == LocationSource::Object));
    }

    #[test]
    fn test_midpoint_and_unit_rotations() {
        let pair = LocationPair {
            entity: EntityId::new(1),
            source: LocationSource::Actor,
            from: QuatT::new(Quat::IDENTITY, Vec3::new(0.0, 0.0, 0.0)),
            to: QuatT::new(Quat::from_rotation_z(1.2), Vec3::new(2.0, -4.0, 1.0)),
        };
        assert!(pair.at(0.5).t.approx_eq(Vec3::new(1.0, -2.0, 0.5), 1.0e-6));
        for step in 0..=10 {
            let q = pair.at(step as f32 / 10.0).q;
            assert!((q.length() - 1.0).abs() < 1.0e-5);
        }
        assert_eq!(pair.at(0.0).t, pair.from.t);
    }

    #[test]
    fn test_fp_camera_brackets_samples() {
        let samples =
            vec![sample(10.0, 0.0, 1.0, FpFlags::ON_GROUND), sample(10.1, 0.4, 1.2, FpFlags::THIRD_PERSON)];
        let mid = fp_camera_at(&samples, 10.0, 0.05).unwrap_or(samples[0]);
        assert!((mid.fov - 1.1).abs() < 1.0e-4);
        assert!((mid.camera.t.x - 10.05).abs() < 1.0e-4);
        assert_eq!(mid.flags, FpFlags::ON_GROUND);

        let before = fp_camera_at(&samples, 10.0, -1.0).unwrap_or(samples[1]);
        assert_eq!(before.frame_time, 10.0);
        let after = fp_camera_at(&samples, 10.0, 5.0).unwrap_or(samples[0]);
        assert!((after.fov - 1.2).abs() < 1.0e-6);
        assert!(fp_camera_at(&[], 0.0, 0.0).is_none());
    }
}
