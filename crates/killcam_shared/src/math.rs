//! Mathematical types shared between recorder and playback.
//!
//! These are the canonical representations written into recorded packets.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Below this squared length a vector is treated as zero
const EPSILON_SQ: f32 = 1.0e-12;

/// 3D Vector - position, velocity, direction
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Unit X vector (right)
    pub const X: Self = Self::new(1.0, 0.0, 0.0);

    /// Unit Y vector (forward)
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);

    /// Unit Z vector (up)
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Creates from array
    #[must_use]
    pub const fn from_array(arr: [f32; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Dot product
    #[must_use]
    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product
    #[must_use]
    #[inline]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    #[inline]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length
    #[must_use]
    #[inline]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Distance to another point
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Distance squared (avoids sqrt)
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        (self - other).length_squared()
    }

    /// Distance ignoring the vertical axis
    #[must_use]
    pub fn distance_2d(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero vector
    #[must_use]
    pub fn normalize_or_zero(self) -> Self {
        let len_sq = self.length_squared();
        if len_sq <= EPSILON_SQ {
            Self::ZERO
        } else {
            self * (1.0 / len_sq.sqrt())
        }
    }

    /// Linear interpolation, `t = 0` gives `a`, `t = 1` gives `b`
    #[must_use]
    #[inline]
    pub fn lerp(a: Self, b: Self, t: f32) -> Self {
        a + (b - a) * t
    }

    /// True when every component is within `tolerance` of `other`
    #[must_use]
    pub fn approx_eq(self, other: Self, tolerance: f32) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.z - other.z).abs() <= tolerance
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Quaternion for rotations
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Quat {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
    /// W component
    pub w: f32,
}

impl Quat {
    /// Creates a new quaternion
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Identity rotation
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Rotation of `angle` radians around a unit `axis`
    #[must_use]
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let (s, c) = (angle * 0.5).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    /// Rotation around the up axis
    #[must_use]
    pub fn from_rotation_z(angle: f32) -> Self {
        Self::from_axis_angle(Vec3::Z, angle)
    }

    /// Rotation around the right axis
    #[must_use]
    pub fn from_rotation_x(angle: f32) -> Self {
        Self::from_axis_angle(Vec3::X, angle)
    }

    /// Rotation whose forward (+Y) axis points along `dir`, keeping +Z up.
    ///
    /// A zero direction gives the identity.
    #[must_use]
    pub fn look_rotation(dir: Vec3) -> Self {
        let dir = dir.normalize_or_zero();
        if dir == Vec3::ZERO {
            return Self::IDENTITY;
        }
        let horizontal = (dir.x * dir.x + dir.y * dir.y).sqrt();
        let yaw = (-dir.x).atan2(dir.y);
        let pitch = dir.z.atan2(horizontal);
        Self::from_rotation_z(yaw) * Self::from_rotation_x(pitch)
    }

    /// Four-component dot product
    #[must_use]
    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Quaternion length
    #[must_use]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit quaternion, or identity for a degenerate input
    #[must_use]
    pub fn normalize(self) -> Self {
        let len_sq = self.dot(self);
        if len_sq <= EPSILON_SQ {
            Self::IDENTITY
        } else {
            let inv = 1.0 / len_sq.sqrt();
            Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
        }
    }

    /// Inverse of a unit quaternion
    #[must_use]
    pub const fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Rotates a vector
    #[must_use]
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let uv = u.cross(v);
        let uuv = u.cross(uv);
        v + (uv * self.w + uuv) * 2.0
    }

    /// Local right axis
    #[must_use]
    pub fn column0(self) -> Vec3 {
        self.rotate(Vec3::X)
    }

    /// Local forward axis
    #[must_use]
    pub fn column1(self) -> Vec3 {
        self.rotate(Vec3::Y)
    }

    /// Local up axis
    #[must_use]
    pub fn column2(self) -> Vec3 {
        self.rotate(Vec3::Z)
    }

    /// Angle in radians of the rotation taking `a` to `b`
    #[must_use]
    pub fn angle_between(a: Self, b: Self) -> f32 {
        let d = a.normalize().dot(b.normalize()).abs().min(1.0);
        2.0 * d.acos()
    }

    /// Normalized linear interpolation along the shortest arc
    #[must_use]
    pub fn nlerp(a: Self, b: Self, t: f32) -> Self {
        let b = if a.dot(b) < 0.0 { -b } else { b };
        Self::new(
            a.x + (b.x - a.x) * t,
            a.y + (b.y - a.y) * t,
            a.z + (b.z - a.z) * t,
            a.w + (b.w - a.w) * t,
        )
        .normalize()
    }

    /// Spherical linear interpolation along the shortest arc
    #[must_use]
    pub fn slerp(a: Self, b: Self, t: f32) -> Self {
        let mut cos = a.dot(b);
        let b = if cos < 0.0 {
            cos = -cos;
            -b
        } else {
            b
        };
        // Nearly parallel: nlerp is exact enough and avoids dividing by sin ~ 0
        if cos > 0.9995 {
            return Self::nlerp(a, b, t);
        }
        let theta = cos.acos();
        let sin = theta.sin();
        let wa = ((1.0 - t) * theta).sin() / sin;
        let wb = (t * theta).sin() / sin;
        Self::new(
            a.x * wa + b.x * wb,
            a.y * wa + b.y * wb,
            a.z * wa + b.z * wb,
            a.w * wa + b.w * wb,
        )
        .normalize()
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for Quat {
    type Output = Self;
    fn mul(self, b: Self) -> Self {
        let a = self;
        Self::new(
            a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
            a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
        )
    }
}

impl std::ops::Neg for Quat {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, -self.w)
    }
}

/// Rigid transform - rotation + translation
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct QuatT {
    /// Rotation
    pub q: Quat,
    /// Translation
    pub t: Vec3,
}

impl QuatT {
    /// Creates a new transform
    #[must_use]
    pub const fn new(q: Quat, t: Vec3) -> Self {
        Self { q, t }
    }

    /// Identity transform
    pub const IDENTITY: Self = Self::new(Quat::IDENTITY, Vec3::ZERO);

    /// Pure translation
    #[must_use]
    pub const fn from_translation(t: Vec3) -> Self {
        Self::new(Quat::IDENTITY, t)
    }

    /// Transforms a point from local to parent space
    #[must_use]
    pub fn transform_point(self, p: Vec3) -> Vec3 {
        self.q.rotate(p) + self.t
    }

    /// Inverse transform
    #[must_use]
    pub fn inverse(self) -> Self {
        let q = self.q.conjugate();
        Self::new(q, -q.rotate(self.t))
    }

    /// Translation lerp with rotation nlerp
    #[must_use]
    pub fn nlerp(a: Self, b: Self, t: f32) -> Self {
        Self::new(Quat::nlerp(a.q, b.q, t), Vec3::lerp(a.t, b.t, t))
    }

    /// Translation lerp with rotation slerp
    #[must_use]
    pub fn slerp(a: Self, b: Self, t: f32) -> Self {
        Self::new(Quat::slerp(a.q, b.q, t), Vec3::lerp(a.t, b.t, t))
    }
}

impl std::ops::Mul for QuatT {
    type Output = Self;
    /// `self * rhs` applies `rhs` first
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.q * rhs.q, self.transform_point(rhs.t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f32 = 1.0e-5;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        let sum = a + b;
        assert_eq!(sum, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a.dot(b), 32.0);
        assert_eq!(Vec3::X.cross(Vec3::Y), Vec3::Z);
        assert_eq!(Vec3::lerp(a, b, 0.5), Vec3::new(2.5, 3.5, 4.5));
    }

    #[test]
    fn test_vec3_bytemuck() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(std::mem::size_of::<QuatT>(), 28);
    }

    #[test]
    fn test_distance_2d_ignores_height() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 100.0);
        assert!((a.distance_2d(b) - 5.0).abs() < TOL);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let q = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let v = q.rotate(Vec3::Y);
        assert!(v.approx_eq(Vec3::new(-1.0, 0.0, 0.0), TOL));
    }

    #[test]
    fn test_look_rotation_points_forward_axis() {
        for dir in [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(-0.3, 0.2, -0.9),
        ] {
            let q = Quat::look_rotation(dir);
            assert!(q.column1().approx_eq(dir.normalize_or_zero(), 1.0e-4));
            // up stays in the vertical plane through forward
            assert!(q.column0().z.abs() < 1.0e-4);
        }
    }

    #[test]
    fn test_slerp_and_nlerp_stay_unit_length() {
        let a = Quat::from_rotation_z(0.1);
        let b = Quat::from_axis_angle(Vec3::new(0.6, 0.0, 0.8), 2.5);
        for i in 0..=20 {
            let t = i as f32 / 20.0;
            assert!((Quat::slerp(a, b, t).length() - 1.0).abs() < 1.0e-4);
            assert!((Quat::nlerp(a, b, t).length() - 1.0).abs() < 1.0e-4);
        }
    }

    #[test]
    fn test_slerp_endpoints() {
        let a = Quat::from_rotation_z(0.2);
        let b = Quat::from_rotation_z(1.4);
        let mid = Quat::slerp(a, b, 0.5);
        assert!(Quat::angle_between(mid, Quat::from_rotation_z(0.8)) < 1.0e-3);
        assert!(Quat::angle_between(Quat::slerp(a, b, 1.0), b) < 1.0e-3);
    }

    #[test]
    fn test_quatt_inverse_roundtrip() {
        let tm = QuatT::new(Quat::from_rotation_z(0.7), Vec3::new(1.0, -2.0, 3.0));
        let p = Vec3::new(0.5, 0.25, -4.0);
        let back = tm.inverse().transform_point(tm.transform_point(p));
        assert!(back.approx_eq(p, 1.0e-4));
    }
}
