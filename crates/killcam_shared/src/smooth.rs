//! Critically damped smoothing for camera motion.

use crate::math::Vec3;

/// Smoothed value plus its running velocity
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SmoothState {
    /// Current smoothed value
    pub value: Vec3,
    /// Current rate of change
    pub velocity: Vec3,
}

impl SmoothState {
    /// State at rest on `value`
    #[must_use]
    pub const fn at(value: Vec3) -> Self {
        Self { value, velocity: Vec3::ZERO }
    }
}

/// Moves `state` towards `target` without overshoot.
///
/// `smooth_time` is roughly the time to reach the target. A non-positive
/// smooth time snaps straight onto the target.
pub fn smooth_cd(state: &mut SmoothState, dt: f32, target: Vec3, smooth_time: f32) {
    if smooth_time <= 0.0 {
        state.value = target;
        state.velocity = Vec3::ZERO;
        return;
    }
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);
    let change = state.value - target;
    let temp = (state.velocity + change * omega) * dt;
    state.velocity = (state.velocity - temp * omega) * exp;
    state.value = target + (change + temp) * exp;
}
