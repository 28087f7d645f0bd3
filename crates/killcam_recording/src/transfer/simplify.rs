//! Victim path simplification.
//!
//! Interior samples that a lerp between their neighbours reproduces within
//! [`POSITION_TOLERANCE`] are dropped.

use crate::packet::VictimPosition;

/// Largest allowed reconstruction error, in world units
pub const POSITION_TOLERANCE: f32 = 0.1;

/// Samples closer than this to the previously kept one are always dropped
pub const MIN_SAMPLE_SPACING: f32 = 0.01;

/// Drops victim samples that can be linearly reconstructed.
///
/// Keeps the first sample, the last considered sample and the first
/// sample at or after `death_time`.
#[must_use]
pub fn simplify_victim_positions(positions: &[VictimPosition], death_time: f32) -> Vec<VictimPosition> {
    let Some(first) = positions.first() else {
        return Vec::new();
    };
    let mut kept = vec![*first];
    let mut prev_index = 0;
    let last_index = positions.len() - 1;

    for i in 1..positions.len() {
        let prev = positions[prev_index];
        let current = positions[i];
        if current.frame_time - prev.frame_time <= MIN_SAMPLE_SPACING {
            continue;
        }

        let crosses_death = current.frame_time >= death_time && prev.frame_time < death_time;
        let keep = i == last_index || crosses_death || {
            let next = positions[i + 1];
            let span = next.frame_time - prev.frame_time;
            positions[prev_index + 1..=i].iter().any(|skipped| {
                let frac = (skipped.frame_time - prev.frame_time) / span;
                let predicted = killcam_shared::Vec3::lerp(prev.position, next.position, frac);
                predicted.distance_squared(skipped.position) > POSITION_TOLERANCE * POSITION_TOLERANCE
            })
        };

        if keep {
            kept.push(current);
            prev_index = i;
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use killcam_shared::Vec3;

    fn sample(t: f32, x: f32, y: f32) -> VictimPosition {
        VictimPosition { frame_time: t, position: Vec3::new(x, y, 0.0) }
    }

    #[test]
    fn test_straight_line_collapses() {
        let path: Vec<_> = (0..20).map(|i| sample(i as f32 * 0.05, i as f32, 0.0)).collect();
        let simplified = simplify_victim_positions(&path, 100.0);
        assert_eq!(simplified, vec![path[0], path[19]]);
    }

    #[test]
    fn test_corner_is_kept() {
        let mut path: Vec<_> = (0..10).map(|i| sample(i as f32 * 0.05, i as f32, 0.0)).collect();
        path.extend((1..10).map(|i| sample((9 + i) as f32 * 0.05, 9.0, i as f32)));
        let simplified = simplify_victim_positions(&path, 100.0);
        assert!(simplified.contains(&path[9]) || simplified.contains(&path[10]));
        for skipped in &path {
            // every original sample stays within tolerance of the simplified path
            let pair = simplified.windows(2).find(|w| w[0].frame_time <= skipped.frame_time && skipped.frame_time <= w[1].frame_time);
            let pair = pair.unwrap();
            let frac = (skipped.frame_time - pair[0].frame_time) / (pair[1].frame_time - pair[0].frame_time);
            let predicted = Vec3::lerp(pair[0].position, pair[1].position, frac);
            assert!(predicted.distance(skipped.position) <= POSITION_TOLERANCE + 1.0e-4);
        }
    }

    #[test]
    fn test_death_crossing_kept() {
        let path: Vec<_> = (0..20).map(|i| sample(i as f32 * 0.05, i as f32, 0.0)).collect();
        let simplified = simplify_victim_positions(&path, 0.5);
        assert_eq!(simplified.len(), 3);
        assert!(simplified[1].frame_time >= 0.5);
        assert!(simplified[1].frame_time < 0.55);
    }

    #[test]
    fn test_close_samples_dropped() {
        let path = vec![sample(0.0, 0.0, 0.0), sample(0.005, 3.0, 0.0), sample(0.1, 1.0, 0.0)];
        let simplified = simplify_victim_positions(&path, 100.0);
        assert_eq!(simplified, vec![path[0], path[2]]);
    }
}
