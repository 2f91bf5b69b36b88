//! The Hopf map and the circles it collapses.
//!
//! A point of S³ ⊂ C² is written `(z1, z2)` and stored as
//! `Vec4(re z1, im z1, re z2, im z2)`. The map to S² is
//! `(x + iy, z) = (2·z1·conj(z2), |z1|² − |z2|²)`.

use glam::{Vec3, Vec4};
use std::f32::consts::TAU;

/// Below this, `1 + z` is treated as the south pole.
const SOUTH_POLE_EPS: f32 = 1e-6;

/// Smallest denominator allowed in the stereographic projection.
pub const PROJECTION_EPS: f32 = 1e-4;

/// Point at angle `t` on the fiber over `base` (a unit vector on S²).
///
/// The result is a unit quaternion-like vector whose Hopf image is `base`.
/// The fiber over the south pole `(0, 0, -1)` is `z1 = 0`.
pub fn fiber_point(base: Vec3, t: f32) -> Vec4 {
    let a = 1.0 + base.z;
    let (sin_t, cos_t) = t.sin_cos();

    if a < SOUTH_POLE_EPS {
        return Vec4::new(0.0, 0.0, cos_t, sin_t);
    }

    let s = 1.0 / (2.0 * a).sqrt();
    s * Vec4::new(
        a * cos_t,
        a * sin_t,
        base.x * cos_t + base.y * sin_t,
        base.x * sin_t - base.y * cos_t,
    )
}

/// Hopf map S³ → S².
pub fn hopf_map(q: Vec4) -> Vec3 {
    // 2 z1 conj(z2)
    let re = 2.0 * (q.x * q.z + q.y * q.w);
    let im = 2.0 * (q.y * q.z - q.x * q.w);
    let z = q.x * q.x + q.y * q.y - q.z * q.z - q.w * q.w;
    Vec3::new(re, im, z)
}

/// Stereographic projection from `(0, 0, 0, 1)` onto R³.
///
/// Points at the projection pole are pushed to a large but finite distance.
pub fn stereographic(q: Vec4) -> Vec3 {
    let denom = (1.0 - q.w).max(PROJECTION_EPS);
    q.truncate() / denom
}

/// Samples the projected fiber over `base` at `resolution` evenly spaced angles,
/// shifted by `t_offset`.
pub fn fiber_polyline(base: Vec3, resolution: u32, t_offset: f32) -> Vec<Vec3> {
    (0..resolution)
        .map(|j| {
            let t = TAU * j as f32 / resolution as f32 + t_offset;
            stereographic(fiber_point(base, t))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn on_sphere(theta: f32, phi: f32) -> Vec3 {
        Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos())
    }

    proptest! {
        #[test]
        fn fiber_points_map_back_to_their_base(
            theta in 0.0f32..3.0,
            phi in 0.0f32..TAU,
            t in 0.0f32..TAU,
        ) {
            let base = on_sphere(theta, phi);
            let q = fiber_point(base, t);
            prop_assert!((q.length() - 1.0).abs() < 1e-4);
            prop_assert!(hopf_map(q).distance(base) < 1e-3);
        }
    }

    #[test]
    fn south_pole_fiber_is_well_defined() {
        let base = Vec3::new(0.0, 0.0, -1.0);
        for j in 0..16 {
            let q = fiber_point(base, j as f32 * 0.4);
            assert!(q.is_finite());
            assert!(hopf_map(q).distance(base) < 1e-5);
        }
    }

    #[test]
    fn projection_stays_finite_at_the_pole() {
        let p = stereographic(Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert!(p.is_finite());
        assert_eq!(stereographic(Vec4::new(1.0, 0.0, 0.0, 0.0)), Vec3::X);
    }

    #[test]
    fn polyline_has_requested_resolution() {
        let line = fiber_polyline(Vec3::X, 32, 0.0);
        assert_eq!(line.len(), 32);
        assert!(line.iter().all(|p| p.is_finite()));
    }
}
