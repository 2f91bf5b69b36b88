//! Base-point sets on S².

use crate::layout::SpherePoint;
use glam::Vec3;
use std::f32::consts::{PI, TAU};

/// Tilt of the great circle out of the equatorial plane.
const GREAT_CIRCLE_TILT: f32 = PI / 6.0;
/// Height of the latitude circle.
const LATITUDE_Z: f32 = 0.5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BaseCurve {
    /// Great circle tilted off the equator; its fibers form a Clifford torus.
    #[default]
    GreatCircle,
    /// Circle of constant latitude.
    Latitude,
    /// Fibonacci spiral spreading the points over the whole sphere.
    Spiral,
}

impl BaseCurve {
    pub const ALL: [BaseCurve; 3] = [Self::GreatCircle, Self::Latitude, Self::Spiral];

    pub fn label(self) -> &'static str {
        match self {
            Self::GreatCircle => "Great circle",
            Self::Latitude => "Latitude circle",
            Self::Spiral => "Fibonacci spiral",
        }
    }

    /// Position of point `i` of `count`.
    pub fn point(self, i: u32, count: u32) -> Vec3 {
        let n = count.max(1) as f32;
        let s = i as f32 / n;
        match self {
            Self::GreatCircle => {
                let (sin_a, cos_a) = GREAT_CIRCLE_TILT.sin_cos();
                let (sin_s, cos_s) = (TAU * s).sin_cos();
                Vec3::new(cos_s, sin_s * cos_a, sin_s * sin_a)
            }
            Self::Latitude => {
                let r = (1.0 - LATITUDE_Z * LATITUDE_Z).sqrt();
                let (sin_s, cos_s) = (TAU * s).sin_cos();
                Vec3::new(r * cos_s, r * sin_s, LATITUDE_Z)
            }
            Self::Spiral => {
                let golden = PI * (3.0 - 5f32.sqrt());
                let z = 1.0 - (2.0 * i as f32 + 1.0) / n;
                let r = (1.0 - z * z).max(0.0).sqrt();
                let (sin_p, cos_p) = (golden * i as f32).sin_cos();
                Vec3::new(r * cos_p, r * sin_p, z)
            }
        }
    }

    pub fn sample(self, count: u32) -> Vec<SpherePoint> {
        (0..count)
            .map(|i| SpherePoint::from_unit(self.point(i, count).normalize()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_curve_lies_on_the_unit_sphere() {
        for curve in BaseCurve::ALL {
            let points = curve.sample(64);
            assert_eq!(points.len(), 64);
            for p in points {
                assert!((p.xyz().length() - 1.0).abs() < 1e-5, "{curve:?}");
                assert_eq!(p.position[3], 1.0);
            }
        }
    }

    #[test]
    fn spiral_spans_both_hemispheres() {
        let points = BaseCurve::Spiral.sample(100);
        assert!(points.iter().any(|p| p.position[2] > 0.9));
        assert!(points.iter().any(|p| p.position[2] < -0.9));
    }
}
