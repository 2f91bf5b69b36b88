//! Host reference of the polyline extrusion stages.
//!
//! Mirrors `polyline_tangents.wgsl`, `polyline_frames.wgsl` and
//! `polyline_mesh.wgsl` for closed polylines.

use glam::Vec3;
use std::f32::consts::TAU;

const TRANSPORT_EPS: f32 = 1e-6;

/// Vertex and index counts of the tube mesh for `fibers` closed polylines of
/// `resolution` samples, extruded with `detail` radial segments.
pub fn tube_counts(fibers: u32, resolution: u32, detail: u32) -> (u64, u64) {
    let vertices = fibers as u64 * resolution as u64 * detail as u64;
    (vertices, 6 * vertices)
}

/// Central-difference tangents of a closed polyline.
pub fn tangents(points: &[Vec3]) -> Vec<Vec3> {
    let n = points.len();
    (0..n)
        .map(|j| {
            let d = points[(j + 1) % n] - points[(j + n - 1) % n];
            d.try_normalize().unwrap_or(Vec3::Z)
        })
        .collect()
}

/// Any unit vector perpendicular to `t`.
pub fn any_perpendicular(t: Vec3) -> Vec3 {
    let axis = if t.x.abs() > 0.9 { Vec3::Y } else { Vec3::X };
    t.cross(axis).normalize()
}

fn transport(normal: Vec3, t: Vec3) -> Vec3 {
    let p = normal - normal.dot(t) * t;
    if p.length() < TRANSPORT_EPS {
        return any_perpendicular(t);
    }
    p.normalize()
}

fn rotate_about(v: Vec3, axis: Vec3, angle: f32) -> Vec3 {
    let (s, c) = angle.sin_cos();
    v * c + axis.cross(v) * s + axis * axis.dot(v) * (1.0 - c)
}

/// Parallel-transport frames `(tangent, normal, binormal)` along a closed curve.
///
/// The twist accumulated over one loop is spread evenly along the curve, so
/// the frame at the end matches the frame at the start.
pub fn closed_frames(tangents: &[Vec3]) -> Vec<(Vec3, Vec3, Vec3)> {
    let Some(&t0) = tangents.first() else {
        return Vec::new();
    };

    let n0 = any_perpendicular(t0);
    let mut normal = n0;
    let mut normals = Vec::with_capacity(tangents.len());
    for &t in tangents {
        normal = transport(normal, t);
        normals.push(normal);
    }

    let closing = transport(normal, t0);
    let twist = closing.cross(n0).dot(t0).atan2(closing.dot(n0));
    let count = tangents.len() as f32;

    tangents
        .iter()
        .zip(normals)
        .enumerate()
        .map(|(j, (&t, nrm))| {
            let nrm = rotate_about(nrm, t, twist * j as f32 / count);
            (t, nrm, t.cross(nrm))
        })
        .collect()
}

/// Ring of `detail` points of radius `radius` around `center` in the `(n, b)` plane.
pub fn ring(center: Vec3, normal: Vec3, binormal: Vec3, radius: f32, detail: u32) -> Vec<Vec3> {
    (0..detail)
        .map(|k| {
            let (s, c) = (TAU * k as f32 / detail as f32).sin_cos();
            center + radius * (c * normal + s * binormal)
        })
        .collect()
}

/// Triangle indices of the tube for fiber `first_sample .. first_sample + resolution`.
///
/// Vertex `(sample s, segment k)` is `s * detail + k`; every quad between two
/// rings is split into two triangles, wrapping around both the ring and the loop.
pub fn tube_indices(first_sample: u32, resolution: u32, detail: u32) -> Vec<u32> {
    let mut out = Vec::with_capacity((6 * resolution * detail) as usize);
    for j in 0..resolution {
        let s0 = first_sample + j;
        let s1 = first_sample + (j + 1) % resolution;
        for k in 0..detail {
            let k1 = (k + 1) % detail;
            let (v00, v01) = (s0 * detail + k, s0 * detail + k1);
            let (v10, v11) = (s1 * detail + k, s1 * detail + k1);
            out.extend_from_slice(&[v00, v10, v11, v00, v11, v01]);
        }
    }
    out
}
