//! Triangle meshes from parametric surfaces.

use crate::layout::Vertex;
use glam::Vec3;
use rayon::prelude::*;
use std::f32::consts::{PI, TAU};

/// Normals shorter than this are treated as degenerate and zeroed.
const NORMAL_EPS: f32 = 1e-6;

/// How the parameter square is identified along its edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// No identification: a sheet.
    Grid,
    /// The `v` axis is periodic: cylinders, spheres in (latitude, longitude).
    Cylinder,
    /// Both axes are periodic: tori.
    Torus,
}

impl Topology {
    /// Maps the first two Betti numbers of the surface to a wrap rule:
    /// `(0, 0)` sheet, `(1, 0)` one periodic axis, `(2, 1)` both periodic.
    pub fn from_betti(b1: u32, b2: u32) -> Option<Self> {
        match (b1, b2) {
            (0, 0) => Some(Self::Grid),
            (1, 0) => Some(Self::Cylinder),
            (2, 1) => Some(Self::Torus),
            _ => None,
        }
    }

    pub fn wraps_u(self) -> bool {
        matches!(self, Self::Torus)
    }

    pub fn wraps_v(self) -> bool {
        matches!(self, Self::Cylinder | Self::Torus)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SurfaceMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// Parameter value of sample `i` out of `count`.
///
/// Periodic axes stop one step short of 1 so the wrap closes the seam; open
/// axes cover the closed interval.
fn param_at(i: u32, count: u32, wraps: bool) -> f32 {
    if wraps {
        i as f32 / count as f32
    } else if count > 1 {
        i as f32 / (count - 1) as f32
    } else {
        0.0
    }
}

/// Samples `param` on a `u_count × v_count` grid over `[0, 1]²` and triangulates it.
///
/// Vertex `(i, j)` lives at index `i * v_count + j`. A cell whose next row or
/// column falls outside the grid is skipped unless that axis wraps, in which case
/// the index is taken modulo the count. Normals are the cross product of two
/// forward differences and are zeroed when degenerate (poles, creases).
pub fn mesh_from_surface<F>(
    param: F,
    u_count: u32,
    v_count: u32,
    topology: Topology,
    color: [f32; 4],
) -> SurfaceMesh
where
    F: Fn(f32, f32) -> Vec3 + Sync,
{
    if u_count == 0 || v_count == 0 {
        return SurfaceMesh::default();
    }

    let du = 1.0 / u_count.max(2) as f32;
    let dv = 1.0 / v_count.max(2) as f32;
    let (wrap_u, wrap_v) = (topology.wraps_u(), topology.wraps_v());

    let vertices: Vec<Vertex> = (0..u_count * v_count)
        .into_par_iter()
        .map(|k| {
            let (i, j) = (k / v_count, k % v_count);
            let (u, v) = (param_at(i, u_count, wrap_u), param_at(j, v_count, wrap_v));

            let p = param(u, v);
            let n = (param(u + du, v) - p).cross(param(u, v + dv) - p);
            let n = if n.length() < NORMAL_EPS {
                Vec3::ZERO
            } else {
                n.normalize()
            };

            Vertex {
                position: [p.x, p.y, p.z, 1.0],
                normal: [n.x, n.y, n.z, 0.0],
                color,
            }
        })
        .collect();

    let index = |i: u32, j: u32| i * v_count + j;
    let mut indices = Vec::with_capacity((u_count * v_count * 6) as usize);

    for i in 0..u_count {
        let i1 = match (i + 1 < u_count, wrap_u) {
            (true, _) => i + 1,
            (false, true) => 0,
            (false, false) => continue,
        };
        for j in 0..v_count {
            let j1 = match (j + 1 < v_count, wrap_v) {
                (true, _) => j + 1,
                (false, true) => 0,
                (false, false) => continue,
            };
            indices.extend_from_slice(&[
                index(i, j),
                index(i1, j),
                index(i1, j1),
                index(i, j),
                index(i1, j1),
                index(i, j1),
            ]);
        }
    }

    SurfaceMesh { vertices, indices }
}

/// Unit sphere with `u` running pole to pole and `v` around the equator.
pub fn s2(u: f32, v: f32) -> Vec3 {
    let (theta, phi) = (PI * u, TAU * v);
    Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos())
}

/// Closed unit sphere mesh.
pub fn sphere_mesh(u_count: u32, v_count: u32, color: [f32; 4]) -> SurfaceMesh {
    mesh_from_surface(s2, u_count, v_count, Topology::Cylinder, color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn plane(u: f32, v: f32) -> Vec3 {
        Vec3::new(u, v, 0.0)
    }

    fn torus(u: f32, v: f32) -> Vec3 {
        let (a, b) = (TAU * u, TAU * v);
        Vec3::new((2.0 + b.cos()) * a.cos(), (2.0 + b.cos()) * a.sin(), b.sin())
    }

    proptest! {
        #[test]
        fn open_grids_stay_in_range(u in 1u32..24, v in 1u32..24) {
            let mesh = mesh_from_surface(plane, u, v, Topology::Grid, [1.0; 4]);
            prop_assert_eq!(mesh.vertices.len(), (u * v) as usize);
            prop_assert_eq!(mesh.indices.len(), (6 * (u - 1) * (v - 1)) as usize);
            for &idx in &mesh.indices {
                prop_assert!(idx < u * v);
            }
        }
    }

    #[test]
    fn cylinder_wraps_last_column_to_first() {
        let (u, v) = (4, 5);
        let mesh = mesh_from_surface(s2, u, v, Topology::Cylinder, [1.0; 4]);
        assert_eq!(mesh.indices.len(), (6 * (u - 1) * v) as usize);

        // Cell (0, v - 1) closes onto column 0.
        let cell = &mesh.indices[6 * (v as usize - 1)..6 * v as usize];
        assert_eq!(cell, &[4, 9, 5, 4, 5, 0]);
        assert!(mesh.indices.iter().all(|&i| i < u * v));
    }

    #[test]
    fn torus_wraps_both_axes() {
        let (u, v) = (6, 4);
        let mesh = mesh_from_surface(torus, u, v, Topology::Torus, [1.0; 4]);
        assert_eq!(mesh.indices.len(), (6 * u * v) as usize);
        // The last row references row 0.
        let last_row = &mesh.indices[6 * ((u - 1) * v) as usize..];
        assert!(last_row.iter().any(|&i| i < v));
        assert!(mesh.vertices.iter().all(|vx| {
            let n = Vec3::from_slice(&vx.normal[..3]);
            (n.length() - 1.0).abs() < 1e-4
        }));
    }

    #[test]
    fn degenerate_normals_are_zero_not_nan() {
        let mesh = sphere_mesh(8, 8, [1.0; 4]);
        let poles: Vec<_> = mesh.vertices.iter().filter(|vx| vx.position[2].abs() > 0.999).collect();
        assert!(!poles.is_empty());
        for vx in mesh.vertices.iter() {
            assert!(vx.normal.iter().all(|c| c.is_finite()));
        }
        assert!(poles.iter().all(|vx| vx.normal == [0.0; 4]));
    }

    #[test]
    fn betti_numbers_select_topology() {
        assert_eq!(Topology::from_betti(0, 0), Some(Topology::Grid));
        assert_eq!(Topology::from_betti(1, 0), Some(Topology::Cylinder));
        assert_eq!(Topology::from_betti(2, 1), Some(Topology::Torus));
        assert_eq!(Topology::from_betti(3, 3), None);
    }
}
