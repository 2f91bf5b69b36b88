//! Element types shared with the WGSL shaders. Field order and padding must
//! match the `struct` declarations in `crates/hopf-viewer/shaders/`.

use bytemuck::{Pod, Zeroable};

/// A base point on S². `position.w` is always 1.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SpherePoint {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

impl SpherePoint {
    /// Builds a point from a unit vector, coloring it by its coordinates.
    pub fn from_unit(p: glam::Vec3) -> Self {
        let c = p * 0.5 + glam::Vec3::splat(0.5);
        Self {
            position: [p.x, p.y, p.z, 1.0],
            color: [c.x, c.y, c.z, 1.0],
        }
    }

    pub fn xyz(&self) -> glam::Vec3 {
        glam::Vec3::new(self.position[0], self.position[1], self.position[2])
    }
}

/// Per-fiber draw metadata.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FiberInstance {
    /// Number of samples along the fiber.
    pub draw_count: u32,
    /// Index of the fiber's first sample in the sample buffer.
    pub first_index: u32,
    /// Tube radius multiplier.
    pub line_width: f32,
    pub padding: u32,
}

/// One sample along a fiber.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FiberSample {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

/// Per-sample extrusion frame. `w` components are unused.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TangentFrame {
    pub tangent: [f32; 4],
    pub normal: [f32; 4],
    pub binormal: [f32; 4],
}

/// Lit mesh vertex produced by the surface generator.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 4],
    pub normal: [f32; 4],
    pub color: [f32; 4],
}

/// Tube vertex written by the extrusion stage.
///
/// The normal is a fixed-point accumulator: the normal stage adds integer face
/// normals atomically and the vertex shader normalizes the sum.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TubeVertex {
    pub position: [f32; 4],
    pub normal_accum: [i32; 4],
    pub color: [f32; 4],
}

/// Fixed-point scale of `TubeVertex::normal_accum`.
pub const NORMAL_FIXED_SCALE: f32 = 65536.0;

const _: [(); 32] = [(); core::mem::size_of::<SpherePoint>()];
const _: [(); 16] = [(); core::mem::size_of::<FiberInstance>()];
const _: [(); 32] = [(); core::mem::size_of::<FiberSample>()];
const _: [(); 48] = [(); core::mem::size_of::<TangentFrame>()];
const _: [(); 48] = [(); core::mem::size_of::<Vertex>()];
const _: [(); 48] = [(); core::mem::size_of::<TubeVertex>()];
