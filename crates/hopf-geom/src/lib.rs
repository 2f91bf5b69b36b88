//! hopf_geom: GPU-free geometry behind the Hopf fibration viewer.
//!
//! - `hopf`: the fiber parameterisation over a base point of S², the Hopf map
//!   S³ → S² and stereographic projection S³ → R³.
//! - `layout`: `#[repr(C)]` element types shared byte-for-byte with the WGSL
//!   compute and render shaders.
//! - `fiber`: fiber-instance partition of the sample buffer and the
//!   multi-draw index set.
//! - `surface`: mesh generation from a parametric surface with wrap topology.
//! - `curves`: generators for the initial base-point set.
//! - `tube`: CPU reference of the tangent / frame / extrusion stages.
//!
//! Everything here is deterministic and runs on the host, so the GPU stages can
//! be checked against it.

pub mod curves;
pub mod fiber;
pub mod hopf;
pub mod layout;
pub mod surface;
pub mod tube;

pub use fiber::{fiber_instances, line_list_indices, DrawRange, MultiIndex};
pub use hopf::{fiber_point, hopf_map, stereographic};
pub use layout::{FiberInstance, FiberSample, SpherePoint, TangentFrame, TubeVertex, Vertex};
pub use surface::{mesh_from_surface, SurfaceMesh, Topology};
