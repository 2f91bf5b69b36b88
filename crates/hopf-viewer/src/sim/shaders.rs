//! Compute program registry for the fiber pipeline.

use crate::gpu::{GpuBackend, GpuError, ShaderManager};

pub const SPHERES_TRANSFORM: &str = "spheres_transform";
pub const HOPF: &str = "hopf";
pub const POLYLINE_TANGENTS: &str = "polyline_tangents";
pub const POLYLINE_FRAMES: &str = "polyline_frames";
pub const POLYLINE_MESH: &str = "polyline_mesh";
pub const MESH_NORMALS: &str = "mesh_normals";
pub const NORMAL_RESET: &str = "normal_reset";

const TYPES: &str = "hopf_types.wgsl";

const SOURCES: [(&str, &str); 8] = [
    (TYPES, include_str!("../../shaders/hopf_types.wgsl")),
    ("spheres_transform.wgsl", include_str!("../../shaders/spheres_transform.wgsl")),
    ("hopf.wgsl", include_str!("../../shaders/hopf.wgsl")),
    ("polyline_tangents.wgsl", include_str!("../../shaders/polyline_tangents.wgsl")),
    ("polyline_frames.wgsl", include_str!("../../shaders/polyline_frames.wgsl")),
    ("polyline_mesh.wgsl", include_str!("../../shaders/polyline_mesh.wgsl")),
    ("mesh_normals.wgsl", include_str!("../../shaders/mesh_normals.wgsl")),
    ("normal_reset.wgsl", include_str!("../../shaders/normal_reset.wgsl")),
];

/// Program name and its stage source. Every program is compiled after the
/// shared type definitions.
const PROGRAMS: [(&str, &str); 7] = [
    (SPHERES_TRANSFORM, "spheres_transform.wgsl"),
    (HOPF, "hopf.wgsl"),
    (POLYLINE_TANGENTS, "polyline_tangents.wgsl"),
    (POLYLINE_FRAMES, "polyline_frames.wgsl"),
    (POLYLINE_MESH, "polyline_mesh.wgsl"),
    (MESH_NORMALS, "mesh_normals.wgsl"),
    (NORMAL_RESET, "normal_reset.wgsl"),
];

/// Compiles every pipeline program. The first failure aborts.
pub fn load_programs<B: GpuBackend>(backend: &B) -> Result<ShaderManager<B>, GpuError> {
    let mut shaders = ShaderManager::new();
    for (file, source) in SOURCES {
        shaders.add_source(file, source);
    }
    for (name, file) in PROGRAMS {
        shaders.add_program(backend, name, &[TYPES, file])?;
    }
    Ok(shaders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::RecordingBackend;
    use crate::gpu::StorageAccess::{Read, ReadWrite};

    #[test]
    fn every_program_reflects_its_slots() {
        let gpu = RecordingBackend::new();
        let shaders = load_programs(&gpu).unwrap();

        let slots = |name| shaders.program(name).unwrap().storage_slots().to_vec();
        assert_eq!(slots(SPHERES_TRANSFORM), vec![(0, ReadWrite)]);
        assert_eq!(
            slots(HOPF),
            vec![(0, Read), (1, Read), (2, ReadWrite), (3, ReadWrite)]
        );
        assert_eq!(slots(POLYLINE_TANGENTS), vec![(0, Read), (1, Read), (2, ReadWrite)]);
        assert_eq!(slots(POLYLINE_FRAMES), vec![(0, Read), (1, ReadWrite)]);
        assert_eq!(
            slots(POLYLINE_MESH),
            vec![(0, Read), (1, Read), (2, Read), (3, ReadWrite), (4, ReadWrite)]
        );
        assert_eq!(slots(MESH_NORMALS), vec![(0, ReadWrite), (1, Read)]);
        assert_eq!(slots(NORMAL_RESET), vec![(0, ReadWrite)]);

        assert_eq!(shaders.program(HOPF).unwrap().local_size(), [4, 32, 1]);
        assert_eq!(shaders.program(POLYLINE_FRAMES).unwrap().local_size(), [1, 1, 32]);
    }

    #[test]
    fn uniform_blocks_match_the_stage_params() {
        let gpu = RecordingBackend::new();
        let shaders = load_programs(&gpu).unwrap();
        let offset = |name, field| shaders.program(name).unwrap().uniforms().offset_of(field);

        assert_eq!(offset(SPHERES_TRANSFORM, "tOffset"), Some(12));
        assert_eq!(offset(HOPF, "tOffset"), Some(4));
        assert_eq!(offset(POLYLINE_MESH, "lineRadius"), Some(8));
        assert_eq!(offset(MESH_NORMALS, "triangleCount"), Some(0));
        assert_eq!(shaders.program(SPHERES_TRANSFORM).unwrap().uniforms().bytes().len(), 16);
    }

    #[test]
    fn a_compile_failure_stops_loading() {
        let gpu = RecordingBackend::failing_program(POLYLINE_MESH);
        let err = load_programs(&gpu).err().unwrap();
        assert!(matches!(err, GpuError::Compile { program, .. } if program == POLYLINE_MESH));
    }
}
