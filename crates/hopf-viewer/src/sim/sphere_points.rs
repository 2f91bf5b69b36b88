use super::context::SimulationContext;
use super::shaders::SPHERES_TRANSFORM;
use crate::gpu::{
    AttributeType, Barriers, Buffer, BufferRoles, GpuBackend, GpuError, IndexedPrimitive, ShaderManager, Usage,
};
use hopf_geom::curves::BaseCurve;
use hopf_geom::surface::sphere_mesh;
use hopf_geom::{MultiIndex, SpherePoint, Vertex};

/// Tessellation of the shared unit-sphere mesh.
const SPHERE_STACKS: u32 = 24;
const SPHERE_SLICES: u32 = 32;
const GLOBE_COLOR: [f32; 4] = [0.55, 0.6, 0.7, 0.35];

/// Base points on S² and the unit-sphere mesh used to show them.
///
/// The same mesh draws the translucent globe and, instanced over the point
/// buffer, one small ball per point.
pub struct SpherePointSet<B: GpuBackend> {
    points: Buffer<B>,
    count: u32,
    sphere: IndexedPrimitive<Vertex, B>,
}

impl<B: GpuBackend> SpherePointSet<B> {
    pub fn new(backend: &B, curve: BaseCurve, count: u32) -> Result<Self, GpuError> {
        let mut sphere = IndexedPrimitive::new("Unit sphere");
        sphere.set_attribute(0, 4, AttributeType::F32, false, 0)?;
        sphere.set_attribute(1, 4, AttributeType::F32, false, 16)?;
        sphere.set_attribute(2, 4, AttributeType::F32, false, 32)?;

        let mesh = sphere_mesh(SPHERE_STACKS, SPHERE_SLICES, GLOBE_COLOR);
        sphere.upload_vertices(backend, &mesh.vertices, Usage::StaticDraw);
        sphere.upload_indices(backend, &mesh.indices, Usage::StaticDraw);
        sphere.set_multi_index(MultiIndex::uniform(1, mesh.indices.len() as u32));

        let mut set = Self {
            points: Buffer::new("Sphere points", BufferRoles::VERTEX | BufferRoles::STORAGE),
            count: 0,
            sphere,
        };
        set.reset(backend, curve, count);
        Ok(set)
    }

    /// Replaces every point with a fresh sample of `curve`.
    pub fn reset(&mut self, backend: &B, curve: BaseCurve, count: u32) {
        let points = curve.sample(count);
        self.points
            .upload(backend, bytemuck::cast_slice(&points), Usage::StreamDraw);
        self.count = count;
        log::debug!("{} base points on '{}'", count, curve.label());
    }

    /// Precesses and jitters every point in place.
    pub fn transform(
        &self,
        backend: &B,
        shaders: &mut ShaderManager<B>,
        ctx: &mut SimulationContext,
    ) -> Result<(), GpuError> {
        let program = shaders.program_mut(SPHERES_TRANSFORM)?;
        program.set_uniform("count", self.count)?;
        program.set_uniform("rand", ctx.next_rand())?;
        program.set_uniform("animSpeed", ctx.params.anim_speed)?;
        program.set_uniform("tOffset", ctx.t_offset)?;
        program.dispatch_compute(backend, &[(0, &self.points)], [self.count, 1, 1])?;
        backend.memory_barrier(Barriers::STORAGE | Barriers::VERTEX_ATTRIB);
        Ok(())
    }

    pub fn points(&self) -> &Buffer<B> {
        &self.points
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn sphere(&self) -> &IndexedPrimitive<Vertex, B> {
        &self.sphere
    }

    /// Host copy of the points, for diagnostics.
    pub fn read_points(&self, backend: &B) -> Result<Vec<SpherePoint>, GpuError> {
        self.points.read(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::RecordingBackend;
    use crate::sim::context::SimulationParams;
    use crate::sim::shaders::load_programs;

    #[test]
    fn points_start_on_the_curve() {
        let gpu = RecordingBackend::new();
        let set = SpherePointSet::new(&gpu, BaseCurve::Spiral, 16).unwrap();
        let points = set.read_points(&gpu).unwrap();
        assert_eq!(points.len(), 16);
        for (i, p) in points.iter().enumerate() {
            let expected = BaseCurve::Spiral.point(i as u32, 16).normalize();
            assert!(p.xyz().distance(expected) < 1e-5);
            assert_eq!(p.position[3], 1.0);
        }
        assert_eq!(set.sphere().multi_index().len(), 1);
    }

    #[test]
    fn transform_binds_points_and_syncs_them() {
        let gpu = RecordingBackend::new();
        let mut shaders = load_programs(&gpu).unwrap();
        let mut ctx = SimulationContext::new(SimulationParams::default(), 3);
        let set = SpherePointSet::new(&gpu, BaseCurve::GreatCircle, 130).unwrap();
        gpu.clear_commands();

        set.transform(&gpu, &mut shaders, &mut ctx).unwrap();
        assert_eq!(gpu.dispatches(), vec![(SPHERES_TRANSFORM.to_owned(), [3, 1, 1])]);
        assert!(gpu.hazards().is_empty());
        assert_eq!(gpu.unsynced_for_draw(), 0);
    }
}
