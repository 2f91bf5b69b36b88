//! Fiber evaluation and tube extrusion stages.

use super::context::{SimulationContext, SimulationParams};
use super::shaders::{HOPF, MESH_NORMALS, NORMAL_RESET, POLYLINE_FRAMES, POLYLINE_MESH, POLYLINE_TANGENTS};
use crate::gpu::{
    AttributeType, Barriers, Buffer, BufferRoles, GpuBackend, GpuError, IndexedPrimitive, ShaderManager, Usage,
};
use hopf_geom::tube::tube_counts;
use hopf_geom::{fiber_instances, line_list_indices, FiberSample, MultiIndex, TangentFrame, TubeVertex};
use std::mem::size_of;

/// Every fiber and its tube, resident on the device.
///
/// Buffers are sized by [`HopfFibration::update_index_data`] and filled by the
/// compute stages each frame.
pub struct HopfFibration<B: GpuBackend> {
    instances: Buffer<B>,
    /// Fiber samples as vertices, with a closed line list per fiber.
    lines: IndexedPrimitive<FiberSample, B>,
    frames: Buffer<B>,
    tube: IndexedPrimitive<TubeVertex, B>,
    fiber_count: u32,
    resolution: u32,
    detail: u32,
    visible: u32,
}

impl<B: GpuBackend> HopfFibration<B> {
    pub fn new() -> Result<Self, GpuError> {
        let mut lines = IndexedPrimitive::new("Fiber lines");
        lines.set_attribute(0, 4, AttributeType::F32, false, 0)?;
        lines.set_attribute(1, 4, AttributeType::F32, false, 16)?;

        let mut tube = IndexedPrimitive::new("Fiber tubes");
        tube.set_attribute(0, 4, AttributeType::F32, false, 0)?;
        tube.set_attribute(1, 4, AttributeType::I32, false, 16)?;
        tube.set_attribute(2, 4, AttributeType::F32, false, 32)?;

        Ok(Self {
            instances: Buffer::new("Fiber instances", BufferRoles::STORAGE),
            lines,
            frames: Buffer::new("Tangent frames", BufferRoles::STORAGE),
            tube,
            fiber_count: 0,
            resolution: 0,
            detail: 0,
            visible: 0,
        })
    }

    /// Rebuilds the instance table and line indices and sizes every buffer
    /// for the current fiber count, resolution and detail.
    pub fn update_index_data(&mut self, backend: &B, params: &SimulationParams) {
        let (count, res, detail) = (params.fiber_count, params.fiber_resolution, params.line_detail);
        let samples = count as u64 * res as u64;
        let (tube_vertices, tube_indices) = tube_counts(count, res, detail);

        let instances = fiber_instances(count, res, 1.0);
        self.instances
            .upload(backend, bytemuck::cast_slice(&instances), Usage::DynamicDraw);

        self.lines.reserve_vertices(backend, samples, Usage::StreamDraw);
        self.lines
            .upload_indices(backend, &line_list_indices(&instances), Usage::DynamicDraw);
        self.lines.set_multi_index(MultiIndex::uniform(count, 2 * res));

        self.frames.reserve(
            backend,
            samples * size_of::<TangentFrame>() as u64,
            Usage::StreamDraw,
        );

        // Normals accumulate in place, so the vertex buffer must start zeroed.
        let zeroed = vec![TubeVertex::default(); tube_vertices as usize];
        self.tube.upload_vertices(backend, &zeroed, Usage::StreamDraw);
        self.tube.reserve_indices(backend, tube_indices, Usage::StreamDraw);
        self.tube.set_multi_index(MultiIndex::uniform(count, 6 * res * detail));

        self.fiber_count = count;
        self.resolution = res;
        self.detail = detail;
        self.set_visible(params.visible_fibers);

        log::info!(
            "fiber buffers: {} fibers × {} samples, {} tube vertices, {} tube indices",
            count,
            res,
            tube_vertices,
            tube_indices
        );
    }

    pub fn set_visible(&mut self, visible: u32) {
        self.visible = visible.min(self.fiber_count);
    }

    pub fn visible(&self) -> u32 {
        self.visible
    }

    pub fn fiber_count(&self) -> u32 {
        self.fiber_count
    }

    pub fn lines(&self) -> &IndexedPrimitive<FiberSample, B> {
        &self.lines
    }

    pub fn tube(&self) -> &IndexedPrimitive<TubeVertex, B> {
        &self.tube
    }

    pub fn instances(&self) -> &Buffer<B> {
        &self.instances
    }

    pub fn frames(&self) -> &Buffer<B> {
        &self.frames
    }

    /// Evaluates every fiber over its base point and projects it to R³.
    pub fn compute_fibers(
        &self,
        backend: &B,
        shaders: &mut ShaderManager<B>,
        ctx: &SimulationContext,
        points: &Buffer<B>,
    ) -> Result<(), GpuError> {
        let program = shaders.program_mut(HOPF)?;
        program.set_uniform("numFibers", self.fiber_count)?;
        program.set_uniform("tOffset", ctx.t_offset)?;
        program.dispatch_compute(
            backend,
            &[
                (0, points),
                (1, &self.instances),
                (2, self.lines.vertices()),
                (3, self.lines.indices()),
            ],
            [self.fiber_count, self.resolution, 1],
        )?;
        backend.memory_barrier(Barriers::STORAGE | Barriers::VERTEX_ATTRIB | Barriers::ELEMENT_ARRAY);
        Ok(())
    }

    pub fn compute_tangents(&self, backend: &B, shaders: &mut ShaderManager<B>) -> Result<(), GpuError> {
        let program = shaders.program_mut(POLYLINE_TANGENTS)?;
        program.set_uniform("numLines", self.fiber_count)?;
        program.dispatch_compute(
            backend,
            &[(0, self.lines.vertices()), (1, &self.instances), (2, &self.frames)],
            [self.resolution, 1, self.fiber_count],
        )?;
        backend.memory_barrier(Barriers::STORAGE);
        Ok(())
    }

    pub fn compute_frames(&self, backend: &B, shaders: &mut ShaderManager<B>) -> Result<(), GpuError> {
        let program = shaders.program_mut(POLYLINE_FRAMES)?;
        program.set_uniform("numLines", self.fiber_count)?;
        program.dispatch_compute(
            backend,
            &[(0, &self.instances), (1, &self.frames)],
            [1, 1, self.fiber_count],
        )?;
        backend.memory_barrier(Barriers::STORAGE);
        Ok(())
    }

    /// Extrudes every fiber into a tube of `line_detail` segments.
    pub fn generate_mesh(
        &self,
        backend: &B,
        shaders: &mut ShaderManager<B>,
        params: &SimulationParams,
    ) -> Result<(), GpuError> {
        let program = shaders.program_mut(POLYLINE_MESH)?;
        program.set_uniform("numLines", self.fiber_count)?;
        program.set_uniform("lineDetail", self.detail)?;
        program.set_uniform("lineRadius", params.line_radius)?;
        program.dispatch_compute(
            backend,
            &[
                (0, self.lines.vertices()),
                (1, &self.instances),
                (2, &self.frames),
                (3, self.tube.vertices()),
                (4, self.tube.indices()),
            ],
            [self.resolution, self.detail, self.fiber_count],
        )?;
        backend.memory_barrier(Barriers::STORAGE | Barriers::VERTEX_ATTRIB | Barriers::ELEMENT_ARRAY);
        Ok(())
    }

    /// Accumulates face normals into the tube vertices.
    pub fn compute_normals(&self, backend: &B, shaders: &mut ShaderManager<B>) -> Result<(), GpuError> {
        let triangles = (self.tube.index_count() / 3) as u32;
        let program = shaders.program_mut(MESH_NORMALS)?;
        program.set_uniform("triangleCount", triangles)?;
        program.dispatch_compute(
            backend,
            &[(0, self.tube.vertices()), (1, self.tube.indices())],
            [triangles, 1, 1],
        )?;
        backend.memory_barrier(Barriers::STORAGE | Barriers::VERTEX_ATTRIB);
        Ok(())
    }

    /// Zeroes the normal accumulators once the frame has been drawn.
    pub fn reset_normals(&self, backend: &B, shaders: &mut ShaderManager<B>) -> Result<(), GpuError> {
        let vertices = self.tube.vertex_count() as u32;
        let program = shaders.program_mut(NORMAL_RESET)?;
        program.set_uniform("count", vertices)?;
        program.dispatch_compute(backend, &[(0, self.tube.vertices())], [vertices, 1, 1])?;
        backend.memory_barrier(Barriers::STORAGE | Barriers::VERTEX_ATTRIB);
        Ok(())
    }
}
