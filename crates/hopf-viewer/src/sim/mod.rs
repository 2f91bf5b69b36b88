//! The per-frame compute pipeline.
//!
//! `Simulation` owns the program registry, the simulation context and every
//! device buffer of the pipeline. Each frame runs
//! transform → hopf → tangents → frames → mesh → normals, the caller draws,
//! and then [`Simulation::after_render`] clears the normal accumulators.

pub mod context;
pub mod hopf;
pub mod shaders;
pub mod sphere_points;

pub use context::{SimulationContext, SimulationParams};
pub use hopf::HopfFibration;
pub use sphere_points::SpherePointSet;

use crate::gpu::{GpuBackend, GpuError, GpuLimits, ShaderManager};

pub struct Simulation<B: GpuBackend> {
    shaders: ShaderManager<B>,
    ctx: SimulationContext,
    points: SpherePointSet<B>,
    fibration: HopfFibration<B>,
    limits: GpuLimits,
}

impl<B: GpuBackend> Simulation<B> {
    /// Compiles every program and sizes the buffers. Any compile failure is
    /// returned and nothing is built. Fiber counts beyond the device limits
    /// are clamped.
    pub fn new(backend: &B, mut params: SimulationParams, seed: u64) -> Result<Self, GpuError> {
        let limits = backend.limits();
        params.fit_to(&limits);
        let shaders = shaders::load_programs(backend)?;
        let points = SpherePointSet::new(backend, params.base_curve, params.fiber_count)?;
        let mut fibration = HopfFibration::new()?;
        fibration.update_index_data(backend, &params);

        Ok(Self {
            shaders,
            ctx: SimulationContext::new(params, seed),
            points,
            fibration,
            limits,
        })
    }

    pub fn params(&self) -> &SimulationParams {
        &self.ctx.params
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    pub fn points(&self) -> &SpherePointSet<B> {
        &self.points
    }

    pub fn fibration(&self) -> &HopfFibration<B> {
        &self.fibration
    }

    /// Largest fiber count the device holds at the current resolution and
    /// detail.
    pub fn max_fibers(&self) -> u32 {
        self.ctx.params.max_fibers(&self.limits)
    }

    /// Adopts `next`, clamped to the device limits, rebuilding the buffers
    /// when a size-affecting field changed. Returns whether a rebuild
    /// happened.
    pub fn apply_params(&mut self, backend: &B, mut next: SimulationParams) -> bool {
        next.fit_to(&self.limits);
        if next == self.ctx.params {
            return false;
        }
        let rebuild = self.ctx.params.needs_rebuild(&next);
        if rebuild {
            log::info!(
                "rebuilding pipeline: {} fibers, resolution {}, detail {}",
                next.fiber_count,
                next.fiber_resolution,
                next.line_detail
            );
            self.points.reset(backend, next.base_curve, next.fiber_count);
            self.fibration.update_index_data(backend, &next);
        }
        self.fibration.set_visible(next.visible_fibers);
        self.ctx.params = next;
        rebuild
    }

    /// Advances time by `dt` seconds and runs every compute stage.
    pub fn update(&mut self, backend: &B, dt: f32) -> Result<(), GpuError> {
        self.ctx.advance(dt);
        let shaders = &mut self.shaders;

        self.points.transform(backend, shaders, &mut self.ctx)?;
        self.fibration
            .compute_fibers(backend, shaders, &self.ctx, self.points.points())?;
        self.fibration.compute_tangents(backend, shaders)?;
        self.fibration.compute_frames(backend, shaders)?;
        self.fibration.generate_mesh(backend, shaders, &self.ctx.params)?;
        self.fibration.compute_normals(backend, shaders)
    }

    /// Cleanup after the frame's draws were submitted.
    pub fn after_render(&mut self, backend: &B) -> Result<(), GpuError> {
        self.fibration.reset_normals(backend, &mut self.shaders)
    }
}
