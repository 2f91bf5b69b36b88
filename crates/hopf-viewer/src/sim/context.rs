use crate::gpu::GpuLimits;
use hopf_geom::curves::BaseCurve;
use hopf_geom::{FiberSample, TangentFrame, TubeVertex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::mem::size_of;

/// User-tunable simulation parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationParams {
    pub anim_speed: f32,
    pub fiber_count: u32,
    pub fiber_resolution: u32,
    pub line_detail: u32,
    pub line_radius: f32,
    /// Fibers drawn, from the front of the instance list.
    pub visible_fibers: u32,
    pub draw_mesh: bool,
    pub draw_lines: bool,
    pub draw_points: bool,
    pub base_curve: BaseCurve,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            anim_speed: 0.2,
            fiber_count: 100,
            fiber_resolution: 200,
            line_detail: 8,
            line_radius: 0.01,
            visible_fibers: 100,
            draw_mesh: true,
            draw_lines: false,
            draw_points: true,
            base_curve: BaseCurve::GreatCircle,
        }
    }
}

impl SimulationParams {
    /// Whether going from `self` to `next` changes any buffer size.
    pub fn needs_rebuild(&self, next: &Self) -> bool {
        self.fiber_count != next.fiber_count
            || self.fiber_resolution != next.fiber_resolution
            || self.line_detail != next.line_detail
            || self.base_curve != next.base_curve
    }

    /// Bytes one fiber adds to the largest of its device buffers.
    fn bytes_per_fiber(&self) -> u64 {
        let samples = self.fiber_resolution as u64;
        let tube = samples * self.line_detail as u64;
        [
            tube * size_of::<TubeVertex>() as u64,
            tube * 6 * size_of::<u32>() as u64,
            samples * size_of::<TangentFrame>() as u64,
            samples * size_of::<FiberSample>() as u64,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
        .max(1)
    }

    /// Most fibers whose buffers fit one storage binding and whose per-fiber
    /// dispatch axis fits the work group limit, at the current resolution
    /// and detail. Never below one.
    pub fn max_fibers(&self, limits: &GpuLimits) -> u32 {
        let by_storage = limits.max_storage_binding_size / self.bytes_per_fiber();
        let by_groups = limits.max_workgroups_per_dimension as u64;
        by_storage.min(by_groups).clamp(1, u32::MAX as u64) as u32
    }

    /// Clamps the fiber counts to what the device can hold. Returns whether
    /// the fiber count had to be lowered.
    pub fn fit_to(&mut self, limits: &GpuLimits) -> bool {
        let max = self.max_fibers(limits);
        let clamped = self.fiber_count > max;
        if clamped {
            log::warn!(
                "{} fibers at resolution {} and detail {} exceed the device limits; using {}",
                self.fiber_count,
                self.fiber_resolution,
                self.line_detail,
                max
            );
            self.fiber_count = max;
        }
        self.visible_fibers = self.visible_fibers.min(self.fiber_count);
        clamped
    }
}

/// Per-run state handed to the stages that need animation time or noise.
pub struct SimulationContext {
    pub params: SimulationParams,
    rng: StdRng,
    /// Fiber phase, advanced by `anim_speed` per second.
    pub t_offset: f32,
    pub elapsed: f32,
}

impl SimulationContext {
    pub fn new(params: SimulationParams, seed: u64) -> Self {
        Self {
            params,
            rng: StdRng::seed_from_u64(seed),
            t_offset: 0.0,
            elapsed: 0.0,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.elapsed += dt;
        self.t_offset += self.params.anim_speed * dt;
    }

    /// Seed for this frame's jitter.
    pub fn next_rand(&mut self) -> f32 {
        self.rng.gen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = SimulationContext::new(SimulationParams::default(), 7);
        let mut b = SimulationContext::new(SimulationParams::default(), 7);
        let mut c = SimulationContext::new(SimulationParams::default(), 8);
        let xs: Vec<f32> = (0..8).map(|_| a.next_rand()).collect();
        let ys: Vec<f32> = (0..8).map(|_| b.next_rand()).collect();
        let zs: Vec<f32> = (0..8).map(|_| c.next_rand()).collect();
        assert_eq!(xs, ys);
        assert_ne!(xs, zs);
    }

    #[test]
    fn advance_scales_by_anim_speed() {
        let mut ctx = SimulationContext::new(
            SimulationParams {
                anim_speed: 0.5,
                ..Default::default()
            },
            1,
        );
        ctx.advance(2.0);
        ctx.advance(-1.0);
        assert_eq!(ctx.t_offset, 1.0);
        assert_eq!(ctx.elapsed, 2.0);
    }

    #[test]
    fn dense_tubes_are_clamped_to_one_storage_binding() {
        let limits = GpuLimits::default();
        let mut params = SimulationParams {
            fiber_count: 1000,
            fiber_resolution: 1000,
            line_detail: 8,
            visible_fibers: 1000,
            ..Default::default()
        };
        assert!(params.fit_to(&limits));

        // 1000 × 8 tube vertices of 48 bytes per fiber.
        assert_eq!(params.fiber_count, (limits.max_storage_binding_size / 384_000) as u32);
        assert_eq!(params.visible_fibers, params.fiber_count);
        let tube_bytes = params.fiber_count as u64 * 1000 * 8 * size_of::<TubeVertex>() as u64;
        assert!(tube_bytes <= limits.max_storage_binding_size);

        let mut small = SimulationParams::default();
        assert!(!small.fit_to(&limits));
        assert_eq!(small, SimulationParams::default());
    }

    #[test]
    fn fiber_count_respects_the_group_limit() {
        let limits = GpuLimits {
            max_workgroups_per_dimension: 50,
            ..GpuLimits::default()
        };
        let params = SimulationParams {
            fiber_resolution: 3,
            line_detail: 3,
            ..Default::default()
        };
        assert_eq!(params.max_fibers(&limits), 50);
    }

    #[test]
    fn only_size_changes_rebuild() {
        let base = SimulationParams::default();
        let mut next = base.clone();
        next.anim_speed = 3.0;
        next.visible_fibers = 1;
        assert!(!base.needs_rebuild(&next));
        next.line_detail = 4;
        assert!(base.needs_rebuild(&next));
    }
}
