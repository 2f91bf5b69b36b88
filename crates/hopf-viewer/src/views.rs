//! Contents of the two viewports: the fiber bundle in R³ and the base
//! points on S².

use crate::camera::Camera;
use crate::camera_updater::{CameraUpdater, CursorCapture};
use crate::gpu::WgpuBackend;
use crate::renderer::pipelines::ScenePipelines;
use crate::sim::Simulation;
use crate::viewport::{Region, Viewport, ViewportContent};
use std::sync::Arc;

/// Swap-chain image and depth target a frame's viewport passes draw into.
pub struct FrameTarget<'f> {
    pub encoder: &'f mut wgpu::CommandEncoder,
    pub color: &'f wgpu::TextureView,
    pub depth: &'f wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl<'f> FrameTarget<'f> {
    /// Opens a pass restricted to `region`. Color is kept and depth cleared,
    /// so viewports never occlude one another. `None` when the region lies
    /// entirely off target.
    pub fn begin_pass(&mut self, label: &str, region: Region) -> Option<wgpu::RenderPass<'_>> {
        let clip = region.clamp_to(self.width, self.height)?;
        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: self.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_viewport(
            clip.x as f32,
            clip.y as f32,
            clip.width as f32,
            clip.height as f32,
            0.0,
            1.0,
        );
        pass.set_scissor_rect(clip.x as u32, clip.y as u32, clip.width, clip.height);
        Some(pass)
    }
}

/// Everything a viewport's content reads while drawing or taking focus.
pub struct ViewContext<'f> {
    pub pipelines: &'f ScenePipelines,
    pub sim: &'f Simulation<WgpuBackend>,
    pub updater: &'f CameraUpdater,
    pub cursor: &'f Arc<dyn CursorCapture>,
    /// Absent outside of frame recording, e.g. while handling focus.
    pub frame: Option<FrameTarget<'f>>,
}

impl ViewContext<'_> {
    /// Hands the updater the viewport's camera and captures the cursor.
    fn take_control(&self, viewport: &Viewport<WgpuBackend>) {
        self.updater.set_data(
            Some(self.cursor.clone()),
            Some(viewport.camera().handle()),
            viewport.center(),
        );
    }
}

/// Fiber tubes and polylines.
pub struct FiberView<'c, 'f>(pub &'c mut ViewContext<'f>);

impl ViewportContent<WgpuBackend> for FiberView<'_, '_> {
    fn render(&mut self, region: Region, camera: &Camera<WgpuBackend>) {
        let ctx = &mut *self.0;
        let (pipelines, sim) = (ctx.pipelines, ctx.sim);
        let Some(frame) = ctx.frame.as_mut() else {
            return;
        };
        let Some(camera_group) = pipelines.camera_group(camera.bind_ubo()) else {
            log::warn!("no bind group for the fiber camera; skipping");
            return;
        };
        let Some(mut pass) = frame.begin_pass("Fiber Pass", region) else {
            return;
        };

        let params = sim.params();
        let fibration = sim.fibration();
        let visible = fibration.visible() as usize;
        if params.draw_mesh {
            pipelines.mesh.draw_tubes(
                &mut pass,
                camera_group,
                &pipelines.scene_model.group,
                fibration.tube(),
                visible,
            );
        }
        if params.draw_lines {
            pipelines
                .lines
                .draw(&mut pass, camera_group, fibration.lines(), visible);
        }
    }

    fn on_focus(&mut self, viewport: &mut Viewport<WgpuBackend>) {
        self.0.take_control(viewport);
    }
}

/// Base points as balls inside a translucent globe.
pub struct SphereView<'c, 'f>(pub &'c mut ViewContext<'f>);

impl ViewportContent<WgpuBackend> for SphereView<'_, '_> {
    fn render(&mut self, region: Region, camera: &Camera<WgpuBackend>) {
        let ctx = &mut *self.0;
        let (pipelines, sim) = (ctx.pipelines, ctx.sim);
        let Some(frame) = ctx.frame.as_mut() else {
            return;
        };
        let Some(camera_group) = pipelines.camera_group(camera.bind_ubo()) else {
            log::warn!("no bind group for the S2 camera; skipping");
            return;
        };
        let Some(mut pass) = frame.begin_pass("S2 Pass", region) else {
            return;
        };

        let points = sim.points();
        if sim.params().draw_points {
            pipelines.spheres.draw(
                &mut pass,
                camera_group,
                &pipelines.ball_model.group,
                points.sphere(),
                points.points(),
                points.count(),
            );
        }
        // Translucent, so after everything opaque.
        pipelines.mesh.draw_surface(
            &mut pass,
            camera_group,
            &pipelines.globe_model.group,
            points.sphere(),
        );
    }

    fn on_focus(&mut self, viewport: &mut Viewport<WgpuBackend>) {
        self.0.take_control(viewport);
    }
}
