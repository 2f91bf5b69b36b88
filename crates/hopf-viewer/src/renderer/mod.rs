//! Owns the GPU context, the depth target, the scene pipelines and the egui
//! renderer. Viewport passes are recorded by [`crate::views`].

pub mod context;
pub mod pipelines;
pub mod targets;

use self::{
    context::GfxContext,
    pipelines::{SceneLayouts, ScenePipelines},
    targets::Targets,
};

const BACKGROUND: wgpu::Color = wgpu::Color {
    r: 0.015,
    g: 0.015,
    b: 0.025,
    a: 1.0,
};

pub struct Renderer {
    pub gfx: GfxContext,
    pub targets: Targets,
    pub scene: ScenePipelines,
    pub egui_renderer: egui_wgpu::Renderer,
}

impl Renderer {
    pub fn new(gfx: GfxContext, layouts: &SceneLayouts<'_>) -> Self {
        let targets = Targets::new(&gfx.device, gfx.size);
        let scene = ScenePipelines::new(&gfx.device, gfx.config.format, targets.depth_fmt, layouts);
        let egui_renderer = egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, None, 1);

        Self {
            gfx,
            targets,
            scene,
            egui_renderer,
        }
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
            self.targets.resize(&self.gfx.device, new_size);
        }
    }

    /// Clears the swap-chain image and the depth target.
    pub fn clear(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(BACKGROUND),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }

    /// Uploads and draws one tessellated egui frame on top of `view`.
    pub fn render_ui(&mut self, view: &wgpu::TextureView, ctx: &egui::Context, output: egui::FullOutput) {
        let shapes = ctx.tessellate(output.shapes, output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.gfx.config.width, self.gfx.config.height],
            pixels_per_point: output.pixels_per_point,
        };

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("UI Encoder"),
            });

        for (id, delta) in &output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.gfx.device, &self.gfx.queue, *id, delta);
        }

        let callbacks = self.egui_renderer.update_buffers(
            &self.gfx.device,
            &self.gfx.queue,
            &mut encoder,
            &shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("EGUI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.egui_renderer
                .render(&mut render_pass, &shapes, &screen_descriptor);
        }

        for id in &output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.gfx
            .queue
            .submit(callbacks.into_iter().chain(std::iter::once(encoder.finish())));
    }
}
