use super::{build_pipeline, PipelineDesc};
use crate::gpu::{IndexedPrimitive, WgpuBackend};
use hopf_geom::FiberSample;

const LINES_WGSL: &str = include_str!("../../../shaders/lines.wgsl");

/// Unlit fiber polylines, one closed line list per fiber.
pub struct LinesPipeline {
    pipeline: wgpu::RenderPipeline,
}

impl LinesPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
        camera_layout: &wgpu::BindGroupLayout,
        vertex_layout: wgpu::VertexBufferLayout<'_>,
    ) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Lines WGSL"),
            source: wgpu::ShaderSource::Wgsl(LINES_WGSL.into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lines Pipeline Layout"),
            bind_group_layouts: &[camera_layout],
            push_constant_ranges: &[],
        });
        let pipeline = build_pipeline(
            device,
            &layout,
            PipelineDesc {
                label: "Lines Pipeline",
                module: &module,
                vs_entry: "vs_main",
                buffers: &[vertex_layout],
                topology: wgpu::PrimitiveTopology::LineList,
                blend: None,
                depth_write: true,
            },
            color_fmt,
            depth_fmt,
        );
        Self { pipeline }
    }

    pub fn draw<'a>(
        &'a self,
        pass: &mut wgpu::RenderPass<'a>,
        camera: &'a wgpu::BindGroup,
        lines: &'a IndexedPrimitive<FiberSample, WgpuBackend>,
        fibers: usize,
    ) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, camera, &[]);
        lines.draw(pass, fibers, 0..1);
    }
}
