//! Lit triangle meshes: the translucent globe and the fiber tubes.

use super::{build_pipeline, PipelineDesc};
use crate::gpu::{IndexedPrimitive, WgpuBackend};
use hopf_geom::{TubeVertex, Vertex};

const MESH_WGSL: &str = include_str!("../../../shaders/mesh.wgsl");

pub struct MeshPipeline {
    /// Alpha blended, no depth writes. Drawn after everything opaque.
    surface: wgpu::RenderPipeline,
    tube: wgpu::RenderPipeline,
}

impl MeshPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
        bind_layouts: &[&wgpu::BindGroupLayout],
        surface_layout: wgpu::VertexBufferLayout<'_>,
        tube_layout: wgpu::VertexBufferLayout<'_>,
    ) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh WGSL"),
            source: wgpu::ShaderSource::Wgsl(MESH_WGSL.into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: bind_layouts,
            push_constant_ranges: &[],
        });

        let surface = build_pipeline(
            device,
            &layout,
            PipelineDesc {
                label: "Surface Pipeline",
                module: &module,
                vs_entry: "vs_main",
                buffers: &[surface_layout],
                topology: wgpu::PrimitiveTopology::TriangleList,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                depth_write: false,
            },
            color_fmt,
            depth_fmt,
        );
        let tube = build_pipeline(
            device,
            &layout,
            PipelineDesc {
                label: "Tube Pipeline",
                module: &module,
                vs_entry: "vs_tube",
                buffers: &[tube_layout],
                topology: wgpu::PrimitiveTopology::TriangleList,
                blend: None,
                depth_write: true,
            },
            color_fmt,
            depth_fmt,
        );

        Self { surface, tube }
    }

    pub fn draw_surface<'a>(
        &'a self,
        pass: &mut wgpu::RenderPass<'a>,
        camera: &'a wgpu::BindGroup,
        model: &'a wgpu::BindGroup,
        mesh: &'a IndexedPrimitive<Vertex, WgpuBackend>,
    ) {
        pass.set_pipeline(&self.surface);
        pass.set_bind_group(0, camera, &[]);
        pass.set_bind_group(1, model, &[]);
        mesh.draw(pass, mesh.multi_index().len(), 0..1);
    }

    /// Draws the tubes of the first `fibers` fibers.
    pub fn draw_tubes<'a>(
        &'a self,
        pass: &mut wgpu::RenderPass<'a>,
        camera: &'a wgpu::BindGroup,
        model: &'a wgpu::BindGroup,
        tube: &'a IndexedPrimitive<TubeVertex, WgpuBackend>,
        fibers: usize,
    ) {
        pass.set_pipeline(&self.tube);
        pass.set_bind_group(0, camera, &[]);
        pass.set_bind_group(1, model, &[]);
        tube.draw(pass, fibers, 0..1);
    }
}
