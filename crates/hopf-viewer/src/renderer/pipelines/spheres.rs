//! One small ball per base point, instanced over the point buffer.

use super::{build_pipeline, PipelineDesc};
use crate::gpu::{Buffer, IndexedPrimitive, WgpuBackend};
use hopf_geom::{SpherePoint, Vertex};

const SPHERES_WGSL: &str = include_str!("../../../shaders/spheres.wgsl");

const INSTANCE_ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![3 => Float32x4, 4 => Float32x4];

pub struct SpheresPipeline {
    pipeline: wgpu::RenderPipeline,
}

impl SpheresPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
        bind_layouts: &[&wgpu::BindGroupLayout],
        mesh_layout: wgpu::VertexBufferLayout<'_>,
    ) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Spheres WGSL"),
            source: wgpu::ShaderSource::Wgsl(SPHERES_WGSL.into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Spheres Pipeline Layout"),
            bind_group_layouts: bind_layouts,
            push_constant_ranges: &[],
        });
        let instances = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SpherePoint>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &INSTANCE_ATTRS,
        };
        let pipeline = build_pipeline(
            device,
            &layout,
            PipelineDesc {
                label: "Spheres Pipeline",
                module: &module,
                vs_entry: "vs_main",
                buffers: &[mesh_layout, instances],
                topology: wgpu::PrimitiveTopology::TriangleList,
                blend: None,
                depth_write: true,
            },
            color_fmt,
            depth_fmt,
        );
        Self { pipeline }
    }

    /// Draws `count` copies of `mesh`, centred on the entries of `points`.
    pub fn draw<'a>(
        &'a self,
        pass: &mut wgpu::RenderPass<'a>,
        camera: &'a wgpu::BindGroup,
        model: &'a wgpu::BindGroup,
        mesh: &'a IndexedPrimitive<Vertex, WgpuBackend>,
        points: &'a Buffer<WgpuBackend>,
        count: u32,
    ) {
        let Some(raw) = points.raw() else {
            return;
        };
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, camera, &[]);
        pass.set_bind_group(1, model, &[]);
        pass.set_vertex_buffer(1, raw.buffer.slice(..));
        mesh.draw(pass, mesh.multi_index().len(), 0..count);
    }
}
