//! Render pipelines of the two viewports and the bind groups they share.
//!
//! Group 0 is always the camera uniform block, group 1 (where used) the
//! per-draw model block.

pub mod lines;
pub mod mesh;
pub mod spheres;

use self::{lines::LinesPipeline, mesh::MeshPipeline, spheres::SpheresPipeline};
use crate::camera::CameraUniform;
use crate::gpu::{Buffer, BufferId, WgpuBackend};
use glam::{Mat4, Vec3};
use std::collections::HashMap;
use wgpu::util::DeviceExt;

/// Radius of the ball drawn at each base point.
const BALL_SCALE: f32 = 0.04;
/// Where the fiber bundle is anchored in the scene.
const SCENE_ORIGIN: Vec3 = Vec3::ZERO;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniform {
    pub model: [[f32; 4]; 4], // 64 B
    pub scale: f32,           // +4
    pub _pad: [f32; 3],       // +12 -> 80
}

const _: [(); 80] = [(); core::mem::size_of::<ModelUniform>()];

/// Layout of a single uniform buffer at binding 0, visible to both stages.
fn uniform_layout(device: &wgpu::Device, label: &str, size: u64) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(size),
            },
            count: None,
        }],
    })
}

/// A fixed model transform and its bind group.
pub struct ModelSlot {
    _buffer: wgpu::Buffer,
    pub group: wgpu::BindGroup,
}

impl ModelSlot {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &str, model: Mat4, scale: f32) -> Self {
        let uniform = ModelUniform {
            model: model.to_cols_array_2d(),
            scale,
            _pad: [0.0; 3],
        };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { _buffer: buffer, group }
    }
}

/// Shared settings of one render pipeline.
pub(crate) struct PipelineDesc<'a> {
    pub label: &'a str,
    pub module: &'a wgpu::ShaderModule,
    pub vs_entry: &'a str,
    pub buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub topology: wgpu::PrimitiveTopology,
    pub blend: Option<wgpu::BlendState>,
    pub depth_write: bool,
}

pub(crate) fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    desc: PipelineDesc<'_>,
    color_fmt: wgpu::TextureFormat,
    depth_fmt: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: desc.module,
            entry_point: desc.vs_entry,
            buffers: desc.buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: desc.topology,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_fmt,
            depth_write_enabled: desc.depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        fragment: Some(wgpu::FragmentState {
            module: desc.module,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format: color_fmt,
                blend: desc.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

/// Vertex layouts of the primitives drawn by the scene pipelines.
pub struct SceneLayouts<'a> {
    pub sphere: wgpu::VertexBufferLayout<'a>,
    pub tube: wgpu::VertexBufferLayout<'a>,
    pub lines: wgpu::VertexBufferLayout<'a>,
}

pub struct ScenePipelines {
    pub camera_layout: wgpu::BindGroupLayout,
    pub model_layout: wgpu::BindGroupLayout,
    pub mesh: MeshPipeline,
    pub lines: LinesPipeline,
    pub spheres: SpheresPipeline,
    pub scene_model: ModelSlot,
    pub globe_model: ModelSlot,
    pub ball_model: ModelSlot,
    camera_groups: HashMap<BufferId, wgpu::BindGroup>,
}

impl ScenePipelines {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
        layouts: &SceneLayouts<'_>,
    ) -> Self {
        let camera_layout = uniform_layout(
            device,
            "Camera UBO Layout",
            std::mem::size_of::<CameraUniform>() as u64,
        );
        let model_layout = uniform_layout(
            device,
            "Model UBO Layout",
            std::mem::size_of::<ModelUniform>() as u64,
        );

        let mesh = MeshPipeline::new(
            device,
            color_fmt,
            depth_fmt,
            &[&camera_layout, &model_layout],
            layouts.sphere.clone(),
            layouts.tube.clone(),
        );
        let lines = LinesPipeline::new(device, color_fmt, depth_fmt, &camera_layout, layouts.lines.clone());
        let spheres = SpheresPipeline::new(
            device,
            color_fmt,
            depth_fmt,
            &[&camera_layout, &model_layout],
            layouts.sphere.clone(),
        );

        let scene_model = ModelSlot::new(
            device,
            &model_layout,
            "Scene Model",
            Mat4::from_translation(SCENE_ORIGIN),
            1.0,
        );
        let globe_model = ModelSlot::new(device, &model_layout, "Globe Model", Mat4::IDENTITY, 1.0);
        let ball_model = ModelSlot::new(device, &model_layout, "Ball Model", Mat4::IDENTITY, BALL_SCALE);

        Self {
            camera_layout,
            model_layout,
            mesh,
            lines,
            spheres,
            scene_model,
            globe_model,
            ball_model,
            camera_groups: HashMap::new(),
        }
    }

    /// Makes sure a bind group exists for the camera block `ubo`.
    pub fn prepare_camera(&mut self, device: &wgpu::Device, ubo: &Buffer<WgpuBackend>) -> Option<BufferId> {
        let raw = ubo.raw()?;
        let layout = &self.camera_layout;
        self.camera_groups.entry(raw.id).or_insert_with(|| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Camera Bind Group"),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: raw.buffer.as_entire_binding(),
                }],
            })
        });
        Some(raw.id)
    }

    pub fn camera_group(&self, ubo: &Buffer<WgpuBackend>) -> Option<&wgpu::BindGroup> {
        self.camera_groups.get(&ubo.id()?)
    }
}
