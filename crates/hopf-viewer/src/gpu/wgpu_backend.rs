//! `GpuBackend` on top of wgpu.
//!
//! Every dispatch is recorded into its own compute pass and submitted right
//! away. Queue submission order makes a stage's storage writes visible to
//! anything submitted after it, so `memory_barrier` only marks the ordering
//! point in the trace log.

use super::{
    Barriers, BufferDesc, BufferId, BufferRoles, GpuBackend, GpuError, GpuLimits, ProgramDesc, StorageAccess,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};

/// Allocation granularity; keeps every copy and binding aligned.
const ALLOCATION_ALIGN: u64 = 16;

pub struct WgpuBuffer {
    pub id: BufferId,
    pub buffer: wgpu::Buffer,
}

pub struct WgpuProgram {
    name: String,
    pipeline: wgpu::ComputePipeline,
    storage_layout: wgpu::BindGroupLayout,
    uniforms: Option<(wgpu::Buffer, wgpu::BindGroup)>,
}

pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    next_id: AtomicU64,
}

impl WgpuBackend {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

fn buffer_usages(roles: BufferRoles) -> wgpu::BufferUsages {
    let mut usages = wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;
    if roles.contains(BufferRoles::VERTEX) {
        usages |= wgpu::BufferUsages::VERTEX;
    }
    if roles.contains(BufferRoles::INDEX) {
        usages |= wgpu::BufferUsages::INDEX;
    }
    if roles.contains(BufferRoles::STORAGE) {
        usages |= wgpu::BufferUsages::STORAGE;
    }
    if roles.contains(BufferRoles::UNIFORM) {
        usages |= wgpu::BufferUsages::UNIFORM;
    }
    usages
}

impl GpuBackend for WgpuBackend {
    type RawBuffer = WgpuBuffer;
    type RawProgram = WgpuProgram;

    fn limits(&self) -> GpuLimits {
        GpuLimits::from_wgpu(&self.device.limits())
    }

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> WgpuBuffer {
        // wgpu has no residency hints; the usage is only traced.
        log::trace!("allocating '{}' ({} bytes, {:?})", desc.label, desc.size, desc.usage);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: desc.size.next_multiple_of(ALLOCATION_ALIGN),
            usage: buffer_usages(desc.roles),
            mapped_at_creation: false,
        });
        WgpuBuffer {
            id: BufferId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            buffer,
        }
    }

    fn buffer_id(&self, buffer: &WgpuBuffer) -> BufferId {
        buffer.id
    }

    fn write_buffer(&self, buffer: &WgpuBuffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(&buffer.buffer, offset, data);
    }

    fn read_buffer(&self, buffer: &WgpuBuffer, offset: u64, len: u64) -> Result<Vec<u8>, GpuError> {
        let padded = len.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        if padded == 0 {
            return Ok(Vec::new());
        }

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size: padded,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(&buffer.buffer, offset, &staging, 0, padded);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| GpuError::Map(e.to_string()))?
            .map_err(|e| GpuError::Map(e.to_string()))?;

        let bytes = slice.get_mapped_range()[..len as usize].to_vec();
        staging.unmap();
        Ok(bytes)
    }

    fn create_program(&self, desc: &ProgramDesc<'_>) -> Result<WgpuProgram, GpuError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.name),
            source: wgpu::ShaderSource::Wgsl(desc.source.into()),
        });

        let storage_entries: Vec<wgpu::BindGroupLayoutEntry> = desc
            .storage
            .iter()
            .map(|&(slot, access)| wgpu::BindGroupLayoutEntry {
                binding: slot,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage {
                        read_only: access == StorageAccess::Read,
                    },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        let storage_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(desc.name),
                entries: &storage_entries,
            });

        let uniform_layout = (desc.uniform_size > 0).then(|| {
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(desc.name),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(desc.uniform_size),
                        },
                        count: None,
                    }],
                })
        });

        let mut layouts = vec![&storage_layout];
        layouts.extend(uniform_layout.as_ref());

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.name),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(desc.name),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: desc.entry_point,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            });

        let uniforms = uniform_layout.map(|layout| {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(desc.name),
                size: desc.uniform_size.next_multiple_of(ALLOCATION_ALIGN),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(desc.name),
                layout: &layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            (buffer, group)
        });

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            log::error!("program '{}' rejected:\n{}", desc.name, err);
            return Err(GpuError::Compile {
                program: desc.name.to_owned(),
                message: err.to_string(),
            });
        }

        Ok(WgpuProgram {
            name: desc.name.to_owned(),
            pipeline,
            storage_layout,
            uniforms,
        })
    }

    fn dispatch(
        &self,
        program: &WgpuProgram,
        groups: [u32; 3],
        storage: &[(u32, &WgpuBuffer)],
        uniforms: &[u8],
    ) -> Result<(), GpuError> {
        let entries: Vec<wgpu::BindGroupEntry> = storage
            .iter()
            .map(|&(slot, buffer)| wgpu::BindGroupEntry {
                binding: slot,
                resource: buffer.buffer.as_entire_binding(),
            })
            .collect();

        let storage_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.name.as_str()),
            layout: &program.storage_layout,
            entries: &entries,
        });

        if let Some((buffer, _)) = &program.uniforms {
            self.queue.write_buffer(buffer, 0, uniforms);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(program.name.as_str()),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(program.name.as_str()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &storage_group, &[]);
            if let Some((_, group)) = &program.uniforms {
                pass.set_bind_group(1, group, &[]);
            }
            pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn memory_barrier(&self, barriers: Barriers) {
        log::trace!("barrier {:?}", barriers);
    }
}
