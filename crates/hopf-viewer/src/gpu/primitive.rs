use super::{Buffer, BufferRoles, GpuBackend, GpuError, UploadPath, Usage, WgpuBackend};
use bytemuck::Pod;
use hopf_geom::MultiIndex;
use std::marker::PhantomData;
use std::mem::size_of;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeType {
    F32,
    I32,
    U32,
}

impl AttributeType {
    pub fn size(self) -> u64 {
        4
    }
}

/// One `location → (components, type, offset)` binding of a vertex layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    pub ty: AttributeType,
    pub normalized: bool,
    pub offset: u64,
}

impl VertexAttribute {
    fn format(&self) -> Option<wgpu::VertexFormat> {
        use wgpu::VertexFormat as F;
        Some(match (self.ty, self.components) {
            (AttributeType::F32, 1) => F::Float32,
            (AttributeType::F32, 2) => F::Float32x2,
            (AttributeType::F32, 3) => F::Float32x3,
            (AttributeType::F32, 4) => F::Float32x4,
            (AttributeType::I32, 1) => F::Sint32,
            (AttributeType::I32, 2) => F::Sint32x2,
            (AttributeType::I32, 3) => F::Sint32x3,
            (AttributeType::I32, 4) => F::Sint32x4,
            (AttributeType::U32, 1) => F::Uint32,
            (AttributeType::U32, 2) => F::Uint32x2,
            (AttributeType::U32, 3) => F::Uint32x3,
            (AttributeType::U32, 4) => F::Uint32x4,
            _ => return None,
        })
    }
}

/// A vertex buffer of `V`, a `u32` index buffer, the attribute layout of `V`
/// and the ranges to draw.
///
/// Both buffers are also storage buffers, so compute stages can fill them.
/// The stride is `size_of::<V>()` and every attribute must fit inside it.
pub struct IndexedPrimitive<V: Pod, B: GpuBackend> {
    vbo: Buffer<B>,
    ebo: Buffer<B>,
    attributes: Vec<VertexAttribute>,
    wgpu_attributes: Vec<wgpu::VertexAttribute>,
    draw: MultiIndex,
    _vertex: PhantomData<V>,
}

impl<V: Pod, B: GpuBackend> IndexedPrimitive<V, B> {
    pub fn new(label: &str) -> Self {
        Self {
            vbo: Buffer::new(
                format!("{label} vertices"),
                BufferRoles::VERTEX | BufferRoles::STORAGE,
            ),
            ebo: Buffer::new(
                format!("{label} indices"),
                BufferRoles::INDEX | BufferRoles::STORAGE,
            ),
            attributes: Vec::new(),
            wgpu_attributes: Vec::new(),
            draw: MultiIndex::new(),
            _vertex: PhantomData,
        }
    }

    pub fn stride() -> u64 {
        size_of::<V>() as u64
    }

    /// Declares the attribute at `location`, replacing any earlier one there.
    pub fn set_attribute(
        &mut self,
        location: u32,
        components: u32,
        ty: AttributeType,
        normalized: bool,
        offset: u64,
    ) -> Result<(), GpuError> {
        let attr = VertexAttribute {
            location,
            components,
            ty,
            normalized,
            offset,
        };
        let fail = |reason: String| GpuError::Attribute { location, reason };

        if attr.format().is_none() {
            return Err(fail(format!("{components} × {ty:?} is not a vertex format")));
        }
        if normalized {
            return Err(fail("32-bit attributes cannot be normalized".into()));
        }
        let end = offset + components as u64 * ty.size();
        if end > Self::stride() {
            return Err(fail(format!(
                "bytes {offset}..{end} exceed the {} byte stride",
                Self::stride()
            )));
        }

        self.attributes.retain(|a| a.location != location);
        self.attributes.push(attr);
        self.attributes.sort_by_key(|a| a.location);
        self.wgpu_attributes = self
            .attributes
            .iter()
            .filter_map(|a| {
                a.format().map(|format| wgpu::VertexAttribute {
                    format,
                    offset: a.offset,
                    shader_location: a.location,
                })
            })
            .collect();
        Ok(())
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn vertex_layout(&self, step_mode: wgpu::VertexStepMode) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: Self::stride(),
            step_mode,
            attributes: &self.wgpu_attributes,
        }
    }

    pub fn upload_vertices(&mut self, backend: &B, vertices: &[V], usage: Usage) -> UploadPath {
        self.vbo.upload(backend, bytemuck::cast_slice(vertices), usage)
    }

    pub fn upload_indices(&mut self, backend: &B, indices: &[u32], usage: Usage) -> UploadPath {
        self.ebo.upload(backend, bytemuck::cast_slice(indices), usage)
    }

    pub fn reserve_vertices(&mut self, backend: &B, count: u64, usage: Usage) -> UploadPath {
        self.vbo.reserve(backend, count * Self::stride(), usage)
    }

    pub fn reserve_indices(&mut self, backend: &B, count: u64, usage: Usage) -> UploadPath {
        self.ebo.reserve(backend, count * size_of::<u32>() as u64, usage)
    }

    pub fn vertex_count(&self) -> u64 {
        self.vbo.len() / Self::stride()
    }

    pub fn index_count(&self) -> u64 {
        self.ebo.len() / size_of::<u32>() as u64
    }

    pub fn vertices(&self) -> &Buffer<B> {
        &self.vbo
    }

    pub fn indices(&self) -> &Buffer<B> {
        &self.ebo
    }

    pub fn multi_index(&self) -> &MultiIndex {
        &self.draw
    }

    pub fn set_multi_index(&mut self, draw: MultiIndex) {
        self.draw = draw;
    }
}

impl<V: Pod> IndexedPrimitive<V, WgpuBackend> {
    /// Sets the vertex buffer at `slot` and the index buffer on `pass`.
    /// Returns `false` while either buffer is unallocated.
    pub fn bind<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, slot: u32) -> bool {
        let (Some(vbo), Some(ebo)) = (self.vbo.raw(), self.ebo.raw()) else {
            return false;
        };
        pass.set_vertex_buffer(slot, vbo.buffer.slice(..));
        pass.set_index_buffer(ebo.buffer.slice(..), wgpu::IndexFormat::Uint32);
        true
    }

    /// Draws the first `ranges` entries of the multi-draw set.
    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, ranges: usize, instances: std::ops::Range<u32>) {
        if !self.bind(pass, 0) {
            return;
        }
        for range in self.draw.coalesced(ranges) {
            pass.draw_indexed(range, 0, instances.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::RecordingBackend;
    use hopf_geom::{TubeVertex, Vertex};

    #[test]
    fn attributes_are_stride_locked() {
        let mut mesh: IndexedPrimitive<Vertex, RecordingBackend> = IndexedPrimitive::new("mesh");
        mesh.set_attribute(0, 4, AttributeType::F32, false, 0).unwrap();
        mesh.set_attribute(2, 4, AttributeType::F32, false, 32).unwrap();

        let err = mesh.set_attribute(3, 4, AttributeType::F32, false, 40).unwrap_err();
        assert!(matches!(err, GpuError::Attribute { location: 3, .. }));
        assert!(mesh.set_attribute(1, 5, AttributeType::F32, false, 16).is_err());
        assert!(mesh.set_attribute(1, 4, AttributeType::I32, true, 16).is_err());

        let layout = mesh.vertex_layout(wgpu::VertexStepMode::Vertex);
        assert_eq!(layout.array_stride, 48);
        assert_eq!(layout.attributes.len(), 2);
    }

    #[test]
    fn redeclaring_a_location_replaces_it() {
        let mut tube: IndexedPrimitive<TubeVertex, RecordingBackend> = IndexedPrimitive::new("tube");
        tube.set_attribute(1, 4, AttributeType::F32, false, 16).unwrap();
        tube.set_attribute(1, 4, AttributeType::I32, false, 16).unwrap();
        assert_eq!(tube.attributes().len(), 1);
        assert_eq!(tube.attributes()[0].ty, AttributeType::I32);
    }

    #[test]
    fn reservations_resize_buffers_independently() {
        let gpu = RecordingBackend::new();
        let mut tube: IndexedPrimitive<TubeVertex, RecordingBackend> = IndexedPrimitive::new("tube");
        tube.set_attribute(0, 4, AttributeType::F32, false, 0).unwrap();

        tube.reserve_vertices(&gpu, 64, Usage::StreamDraw);
        tube.reserve_indices(&gpu, 384, Usage::StreamDraw);
        let vbo = tube.vertices().id();

        tube.reserve_indices(&gpu, 1000, Usage::StreamDraw);
        assert_eq!(tube.vertices().id(), vbo);
        assert_eq!(tube.vertex_count(), 64);
        assert_eq!(tube.index_count(), 1000);
        assert_eq!(tube.attributes().len(), 1);
    }
}
