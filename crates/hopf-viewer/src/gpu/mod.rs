//! Device abstraction used by the compute pipeline.
//!
//! `GpuBackend` is the seam between the pipeline stages and the device: the
//! production implementation is [`wgpu_backend::WgpuBackend`]; tests run the
//! same stages against a recording backend that checks barrier discipline.

pub mod buffer;
pub mod primitive;
pub mod program;
pub mod wgpu_backend;

#[cfg(test)]
pub mod recording;

pub use buffer::{Buffer, UploadPath};
pub use primitive::{AttributeType, IndexedPrimitive, VertexAttribute};
pub use program::{Program, Reflection, ShaderManager, UniformBlock, UniformType, UniformValue};
pub use wgpu_backend::WgpuBackend;

use std::ops::BitOr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("program '{program}' failed to compile: {message}")]
    Compile { program: String, message: String },

    #[error("no shader source named '{0}'")]
    MissingSource(String),

    #[error("no program named '{0}'")]
    UnknownProgram(String),

    #[error("program '{program}' has no uniform '{name}'")]
    UnknownUniform { program: String, name: String },

    #[error("uniform '{name}' expects {expected:?}, got {got:?}")]
    UniformType {
        name: String,
        expected: UniformType,
        got: UniformType,
    },

    #[error("program '{program}' cannot cover {items:?} items within {max} groups per axis")]
    DispatchTooLarge { program: String, items: [u32; 3], max: u32 },

    #[error("program '{program}' needs storage slot {slot} bound")]
    MissingBinding { program: String, slot: u32 },

    #[error("buffer '{0}' has not been allocated")]
    Unallocated(String),

    #[error("buffer mapping failed: {0}")]
    Map(String),

    #[error("attribute at location {location}: {reason}")]
    Attribute { location: u32, reason: String },
}

/// Stable identity of one device allocation. A reallocation yields a new id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// Pipeline roles a buffer may be bound in. Fixed for the buffer's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferRoles(u32);

impl BufferRoles {
    pub const VERTEX: Self = Self(1);
    pub const INDEX: Self = Self(1 << 1);
    pub const STORAGE: Self = Self(1 << 2);
    pub const UNIFORM: Self = Self(1 << 3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for BufferRoles {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Expected access pattern of a buffer's contents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Usage {
    /// Written once, drawn many times.
    #[default]
    StaticDraw,
    /// Rewritten occasionally.
    DynamicDraw,
    /// Rewritten every frame.
    StreamDraw,
}

/// Memory barrier kinds, combinable with `|`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Barriers(u32);

impl Barriers {
    /// Storage writes visible to later dispatches.
    pub const STORAGE: Self = Self(1);
    /// Storage writes visible to vertex fetch.
    pub const VERTEX_ATTRIB: Self = Self(1 << 1);
    /// Storage writes visible to index fetch.
    pub const ELEMENT_ARRAY: Self = Self(1 << 2);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Barriers {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// How a compute program accesses a storage slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageAccess {
    Read,
    ReadWrite,
}

/// Device limits the pipeline sizes itself against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuLimits {
    pub max_workgroups_per_dimension: u32,
    /// Largest range a single storage binding may cover, in bytes.
    pub max_storage_binding_size: u64,
}

impl GpuLimits {
    pub fn from_wgpu(limits: &wgpu::Limits) -> Self {
        Self {
            max_workgroups_per_dimension: limits.max_compute_workgroups_per_dimension,
            max_storage_binding_size: limits.max_storage_buffer_binding_size as u64,
        }
    }
}

impl Default for GpuLimits {
    fn default() -> Self {
        Self::from_wgpu(&wgpu::Limits::default())
    }
}

pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub size: u64,
    pub roles: BufferRoles,
    pub usage: Usage,
}

pub struct ProgramDesc<'a> {
    pub name: &'a str,
    pub source: &'a str,
    pub entry_point: &'a str,
    /// `(slot, access)` of every storage binding in group 0.
    pub storage: &'a [(u32, StorageAccess)],
    /// Size of the group 1 uniform block; 0 when the program has none.
    pub uniform_size: u64,
}

/// Device operations needed by the buffers and compute stages.
///
/// Dispatches are synchronous from the caller's point of view: once
/// `dispatch` returns, the work is ordered before anything issued later.
/// Visibility of its storage writes is only guaranteed after the matching
/// `memory_barrier`.
pub trait GpuBackend {
    type RawBuffer;
    type RawProgram;

    fn limits(&self) -> GpuLimits;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> Self::RawBuffer;

    fn buffer_id(&self, buffer: &Self::RawBuffer) -> BufferId;

    fn write_buffer(&self, buffer: &Self::RawBuffer, offset: u64, data: &[u8]);

    /// Blocking read-back of `len` bytes at `offset`.
    fn read_buffer(&self, buffer: &Self::RawBuffer, offset: u64, len: u64) -> Result<Vec<u8>, GpuError>;

    fn create_program(&self, desc: &ProgramDesc<'_>) -> Result<Self::RawProgram, GpuError>;

    fn dispatch(
        &self,
        program: &Self::RawProgram,
        groups: [u32; 3],
        storage: &[(u32, &Self::RawBuffer)],
        uniforms: &[u8],
    ) -> Result<(), GpuError>;

    fn memory_barrier(&self, barriers: Barriers);
}
