//! Named compute programs and their uniform blocks.

use super::{Buffer, GpuBackend, GpuError, ProgramDesc, StorageAccess};
use glam::{Mat4, Vec2, Vec3, Vec4};
use std::collections::HashMap;
use wgpu::naga;

const ENTRY_POINT: &str = "main";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformType {
    F32,
    U32,
    I32,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformType {
    fn from_naga(inner: &naga::TypeInner) -> Option<Self> {
        use naga::{ScalarKind, TypeInner, VectorSize};

        match *inner {
            TypeInner::Scalar(naga::Scalar { kind, width: 4 }) => match kind {
                ScalarKind::Float => Some(Self::F32),
                ScalarKind::Uint => Some(Self::U32),
                ScalarKind::Sint => Some(Self::I32),
                _ => None,
            },
            TypeInner::Vector {
                size,
                scalar: naga::Scalar::F32,
            } => Some(match size {
                VectorSize::Bi => Self::Vec2,
                VectorSize::Tri => Self::Vec3,
                VectorSize::Quad => Self::Vec4,
            }),
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                scalar: naga::Scalar::F32,
            } => Some(Self::Mat4),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    F32(f32),
    U32(u32),
    I32(i32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn ty(&self) -> UniformType {
        match self {
            Self::F32(_) => UniformType::F32,
            Self::U32(_) => UniformType::U32,
            Self::I32(_) => UniformType::I32,
            Self::Vec2(_) => UniformType::Vec2,
            Self::Vec3(_) => UniformType::Vec3,
            Self::Vec4(_) => UniformType::Vec4,
            Self::Mat4(_) => UniformType::Mat4,
        }
    }

    fn write(&self, out: &mut [u8]) {
        let bytes: &[u8] = match self {
            Self::F32(v) => bytemuck::bytes_of(v),
            Self::U32(v) => bytemuck::bytes_of(v),
            Self::I32(v) => bytemuck::bytes_of(v),
            Self::Vec2(v) => bytemuck::bytes_of(v),
            Self::Vec3(v) => bytemuck::bytes_of(v),
            Self::Vec4(v) => bytemuck::bytes_of(v),
            Self::Mat4(v) => bytemuck::bytes_of(v),
        };
        out[..bytes.len()].copy_from_slice(bytes);
    }
}

macro_rules! uniform_from {
    ($($t:ty => $v:ident),* $(,)?) => {
        $(impl From<$t> for UniformValue {
            fn from(value: $t) -> Self {
                Self::$v(value)
            }
        })*
    };
}

uniform_from!(f32 => F32, u32 => U32, i32 => I32, Vec2 => Vec2, Vec3 => Vec3, Vec4 => Vec4, Mat4 => Mat4);

/// Host copy of a program's uniform struct, at the offsets the shader
/// compiler assigned.
#[derive(Clone, Debug, Default)]
pub struct UniformBlock {
    fields: HashMap<String, (u64, UniformType)>,
    bytes: Vec<u8>,
}

impl UniformBlock {
    fn from_struct(module: &naga::Module, ty: naga::Handle<naga::Type>) -> Result<Self, String> {
        let naga::TypeInner::Struct { members, span } = &module.types[ty].inner else {
            return Err("the group 1 uniform is not a struct".into());
        };
        let mut fields = HashMap::with_capacity(members.len());
        for member in members {
            let name = member.name.clone().unwrap_or_default();
            let ty = UniformType::from_naga(&module.types[member.ty].inner)
                .ok_or_else(|| format!("uniform member '{name}' has an unsupported type"))?;
            fields.insert(name, (member.offset as u64, ty));
        }
        Ok(Self {
            fields,
            bytes: vec![0; *span as usize],
        })
    }

    pub fn offset_of(&self, name: &str) -> Option<u64> {
        self.fields.get(name).map(|(offset, _)| *offset)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Interface of a compute entry point, as declared in its WGSL.
#[derive(Clone, Debug)]
pub struct Reflection {
    pub local_size: [u32; 3],
    /// `(binding, access)` of every storage variable in group 0, by binding.
    pub storage: Vec<(u32, StorageAccess)>,
    /// Fields of the group 1 uniform struct; empty when there is none.
    pub uniforms: UniformBlock,
    /// The entry point reads `num_workgroups`, so a 1-D dispatch may be
    /// folded into rows.
    pub folds: bool,
}

impl Reflection {
    /// Parses and validates `source`, then reads the interface of
    /// `entry_point`. Parse and validation errors become `GpuError::Compile`.
    pub fn from_wgsl(program: &str, source: &str, entry_point: &str) -> Result<Self, GpuError> {
        let compile = |message: String| GpuError::Compile {
            program: program.to_owned(),
            message,
        };

        let module = naga::front::wgsl::parse_str(source).map_err(|e| compile(e.emit_to_string(source)))?;
        naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::empty())
            .validate(&module)
            .map_err(|e| compile(e.emit_to_string(source)))?;

        let entry = module
            .entry_points
            .iter()
            .find(|ep| ep.name == entry_point && ep.stage == naga::ShaderStage::Compute)
            .ok_or_else(|| compile(format!("no compute entry point '{entry_point}'")))?;
        let folds = entry.function.arguments.iter().any(|arg| {
            matches!(
                arg.binding,
                Some(naga::Binding::BuiltIn(naga::BuiltIn::NumWorkGroups))
            )
        });

        let mut storage = Vec::new();
        let mut uniforms = UniformBlock::default();
        for (_, var) in module.global_variables.iter() {
            let Some(binding) = &var.binding else {
                continue;
            };
            match var.space {
                naga::AddressSpace::Storage { access } if binding.group == 0 => {
                    let access = if access.contains(naga::StorageAccess::STORE) {
                        StorageAccess::ReadWrite
                    } else {
                        StorageAccess::Read
                    };
                    storage.push((binding.binding, access));
                }
                naga::AddressSpace::Uniform if binding.group == 1 => {
                    uniforms = UniformBlock::from_struct(&module, var.ty).map_err(compile)?;
                }
                _ => {}
            }
        }
        storage.sort_by_key(|(slot, _)| *slot);

        Ok(Self {
            local_size: entry.workgroup_size,
            storage,
            uniforms,
            folds,
        })
    }
}

/// A compiled compute program.
pub struct Program<B: GpuBackend> {
    name: String,
    raw: B::RawProgram,
    local_size: [u32; 3],
    storage: Vec<(u32, StorageAccess)>,
    uniforms: UniformBlock,
    folds: bool,
    max_groups: u32,
}

impl<B: GpuBackend> Program<B> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_size(&self) -> [u32; 3] {
        self.local_size
    }

    pub fn storage_slots(&self) -> &[(u32, StorageAccess)] {
        &self.storage
    }

    pub fn uniforms(&self) -> &UniformBlock {
        &self.uniforms
    }

    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> Result<(), GpuError> {
        let value = value.into();
        let &(offset, ty) = self
            .uniforms
            .fields
            .get(name)
            .ok_or_else(|| GpuError::UnknownUniform {
                program: self.name.clone(),
                name: name.to_owned(),
            })?;
        if ty != value.ty() {
            return Err(GpuError::UniformType {
                name: name.to_owned(),
                expected: ty,
                got: value.ty(),
            });
        }
        value.write(&mut self.uniforms.bytes[offset as usize..]);
        Ok(())
    }

    /// Work groups needed to cover `items` invocations per axis.
    ///
    /// A 1-D count over the device's per-axis limit is folded into rows of
    /// the maximum width when the program rebuilds its linear index from
    /// `num_workgroups`; otherwise it is an error.
    pub fn group_counts(&self, items: [u32; 3]) -> Result<[u32; 3], GpuError> {
        let max = self.max_groups;
        let mut groups = [0, 1, 2].map(|axis| items[axis].div_ceil(self.local_size[axis]));
        if self.folds && groups[0] > max && groups[1] == 1 && groups[2] == 1 {
            groups = [max, groups[0].div_ceil(max), 1];
        }
        if groups.iter().any(|&g| g > max) {
            return Err(GpuError::DispatchTooLarge {
                program: self.name.clone(),
                items,
                max,
            });
        }
        Ok(groups)
    }

    /// Dispatches enough groups to cover `items` invocations per axis.
    ///
    /// Every declared storage slot must be bound. A zero item count on any
    /// axis is a no-op.
    pub fn dispatch_compute(
        &self,
        backend: &B,
        bindings: &[(u32, &Buffer<B>)],
        items: [u32; 3],
    ) -> Result<[u32; 3], GpuError> {
        let mut raw = Vec::with_capacity(bindings.len());
        for &(slot, _) in &self.storage {
            let buffer = bindings
                .iter()
                .find(|(s, _)| *s == slot)
                .map(|(_, b)| *b)
                .ok_or_else(|| GpuError::MissingBinding {
                    program: self.name.clone(),
                    slot,
                })?;
            raw.push((slot, buffer.try_raw()?));
        }

        let groups = self.group_counts(items)?;
        if groups.contains(&0) {
            log::trace!("{}: nothing to dispatch for {:?}", self.name, items);
            return Ok(groups);
        }

        log::trace!("{}: dispatch {:?} groups for {:?} items", self.name, groups, items);
        backend.dispatch(&self.raw, groups, &raw, self.uniforms.bytes())?;
        Ok(groups)
    }
}

/// Owns the WGSL sources and every compiled program, by name.
pub struct ShaderManager<B: GpuBackend> {
    sources: HashMap<&'static str, &'static str>,
    programs: HashMap<String, Program<B>>,
}

impl<B: GpuBackend> Default for ShaderManager<B> {
    fn default() -> Self {
        Self {
            sources: HashMap::new(),
            programs: HashMap::new(),
        }
    }
}

impl<B: GpuBackend> ShaderManager<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, file: &'static str, source: &'static str) {
        self.sources.insert(file, source);
    }

    /// Compiles `files`, concatenated in order, as program `name`. Local
    /// size, storage slots and uniform fields are reflected from the source.
    pub fn add_program(&mut self, backend: &B, name: &str, files: &[&str]) -> Result<(), GpuError> {
        let mut source = String::new();
        for file in files {
            let text = self
                .sources
                .get(file)
                .ok_or_else(|| GpuError::MissingSource((*file).to_owned()))?;
            source.push_str(text);
            source.push('\n');
        }

        let Reflection {
            local_size,
            storage,
            uniforms,
            folds,
        } = Reflection::from_wgsl(name, &source, ENTRY_POINT)?;

        let raw = backend.create_program(&ProgramDesc {
            name,
            source: &source,
            entry_point: ENTRY_POINT,
            storage: &storage,
            uniform_size: uniforms.bytes().len() as u64,
        })?;

        log::info!(
            "compiled program '{}' (local size {:?}, {} storage slots, {} uniform bytes)",
            name,
            local_size,
            storage.len(),
            uniforms.bytes().len()
        );
        self.programs.insert(
            name.to_owned(),
            Program {
                name: name.to_owned(),
                raw,
                local_size,
                storage,
                uniforms,
                folds,
                max_groups: backend.limits().max_workgroups_per_dimension,
            },
        );
        Ok(())
    }

    pub fn program(&self, name: &str) -> Result<&Program<B>, GpuError> {
        self.programs
            .get(name)
            .ok_or_else(|| GpuError::UnknownProgram(name.to_owned()))
    }

    pub fn program_mut(&mut self, name: &str) -> Result<&mut Program<B>, GpuError> {
        self.programs
            .get_mut(name)
            .ok_or_else(|| GpuError::UnknownProgram(name.to_owned()))
    }
}
