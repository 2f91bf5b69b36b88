//! Host-side backend that records commands and checks barrier discipline.

use super::{Barriers, BufferDesc, BufferId, GpuBackend, GpuError, GpuLimits, ProgramDesc, StorageAccess};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateBuffer { id: BufferId, label: String, size: u64 },
    WriteBuffer { id: BufferId, offset: u64, len: u64 },
    CreateProgram { name: String },
    Dispatch {
        program: String,
        groups: [u32; 3],
        storage: Vec<(u32, BufferId, StorageAccess)>,
        uniforms: Vec<u8>,
    },
    Barrier(Barriers),
}

#[derive(Default)]
struct State {
    next_id: u64,
    live: usize,
    commands: Vec<Command>,
    contents: HashMap<BufferId, Vec<u8>>,
    /// Written by a dispatch, not yet made visible to later dispatches.
    unsynced_storage: HashSet<BufferId>,
    /// Written by a dispatch, not yet made visible to vertex/index fetch.
    unsynced_draw: HashSet<BufferId>,
    hazards: Vec<String>,
    failing: Option<String>,
    limits: GpuLimits,
}

#[derive(Clone, Default)]
pub struct RecordingBackend {
    state: Rc<RefCell<State>>,
}

pub struct RecordedBuffer {
    id: BufferId,
    state: Rc<RefCell<State>>,
}

impl Drop for RecordedBuffer {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.live -= 1;
        state.contents.remove(&self.id);
    }
}

pub struct RecordedProgram {
    name: String,
    storage: Vec<(u32, StorageAccess)>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend on which compiling `name` fails.
    pub fn failing_program(name: &str) -> Self {
        let backend = Self::new();
        backend.state.borrow_mut().failing = Some(name.to_owned());
        backend
    }

    /// A backend reporting `limits` instead of the wgpu defaults.
    pub fn with_limits(limits: GpuLimits) -> Self {
        let backend = Self::new();
        backend.state.borrow_mut().limits = limits;
        backend
    }

    pub fn commands(&self) -> Vec<Command> {
        self.state.borrow().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.state.borrow_mut().commands.clear();
    }

    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.state.borrow().commands.iter().filter(|c| pred(c)).count()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().live
    }

    /// `(program, groups)` for every dispatch, in order.
    pub fn dispatches(&self) -> Vec<(String, [u32; 3])> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Dispatch { program, groups, .. } => Some((program.clone(), *groups)),
                _ => None,
            })
            .collect()
    }

    pub fn writes_to(&self, id: BufferId) -> usize {
        self.count(|c| matches!(c, Command::WriteBuffer { id: w, .. } if *w == id))
    }

    pub fn hazards(&self) -> Vec<String> {
        self.state.borrow().hazards.clone()
    }

    /// Buffers written on the device that a draw could not yet safely read.
    pub fn unsynced_for_draw(&self) -> usize {
        self.state.borrow().unsynced_draw.len()
    }
}

impl GpuBackend for RecordingBackend {
    type RawBuffer = RecordedBuffer;
    type RawProgram = RecordedProgram;

    fn limits(&self) -> GpuLimits {
        self.state.borrow().limits
    }

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> RecordedBuffer {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.live += 1;
        let id = BufferId(state.next_id);
        state.contents.insert(id, vec![0; desc.size as usize]);
        state.commands.push(Command::CreateBuffer {
            id,
            label: desc.label.to_owned(),
            size: desc.size,
        });
        RecordedBuffer {
            id,
            state: self.state.clone(),
        }
    }

    fn buffer_id(&self, buffer: &RecordedBuffer) -> BufferId {
        buffer.id
    }

    fn write_buffer(&self, buffer: &RecordedBuffer, offset: u64, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        if let Some(bytes) = state.contents.get_mut(&buffer.id) {
            let end = offset as usize + data.len();
            if bytes.len() < end {
                bytes.resize(end, 0);
            }
            bytes[offset as usize..end].copy_from_slice(data);
        }
        state.commands.push(Command::WriteBuffer {
            id: buffer.id,
            offset,
            len: data.len() as u64,
        });
    }

    fn read_buffer(&self, buffer: &RecordedBuffer, offset: u64, len: u64) -> Result<Vec<u8>, GpuError> {
        let state = self.state.borrow();
        let bytes = state
            .contents
            .get(&buffer.id)
            .ok_or_else(|| GpuError::Map(format!("{:?} is gone", buffer.id)))?;
        let mut out = vec![0; len as usize];
        let start = (offset as usize).min(bytes.len());
        let end = (offset as usize + len as usize).min(bytes.len());
        out[..end - start].copy_from_slice(&bytes[start..end]);
        Ok(out)
    }

    fn create_program(&self, desc: &ProgramDesc<'_>) -> Result<RecordedProgram, GpuError> {
        let mut state = self.state.borrow_mut();
        if state.failing.as_deref() == Some(desc.name) {
            return Err(GpuError::Compile {
                program: desc.name.to_owned(),
                message: "rejected by test backend".into(),
            });
        }
        state.commands.push(Command::CreateProgram {
            name: desc.name.to_owned(),
        });
        Ok(RecordedProgram {
            name: desc.name.to_owned(),
            storage: desc.storage.to_vec(),
        })
    }

    fn dispatch(
        &self,
        program: &RecordedProgram,
        groups: [u32; 3],
        storage: &[(u32, &RecordedBuffer)],
        uniforms: &[u8],
    ) -> Result<(), GpuError> {
        let mut state = self.state.borrow_mut();
        let mut bound = Vec::with_capacity(storage.len());

        for &(slot, buffer) in storage {
            let access = program
                .storage
                .iter()
                .find(|(s, _)| *s == slot)
                .map(|(_, a)| *a)
                .ok_or_else(|| GpuError::MissingBinding {
                    program: program.name.clone(),
                    slot,
                })?;

            if state.unsynced_storage.contains(&buffer.id) {
                let msg = format!(
                    "'{}' slot {} reads {:?} before a storage barrier",
                    program.name, slot, buffer.id
                );
                state.hazards.push(msg);
            }
            bound.push((slot, buffer.id, access));
        }

        for &(_, id, access) in &bound {
            if access == StorageAccess::ReadWrite {
                state.unsynced_storage.insert(id);
                state.unsynced_draw.insert(id);
            }
        }

        state.commands.push(Command::Dispatch {
            program: program.name.clone(),
            groups,
            storage: bound,
            uniforms: uniforms.to_vec(),
        });
        Ok(())
    }

    fn memory_barrier(&self, barriers: Barriers) {
        let mut state = self.state.borrow_mut();
        if barriers.contains(Barriers::STORAGE) {
            state.unsynced_storage.clear();
        }
        if barriers.contains(Barriers::VERTEX_ATTRIB) || barriers.contains(Barriers::ELEMENT_ARRAY) {
            state.unsynced_draw.clear();
        }
        state.commands.push(Command::Barrier(barriers));
    }
}
