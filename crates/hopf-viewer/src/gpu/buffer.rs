use super::{BufferDesc, BufferId, BufferRoles, GpuBackend, GpuError, Usage};

/// Backends refuse zero-sized bindings; allocations never go below this.
const MIN_ALLOCATION: u64 = 16;

/// Which branch an upload took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadPath {
    /// The payload fit; written in place, id unchanged.
    Overwritten,
    /// The payload was larger than the allocation; a new one was made.
    Reallocated,
}

/// One device allocation with upload-or-grow semantics.
///
/// The allocation is released when the `Buffer` is dropped.
pub struct Buffer<B: GpuBackend> {
    label: String,
    roles: BufferRoles,
    raw: Option<B::RawBuffer>,
    id: Option<BufferId>,
    /// Allocated bytes.
    size: u64,
    /// Bytes covered by the last upload or reserve.
    len: u64,
}

impl<B: GpuBackend> Buffer<B> {
    pub fn new(label: impl Into<String>, roles: BufferRoles) -> Self {
        Self {
            label: label.into(),
            roles,
            raw: None,
            id: None,
            size: 0,
            len: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn id(&self) -> Option<BufferId> {
        self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn raw(&self) -> Option<&B::RawBuffer> {
        self.raw.as_ref()
    }

    pub fn try_raw(&self) -> Result<&B::RawBuffer, GpuError> {
        self.raw
            .as_ref()
            .ok_or_else(|| GpuError::Unallocated(self.label.clone()))
    }

    fn allocate(&mut self, backend: &B, size: u64, usage: Usage) {
        let raw = backend.create_buffer(&BufferDesc {
            label: &self.label,
            size: size.max(MIN_ALLOCATION),
            roles: self.roles,
            usage,
        });
        let id = backend.buffer_id(&raw);
        log::debug!("buffer '{}' allocated {} bytes ({:?})", self.label, size, id);

        // Dropping the previous allocation releases it.
        self.raw = Some(raw);
        self.id = Some(id);
        self.size = size;
    }

    /// Writes `bytes` at offset 0, reallocating only if they do not fit.
    pub fn upload(&mut self, backend: &B, bytes: &[u8], usage: Usage) -> UploadPath {
        let len = bytes.len() as u64;
        let path = if self.raw.is_some() && len <= self.size {
            UploadPath::Overwritten
        } else {
            self.allocate(backend, len, usage);
            UploadPath::Reallocated
        };

        if let (Some(raw), false) = (&self.raw, bytes.is_empty()) {
            backend.write_buffer(raw, 0, bytes);
        }
        self.len = len;
        path
    }

    /// Ensures room for `byte_count` bytes without writing data.
    ///
    /// Contents are unspecified after a growing reserve.
    pub fn reserve(&mut self, backend: &B, byte_count: u64, usage: Usage) -> UploadPath {
        let path = if self.raw.is_some() && byte_count <= self.size {
            UploadPath::Overwritten
        } else {
            self.allocate(backend, byte_count, usage);
            UploadPath::Reallocated
        };
        self.len = byte_count;
        path
    }

    /// Writes `bytes` at `offset` inside the current allocation.
    pub fn write_at(&self, backend: &B, offset: u64, bytes: &[u8]) -> Result<(), GpuError> {
        let raw = self.try_raw()?;
        debug_assert!(offset + bytes.len() as u64 <= self.size);
        backend.write_buffer(raw, offset, bytes);
        Ok(())
    }

    /// Maps the first `len()` bytes back and reinterprets them as `T`.
    pub fn read<T: bytemuck::Pod>(&self, backend: &B) -> Result<Vec<T>, GpuError> {
        let raw = self.try_raw()?;
        let bytes = backend.read_buffer(raw, 0, self.len)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::{Command, RecordingBackend};

    fn storage() -> Buffer<RecordingBackend> {
        Buffer::new("test", BufferRoles::STORAGE)
    }

    #[test]
    fn identical_uploads_do_not_reallocate() {
        let gpu = RecordingBackend::new();
        let mut buf = storage();
        let payload = [7u8; 64];

        assert_eq!(buf.upload(&gpu, &payload, Usage::StaticDraw), UploadPath::Reallocated);
        let (id, size) = (buf.id(), buf.size());

        assert_eq!(buf.upload(&gpu, &payload, Usage::StaticDraw), UploadPath::Overwritten);
        assert_eq!(buf.id(), id);
        assert_eq!(buf.size(), size);
        assert_eq!(gpu.count(|c| matches!(c, Command::CreateBuffer { .. })), 1);
    }

    #[test]
    fn small_upload_after_large_takes_sub_write() {
        let gpu = RecordingBackend::new();
        let mut buf = storage();
        buf.upload(&gpu, &[1u8; 256], Usage::StreamDraw);
        let id = buf.id();

        assert_eq!(buf.upload(&gpu, &[2u8; 32], Usage::StreamDraw), UploadPath::Overwritten);
        assert_eq!(buf.id(), id);
        assert_eq!(buf.size(), 256);
        assert_eq!(buf.len(), 32);
        assert_eq!(buf.read::<u8>(&gpu).unwrap(), vec![2u8; 32]);
    }

    #[test]
    fn growing_upload_reallocates_with_new_id() {
        let gpu = RecordingBackend::new();
        let mut buf = storage();
        buf.upload(&gpu, &[0u8; 16], Usage::StaticDraw);
        let first = buf.id();

        assert_eq!(buf.upload(&gpu, &[0u8; 48], Usage::StaticDraw), UploadPath::Reallocated);
        assert_ne!(buf.id(), first);
        assert_eq!(buf.size(), 48);
        assert_eq!(gpu.live_buffers(), 1);
    }

    #[test]
    fn reserve_grows_only_when_needed() {
        let gpu = RecordingBackend::new();
        let mut buf = storage();
        assert!(buf.id().is_none());
        assert!(matches!(buf.read::<u32>(&gpu), Err(GpuError::Unallocated(_))));

        assert_eq!(buf.reserve(&gpu, 128, Usage::StreamDraw), UploadPath::Reallocated);
        assert_eq!(buf.reserve(&gpu, 64, Usage::StreamDraw), UploadPath::Overwritten);
        assert_eq!(buf.size(), 128);
        assert_eq!(buf.len(), 64);
    }
}
