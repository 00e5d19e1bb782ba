//! The slice of the render backend the quad-tree needs: creating and
//! deleting opaque buffers from numeric arrays.

use rustc_hash::FxHashMap;

/// Opaque buffer handle issued by a [`RenderBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    Array,
    ElementArray,
}

pub trait RenderBackend {
    /// Upload vertex data with `item_size` components per vertex.
    fn create_array_buffer(&mut self, data: &[u8], item_size: usize) -> BufferHandle;

    /// Upload `u32` triangle indices.
    fn create_element_array_buffer(&mut self, data: &[u8]) -> BufferHandle;

    fn delete_buffer(&mut self, handle: BufferHandle);
}

/// Per-segment vertex buffers for relative-to-eye drawing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmentBuffers {
    pub positions_high: BufferHandle,
    pub positions_low: BufferHandle,
    pub normals: BufferHandle,
}

impl SegmentBuffers {
    pub fn release(self, backend: &mut dyn RenderBackend) {
        backend.delete_buffer(self.positions_high);
        backend.delete_buffer(self.positions_low);
        backend.delete_buffer(self.normals);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferInfo {
    pub kind: BufferKind,
    pub bytes: usize,
    pub item_size: usize,
}

/// In-memory backend that tracks live buffers. Used headless and in tests.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u64,
    live: FxHashMap<BufferHandle, BufferInfo>,
    created: u64,
    deleted: u64,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, info: BufferInfo) -> BufferHandle {
        self.next_id += 1;
        self.created += 1;
        let handle = BufferHandle(self.next_id);
        self.live.insert(handle, info);
        handle
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_bytes(&self) -> usize {
        self.live.values().map(|b| b.bytes).sum()
    }

    pub fn info(&self, handle: BufferHandle) -> Option<&BufferInfo> {
        self.live.get(&handle)
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn deleted(&self) -> u64 {
        self.deleted
    }
}

impl RenderBackend for RecordingBackend {
    fn create_array_buffer(&mut self, data: &[u8], item_size: usize) -> BufferHandle {
        self.record(BufferInfo {
            kind: BufferKind::Array,
            bytes: data.len(),
            item_size,
        })
    }

    fn create_element_array_buffer(&mut self, data: &[u8]) -> BufferHandle {
        self.record(BufferInfo {
            kind: BufferKind::ElementArray,
            bytes: data.len(),
            item_size: 1,
        })
    }

    fn delete_buffer(&mut self, handle: BufferHandle) {
        if self.live.remove(&handle).is_some() {
            self.deleted += 1;
        } else {
            tracing::warn!(?handle, "deleting unknown buffer");
        }
    }
}
