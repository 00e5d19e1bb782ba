//! Shared per-grid-size geometry: triangle indices and texture coordinates.
//!
//! Every segment with the same grid size draws with the same index buffer.
//! The cache is owned by the planet and cleared with it.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{BufferHandle, RenderBackend};

/// Triangle indices for a `grid × grid` cell mesh.
///
/// Each cell is cut along its NW–SE diagonal into `(NW, SW, SE)` and
/// `(NW, SE, NE)`, counter-clockwise seen from above.
pub fn grid_indices(grid: usize) -> Vec<u32> {
    let side = grid + 1;
    let mut indices = Vec::with_capacity(grid * grid * 6);
    for j in 0..grid {
        for i in 0..grid {
            let nw = (j * side + i) as u32;
            let ne = nw + 1;
            let sw = nw + side as u32;
            let se = sw + 1;
            indices.extend_from_slice(&[nw, sw, se, nw, se, ne]);
        }
    }
    indices
}

/// Interleaved `(u, v)` texture coordinates, `v` increasing southwards.
pub fn grid_texcoords(grid: usize) -> Vec<f32> {
    let g = grid as f32;
    let mut uv = Vec::with_capacity((grid + 1) * (grid + 1) * 2);
    for j in 0..=grid {
        for i in 0..=grid {
            uv.push(i as f32 / g);
            uv.push(j as f32 / g);
        }
    }
    uv
}

#[derive(Debug, Default)]
pub struct GeometryCache {
    indices: FxHashMap<usize, Arc<Vec<u32>>>,
    texcoords: FxHashMap<usize, Arc<Vec<f32>>>,
    index_buffers: FxHashMap<usize, BufferHandle>,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-build the entries for the given grid sizes.
    pub fn init(&mut self, grid_sizes: &[usize]) {
        for &grid in grid_sizes {
            self.indices(grid);
            self.texcoords(grid);
        }
    }

    pub fn indices(&mut self, grid: usize) -> Arc<Vec<u32>> {
        Arc::clone(
            self.indices
                .entry(grid)
                .or_insert_with(|| Arc::new(grid_indices(grid))),
        )
    }

    pub fn texcoords(&mut self, grid: usize) -> Arc<Vec<f32>> {
        Arc::clone(
            self.texcoords
                .entry(grid)
                .or_insert_with(|| Arc::new(grid_texcoords(grid))),
        )
    }

    /// The shared element buffer for `grid`, uploaded on first use.
    pub fn index_buffer(&mut self, grid: usize, backend: &mut dyn RenderBackend) -> BufferHandle {
        if let Some(&handle) = self.index_buffers.get(&grid) {
            return handle;
        }
        let indices = self.indices(grid);
        let handle = backend.create_element_array_buffer(bytemuck::cast_slice(indices.as_slice()));
        self.index_buffers.insert(grid, handle);
        handle
    }

    /// Drop everything and delete the uploaded index buffers.
    pub fn clear(&mut self, backend: &mut dyn RenderBackend) {
        for (_, handle) in self.index_buffers.drain() {
            backend.delete_buffer(handle);
        }
        self.indices.clear();
        self.texcoords.clear();
    }

    pub fn cached_grids(&self) -> usize {
        self.indices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingBackend;

    #[test]
    fn test_indices_cover_grid() {
        let indices = grid_indices(2);
        assert_eq!(indices.len(), 2 * 2 * 6);
        assert_eq!(&indices[..6], &[0, 3, 4, 0, 4, 1]);
        assert!(indices.iter().all(|&i| i < 9));
    }

    #[test]
    fn test_texcoords_corners() {
        let uv = grid_texcoords(4);
        assert_eq!(&uv[..2], &[0.0, 0.0]);
        assert_eq!(&uv[uv.len() - 2..], &[1.0, 1.0]);
    }

    #[test]
    fn test_index_buffer_uploaded_once_and_cleared() {
        let mut backend = RecordingBackend::new();
        let mut cache = GeometryCache::new();
        cache.init(&[8, 16]);
        assert_eq!(cache.cached_grids(), 2);
        let a = cache.index_buffer(8, &mut backend);
        let b = cache.index_buffer(8, &mut backend);
        assert_eq!(a, b);
        assert_eq!(backend.live_count(), 1);
        cache.clear(&mut backend);
        assert_eq!(backend.live_count(), 0);
        assert_eq!(cache.cached_grids(), 0);
    }
}
