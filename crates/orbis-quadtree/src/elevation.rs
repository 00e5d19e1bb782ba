//! Turning provider tiles into segment height grids.
//!
//! A segment with grid size `g` stores `(g + 1)²` heights, row-major from the
//! north-west corner. Raw tiles are read through a vertex view: for the
//! pixel layout the missing east column and south row are synthesised by
//! clamping to the last pixel.
//!
//! Missing samples are filled from the nearest ancestor that has terrain,
//! following the ancestor's triangulated surface so that the fallback agrees
//! exactly with what the ancestor renders.

use std::sync::Arc;

use orbis_terrain::{NoDataValues, SampleLayout, TerrainTile, TileKey};

/// Heights for one segment plus, when the raw data is fine enough, the grids
/// of its four children in `[NW, NE, SW, SE]` order.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractedElevation {
    pub heights: Vec<f32>,
    pub children: Option<[Vec<f32>; 4]>,
}

/// Raw sample at vertex `(i, j)` of the tile's cell grid.
#[inline]
fn raw(tile: &TerrainTile, i: usize, j: usize) -> f32 {
    tile.get(i, j)
}

/// Extract a `grid`-sized height grid from `tile`.
///
/// `child_grid` is the grid size children of this segment will use; their
/// grids are pre-computed when the raw data covers them exactly.
pub fn extract_elevation(
    tile: &TerrainTile,
    grid: usize,
    child_grid: usize,
    no_data: &NoDataValues,
) -> ExtractedElevation {
    let cells = tile.cells;
    if cells == grid {
        return ExtractedElevation {
            heights: extract_equal(tile, grid),
            children: None,
        };
    }
    if cells > grid && cells % grid == 0 && (cells / grid).is_power_of_two() {
        return extract_power_of_two(tile, grid, child_grid);
    }
    ExtractedElevation {
        heights: resample(tile, grid, no_data),
        children: None,
    }
}

/// Raw resolution equals the grid resolution.
fn extract_equal(tile: &TerrainTile, grid: usize) -> Vec<f32> {
    let side = grid + 1;
    match tile.layout {
        SampleLayout::Vertices => tile.samples.clone(),
        SampleLayout::Pixels => {
            let mut heights = vec![0.0; side * side];
            for j in 0..grid {
                let row = &tile.samples[j * grid..(j + 1) * grid];
                heights[j * side..j * side + grid].copy_from_slice(row);
                // Right edge.
                heights[j * side + grid] = row[grid - 1];
            }
            // Bottom edge and corner.
            let last = &tile.samples[(grid - 1) * grid..grid * grid];
            heights[grid * side..grid * side + grid].copy_from_slice(last);
            heights[grid * side + grid] = last[grid - 1];
            heights
        }
    }
}

/// Raw resolution is `grid · 2^k` with `k ≥ 1`.
fn extract_power_of_two(tile: &TerrainTile, grid: usize, child_grid: usize) -> ExtractedElevation {
    let cells = tile.cells;
    let side = grid + 1;
    let step = cells / grid;

    let mut heights = Vec::with_capacity(side * side);
    for j in 0..=grid {
        for i in 0..=grid {
            heights.push(raw(tile, i * step, j * step));
        }
    }

    let half = cells / 2;
    let children = (child_grid > 0 && half % child_grid == 0 && (half / child_grid).is_power_of_two())
        .then(|| extract_children(tile, child_grid));

    ExtractedElevation { heights, children }
}

fn extract_children(tile: &TerrainTile, cg: usize) -> [Vec<f32>; 4] {
    let half = tile.cells / 2;
    let cs = half / cg;
    let cside = cg + 1;

    // The row and column the children share, computed once.
    let mid_row: Vec<f32> = (0..=2 * cg).map(|k| raw(tile, k * cs, half)).collect();
    let mid_col: Vec<f32> = (0..=2 * cg).map(|k| raw(tile, half, k * cs)).collect();

    std::array::from_fn(|c| {
        let (cx, cy) = (c & 1, c >> 1);
        let (ox, oy) = (cx * half, cy * half);
        let mut h = Vec::with_capacity(cside * cside);
        for j in 0..=cg {
            for i in 0..=cg {
                h.push(raw(tile, ox + i * cs, oy + j * cs));
            }
        }
        let shared_j = if cy == 0 { cg } else { 0 };
        let shared_i = if cx == 0 { cg } else { 0 };
        for i in 0..=cg {
            h[shared_j * cside + i] = mid_row[cx * cg + i];
        }
        for j in 0..=cg {
            h[j * cside + shared_i] = mid_col[cy * cg + j];
        }
        h
    })
}

/// General path: bilinear over the vertex view, nearest sample next to missing data.
fn resample(tile: &TerrainTile, grid: usize, no_data: &NoDataValues) -> Vec<f32> {
    let cells = tile.cells as f64;
    let last = tile.cells;
    let mut heights = Vec::with_capacity((grid + 1) * (grid + 1));
    for j in 0..=grid {
        for i in 0..=grid {
            let fx = i as f64 / grid as f64 * cells;
            let fy = j as f64 / grid as f64 * cells;
            let x0 = (fx.floor() as usize).min(last.saturating_sub(1));
            let y0 = (fy.floor() as usize).min(last.saturating_sub(1));
            let (tx, ty) = (fx - x0 as f64, fy - y0 as f64);
            let h = [
                raw(tile, x0, y0),
                raw(tile, x0 + 1, y0),
                raw(tile, x0, y0 + 1),
                raw(tile, x0 + 1, y0 + 1),
            ];
            if h.iter().any(|&v| no_data.is_no_data(v)) {
                let nearest = match (tx >= 0.5, ty >= 0.5) {
                    (false, false) => h[0],
                    (true, false) => h[1],
                    (false, true) => h[2],
                    (true, true) => h[3],
                };
                heights.push(nearest);
            } else {
                let top = h[0] as f64 + (h[1] - h[0]) as f64 * tx;
                let bottom = h[2] as f64 + (h[3] - h[2]) as f64 * tx;
                heights.push((top + (bottom - top) * ty) as f32);
            }
        }
    }
    heights
}

/// Height of a grid's triangulated surface at fractional grid position `(fx, fy)`.
///
/// Cells are split along the NW–SE diagonal, matching the index buffer, so
/// at sample positions the result is the sample itself.
pub fn triangle_sample(heights: &[f32], grid: usize, fx: f64, fy: f64) -> f32 {
    let g = grid as f64;
    let fx = fx.clamp(0.0, g);
    let fy = fy.clamp(0.0, g);
    let x0 = (fx.floor() as usize).min(grid - 1);
    let y0 = (fy.floor() as usize).min(grid - 1);
    let tx = fx - x0 as f64;
    let ty = fy - y0 as f64;
    let side = grid + 1;
    let h00 = heights[y0 * side + x0] as f64;
    let h10 = heights[y0 * side + x0 + 1] as f64;
    let h01 = heights[(y0 + 1) * side + x0] as f64;
    let h11 = heights[(y0 + 1) * side + x0 + 1] as f64;
    let h = if tx >= ty {
        h00 + tx * (h10 - h00) + ty * (h11 - h10)
    } else {
        h00 + ty * (h01 - h00) + tx * (h11 - h01)
    };
    h as f32
}

/// Heights of an ancestor used to fill in missing data.
#[derive(Clone, Debug)]
pub struct FallbackSource {
    pub key: TileKey,
    pub grid: usize,
    pub heights: Arc<Vec<f32>>,
}

impl FallbackSource {
    /// Ancestor surface height under vertex `(i, j)` of `key`'s `grid`.
    ///
    /// `None` when `key` is not a descendant of the source.
    pub fn sample(&self, key: &TileKey, grid: usize, i: usize, j: usize) -> Option<f32> {
        if !key.is_descendant_of(&self.key) {
            return None;
        }
        let (dz, dx, dy) = key.offset_in_ancestor(self.key.zoom)?;
        let scale = (1u64 << dz) as f64;
        let g = grid as f64;
        let u = (dx as f64 + i as f64 / g) / scale;
        let v = (dy as f64 + j as f64 / g) / scale;
        let sg = self.grid as f64;
        Some(triangle_sample(&self.heights, self.grid, u * sg, v * sg))
    }

    pub fn zoom_diff(&self, key: &TileKey) -> u8 {
        key.zoom.saturating_sub(self.key.zoom)
    }
}

/// What [`resolve_no_data`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoDataResolution {
    pub missing: usize,
    pub filled_from_ancestor: usize,
    pub skip_positive_heights: bool,
}

/// Replace missing samples with ancestor heights, or zero without an ancestor.
///
/// Fallback from an ancestor `sea_level_zoom_diff` or more levels up is
/// clamped to sea level.
pub fn resolve_no_data(
    heights: &mut [f32],
    key: &TileKey,
    grid: usize,
    no_data: &NoDataValues,
    fallback: Option<&FallbackSource>,
    sea_level_zoom_diff: u8,
) -> NoDataResolution {
    let side = grid + 1;
    let clamp_to_sea = fallback.is_some_and(|f| f.zoom_diff(key) >= sea_level_zoom_diff);
    let mut res = NoDataResolution::default();
    for j in 0..side {
        for i in 0..side {
            let idx = j * side + i;
            if !no_data.is_no_data(heights[idx]) {
                continue;
            }
            res.missing += 1;
            match fallback.and_then(|f| f.sample(key, grid, i, j)) {
                Some(h) => {
                    res.filled_from_ancestor += 1;
                    heights[idx] = if clamp_to_sea {
                        res.skip_positive_heights = true;
                        h.min(0.0)
                    } else {
                        h
                    };
                }
                None => heights[idx] = 0.0,
            }
        }
    }
    res
}

/// A whole grid sampled from the ancestor surface.
pub fn fallback_grid(key: &TileKey, grid: usize, fallback: &FallbackSource) -> Vec<f32> {
    let side = grid + 1;
    let mut heights = Vec::with_capacity(side * side);
    for j in 0..side {
        for i in 0..side {
            heights.push(fallback.sample(key, grid, i, j).unwrap_or(0.0));
        }
    }
    heights
}

/// Flat grid whose border ring follows the ancestor so that seams stay closed.
pub fn flat_with_border(key: &TileKey, grid: usize, fallback: Option<&FallbackSource>) -> Vec<f32> {
    let side = grid + 1;
    let mut heights = vec![0.0; side * side];
    if let Some(f) = fallback {
        for j in 0..side {
            for i in 0..side {
                if i == 0 || j == 0 || i == grid || j == grid {
                    heights[j * side + i] = f.sample(key, grid, i, j).unwrap_or(0.0);
                }
            }
        }
    }
    heights
}

/// `(min, max)` of a grid, `(0, 0)` when empty.
pub fn height_range(heights: &[f32]) -> (f32, f32) {
    if heights.is_empty() {
        return (0.0, 0.0);
    }
    heights
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &h| (lo.min(h), hi.max(h)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_terrain::TileGroup;

    fn key(zoom: u8, x: u32, y: u32) -> TileKey {
        TileKey::new(TileGroup::Standard, zoom, x, y)
    }

    fn ramp_tile(cells: usize) -> TerrainTile {
        let side = cells + 1;
        let samples = (0..side * side)
            .map(|k| ((k % side) * 10 + (k / side)) as f32)
            .collect();
        TerrainTile::new(cells, SampleLayout::Vertices, samples)
    }

    #[test]
    fn test_equal_vertices_copy() {
        let tile = ramp_tile(4);
        let out = extract_elevation(&tile, 4, 4, &NoDataValues::default());
        assert_eq!(out.heights, tile.samples);
        assert!(out.children.is_none());
    }

    /// Pixel tiles get their east column and south row from the last pixel.
    #[test]
    fn test_equal_pixels_synthesise_edges() {
        let tile = TerrainTile::new(2, SampleLayout::Pixels, vec![1.0, 2.0, 3.0, 4.0]);
        let out = extract_elevation(&tile, 2, 2, &NoDataValues::default());
        assert_eq!(out.heights, vec![1.0, 2.0, 2.0, 3.0, 4.0, 4.0, 3.0, 4.0, 4.0]);
    }

    #[test]
    fn test_power_of_two_strides() {
        let tile = ramp_tile(8);
        let out = extract_elevation(&tile, 2, 2, &NoDataValues::default());
        // Vertex (1, 1) of a 2-cell grid is raw vertex (4, 4).
        assert_eq!(out.heights[4], 44.0);
        assert_eq!(out.heights.len(), 9);
    }

    /// Child grids cover their quadrant of the raw data and agree on shared edges.
    #[test]
    fn test_power_of_two_seeds_children() {
        let tile = ramp_tile(8);
        let out = extract_elevation(&tile, 4, 4, &NoDataValues::default());
        let [nw, ne, sw, se] = out.children.expect("children seeded");
        let side = 5;
        // NE child's north-west corner is raw (4, 0).
        assert_eq!(ne[0], 40.0);
        // SE child's south-east corner is raw (8, 8).
        assert_eq!(se[side * side - 1], 88.0);
        for k in 0..side {
            // NW east column == NE west column.
            assert_eq!(nw[k * side + 4], ne[k * side]);
            // NW south row == SW north row.
            assert_eq!(nw[4 * side + k], sw[k]);
        }
    }

    #[test]
    fn test_children_skipped_when_too_coarse() {
        let tile = ramp_tile(8);
        // Half the raw data is 4 cells, which cannot feed a 16-cell child.
        let out = extract_elevation(&tile, 4, 16, &NoDataValues::default());
        assert!(out.children.is_none());
    }

    #[test]
    fn test_resample_general_path() {
        let tile = ramp_tile(3);
        let out = extract_elevation(&tile, 2, 2, &NoDataValues::default());
        assert_eq!(out.heights[0], 0.0);
        assert_eq!(out.heights[8], 33.0);
        // Raw (1.5, 0) is halfway between 10 and 20.
        assert!((out.heights[1] - 15.0).abs() < 1e-4);
    }

    #[test]
    fn test_triangle_sample_exact_at_samples() {
        let heights = [0.0, 10.0, 20.0, 40.0];
        assert_eq!(triangle_sample(&heights, 1, 0.0, 0.0), 0.0);
        assert_eq!(triangle_sample(&heights, 1, 1.0, 0.0), 10.0);
        assert_eq!(triangle_sample(&heights, 1, 0.0, 1.0), 20.0);
        assert_eq!(triangle_sample(&heights, 1, 1.0, 1.0), 40.0);
        // On the diagonal both triangles agree.
        assert_eq!(triangle_sample(&heights, 1, 0.5, 0.5), 20.0);
        // Upper-right triangle (NW, SE, NE).
        assert_eq!(triangle_sample(&heights, 1, 1.0, 0.5), 25.0);
        // Lower-left triangle (NW, SW, SE).
        assert_eq!(triangle_sample(&heights, 1, 0.5, 1.0), 30.0);
    }

    #[test]
    fn test_fallback_requires_descendant() {
        let src = FallbackSource {
            key: key(1, 0, 0),
            grid: 1,
            heights: Arc::new(vec![0.0; 4]),
        };
        assert!(src.sample(&key(2, 3, 0), 1, 0, 0).is_none());
        assert!(src.sample(&key(2, 1, 1), 1, 0, 0).is_some());
    }

    #[test]
    fn test_resolve_no_data_clamps_coarse_fallback() {
        let src = FallbackSource {
            key: key(0, 0, 0),
            grid: 1,
            heights: Arc::new(vec![100.0; 4]),
        };
        let no_data = NoDataValues::default();
        let child = key(5, 0, 0);
        let mut heights = vec![-32_767.0, 5.0, -32_767.0, 7.0];
        let res = resolve_no_data(&mut heights, &child, 1, &no_data, Some(&src), 4);
        assert_eq!(res.missing, 2);
        assert!(res.skip_positive_heights);
        assert_eq!(heights, vec![0.0, 5.0, 0.0, 7.0]);

        let near = key(2, 0, 0);
        let mut heights = vec![-32_767.0, 5.0, -32_767.0, 7.0];
        let res = resolve_no_data(&mut heights, &near, 1, &no_data, Some(&src), 4);
        assert!(!res.skip_positive_heights);
        assert_eq!(heights[0], 100.0);
    }

    #[test]
    fn test_flat_with_border() {
        let src = FallbackSource {
            key: key(0, 0, 0),
            grid: 1,
            heights: Arc::new(vec![8.0; 4]),
        };
        let heights = flat_with_border(&key(1, 0, 0), 2, Some(&src));
        assert_eq!(heights[4], 0.0);
        assert!(heights.iter().enumerate().all(|(k, &h)| k == 4 || h == 8.0));
    }
}
