//! Crack removal between neighbours at different zoom levels.
//!
//! A finer segment snaps its edge vertices onto the triangle surface of the
//! coarser neighbour across that edge, so both sides share the same line.

use std::sync::Arc;

use orbis_terrain::{TileGroup, TileKey};

use crate::elevation::triangle_sample;

/// Per side `(zoom, data_version)` of the coarser neighbour the edge was
/// snapped to. Geometry is rebuilt only when this changes.
pub type EdgeSignature = [Option<(u8, u32)>; 4];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    North,
    East,
    South,
    West,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::North, Side::East, Side::South, Side::West];

    /// The same-zoom tile across this side. Longitude wraps. The outer row
    /// of the standard grid borders the polar cap groups, which only exist
    /// under mercator subdivision; at a true pole there is no neighbour.
    pub fn neighbour_key(self, key: &TileKey) -> Option<TileKey> {
        let n = key.tiles_per_side();
        let (group, x, y) = match self {
            Side::North if key.y == 0 => match key.group {
                TileGroup::Standard => (TileGroup::North, key.x, n - 1),
                TileGroup::South => (TileGroup::Standard, key.x, n - 1),
                TileGroup::North => return None,
            },
            Side::South if key.y + 1 == n => match key.group {
                TileGroup::Standard => (TileGroup::South, key.x, 0),
                TileGroup::North => (TileGroup::Standard, key.x, 0),
                TileGroup::South => return None,
            },
            Side::North => (key.group, key.x, key.y - 1),
            Side::South => (key.group, key.x, key.y + 1),
            Side::East => (key.group, (key.x + 1) % n, key.y),
            Side::West => (key.group, (key.x + n - 1) % n, key.y),
        };
        let neighbour = TileKey::new(group, key.zoom, x, y);
        (neighbour != *key).then_some(neighbour)
    }

    /// Grid vertices along this side, in order.
    fn vertices(self, grid: usize) -> impl Iterator<Item = (usize, usize)> {
        (0..=grid).map(move |k| match self {
            Side::North => (k, 0),
            Side::South => (k, grid),
            Side::West => (0, k),
            Side::East => (grid, k),
        })
    }
}

/// Rows, in whole grids, from `own`'s row origin to `other`'s. The north
/// cap sits one grid above the standard rows and the south cap one below.
fn group_row_offset(own: TileGroup, other: TileGroup) -> f64 {
    match (own, other) {
        (TileGroup::Standard, TileGroup::North) | (TileGroup::South, TileGroup::Standard) => 1.0,
        (TileGroup::Standard, TileGroup::South) | (TileGroup::North, TileGroup::Standard) => -1.0,
        _ => 0.0,
    }
}

/// The rendered heights of a neighbouring segment.
#[derive(Clone, Debug)]
pub struct NeighbourSurface {
    pub key: TileKey,
    pub grid: usize,
    pub heights: Arc<Vec<f32>>,
    pub data_version: u32,
}

pub fn edge_signature(key: &TileKey, neighbours: &[Option<NeighbourSurface>; 4]) -> EdgeSignature {
    std::array::from_fn(|s| {
        neighbours[s]
            .as_ref()
            .filter(|n| n.key.zoom < key.zoom)
            .map(|n| (n.key.zoom, n.data_version))
    })
}

/// Heights of `key` with every edge that borders a coarser neighbour snapped
/// onto that neighbour's surface. `None` when no edge needs it.
pub fn equalize_edges(
    key: &TileKey,
    grid: usize,
    heights: &[f32],
    neighbours: &[Option<NeighbourSurface>; 4],
) -> Option<Vec<f32>> {
    let side_len = grid + 1;
    let g = grid as f64;
    let mut out: Option<Vec<f32>> = None;
    for (side, neighbour) in Side::ALL.into_iter().zip(neighbours) {
        let Some(n) = neighbour.as_ref().filter(|n| n.key.zoom < key.zoom) else {
            continue;
        };
        let out = out.get_or_insert_with(|| heights.to_vec());
        let scale = f64::from(1u32 << (key.zoom - n.key.zoom));
        let wrap = f64::from(n.key.tiles_per_side());
        let ng = n.grid as f64;
        let row_shift = group_row_offset(key.group, n.key.group) * f64::from(key.tiles_per_side());
        for (i, j) in side.vertices(grid) {
            let mut u = (key.x as f64 + i as f64 / g) / scale - n.key.x as f64;
            if u < -0.5 {
                u += wrap;
            } else if u > 1.5 {
                u -= wrap;
            }
            let v = (key.y as f64 + row_shift + j as f64 / g) / scale - n.key.y as f64;
            out[j * side_len + i] = triangle_sample(
                &n.heights,
                n.grid,
                u.clamp(0.0, 1.0) * ng,
                v.clamp(0.0, 1.0) * ng,
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_terrain::TileGroup;

    fn key(zoom: u8, x: u32, y: u32) -> TileKey {
        TileKey::new(TileGroup::Standard, zoom, x, y)
    }

    fn surface(k: TileKey, heights: Vec<f32>) -> NeighbourSurface {
        NeighbourSurface {
            key: k,
            grid: 1,
            heights: Arc::new(heights),
            data_version: 3,
        }
    }

    #[test]
    fn test_neighbour_keys() {
        let k = key(2, 0, 0);
        assert_eq!(Side::West.neighbour_key(&k), Some(key(2, 3, 0)));
        assert_eq!(Side::East.neighbour_key(&k), Some(key(2, 1, 0)));
        assert_eq!(Side::South.neighbour_key(&k), Some(key(2, 0, 1)));
        assert_eq!(Side::East.neighbour_key(&key(0, 0, 0)), None);
    }

    /// The outer standard rows look across into the polar caps, and the caps'
    /// pole-side edges have nothing beyond them.
    #[test]
    fn test_neighbour_keys_cross_into_caps() {
        let north = |z, x, y| TileKey::new(TileGroup::North, z, x, y);
        let south = |z, x, y| TileKey::new(TileGroup::South, z, x, y);
        assert_eq!(Side::North.neighbour_key(&key(2, 1, 0)), Some(north(2, 1, 3)));
        assert_eq!(Side::South.neighbour_key(&key(2, 1, 3)), Some(south(2, 1, 0)));
        assert_eq!(Side::South.neighbour_key(&north(2, 2, 3)), Some(key(2, 2, 0)));
        assert_eq!(Side::North.neighbour_key(&south(2, 2, 0)), Some(key(2, 2, 3)));
        assert_eq!(Side::North.neighbour_key(&north(2, 2, 0)), None);
        assert_eq!(Side::South.neighbour_key(&south(2, 2, 3)), None);
        assert_eq!(Side::North.neighbour_key(&key(0, 0, 0)), Some(north(0, 0, 0)));
    }

    /// A standard tile in the top row snaps its north edge onto the south
    /// edge of a coarser north cap tile.
    #[test]
    fn test_north_edge_snaps_to_cap() {
        let own = key(2, 1, 0);
        let cap = NeighbourSurface {
            key: TileKey::new(TileGroup::North, 1, 0, 1),
            grid: 1,
            heights: Arc::new(vec![0.0, 0.0, 40.0, 80.0]),
            data_version: 1,
        };
        let out = equalize_edges(&own, 2, &[7.0; 9], &[Some(cap), None, None, None]).unwrap();
        // Own columns span the east half of the cap tile's south edge.
        assert_eq!(out[0], 60.0);
        assert_eq!(out[1], 70.0);
        assert_eq!(out[2], 80.0);
        assert_eq!(out[4], 7.0);
    }

    /// The west edge follows the coarse neighbour's east edge.
    #[test]
    fn test_west_edge_snaps_to_coarse_neighbour() {
        let own = key(2, 2, 1);
        let coarse = surface(key(1, 0, 0), vec![0.0, 0.0, 100.0, 100.0]);
        let neighbours = [None, None, None, Some(coarse)];
        let out = equalize_edges(&own, 2, &[0.0; 9], &neighbours).unwrap();
        assert_eq!(out[0], 50.0);
        assert_eq!(out[3], 75.0);
        assert_eq!(out[6], 100.0);
        assert_eq!(out[4], 0.0);
        assert_eq!(out[2], 0.0);
        assert_eq!(edge_signature(&own, &neighbours), [None, None, None, Some((1, 3))]);
    }

    #[test]
    fn test_east_edge_wraps_longitude() {
        let own = key(2, 3, 0);
        let coarse = surface(key(1, 0, 0), vec![10.0, 20.0, 30.0, 40.0]);
        let out = equalize_edges(&own, 2, &[0.0; 9], &[None, Some(coarse), None, None]).unwrap();
        // Own east edge lies on the coarse tile's west edge, upper half.
        assert_eq!(out[2], 10.0);
        assert_eq!(out[8], 20.0);
    }

    #[test]
    fn test_same_zoom_neighbours_untouched() {
        let own = key(2, 1, 1);
        let same = surface(key(2, 2, 1), vec![5.0; 4]);
        let neighbours = [None, Some(same), None, None];
        assert!(equalize_edges(&own, 2, &[0.0; 9], &neighbours).is_none());
        assert_eq!(edge_signature(&own, &neighbours), [None; 4]);
    }
}
