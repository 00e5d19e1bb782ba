//! The elevation provider interface consumed by the quad-tree.

use orbis_math::LonLat;

use crate::{SampleLayout, TerrainError, TerrainRequest, TerrainTile, TilingScheme};

/// Grid resolution used when a point query has to fetch a whole tile.
const HEIGHT_QUERY_GRID: usize = 32;

/// A source of elevation tiles.
///
/// [`fetch`](Self::fetch) is called on loader threads and may block; every
/// other method must be cheap.
pub trait TerrainProvider: Send + Sync {
    fn name(&self) -> &str;

    fn is_ready(&self) -> bool {
        true
    }

    /// An empty provider renders the globe flat and is never asked for tiles.
    fn is_empty(&self) -> bool {
        false
    }

    fn min_zoom(&self) -> u8 {
        0
    }

    /// Deepest zoom with real data. Deeper segments reuse ancestor data.
    fn max_zoom(&self) -> u8;

    fn tiling(&self) -> TilingScheme {
        TilingScheme::Geographic
    }

    /// Produce raw elevation for one tile.
    fn fetch(&self, request: &TerrainRequest) -> Result<TerrainTile, TerrainError>;

    /// Elevation at a single position using data no finer than `zoom`.
    fn height_at(&self, lonlat: &LonLat, zoom: u8) -> Option<f64> {
        let tiling = self.tiling();
        let zoom = zoom.clamp(self.min_zoom(), self.max_zoom());
        let key = tiling.tile_at(lonlat, zoom);
        let request = TerrainRequest {
            key,
            extent: tiling.tile_extent(&key),
            grid_size: HEIGHT_QUERY_GRID,
            mercator_rows: tiling.mercator_rows(key.group),
        };
        let tile = self.fetch(&request).ok()?;
        tile.validate(&key).ok()?;
        let (u, v) = tiling.position_in_tile(&key, lonlat);
        let h = tile.sample_bilinear(u, v);
        (!self.no_data_values().contains(&h)).then_some(h as f64)
    }

    /// Sentinels this provider uses for missing samples.
    fn no_data_values(&self) -> &[f32] {
        &[]
    }

    /// Conservative `(min, max)` elevation of any tile, used to bound
    /// segments before their data arrives.
    fn height_bounds(&self) -> (f64, f64) {
        (0.0, 0.0)
    }

    /// Ask in-flight network work to stop. Best effort.
    fn abort_loading(&self) {}

    fn clear_cache(&self) {}
}

/// A provider without data: the globe renders as the bare ellipsoid.
#[derive(Clone, Debug, Default)]
pub struct EmptyTerrain;

impl TerrainProvider for EmptyTerrain {
    fn name(&self) -> &str {
        "empty"
    }

    fn is_empty(&self) -> bool {
        true
    }

    fn max_zoom(&self) -> u8 {
        0
    }

    fn fetch(&self, request: &TerrainRequest) -> Result<TerrainTile, TerrainError> {
        let cells = request.grid_size.max(1);
        Ok(TerrainTile::new(
            cells,
            SampleLayout::Vertices,
            vec![0.0; (cells + 1) * (cells + 1)],
        ))
    }

    fn height_at(&self, _lonlat: &LonLat, _zoom: u8) -> Option<f64> {
        Some(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TileGroup, TileKey};
    use orbis_math::Extent;

    struct Ramp;

    impl TerrainProvider for Ramp {
        fn name(&self) -> &str {
            "ramp"
        }

        fn max_zoom(&self) -> u8 {
            4
        }

        fn fetch(&self, request: &TerrainRequest) -> Result<TerrainTile, TerrainError> {
            let n = request.grid_size;
            let mut samples = Vec::with_capacity((n + 1) * (n + 1));
            for j in 0..=n {
                for i in 0..=n {
                    samples.push(request.position(i as f64 / n as f64, j as f64 / n as f64).lon as f32);
                }
            }
            Ok(TerrainTile::new(n, SampleLayout::Vertices, samples))
        }
    }

    /// The default point query samples the covering tile.
    #[test]
    fn test_default_height_at_samples_tile() {
        let h = Ramp.height_at(&LonLat::new(33.0, 10.0), 3).unwrap();
        assert!((h - 33.0).abs() < 1e-3, "got {h}");
    }

    #[test]
    fn test_empty_terrain_is_flat() {
        let empty = EmptyTerrain;
        assert!(empty.is_empty());
        let request = TerrainRequest {
            key: TileKey::root(TileGroup::Standard),
            extent: Extent::whole_globe(),
            grid_size: 4,
            mercator_rows: false,
        };
        let tile = empty.fetch(&request).unwrap();
        assert_eq!(tile.samples.len(), 25);
        assert!(tile.samples.iter().all(|&h| h == 0.0));
        assert_eq!(empty.height_at(&LonLat::new(1.0, 2.0), 10), Some(0.0));
    }
}
