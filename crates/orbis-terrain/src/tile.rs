//! Tile requests and raw elevation payloads.

use orbis_math::{Extent, LonLat, forward_mercator_lat, inverse_mercator_lat};

use crate::{TerrainError, TileKey};

/// What a segment asks its provider for.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainRequest {
    pub key: TileKey,
    pub extent: Extent,
    /// Target grid resolution (cells per side) of the requesting segment.
    pub grid_size: usize,
    /// Rows are spaced evenly in mercator `y` instead of latitude.
    pub mercator_rows: bool,
}

impl TerrainRequest {
    /// Geodetic position of normalised grid coordinates `(u, v)`, `v` from the north edge.
    pub fn position(&self, u: f64, v: f64) -> LonLat {
        if self.mercator_rows {
            let top = forward_mercator_lat(self.extent.north());
            let bottom = forward_mercator_lat(self.extent.south());
            LonLat::new(
                self.extent.west() + self.extent.width() * u,
                inverse_mercator_lat(top + (bottom - top) * v),
            )
        } else {
            self.extent.lonlat_at(u, v)
        }
    }
}

/// How samples in a [`TerrainTile`] relate to the tile's cell grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleLayout {
    /// `(cells + 1)²` samples on grid corners, edges included.
    Vertices,
    /// `cells²` samples, one per image pixel; the east and south edges are
    /// not covered and get synthesised during extraction.
    Pixels,
}

/// Raw elevation returned by a provider, row-major from the north-west corner.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainTile {
    pub cells: usize,
    pub layout: SampleLayout,
    pub samples: Vec<f32>,
}

impl TerrainTile {
    pub fn new(cells: usize, layout: SampleLayout, samples: Vec<f32>) -> Self {
        Self {
            cells,
            layout,
            samples,
        }
    }

    /// Samples per row.
    pub fn side(&self) -> usize {
        match self.layout {
            SampleLayout::Vertices => self.cells + 1,
            SampleLayout::Pixels => self.cells,
        }
    }

    pub fn expected_len(&self) -> usize {
        self.side() * self.side()
    }

    /// Reject payloads whose sample count does not match their declared shape.
    pub fn validate(&self, key: &TileKey) -> Result<(), TerrainError> {
        if self.cells == 0 || self.samples.len() != self.expected_len() {
            return Err(TerrainError::MalformedTile {
                key: *key,
                expected: self.expected_len(),
                got: self.samples.len(),
            });
        }
        Ok(())
    }

    /// Sample at raw index `(ix, iy)`, clamped into range.
    pub fn get(&self, ix: usize, iy: usize) -> f32 {
        let last = self.side() - 1;
        self.samples[iy.min(last) * self.side() + ix.min(last)]
    }

    /// Bilinear sample at normalised `(u, v)` over the tile's covered area.
    pub fn sample_bilinear(&self, u: f64, v: f64) -> f32 {
        let span = match self.layout {
            SampleLayout::Vertices => self.cells as f64,
            SampleLayout::Pixels => (self.cells - 1).max(1) as f64,
        };
        let fx = (u.clamp(0.0, 1.0) * span).min(span);
        let fy = (v.clamp(0.0, 1.0) * span).min(span);
        let (x0, y0) = (fx.floor() as usize, fy.floor() as usize);
        let (tx, ty) = ((fx - x0 as f64) as f32, (fy - y0 as f64) as f32);
        let h00 = self.get(x0, y0);
        let h10 = self.get(x0 + 1, y0);
        let h01 = self.get(x0, y0 + 1);
        let h11 = self.get(x0 + 1, y0 + 1);
        let top = h00 + (h10 - h00) * tx;
        let bottom = h01 + (h11 - h01) * tx;
        top + (bottom - top) * ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TileGroup;

    #[test]
    fn test_validate_sample_count() {
        let key = TileKey::root(TileGroup::Standard);
        let good = TerrainTile::new(2, SampleLayout::Vertices, vec![0.0; 9]);
        assert!(good.validate(&key).is_ok());
        let pixels = TerrainTile::new(2, SampleLayout::Pixels, vec![0.0; 4]);
        assert!(pixels.validate(&key).is_ok());
        let bad = TerrainTile::new(2, SampleLayout::Vertices, vec![0.0; 8]);
        assert!(matches!(
            bad.validate(&key),
            Err(TerrainError::MalformedTile { expected: 9, got: 8, .. })
        ));
    }

    #[test]
    fn test_bilinear_center() {
        let tile = TerrainTile::new(1, SampleLayout::Vertices, vec![0.0, 10.0, 20.0, 30.0]);
        assert_eq!(tile.sample_bilinear(0.0, 0.0), 0.0);
        assert_eq!(tile.sample_bilinear(1.0, 1.0), 30.0);
        assert_eq!(tile.sample_bilinear(0.5, 0.5), 15.0);
    }

    #[test]
    fn test_mercator_request_positions() {
        let request = TerrainRequest {
            key: TileKey::root(TileGroup::Standard),
            extent: Extent::from_degrees(-180.0, -60.0, 180.0, 60.0),
            grid_size: 4,
            mercator_rows: true,
        };
        let mid = request.position(0.5, 0.5);
        assert!(mid.lat.abs() < 1e-9);
        let top = request.position(0.0, 0.0);
        assert!((top.lat - 60.0).abs() < 1e-9);
        // A quarter of the way down in mercator space is well above 30°.
        assert!(request.position(0.0, 0.25).lat > 30.0);
    }
}
