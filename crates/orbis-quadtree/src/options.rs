//! Tunables for the quad-tree and the planet driver.
//!
//! The numeric defaults are empirical. They are exposed so that callers can
//! validate them against the visual behaviour they want rather than treating
//! them as derived constants.

use orbis_math::Ellipsoid;

use crate::SubdivisionKind;

/// Default cut-off for the cheap horizon test.
pub const HORIZON_TANGENT: f64 = 0.81;

/// Default ceiling on live nodes before a memory clear is considered.
pub const MAX_NODES: usize = 200;

/// Level-of-detail selection.
#[derive(Clone, Debug, PartialEq)]
pub struct LodOptions {
    /// Split threshold in pixels when looking straight down.
    pub lod_size_near: f64,
    /// Split threshold in pixels when looking at the horizon.
    pub lod_size_far: f64,
    /// Deepest zoom the tree will subdivide to.
    pub max_node_zoom: u8,
    /// Nodes whose center normal points away from the view direction by more
    /// than this cosine are rejected without the exact horizon test.
    pub horizon_tangent: f64,
    /// The cheap horizon reject only applies from this zoom on, where tiles
    /// are small enough for the center normal to be representative.
    pub horizon_tangent_min_zoom: u8,
    /// Segment grid size (cells per side) by zoom; the last entry repeats.
    pub grid_size_by_zoom: Vec<usize>,
    /// Children not visited for this many frames are destroyed.
    pub prune_after_frames: u64,
}

impl Default for LodOptions {
    fn default() -> Self {
        Self {
            lod_size_near: 256.0,
            lod_size_far: 384.0,
            max_node_zoom: 20,
            horizon_tangent: HORIZON_TANGENT,
            horizon_tangent_min_zoom: 8,
            grid_size_by_zoom: vec![32, 32, 32, 16],
            prune_after_frames: 120,
        }
    }
}

impl LodOptions {
    pub fn grid_size(&self, zoom: u8) -> usize {
        self.grid_size_by_zoom
            .get(zoom as usize)
            .or(self.grid_size_by_zoom.last())
            .copied()
            .unwrap_or(16)
            .max(1)
    }

    /// Split threshold for a camera slope: near when looking down, far at grazing angles.
    pub fn lod_size(&self, slope: f64) -> f64 {
        orbis_math::lerp(slope.clamp(0.0, 1.0), self.lod_size_far, self.lod_size_near)
    }
}

/// The equal-zoom correction band.
#[derive(Clone, Debug, PartialEq)]
pub struct EqualZoomOptions {
    pub enabled: bool,
    /// Camera slope above which the pass may run. Slope is 1 looking
    /// straight down and 0 at the horizon, so the pass covers steep views.
    pub min_slope: f64,
    pub min_altitude: f64,
    pub max_altitude: f64,
    /// Half-width in meters of the dead band around each altitude threshold.
    pub altitude_hysteresis: f64,
    /// Half-width of the dead band around `min_slope`.
    pub slope_hysteresis: f64,
}

impl Default for EqualZoomOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            min_slope: 0.8,
            min_altitude: 10_000.0,
            max_altitude: 15_000_000.0,
            altitude_hysteresis: 500.0,
            slope_hysteresis: 0.02,
        }
    }
}

/// Transition opacity.
#[derive(Clone, Debug, PartialEq)]
pub struct FadingOptions {
    pub enabled: bool,
    /// Opacity change per frame.
    pub rate: f32,
    /// Frames a transition may wait for data before it proceeds anyway.
    pub max_hold_frames: u32,
}

impl Default for FadingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 0.1,
            max_hold_frames: 30,
        }
    }
}

/// Full-reset memory policy.
#[derive(Clone, Debug, PartialEq)]
pub struct MemoryOptions {
    pub max_nodes: usize,
    /// Camera travel in meters required since the previous clear.
    pub min_clear_distance: f64,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            max_nodes: MAX_NODES,
            min_clear_distance: 10_000.0,
        }
    }
}

/// Elevation application.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainOptions {
    /// Fallback from an ancestor at least this many zooms coarser clamps
    /// heights to sea level.
    pub sea_level_zoom_diff: u8,
    /// Failed fetches are retried at most this many times.
    pub max_retries: u32,
    /// First retry delay in frames; doubles on every failure.
    pub retry_base_frames: u64,
    pub max_in_flight: usize,
    /// Sentinels added to the provider's own.
    pub extra_no_data: Vec<f32>,
    /// Samples above this are treated as missing.
    pub max_valid_height: f32,
}

impl Default for TerrainOptions {
    fn default() -> Self {
        Self {
            sea_level_zoom_diff: 4,
            max_retries: 5,
            retry_base_frames: 8,
            max_in_flight: 64,
            extra_no_data: Vec::new(),
            max_valid_height: 50_000.0,
        }
    }
}

/// Everything a [`Planet`](crate::Planet) is configured with.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanetOptions {
    pub ellipsoid: Ellipsoid,
    pub subdivision: SubdivisionKind,
    /// Vertical exaggeration applied to elevation.
    pub height_factor: f64,
    pub lod: LodOptions,
    pub equal_zoom: EqualZoomOptions,
    pub fading: FadingOptions,
    pub memory: MemoryOptions,
    pub terrain: TerrainOptions,
}

impl Default for PlanetOptions {
    fn default() -> Self {
        Self {
            ellipsoid: Ellipsoid::wgs84(),
            subdivision: SubdivisionKind::Geographic,
            height_factor: 1.0,
            lod: LodOptions::default(),
            equal_zoom: EqualZoomOptions::default(),
            fading: FadingOptions::default(),
            memory: MemoryOptions::default(),
            terrain: TerrainOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_size_repeats_last() {
        let lod = LodOptions {
            grid_size_by_zoom: vec![64, 32],
            ..Default::default()
        };
        assert_eq!(lod.grid_size(0), 64);
        assert_eq!(lod.grid_size(1), 32);
        assert_eq!(lod.grid_size(15), 32);
    }

    #[test]
    fn test_lod_size_follows_slope() {
        let lod = LodOptions::default();
        assert_eq!(lod.lod_size(1.0), lod.lod_size_near);
        assert_eq!(lod.lod_size(0.0), lod.lod_size_far);
        assert_eq!(lod.lod_size(-0.5), lod.lod_size_far);
        let mid = lod.lod_size(0.5);
        assert!(mid > lod.lod_size_near && mid < lod.lod_size_far);
    }
}
