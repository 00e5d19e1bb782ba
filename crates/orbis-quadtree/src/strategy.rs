//! Subdivision strategies.
//!
//! A single [`Node`](crate::Node) type is parameterised by the strategy of
//! its root. The strategy decides how an extent splits into four children,
//! where grid vertices sit inside an extent, how a node is bounded and
//! whether it is visible.

use std::fmt;
use std::sync::Arc;

use glam::DVec3;
use orbis_camera::Camera;
use orbis_math::{
    BoundingSphere, Ellipsoid, Extent, LonLat, MAX_MERCATOR_LAT, forward_mercator_lat,
    inverse_mercator_lat,
};
use orbis_terrain::{TileGroup, TileKey, TilingScheme};

use crate::horizon;

/// Position of a node among its siblings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartId {
    Nw,
    Ne,
    Sw,
    Se,
    Root,
}

impl PartId {
    pub const CHILDREN: [PartId; 4] = [PartId::Nw, PartId::Ne, PartId::Sw, PartId::Se];
}

/// One child produced by [`SubdivisionStrategy::create_child_nodes`].
#[derive(Clone, Debug, PartialEq)]
pub struct ChildSpec {
    pub part: PartId,
    pub key: TileKey,
    pub extent: Extent,
}

/// Camera-dependent inputs of the visibility test.
#[derive(Clone, Copy, Debug)]
pub struct CullContext<'a> {
    pub camera: &'a Camera,
    pub horizon_tangent: f64,
    pub horizon_tangent_min_zoom: u8,
}

pub trait SubdivisionStrategy: Send + Sync + fmt::Debug {
    fn group(&self) -> TileGroup;

    fn root_extent(&self) -> Extent;

    /// Whether grid rows are spaced evenly in mercator `y`.
    fn mercator_rows(&self) -> bool {
        false
    }

    /// Dividing longitude and latitude of an extent.
    fn split_point(&self, extent: &Extent) -> (f64, f64) {
        let c = extent.center();
        (c.lon, c.lat)
    }

    /// The four children of `key`, in `[NW, NE, SW, SE]` order.
    fn create_child_nodes(&self, key: &TileKey, extent: &Extent) -> [ChildSpec; 4] {
        let (mid_lon, mid_lat) = self.split_point(extent);
        let extents = extent.split_at(mid_lon, mid_lat);
        let keys = key.children();
        std::array::from_fn(|i| ChildSpec {
            part: PartId::CHILDREN[i],
            key: keys[i],
            extent: extents[i],
        })
    }

    fn is_inside(&self, extent: &Extent, lonlat: &LonLat) -> bool {
        extent.contains(&lonlat.normalized())
    }

    /// Frustum bitmask of a node, `0` when culled.
    ///
    /// The horizon tests are skipped while the camera is above the extent.
    fn is_visible(
        &self,
        ctx: &CullContext<'_>,
        extent: &Extent,
        bounds: &BoundingSphere,
        max_height: f64,
        zoom: u8,
    ) -> u32 {
        let camera = ctx.camera;
        if !self.is_inside(extent, camera.lonlat()) {
            let ellipsoid = camera.ellipsoid();
            if zoom >= ctx.horizon_tangent_min_zoom {
                let normal = ellipsoid.lonlat_normal(&self.center(extent));
                if horizon::faces_away(normal, camera.backward(), ctx.horizon_tangent) {
                    return 0;
                }
            }
            if horizon::extent_below_horizon(
                ellipsoid,
                camera.eye(),
                camera.lonlat(),
                extent,
                max_height,
            ) {
                return 0;
            }
        }
        camera.in_frustum_mask(bounds)
    }

    /// Bounding sphere of the extent displaced between the two heights.
    fn set_extent_bounds(
        &self,
        ellipsoid: &Ellipsoid,
        extent: &Extent,
        min_height: f64,
        max_height: f64,
    ) -> BoundingSphere {
        BoundingSphere::from_extent(ellipsoid, extent, min_height, max_height)
    }

    /// Geodetic position of grid vertex `(i, j)`, `j` counted from the north edge.
    fn grid_lonlat(&self, extent: &Extent, grid: usize, i: usize, j: usize) -> LonLat {
        let g = grid as f64;
        extent.lonlat_at(i as f64 / g, j as f64 / g)
    }

    /// Geodetic center of an extent in this strategy's row spacing.
    fn center(&self, extent: &Extent) -> LonLat {
        let (lon, lat) = self.split_point(extent);
        LonLat::new(lon, lat)
    }
}

/// One root over the whole globe split at lon/lat midpoints.
#[derive(Clone, Copy, Debug, Default)]
pub struct GeographicStrategy;

impl SubdivisionStrategy for GeographicStrategy {
    fn group(&self) -> TileGroup {
        TileGroup::Standard
    }

    fn root_extent(&self) -> Extent {
        Extent::whole_globe()
    }
}

/// Web-mercator square split at mercator-space midpoints.
#[derive(Clone, Copy, Debug, Default)]
pub struct MercatorStrategy;

impl SubdivisionStrategy for MercatorStrategy {
    fn group(&self) -> TileGroup {
        TileGroup::Standard
    }

    fn root_extent(&self) -> Extent {
        Extent::from_degrees(-180.0, -MAX_MERCATOR_LAT, 180.0, MAX_MERCATOR_LAT)
    }

    fn mercator_rows(&self) -> bool {
        true
    }

    fn split_point(&self, extent: &Extent) -> (f64, f64) {
        let top = forward_mercator_lat(extent.north());
        let bottom = forward_mercator_lat(extent.south());
        (
            (extent.west() + extent.east()) * 0.5,
            inverse_mercator_lat((top + bottom) * 0.5),
        )
    }

    fn grid_lonlat(&self, extent: &Extent, grid: usize, i: usize, j: usize) -> LonLat {
        let g = grid as f64;
        let top = forward_mercator_lat(extent.north());
        let bottom = forward_mercator_lat(extent.south());
        LonLat::new(
            extent.west() + extent.width() * (i as f64 / g),
            inverse_mercator_lat(top + (bottom - top) * (j as f64 / g)),
        )
    }
}

/// Polar cap beyond the mercator limit, split at lon/lat midpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolarCapStrategy {
    North,
    South,
}

impl SubdivisionStrategy for PolarCapStrategy {
    fn group(&self) -> TileGroup {
        match self {
            PolarCapStrategy::North => TileGroup::North,
            PolarCapStrategy::South => TileGroup::South,
        }
    }

    fn root_extent(&self) -> Extent {
        match self {
            PolarCapStrategy::North => Extent::from_degrees(-180.0, MAX_MERCATOR_LAT, 180.0, 90.0),
            PolarCapStrategy::South => {
                Extent::from_degrees(-180.0, -90.0, 180.0, -MAX_MERCATOR_LAT)
            }
        }
    }
}

/// Which set of roots a planet is built from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubdivisionKind {
    /// A single whole-globe root.
    #[default]
    Geographic,
    /// Mercator square plus north and south caps.
    MercatorWithPoles,
}

impl SubdivisionKind {
    pub fn roots(&self) -> Vec<Arc<dyn SubdivisionStrategy>> {
        match self {
            SubdivisionKind::Geographic => vec![Arc::new(GeographicStrategy)],
            SubdivisionKind::MercatorWithPoles => vec![
                Arc::new(MercatorStrategy),
                Arc::new(PolarCapStrategy::North),
                Arc::new(PolarCapStrategy::South),
            ],
        }
    }

    /// The terrain tiling that addresses the same tiles.
    pub fn tiling(&self) -> TilingScheme {
        match self {
            SubdivisionKind::Geographic => TilingScheme::Geographic,
            SubdivisionKind::MercatorWithPoles => TilingScheme::Mercator,
        }
    }
}

/// Cartesian position of a grid vertex at `height`.
pub fn grid_position(
    strategy: &dyn SubdivisionStrategy,
    ellipsoid: &Ellipsoid,
    extent: &Extent,
    grid: usize,
    i: usize,
    j: usize,
    height: f64,
) -> DVec3 {
    let mut ll = strategy.grid_lonlat(extent, grid, i, j);
    ll.height = height;
    ellipsoid.lonlat_to_cartesian(&ll)
}
