//! Geodetic primitives for the orbis globe: lon/lat values, extents, the
//! reference ellipsoid, bounding volumes, rays, and the high/low float split
//! used by relative-to-eye rendering.

mod bounds;
mod ellipsoid;
mod extent;
mod lonlat;
mod ray;
mod split;

pub use bounds::{BoundingBox, BoundingSphere};
pub use ellipsoid::Ellipsoid;
pub use extent::Extent;
pub use lonlat::{LonLat, MAX_MERCATOR_LAT, POLE, forward_mercator_lat, inverse_mercator_lat};
pub use ray::{Ray, ray_triangle};
pub use split::{SplitVec3, split_dvec3, split_f64, split_positions};

/// Linear interpolation `a + (b - a) * t`.
#[inline]
pub fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + (b - a) * t
}
