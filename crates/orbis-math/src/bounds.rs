//! Tile bounding volumes for frustum, horizon and picking tests.

use glam::DVec3;

use crate::{Ellipsoid, Extent};

/// Samples per side used when bounding an extent on the ellipsoid.
const EXTENT_SAMPLES: usize = 9;

/// A bounding sphere in world space (relative to the ellipsoid center).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

/// An axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl BoundingSphere {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Sphere around a point cloud, centred on the cloud's AABB center.
    pub fn from_points(points: impl IntoIterator<Item = DVec3> + Clone) -> Self {
        let aabb = BoundingBox::from_points(points.clone());
        let center = aabb.center();
        let radius_sq = points
            .into_iter()
            .map(|p| (p - center).length_squared())
            .fold(0.0_f64, f64::max);
        Self {
            center,
            radius: radius_sq.sqrt(),
        }
    }

    /// Bound an extent of the ellipsoid surface displaced between
    /// `min_height` and `max_height`.
    ///
    /// Samples a grid over the extent at both heights so that large tiles
    /// (a hemisphere, the whole globe) are bounded by their bulge, not just
    /// their corners. The radius is padded by the sagitta of the widest
    /// sample step, which covers the surface curving out between samples.
    pub fn from_extent(
        ellipsoid: &Ellipsoid,
        extent: &Extent,
        min_height: f64,
        max_height: f64,
    ) -> Self {
        let mut sphere = Self::from_points(extent_points(ellipsoid, extent, min_height, max_height));
        sphere.radius += sample_sagitta(ellipsoid, extent, max_height);
        sphere
    }

    pub fn contains_point(&self, p: DVec3) -> bool {
        (p - self.center).length_squared() <= self.radius * self.radius
    }

    /// Grow the sphere so that it also encloses `p`.
    pub fn expand_to(&mut self, p: DVec3) {
        let d = (p - self.center).length();
        if d > self.radius {
            self.radius = d;
        }
    }
}

impl BoundingBox {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
        let mut min = DVec3::splat(f64::MAX);
        let mut max = DVec3::splat(f64::MIN);
        for p in points {
            min = min.min(p);
            max = max.max(p);
        }
        Self { min, max }
    }

    /// Box around an ellipsoid extent, sampled like [`BoundingSphere::from_extent`].
    pub fn from_extent(
        ellipsoid: &Ellipsoid,
        extent: &Extent,
        min_height: f64,
        max_height: f64,
    ) -> Self {
        let pad = DVec3::splat(sample_sagitta(ellipsoid, extent, max_height));
        let bb = Self::from_points(extent_points(ellipsoid, extent, min_height, max_height));
        Self::new(bb.min - pad, bb.max + pad)
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> DVec3 {
        (self.max - self.min) * 0.5
    }

    pub fn contains_point(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// The eight corners, `min` first and `max` last.
    pub fn corners(&self) -> [DVec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            DVec3::new(a.x, a.y, a.z),
            DVec3::new(b.x, a.y, a.z),
            DVec3::new(a.x, b.y, a.z),
            DVec3::new(b.x, b.y, a.z),
            DVec3::new(a.x, a.y, b.z),
            DVec3::new(b.x, a.y, b.z),
            DVec3::new(a.x, b.y, b.z),
            DVec3::new(b.x, b.y, b.z),
        ]
    }
}

/// Largest distance between the surface and a chord joining neighbouring samples.
fn sample_sagitta(ellipsoid: &Ellipsoid, extent: &Extent, max_height: f64) -> f64 {
    let last = (EXTENT_SAMPLES - 1) as f64;
    let step = (extent.width() / last).hypot(extent.height() / last).to_radians();
    let radius = ellipsoid.a() + max_height.max(0.0);
    radius * (1.0 - (step * 0.5).min(std::f64::consts::FRAC_PI_2).cos())
}

fn extent_points(
    ellipsoid: &Ellipsoid,
    extent: &Extent,
    min_height: f64,
    max_height: f64,
) -> Vec<DVec3> {
    let last = (EXTENT_SAMPLES - 1) as f64;
    let mut points = Vec::with_capacity(EXTENT_SAMPLES * EXTENT_SAMPLES * 2);
    for j in 0..EXTENT_SAMPLES {
        for i in 0..EXTENT_SAMPLES {
            let mut ll = extent.lonlat_at(i as f64 / last, j as f64 / last);
            for h in [min_height, max_height] {
                ll.height = h;
                points.push(ellipsoid.lonlat_to_cartesian(&ll));
            }
        }
    }
    points
}
