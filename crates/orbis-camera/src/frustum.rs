//! A single perspective frustum of the camera's depth cascade.
//!
//! Each frustum carries its own near/far range and projection matrix. Planes
//! are extracted from the combined view-projection with the Griggs-Hartmann
//! method and tested against world-space bounding volumes in `f64`.

use glam::{DMat4, DVec3, DVec4, Mat4};
use orbis_math::{BoundingBox, BoundingSphere};

const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
const NEAR: usize = 4;
const FAR: usize = 5;

#[derive(Clone, Debug)]
pub struct Frustum {
    /// Position of this frustum in the camera's cascade.
    pub index: usize,
    near: f64,
    far: f64,
    /// Vertical field of view in radians.
    fov_y: f64,
    aspect: f64,
    projection: DMat4,
    view_projection: DMat4,
    /// Six inward-facing planes `(n, d)`, normalised so that `n·p + d` is a distance.
    planes: [DVec4; 6],
}

impl Frustum {
    /// Create a frustum. `fov_y_degrees` is the vertical view angle.
    pub fn new(index: usize, fov_y_degrees: f64, aspect: f64, near: f64, far: f64) -> Self {
        debug_assert!(near > 0.0 && far > near, "invalid frustum range {near}..{far}");
        let mut frustum = Self {
            index,
            near,
            far,
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            projection: DMat4::IDENTITY,
            view_projection: DMat4::IDENTITY,
            planes: [DVec4::ZERO; 6],
        };
        frustum.rebuild_projection();
        frustum
    }

    /// Change field of view and aspect ratio, keeping the near/far split.
    pub fn set_projection(&mut self, fov_y_degrees: f64, aspect: f64) {
        self.fov_y = fov_y_degrees.to_radians();
        self.aspect = aspect;
        self.rebuild_projection();
    }

    fn rebuild_projection(&mut self) {
        self.projection = DMat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
    }

    /// Recompute view-projection and planes for a new view matrix.
    pub fn update(&mut self, view: &DMat4) {
        self.view_projection = self.projection * *view;
        let vp = &self.view_projection;
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];

        self.planes[LEFT] = rows[3] + rows[0];
        self.planes[RIGHT] = rows[3] - rows[0];
        self.planes[BOTTOM] = rows[3] + rows[1];
        self.planes[TOP] = rows[3] - rows[1];
        // Depth range is [0, 1].
        self.planes[NEAR] = rows[2];
        self.planes[FAR] = rows[3] - rows[2];

        for plane in &mut self.planes {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }
    }

    pub fn near(&self) -> f64 {
        self.near
    }

    pub fn far(&self) -> f64 {
        self.far
    }

    pub fn projection(&self) -> &DMat4 {
        &self.projection
    }

    pub fn view_projection(&self) -> &DMat4 {
        &self.view_projection
    }

    /// Single-precision projection matrix for the render path.
    pub fn projection_f32(&self) -> Mat4 {
        Mat4::from_cols_array(&self.projection.to_cols_array().map(|v| v as f32))
    }

    fn distance(plane: &DVec4, p: DVec3) -> f64 {
        plane.truncate().dot(p) + plane.w
    }

    pub fn contains_point(&self, p: DVec3) -> bool {
        self.planes.iter().all(|plane| Self::distance(plane, p) >= 0.0)
    }

    /// Whether the sphere intersects the frustum (conservative near corners).
    pub fn contains_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|plane| Self::distance(plane, sphere.center) >= -sphere.radius)
    }

    /// p-vertex test: for each plane the box corner furthest along the normal
    /// must not be behind it.
    pub fn contains_box(&self, bbox: &BoundingBox) -> bool {
        for plane in &self.planes {
            let n = plane.truncate();
            let p = DVec3::new(
                if n.x >= 0.0 { bbox.max.x } else { bbox.min.x },
                if n.y >= 0.0 { bbox.max.y } else { bbox.min.y },
                if n.z >= 0.0 { bbox.max.z } else { bbox.min.z },
            );
            if Self::distance(plane, p) < 0.0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Camera at the origin looking down -Z.
    fn make_frustum(near: f64, far: f64) -> Frustum {
        let mut f = Frustum::new(0, 60.0, 1.0, near, far);
        f.update(&DMat4::look_to_rh(DVec3::ZERO, DVec3::NEG_Z, DVec3::Y));
        f
    }

    #[test]
    fn test_point_in_front_is_inside() {
        let f = make_frustum(1.0, 100.0);
        assert!(f.contains_point(DVec3::new(0.0, 0.0, -10.0)));
    }

    #[test]
    fn test_point_behind_is_outside() {
        let f = make_frustum(1.0, 100.0);
        assert!(!f.contains_point(DVec3::new(0.0, 0.0, 10.0)));
    }

    #[test]
    fn test_near_and_far_planes() {
        let f = make_frustum(10.0, 100.0);
        assert!(!f.contains_point(DVec3::new(0.0, 0.0, -5.0)));
        assert!(f.contains_point(DVec3::new(0.0, 0.0, -50.0)));
        assert!(!f.contains_point(DVec3::new(0.0, 0.0, -150.0)));
    }

    #[test]
    fn test_sphere_straddling_side_plane() {
        let f = make_frustum(1.0, 100.0);
        // Center just outside the right plane, radius reaches back in.
        let outside = DVec3::new(20.0, 0.0, -10.0);
        assert!(!f.contains_point(outside));
        assert!(f.contains_sphere(&BoundingSphere::new(outside, 15.0)));
        assert!(!f.contains_sphere(&BoundingSphere::new(outside, 1.0)));
    }

    #[test]
    fn test_box_p_vertex() {
        let f = make_frustum(1.0, 100.0);
        let inside = BoundingBox::new(DVec3::new(-1.0, -1.0, -20.0), DVec3::new(1.0, 1.0, -10.0));
        assert!(f.contains_box(&inside));
        let behind = BoundingBox::new(DVec3::new(-1.0, -1.0, 5.0), DVec3::new(1.0, 1.0, 10.0));
        assert!(!f.contains_box(&behind));
    }

    /// Planet-scale coordinates stay exact in f64.
    #[test]
    fn test_planet_scale_sphere() {
        let eye = DVec3::new(6_378_137.0 * 3.0, 0.0, 0.0);
        let mut f = Frustum::new(3, 60.0, 1.5, 1e6, 1e9);
        f.update(&DMat4::look_to_rh(eye, DVec3::NEG_X, DVec3::Z));
        assert!(f.contains_sphere(&BoundingSphere::new(DVec3::ZERO, 6_378_137.0)));
        assert!(!f.contains_sphere(&BoundingSphere::new(eye * 2.0, 1000.0)));
    }

    #[test]
    fn test_projection_f32_matches() {
        let f = Frustum::new(0, 45.0, 1.0, 1.0, 1000.0);
        let m = f.projection_f32();
        assert!((m.x_axis.x as f64 - f.projection().x_axis.x).abs() < 1e-6);
    }
}
