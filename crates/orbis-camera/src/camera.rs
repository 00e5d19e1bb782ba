//! Globe camera with a cascade of depth frustums.
//!
//! World space is Earth-centred and Earth-fixed in `f64`. The camera keeps an
//! orthonormal basis (`right`, `up`, `back`) and derives from it the view
//! matrix, the frustum planes, its geodetic position and the slope to the
//! ground. Single-precision data is only produced at the render boundary.

use glam::{DMat4, DVec2, DVec3, Mat4};
use orbis_math::{BoundingSphere, Ellipsoid, LonLat, Ray, SplitVec3, split_dvec3};

use crate::Frustum;

/// Default near/far cascade in meters, from the eye outwards.
pub const DEFAULT_FRUSTUMS: [(f64, f64); 4] = [
    (1.0, 100.0 + 0.075),
    (100.0, 1000.0 + 0.075),
    (1000.0, 1e6 + 10_000.0),
    (1e6, 1e9),
];

/// Smallest viewport side considered by the projected-size metric.
const MIN_PROJ_SIDE: f64 = 512.0;

/// Construction parameters for a [`Camera`].
#[derive(Clone, Debug, PartialEq)]
pub struct CameraOptions {
    /// Vertical view angle in degrees.
    pub view_angle: f64,
    /// Viewport width in pixels.
    pub width: f64,
    /// Viewport height in pixels.
    pub height: f64,
    /// Near/far ranges of the frustum cascade.
    pub frustums: Vec<(f64, f64)>,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            view_angle: 47.0,
            width: 1280.0,
            height: 720.0,
            frustums: DEFAULT_FRUSTUMS.to_vec(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Camera {
    ellipsoid: Ellipsoid,
    eye: DVec3,
    right: DVec3,
    up: DVec3,
    back: DVec3,
    view_angle: f64,
    width: f64,
    height: f64,
    frustums: Vec<Frustum>,
    view: DMat4,
    proj_size_const: f64,
    lonlat: LonLat,
    eye_norm: DVec3,
    slope: f64,
}

impl Camera {
    pub fn new(ellipsoid: Ellipsoid, options: &CameraOptions) -> Self {
        let aspect = options.width / options.height.max(1.0);
        let frustums = options
            .frustums
            .iter()
            .enumerate()
            .map(|(i, &(near, far))| Frustum::new(i, options.view_angle, aspect, near, far))
            .collect();

        let mut camera = Self {
            ellipsoid,
            eye: DVec3::new(ellipsoid.a() * 3.0, 0.0, 0.0),
            right: DVec3::Y,
            up: DVec3::Z,
            back: DVec3::X,
            view_angle: options.view_angle,
            width: options.width,
            height: options.height,
            frustums,
            view: DMat4::IDENTITY,
            proj_size_const: 0.0,
            lonlat: LonLat::default(),
            eye_norm: DVec3::X,
            slope: 1.0,
        };
        camera.refresh_proj_size_const();
        camera.update();
        camera
    }

    /// Place the eye at `eye` looking at `look`, with `up` as the approximate up hint.
    ///
    /// When `up` is parallel to the view direction the ellipsoid's north axis
    /// is used instead.
    pub fn set(&mut self, eye: DVec3, look: DVec3, up: DVec3) {
        self.eye = eye;
        let forward = (look - eye).normalize_or_zero();
        if forward == DVec3::ZERO {
            return;
        }
        self.back = -forward;
        let mut right = forward.cross(up);
        if right.length_squared() < 1e-20 {
            right = forward.cross(DVec3::Z);
            if right.length_squared() < 1e-20 {
                right = forward.cross(DVec3::Y);
            }
        }
        self.right = right.normalize();
        self.up = self.back.cross(self.right).normalize();
        self.update();
    }

    /// Look at `target` from `eye`, both geodetic, keeping geodetic up at the eye.
    pub fn look_at_lonlat(&mut self, eye: &LonLat, target: &LonLat) {
        let eye_cart = self.ellipsoid.lonlat_to_cartesian(eye);
        let target_cart = self.ellipsoid.lonlat_to_cartesian(target);
        let up = self.ellipsoid.geodetic_surface_normal(eye_cart);
        self.set(eye_cart, target_cart, up);
    }

    /// Hover over `position` looking straight down, north up on screen.
    pub fn look_down_at(&mut self, position: &LonLat) {
        let eye = self.ellipsoid.lonlat_to_cartesian(position);
        let ground = self.ellipsoid.lonlat_to_cartesian(&LonLat::new(position.lon, position.lat));
        let north = DVec3::Z;
        let target = if (eye - ground).length_squared() > 1e-6 {
            ground
        } else {
            eye - self.ellipsoid.geodetic_surface_normal(eye)
        };
        self.set(eye, target, north);
    }

    /// Recompute view matrix, frustum planes, geodetic position and slope.
    pub fn update(&mut self) {
        self.view = DMat4::look_to_rh(self.eye, -self.back, self.up);
        for frustum in &mut self.frustums {
            frustum.update(&self.view);
        }
        self.lonlat = self.ellipsoid.cartesian_to_lonlat(self.eye);
        self.eye_norm = self.ellipsoid.geodetic_surface_normal(self.eye);
        self.slope = self.back.dot(self.eye_norm);
    }

    /// Resize the viewport; frustum projections follow.
    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.rebuild_frustums();
    }

    /// Change the vertical view angle (degrees); frustum projections follow.
    pub fn set_view_angle(&mut self, degrees: f64) {
        self.view_angle = degrees;
        self.rebuild_frustums();
    }

    fn rebuild_frustums(&mut self) {
        let aspect = self.aspect();
        for frustum in &mut self.frustums {
            frustum.set_projection(self.view_angle, aspect);
            frustum.update(&self.view);
        }
        self.refresh_proj_size_const();
    }

    fn refresh_proj_size_const(&mut self) {
        let side = self.width.max(MIN_PROJ_SIDE).min(self.height.max(MIN_PROJ_SIDE));
        self.proj_size_const = side / self.view_angle.to_radians();
    }

    /// Screen-space size metric of a sphere: `atan(radius / distance) * projSizeConst`.
    ///
    /// Strictly decreasing in distance and strictly increasing in radius.
    pub fn projected_size(&self, point: DVec3, radius: f64) -> f64 {
        let distance = self.eye.distance(point);
        (radius / distance).atan() * self.proj_size_const
    }

    /// Bitmask of cascade frustums intersecting `sphere` (bit `i` for frustum `i`).
    pub fn in_frustum_mask(&self, sphere: &BoundingSphere) -> u32 {
        self.frustums
            .iter()
            .filter(|f| f.contains_sphere(sphere))
            .fold(0, |mask, f| mask | (1 << f.index))
    }

    /// Project a world point to pixel coordinates (origin top-left).
    ///
    /// `None` when the point is behind the eye.
    pub fn project(&self, point: DVec3) -> Option<DVec2> {
        let frustum = self.frustums.first()?;
        let clip = *frustum.view_projection() * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(DVec2::new(
            (ndc.x + 1.0) * 0.5 * self.width,
            (1.0 - ndc.y) * 0.5 * self.height,
        ))
    }

    /// World-space unit direction through a pixel.
    pub fn unproject(&self, px: DVec2) -> DVec3 {
        let ndc_x = 2.0 * px.x / self.width - 1.0;
        let ndc_y = 1.0 - 2.0 * px.y / self.height;
        let tan_half = (self.view_angle.to_radians() * 0.5).tan();
        let dir = -self.back
            + self.right * (ndc_x * tan_half * self.aspect())
            + self.up * (ndc_y * tan_half);
        dir.normalize_or_zero()
    }

    /// Ray from the eye through a pixel.
    pub fn ray_from_pixel(&self, px: DVec2) -> Ray {
        Ray::new(self.eye, self.unproject(px))
    }

    /// Eye position split for relative-to-eye rendering.
    pub fn eye_split(&self) -> SplitVec3 {
        split_dvec3(self.eye)
    }

    /// Single-precision view matrix with the eye at the origin. Pairs with
    /// [`eye_split`](Self::eye_split): the shader subtracts the split eye from
    /// split vertex positions and applies this rotation.
    pub fn view_rte_f32(&self) -> Mat4 {
        let rot = DMat4::look_to_rh(DVec3::ZERO, -self.back, self.up);
        Mat4::from_cols_array(&rot.to_cols_array().map(|v| v as f32))
    }

    pub fn eye(&self) -> DVec3 {
        self.eye
    }

    pub fn forward(&self) -> DVec3 {
        -self.back
    }

    pub fn backward(&self) -> DVec3 {
        self.back
    }

    pub fn right(&self) -> DVec3 {
        self.right
    }

    pub fn up(&self) -> DVec3 {
        self.up
    }

    /// Dot of the backward vector with geodetic up at the eye: 1 looking
    /// straight down, 0 looking at the horizon.
    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn lonlat(&self) -> &LonLat {
        &self.lonlat
    }

    /// Altitude above the ellipsoid.
    pub fn altitude(&self) -> f64 {
        self.lonlat.height
    }

    pub fn eye_norm(&self) -> DVec3 {
        self.eye_norm
    }

    pub fn frustums(&self) -> &[Frustum] {
        &self.frustums
    }

    pub fn frustum_count(&self) -> usize {
        self.frustums.len()
    }

    pub fn view_angle(&self) -> f64 {
        self.view_angle
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn aspect(&self) -> f64 {
        self.width / self.height.max(1.0)
    }

    pub fn proj_size_const(&self) -> f64 {
        self.proj_size_const
    }

    pub fn view_matrix(&self) -> &DMat4 {
        &self.view
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn earth_camera() -> Camera {
        Camera::new(Ellipsoid::wgs84(), &CameraOptions::default())
    }

    /// projSizeConst uses the smaller viewport side, floored at 512 px.
    #[test]
    fn test_proj_size_const() {
        let mut cam = earth_camera();
        cam.set_viewport_size(1920.0, 1080.0);
        cam.set_view_angle(45.0);
        let expected = 1080.0 / 45.0_f64.to_radians();
        assert!((cam.proj_size_const() - expected).abs() < 1e-9);

        cam.set_viewport_size(300.0, 200.0);
        let expected = 512.0 / 45.0_f64.to_radians();
        assert!((cam.proj_size_const() - expected).abs() < 1e-9);
    }

    /// Projected size falls strictly with distance and rises strictly with radius.
    #[test]
    fn test_projected_size_monotonic() {
        let mut cam = earth_camera();
        cam.set(DVec3::ZERO, DVec3::NEG_Z, DVec3::Y);
        let mut last = f64::INFINITY;
        for d in [1.0, 10.0, 100.0, 1e3, 1e5, 1e7] {
            let s = cam.projected_size(DVec3::new(0.0, 0.0, -d), 50.0);
            assert!(s < last, "size {s} at {d} not below {last}");
            last = s;
        }
        let mut last = 0.0;
        for r in [1.0, 10.0, 100.0, 1e3, 1e5] {
            let s = cam.projected_size(DVec3::new(0.0, 0.0, -1000.0), r);
            assert!(s > last);
            last = s;
        }
    }

    /// Looking straight down gives slope 1, looking along the horizon gives 0.
    #[test]
    fn test_slope() {
        let mut cam = earth_camera();
        cam.look_down_at(&LonLat::with_height(10.0, 20.0, 5000.0));
        assert!((cam.slope() - 1.0).abs() < 1e-9, "slope {}", cam.slope());

        let eye = LonLat::with_height(0.0, 0.0, 100.0);
        let eye_cart = cam.ellipsoid().lonlat_to_cartesian(&eye);
        cam.set(eye_cart, eye_cart + DVec3::Z * 1000.0, DVec3::X);
        assert!(cam.slope().abs() < 1e-9);
    }

    #[test]
    fn test_altitude_and_lonlat() {
        let mut cam = earth_camera();
        cam.look_down_at(&LonLat::with_height(-45.0, 30.0, 12_000.0));
        assert!((cam.altitude() - 12_000.0).abs() < 1e-3);
        assert!((cam.lonlat().lon + 45.0).abs() < 1e-9);
        assert!((cam.lonlat().lat - 30.0).abs() < 1e-7);
    }

    /// Unprojecting the viewport center gives the forward vector and
    /// project/unproject agree.
    #[test]
    fn test_project_unproject() {
        let mut cam = earth_camera();
        cam.look_down_at(&LonLat::with_height(0.0, 0.0, 1_000_000.0));
        let center = DVec2::new(cam.width() * 0.5, cam.height() * 0.5);
        assert!((cam.unproject(center) - cam.forward()).length() < 1e-12);

        let px = DVec2::new(300.0, 200.0);
        let p = cam.eye() + cam.unproject(px) * 5000.0;
        let back = cam.project(p).unwrap();
        assert!((back - px).length() < 1e-6, "{back:?}");

        let behind = cam.eye() - cam.forward() * 10.0;
        assert!(cam.project(behind).is_none());
    }

    /// The whole globe seen from afar lands in the outermost frustum only.
    #[test]
    fn test_in_frustum_mask() {
        let mut cam = earth_camera();
        let e = *cam.ellipsoid();
        cam.look_down_at(&LonLat::with_height(0.0, 0.0, e.a() * 2.0));
        let globe = BoundingSphere::new(DVec3::ZERO, e.a());
        assert_eq!(cam.in_frustum_mask(&globe), 1 << 3);

        let behind = BoundingSphere::new(cam.eye() * 2.0, 10.0);
        assert_eq!(cam.in_frustum_mask(&behind), 0);
    }

    #[test]
    fn test_eye_split_recombines() {
        let mut cam = earth_camera();
        cam.look_down_at(&LonLat::with_height(12.3, 45.6, 789.0));
        let split = cam.eye_split();
        assert!((split.to_dvec3() - cam.eye()).length() < 1e-6);
    }

    /// Eye-relative positions through the `f32` matrix land where the full
    /// `f64` view puts them.
    #[test]
    fn test_view_rte_matches_view() {
        let mut cam = earth_camera();
        cam.look_down_at(&LonLat::with_height(100.0, -35.0, 2_000.0));
        let p = cam.ellipsoid().lonlat_to_cartesian(&LonLat::with_height(100.01, -35.0, 150.0));
        let expected = cam.view_matrix().transform_point3(p);
        let rel = (p - cam.eye()).as_vec3();
        let got = cam.view_rte_f32().transform_point3(rel).as_dvec3();
        assert!((got - expected).length() < 0.01, "{got:?} vs {expected:?}");
    }
}
