//! Horizon culling against the ellipsoid.

use glam::DVec3;
use orbis_math::{Ellipsoid, Extent, LonLat};

/// Whether `point` is hidden behind the ellipsoid as seen from `eye`.
///
/// Works in the scaled space where the ellipsoid is the unit sphere: the
/// point is occluded when it lies beyond the horizon plane and inside the
/// cone tangent to the sphere. An eye inside the ellipsoid sees everything.
pub fn is_occluded(ellipsoid: &Ellipsoid, eye: DVec3, point: DVec3) -> bool {
    let inv = ellipsoid.inv_radii();
    let cv = eye * inv;
    let vh_mag_sq = cv.length_squared() - 1.0;
    if vh_mag_sq <= 0.0 {
        return false;
    }
    let vt = point * inv - cv;
    let vt_dot_vc = -vt.dot(cv);
    vt_dot_vc > vh_mag_sq && vt_dot_vc * vt_dot_vc / vt.length_squared() > vh_mag_sq
}

fn unit_dir(lon: f64, lat: f64) -> DVec3 {
    let (sin_lat, cos_lat) = lat.to_radians().sin_cos();
    let (sin_lon, cos_lon) = lon.to_radians().sin_cos();
    DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
}

/// Wrap a longitude difference into `[-180, 180)`.
fn wrap_lon(d: f64) -> f64 {
    (d + 180.0).rem_euclid(360.0) - 180.0
}

/// The point of `extent` angularly closest to the direction `(lon, lat)`.
///
/// Along a parallel edge the closest longitude is the clamped one; along a
/// meridian the closest latitude solves `tan φ = tan φc / cos Δλ`.
pub fn nearest_lonlat(extent: &Extent, target: &LonLat) -> LonLat {
    let t = target.normalized();
    let inside_lon = t.lon >= extent.west() && t.lon <= extent.east();
    if inside_lon {
        return LonLat::new(t.lon, t.lat.clamp(extent.south(), extent.north()));
    }

    let target_dir = unit_dir(t.lon, t.lat);
    let lat_rad = t.lat.to_radians();
    let mut best = LonLat::new(extent.west(), extent.south());
    let mut best_dot = f64::NEG_INFINITY;
    for lon in [extent.west(), extent.east()] {
        let dl = wrap_lon(t.lon - lon).to_radians();
        let stationary = (lat_rad.tan() / dl.cos()).atan().to_degrees();
        let candidates = [
            stationary.clamp(extent.south(), extent.north()),
            extent.south(),
            extent.north(),
        ];
        for lat in candidates {
            let d = unit_dir(lon, lat).dot(target_dir);
            if d > best_dot {
                best_dot = d;
                best = LonLat::new(lon, lat);
            }
        }
    }
    best
}

/// Whether every point of `extent`, raised to `max_height`, is below the horizon.
///
/// Tests the least occluded candidate, the extent point closest to the
/// eye's own geodetic direction.
pub fn extent_below_horizon(
    ellipsoid: &Ellipsoid,
    eye: DVec3,
    eye_lonlat: &LonLat,
    extent: &Extent,
    max_height: f64,
) -> bool {
    let mut nearest = nearest_lonlat(extent, eye_lonlat);
    nearest.height = max_height.max(0.0);
    is_occluded(ellipsoid, eye, ellipsoid.lonlat_to_cartesian(&nearest))
}

/// Cheap reject: the tile normal points away from the viewer along the view axis.
pub fn faces_away(center_normal: DVec3, camera_backward: DVec3, tangent: f64) -> bool {
    center_normal.dot(camera_backward) < -tangent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_far_side_point_occluded() {
        let e = Ellipsoid::sphere(1.0);
        let eye = DVec3::new(4.0, 0.0, 0.0);
        assert!(is_occluded(&e, eye, DVec3::new(-1.0, 0.0, 0.0)));
        assert!(is_occluded(&e, eye, DVec3::new(0.0, 1.0, 0.0)));
        assert!(!is_occluded(&e, eye, DVec3::new(1.0, 0.0, 0.0)));
        // Horizon sits at acos(1/4) ≈ 75.5° from the sub-camera point.
        let near_horizon = unit_dir(70.0, 0.0);
        assert!(!is_occluded(&e, eye, near_horizon));
    }

    #[test]
    fn test_eye_inside_sees_everything() {
        let e = Ellipsoid::sphere(1.0);
        assert!(!is_occluded(&e, DVec3::new(0.5, 0.0, 0.0), DVec3::new(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_nearest_lonlat_on_parallel_edge() {
        let extent = Extent::from_degrees(-10.0, 20.0, 10.0, 30.0);
        let p = nearest_lonlat(&extent, &LonLat::new(5.0, 0.0));
        assert_eq!((p.lon, p.lat), (5.0, 20.0));
    }

    #[test]
    fn test_nearest_lonlat_on_meridian_edge() {
        let extent = Extent::from_degrees(90.0, -45.0, 180.0, 0.0);
        let p = nearest_lonlat(&extent, &LonLat::new(0.0, 0.0));
        assert_eq!(p.lon, 90.0);
        assert!(p.lat.abs() < 1e-9);
    }

    /// Across the antimeridian the closer edge is picked by wrapped distance.
    #[test]
    fn test_nearest_lonlat_wraps() {
        let extent = Extent::from_degrees(-180.0, -10.0, -170.0, 10.0);
        let p = nearest_lonlat(&extent, &LonLat::new(175.0, 0.0));
        assert_eq!(p.lon, -180.0);
    }

    #[test]
    fn test_extent_below_horizon() {
        let e = Ellipsoid::sphere(1_000.0);
        let eye = DVec3::new(4_000.0, 0.0, 0.0);
        let eye_ll = e.cartesian_to_lonlat(eye);
        let far = Extent::from_degrees(90.0, 0.0, 180.0, 45.0);
        let near = Extent::from_degrees(0.0, 45.0, 90.0, 90.0);
        assert!(extent_below_horizon(&e, eye, &eye_ll, &far, 0.0));
        assert!(!extent_below_horizon(&e, eye, &eye_ll, &near, 0.0));
        // A tall enough mountain pokes above the horizon.
        assert!(!extent_below_horizon(&e, eye, &eye_ll, &far, 1_000.0));
    }

    #[test]
    fn test_faces_away() {
        assert!(faces_away(-DVec3::X, DVec3::X, 0.81));
        assert!(!faces_away(DVec3::Y, DVec3::X, 0.81));
    }
}
