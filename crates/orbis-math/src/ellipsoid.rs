//! Reference ellipsoid: geodetic↔cartesian conversion and ray intersection.

use glam::DVec3;

use crate::{LonLat, Ray};

/// WGS84 semi-major axis in meters.
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// An oblate ellipsoid of revolution centred at the origin with its polar axis on +Z.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ellipsoid {
    a: f64,
    b: f64,
    /// First eccentricity squared.
    e2: f64,
    /// Second eccentricity squared.
    ep2: f64,
    inv_radii: DVec3,
    inv_radii_sq: DVec3,
}

impl Ellipsoid {
    /// Build an ellipsoid from its equatorial (`a`) and polar (`b`) radii.
    pub fn new(a: f64, b: f64) -> Self {
        debug_assert!(a > 0.0 && b > 0.0 && b <= a, "invalid ellipsoid axes {a}/{b}");
        let e2 = (a * a - b * b) / (a * a);
        let ep2 = (a * a - b * b) / (b * b);
        let radii = DVec3::new(a, a, b);
        Self {
            a,
            b,
            e2,
            ep2,
            inv_radii: 1.0 / radii,
            inv_radii_sq: 1.0 / (radii * radii),
        }
    }

    /// The WGS84 ellipsoid.
    pub fn wgs84() -> Self {
        Self::new(WGS84_A, WGS84_A * (1.0 - WGS84_F))
    }

    /// A perfect sphere.
    pub fn sphere(radius: f64) -> Self {
        Self::new(radius, radius)
    }

    /// Semi-major (equatorial) radius.
    pub fn a(&self) -> f64 {
        self.a
    }

    /// Semi-minor (polar) radius.
    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn max_radius(&self) -> f64 {
        self.a
    }

    pub fn min_radius(&self) -> f64 {
        self.b
    }

    /// Reciprocal radii, used to map the ellipsoid onto the unit sphere.
    pub fn inv_radii(&self) -> DVec3 {
        self.inv_radii
    }

    pub fn lonlat_to_cartesian(&self, ll: &LonLat) -> DVec3 {
        let (lon, lat) = ll.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();
        let n = self.a / (1.0 - self.e2 * sin_lat * sin_lat).sqrt();
        DVec3::new(
            (n + ll.height) * cos_lat * cos_lon,
            (n + ll.height) * cos_lat * sin_lon,
            (n * (1.0 - self.e2) + ll.height) * sin_lat,
        )
    }

    /// Convert a cartesian point to geodetic coordinates (Bowring's method).
    pub fn cartesian_to_lonlat(&self, p: DVec3) -> LonLat {
        let horizontal = (p.x * p.x + p.y * p.y).sqrt();
        let lon = p.y.atan2(p.x).to_degrees();

        if horizontal < 1e-9 * self.a {
            let lat = if p.z >= 0.0 { 90.0 } else { -90.0 };
            return LonLat::with_height(lon, lat, p.z.abs() - self.b);
        }

        let theta = (p.z * self.a).atan2(horizontal * self.b);
        let (sin_t, cos_t) = theta.sin_cos();
        let lat = (p.z + self.ep2 * self.b * sin_t * sin_t * sin_t)
            .atan2(horizontal - self.e2 * self.a * cos_t * cos_t * cos_t);

        let sin_lat = lat.sin();
        let n = self.a / (1.0 - self.e2 * sin_lat * sin_lat).sqrt();
        let height = horizontal / lat.cos() - n;

        LonLat::with_height(lon, lat.to_degrees(), height)
    }

    /// Outward surface normal at a cartesian point (geodetic "up").
    pub fn geodetic_surface_normal(&self, p: DVec3) -> DVec3 {
        (p * self.inv_radii_sq).normalize_or_zero()
    }

    /// Outward surface normal at a geodetic position.
    pub fn lonlat_normal(&self, ll: &LonLat) -> DVec3 {
        let (lon, lat) = ll.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();
        DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
    }

    /// Height of `p` above the ellipsoid surface.
    pub fn height_of(&self, p: DVec3) -> f64 {
        self.cartesian_to_lonlat(p).height
    }

    /// Nearest intersection of `ray` with the ellipsoid surface in front of
    /// its origin. `None` if the ray misses or starts inside and points away.
    pub fn hit_ray(&self, ray: &Ray) -> Option<DVec3> {
        if ray.is_degenerate() {
            return None;
        }
        let o = ray.origin * self.inv_radii;
        let d = ray.direction * self.inv_radii;

        let a = d.length_squared();
        let b = 2.0 * o.dot(d);
        let c = o.length_squared() - 1.0;
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        let t0 = (-b - sq) / (2.0 * a);
        let t1 = (-b + sq) / (2.0 * a);
        let t = if t0 >= 0.0 {
            t0
        } else if t1 >= 0.0 {
            t1
        } else {
            return None;
        };
        Some(ray.at(t))
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() <= eps, "expected {b}, got {a}");
    }

    #[test]
    fn test_equator_prime_meridian() {
        let e = Ellipsoid::wgs84();
        let p = e.lonlat_to_cartesian(&LonLat::new(0.0, 0.0));
        assert_close(p.x, WGS84_A, 1e-6);
        assert_close(p.y, 0.0, 1e-6);
        assert_close(p.z, 0.0, 1e-6);
    }

    #[test]
    fn test_north_pole_is_polar_radius() {
        let e = Ellipsoid::wgs84();
        let p = e.lonlat_to_cartesian(&LonLat::new(0.0, 90.0));
        assert_close(p.z, e.b(), 1e-6);
        let back = e.cartesian_to_lonlat(p);
        assert_close(back.lat, 90.0, 1e-9);
        assert_close(back.height, 0.0, 1e-6);
    }

    #[test]
    fn test_geodetic_round_trip() {
        let e = Ellipsoid::wgs84();
        for ll in [
            LonLat::with_height(30.0, -60.0, 150.0),
            LonLat::with_height(-120.0, 45.0, 8_848.0),
            LonLat::with_height(179.0, 1.0, -400.0),
            LonLat::with_height(10.0, 10.0, 1_000_000.0),
        ] {
            let back = e.cartesian_to_lonlat(e.lonlat_to_cartesian(&ll));
            assert_close(back.lon, ll.lon, 1e-9);
            assert_close(back.lat, ll.lat, 1e-7);
            assert_close(back.height, ll.height, 1e-2);
        }
    }

    #[test]
    fn test_ray_hits_sphere_front_face() {
        let e = Ellipsoid::sphere(1000.0);
        let ray = Ray::new(DVec3::new(5000.0, 0.0, 0.0), DVec3::NEG_X);
        let hit = e.hit_ray(&ray).unwrap();
        assert_close(hit.x, 1000.0, 1e-9);
    }

    #[test]
    fn test_ray_miss_returns_none() {
        let e = Ellipsoid::sphere(1000.0);
        let ray = Ray::new(DVec3::new(5000.0, 0.0, 0.0), DVec3::Y);
        assert!(e.hit_ray(&ray).is_none());
        let away = Ray::new(DVec3::new(5000.0, 0.0, 0.0), DVec3::X);
        assert!(e.hit_ray(&away).is_none());
    }

    #[test]
    fn test_surface_normal_matches_lonlat_normal() {
        let e = Ellipsoid::wgs84();
        let ll = LonLat::new(25.0, 40.0);
        let p = e.lonlat_to_cartesian(&ll);
        let n1 = e.geodetic_surface_normal(p);
        let n2 = e.lonlat_normal(&ll);
        assert!((n1 - n2).length() < 1e-12);
    }
}
