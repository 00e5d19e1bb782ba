//! Rays and ray/triangle intersection for terrain picking.

use glam::DVec3;

/// A half-line in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    /// Unit direction. Zero for a degenerate ray.
    pub direction: DVec3,
}

impl Ray {
    /// Create a ray, normalising `direction`.
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// A ray is degenerate when its direction could not be normalised.
    pub fn is_degenerate(&self) -> bool {
        self.direction == DVec3::ZERO
    }

    /// Point at parameter `t` along the ray.
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }

    /// Distance along the ray to the first intersection with a sphere, if any.
    pub fn hit_sphere(&self, center: DVec3, radius: f64) -> Option<f64> {
        let oc = self.origin - center;
        let b = oc.dot(self.direction);
        let c = oc.length_squared() - radius * radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        let t0 = -b - sq;
        let t1 = -b + sq;
        if t0 >= 0.0 {
            Some(t0)
        } else if t1 >= 0.0 {
            Some(0.0)
        } else {
            None
        }
    }
}

/// Möller–Trumbore intersection. Returns the ray parameter of the hit, or
/// `None` when the ray misses, is parallel, or the hit lies behind the origin.
pub fn ray_triangle(ray: &Ray, a: DVec3, b: DVec3, c: DVec3) -> Option<f64> {
    const EPS: f64 = 1e-12;

    let e1 = b - a;
    let e2 = c - a;
    let p = ray.direction.cross(e2);
    let det = e1.dot(p);
    if det.abs() < EPS * e1.length() * e2.length() {
        return None;
    }
    let inv = 1.0 / det;
    let s = ray.origin - a;
    let u = s.dot(p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = ray.direction.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv;
    (t >= 0.0).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_triangle_hit() {
        let ray = Ray::new(DVec3::new(0.25, 0.25, 10.0), DVec3::NEG_Z);
        let t = ray_triangle(&ray, DVec3::ZERO, DVec3::X, DVec3::Y).unwrap();
        assert!((t - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_ray_triangle_miss_outside() {
        let ray = Ray::new(DVec3::new(0.75, 0.75, 10.0), DVec3::NEG_Z);
        assert!(ray_triangle(&ray, DVec3::ZERO, DVec3::X, DVec3::Y).is_none());
    }

    #[test]
    fn test_ray_triangle_parallel_is_none() {
        let ray = Ray::new(DVec3::new(0.25, 0.25, 1.0), DVec3::X);
        assert!(ray_triangle(&ray, DVec3::ZERO, DVec3::X, DVec3::Y).is_none());
    }

    #[test]
    fn test_degenerate_ray() {
        let ray = Ray::new(DVec3::ONE, DVec3::ZERO);
        assert!(ray.is_degenerate());
        assert!(ray_triangle(&ray, DVec3::ZERO, DVec3::X, DVec3::Y).is_none());
    }

    #[test]
    fn test_hit_sphere_from_outside_and_inside() {
        let ray = Ray::new(DVec3::new(0.0, 0.0, 10.0), DVec3::NEG_Z);
        assert_eq!(ray.hit_sphere(DVec3::ZERO, 2.0), Some(8.0));
        let inside = Ray::new(DVec3::ZERO, DVec3::X);
        assert_eq!(inside.hit_sphere(DVec3::ZERO, 2.0), Some(0.0));
        let behind = Ray::new(DVec3::new(0.0, 0.0, 10.0), DVec3::Z);
        assert!(behind.hit_sphere(DVec3::ZERO, 2.0).is_none());
    }
}
