//! Geodetic coordinate value type and spherical-mercator helpers.

use std::f64::consts::PI;

/// Half the circumference of the spherical-mercator world, in meters.
pub const POLE: f64 = 20_037_508.342_789_244;

/// Latitude (degrees) at which the square web-mercator world is cut off.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// A geodetic position: longitude and latitude in degrees, height in meters
/// above the ellipsoid surface.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LonLat {
    /// Longitude in degrees, nominally `[-180, 180]`.
    pub lon: f64,
    /// Latitude in degrees, `[-90, 90]`.
    pub lat: f64,
    /// Height above the ellipsoid in meters.
    pub height: f64,
}

impl LonLat {
    /// Create a position on the ellipsoid surface.
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon,
            lat,
            height: 0.0,
        }
    }

    /// Create a position at the given height.
    pub const fn with_height(lon: f64, lat: f64, height: f64) -> Self {
        Self { lon, lat, height }
    }

    /// Longitude and latitude in radians.
    pub fn to_radians(&self) -> (f64, f64) {
        (self.lon.to_radians(), self.lat.to_radians())
    }

    /// Wrap longitude into `[-180, 180)` and clamp latitude into `[-90, 90]`.
    pub fn normalized(&self) -> Self {
        let mut lon = (self.lon + 180.0).rem_euclid(360.0) - 180.0;
        if lon == -180.0 && self.lon > 0.0 {
            lon = 180.0;
        }
        Self {
            lon,
            lat: self.lat.clamp(-90.0, 90.0),
            height: self.height,
        }
    }

    /// Project to spherical-mercator meters `(x, y)`.
    ///
    /// Latitude is clamped to [`MAX_MERCATOR_LAT`] first.
    pub fn forward_mercator(&self) -> (f64, f64) {
        (self.lon * POLE / 180.0, forward_mercator_lat(self.lat))
    }

    /// Inverse of [`forward_mercator`](Self::forward_mercator).
    pub fn inverse_mercator(x: f64, y: f64) -> Self {
        Self::new(x * 180.0 / POLE, inverse_mercator_lat(y))
    }
}

/// Mercator `y` in meters for a latitude in degrees.
pub fn forward_mercator_lat(lat: f64) -> f64 {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let y = ((90.0 + lat) * PI / 360.0).tan().ln() / (PI / 180.0);
    y * POLE / 180.0
}

/// Latitude in degrees for a mercator `y` in meters.
pub fn inverse_mercator_lat(y: f64) -> f64 {
    180.0 / PI * (2.0 * (y / POLE * PI).exp().atan() - PI / 2.0)
}
