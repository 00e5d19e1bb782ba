//! The scripted fly-over: a look-down descent that pans east.

use orbis_config::DemoConfig;
use orbis_math::LonLat;

/// Camera position over time.
#[derive(Clone, Debug, PartialEq)]
pub struct Flight {
    start: LonLat,
    end_altitude: f64,
    pan_deg_per_s: f64,
    duration: f64,
}

impl Flight {
    pub fn from_config(demo: &DemoConfig) -> Self {
        Self {
            start: LonLat::with_height(demo.start_lon, demo.start_lat, demo.start_altitude_m),
            end_altitude: demo.end_altitude_m,
            pan_deg_per_s: demo.pan_deg_per_s,
            duration: demo.duration_s.max(f64::EPSILON),
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_finished(&self, t: f64) -> bool {
        t >= self.duration
    }

    /// Position at `t` seconds. Altitude falls geometrically, so every
    /// second covers the same number of zoom levels.
    pub fn position(&self, t: f64) -> LonLat {
        let s = (t / self.duration).clamp(0.0, 1.0);
        let from = self.start.height.max(1.0);
        let to = self.end_altitude.max(1.0);
        let altitude = from * (to / from).powf(s);
        let lon = self.start.lon + self.pan_deg_per_s * t.clamp(0.0, self.duration);
        LonLat::with_height(lon, self.start.lat, altitude).normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight() -> Flight {
        Flight::from_config(&DemoConfig {
            start_lon: 179.0,
            start_lat: 10.0,
            start_altitude_m: 1_000_000.0,
            end_altitude_m: 1_000.0,
            pan_deg_per_s: 1.0,
            duration_s: 10.0,
            ..Default::default()
        })
    }

    #[test]
    fn test_endpoints() {
        let f = flight();
        let start = f.position(0.0);
        assert_eq!(start.height, 1_000_000.0);
        let end = f.position(100.0);
        assert!((end.height - 1_000.0).abs() < 1e-6);
        assert!(f.is_finished(10.0));
        assert!(!f.is_finished(9.99));
    }

    /// Halfway in time is halfway in log-altitude.
    #[test]
    fn test_descent_is_geometric() {
        let mid = flight().position(5.0);
        assert!((mid.height - 31_622.776).abs() < 0.01, "{}", mid.height);
    }

    #[test]
    fn test_pan_wraps_longitude() {
        let p = flight().position(3.0);
        assert!((p.lon - -178.0).abs() < 1e-9, "{}", p.lon);
        assert_eq!(p.lat, 10.0);
    }
}
