//! Base-256 RGB height decoding.

/// Linear mapping from a 24-bit RGB integer to meters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RgbEncoding {
    /// Height of the integer value 0.
    pub min_height: f64,
    /// Meters per integer step.
    pub resolution: f64,
}

impl Default for RgbEncoding {
    /// The common `-10000 + 0.1 * value` terrain-RGB encoding.
    fn default() -> Self {
        Self {
            min_height: -10_000.0,
            resolution: 0.1,
        }
    }
}

impl RgbEncoding {
    /// Decode one pixel: `min_height + resolution * (r·65536 + g·256 + b)`.
    ///
    /// A fully saturated pixel (255, 255, 255) maps to `min_height`.
    pub fn decode(&self, r: u8, g: u8, b: u8) -> f32 {
        if r == u8::MAX && g == u8::MAX && b == u8::MAX {
            return self.min_height as f32;
        }
        let value = (r as u32) << 16 | (g as u32) << 8 | b as u32;
        (self.min_height + self.resolution * value as f64) as f32
    }
}

/// Decode interleaved pixel data with `channels` bytes per pixel (3 or 4).
pub fn decode_rgb_elevation(data: &[u8], channels: usize, encoding: &RgbEncoding) -> Vec<f32> {
    debug_assert!(channels >= 3, "need at least RGB, got {channels} channels");
    data.chunks_exact(channels.max(3))
        .map(|px| encoding.decode(px[0], px[1], px[2]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_zero_is_min_height() {
        let enc = RgbEncoding::default();
        assert_eq!(enc.decode(0, 0, 0), -10_000.0);
    }

    #[test]
    fn test_decode_sea_level() {
        // 100000 * 0.1 - 10000 = 0
        let enc = RgbEncoding::default();
        let v = 100_000u32;
        let h = enc.decode((v >> 16) as u8, (v >> 8) as u8, v as u8);
        assert!(h.abs() < 1e-3, "got {h}");
    }

    #[test]
    fn test_saturated_pixel_maps_to_min_height() {
        let enc = RgbEncoding {
            min_height: -500.0,
            resolution: 1.0,
        };
        assert_eq!(enc.decode(255, 255, 255), -500.0);
        // One step below saturation decodes normally.
        assert_eq!(enc.decode(255, 255, 254), (-500.0 + 16_777_214.0) as f32);
    }

    #[test]
    fn test_decode_rgba_buffer() {
        let enc = RgbEncoding {
            min_height: 0.0,
            resolution: 1.0,
        };
        let data = [0, 1, 2, 255, 0, 0, 10, 255];
        assert_eq!(decode_rgb_elevation(&data, 4, &enc), vec![258.0, 10.0]);
    }
}
