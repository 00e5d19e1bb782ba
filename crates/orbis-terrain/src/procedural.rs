//! Procedural elevation: fractal Brownian motion over simplex noise sampled
//! on the unit sphere, so there is no seam at the antimeridian or the poles.

use glam::DVec3;
use noise::{NoiseFn, Simplex};
use orbis_math::LonLat;

use crate::{SampleLayout, TerrainError, TerrainProvider, TerrainRequest, TerrainTile};

/// Sentinel written for masked ocean samples.
pub const OCEAN_NO_DATA: f32 = -32_767.0;

#[derive(Clone, Debug, PartialEq)]
pub struct ProceduralParams {
    /// Seed for deterministic generation.
    pub seed: u32,
    /// Number of octaves composited.
    pub octaves: u32,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Frequency of the first octave, in cycles per unit-sphere radius.
    pub base_frequency: f64,
    /// Amplitude of the first octave in meters.
    pub amplitude: f64,
    /// Constant added to every sample.
    pub offset: f64,
    /// Replace below-sea-level samples with [`OCEAN_NO_DATA`].
    pub mask_ocean: bool,
    /// Raw cells per requested grid cell. Must be a power of two.
    pub data_multiplier: usize,
    pub max_zoom: u8,
}

impl Default for ProceduralParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 8,
            lacunarity: 2.0,
            persistence: 0.5,
            base_frequency: 2.0,
            amplitude: 4_000.0,
            offset: 0.0,
            mask_ocean: false,
            data_multiplier: 1,
            max_zoom: 14,
        }
    }
}

/// fBm sampler over the unit sphere.
#[derive(Clone, Debug)]
pub struct SphereHeightSampler {
    noise: Simplex,
    params: ProceduralParams,
}

impl SphereHeightSampler {
    pub fn new(params: ProceduralParams) -> Self {
        Self {
            noise: Simplex::new(params.seed),
            params,
        }
    }

    /// Height in meters at a direction from the planet center.
    pub fn sample_dir(&self, dir: DVec3) -> f64 {
        let mut total = self.params.offset;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = self.params.amplitude;
        for _ in 0..self.params.octaves {
            let p = dir * frequency;
            total += self.noise.get([p.x, p.y, p.z]) * amplitude;
            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }
        total
    }

    pub fn sample(&self, ll: &LonLat) -> f64 {
        let (lon, lat) = ll.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();
        self.sample_dir(DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat))
    }

    /// Upper bound of `|height - offset|`: the geometric sum of octave amplitudes.
    pub fn max_amplitude(&self) -> f64 {
        let p = &self.params;
        (0..p.octaves).map(|i| p.amplitude * p.persistence.powi(i as i32)).sum()
    }
}

/// A provider that synthesises elevation on demand.
#[derive(Clone, Debug)]
pub struct ProceduralTerrain {
    sampler: SphereHeightSampler,
    params: ProceduralParams,
}

impl ProceduralTerrain {
    pub fn new(params: ProceduralParams) -> Self {
        debug_assert!(
            params.data_multiplier.is_power_of_two(),
            "data multiplier {} is not a power of two",
            params.data_multiplier
        );
        Self {
            sampler: SphereHeightSampler::new(params.clone()),
            params,
        }
    }

    pub fn params(&self) -> &ProceduralParams {
        &self.params
    }

    fn sample_masked(&self, ll: &LonLat) -> f32 {
        let h = self.sampler.sample(ll);
        if self.params.mask_ocean && h < 0.0 {
            OCEAN_NO_DATA
        } else {
            h as f32
        }
    }
}

impl TerrainProvider for ProceduralTerrain {
    fn name(&self) -> &str {
        "procedural"
    }

    fn max_zoom(&self) -> u8 {
        self.params.max_zoom
    }

    fn fetch(&self, request: &TerrainRequest) -> Result<TerrainTile, TerrainError> {
        if request.key.zoom > self.params.max_zoom {
            return Err(TerrainError::NoData(request.key));
        }
        let cells = request.grid_size.max(1) * self.params.data_multiplier.max(1);
        let inv = 1.0 / cells as f64;
        let mut samples = Vec::with_capacity((cells + 1) * (cells + 1));
        for j in 0..=cells {
            for i in 0..=cells {
                let ll = request.position(i as f64 * inv, j as f64 * inv);
                samples.push(self.sample_masked(&ll));
            }
        }
        Ok(TerrainTile::new(cells, SampleLayout::Vertices, samples))
    }

    fn height_at(&self, lonlat: &LonLat, _zoom: u8) -> Option<f64> {
        let h = self.sample_masked(lonlat);
        (h != OCEAN_NO_DATA).then_some(h as f64)
    }

    fn no_data_values(&self) -> &[f32] {
        if self.params.mask_ocean {
            &[OCEAN_NO_DATA]
        } else {
            &[]
        }
    }

    fn height_bounds(&self) -> (f64, f64) {
        let amp = self.sampler.max_amplitude();
        let min = if self.params.mask_ocean {
            self.params.offset.min(0.0)
        } else {
            self.params.offset - amp
        };
        (min, self.params.offset + amp)
    }
}
