//! Terrain from RGB-encoded elevation images.

use crate::{
    NoDataValues, RgbEncoding, SampleLayout, TerrainError, TerrainProvider, TerrainRequest,
    TerrainTile, TileKey, TilingScheme, decode_rgb_elevation,
};

/// A decoded image with interleaved 8-bit channels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<u8>,
}

impl RgbImage {
    pub fn new(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            data,
        }
    }
}

/// Obtains the encoded image for a tile. Implementations may block.
pub trait TileFetcher: Send + Sync {
    fn fetch_rgb(&self, key: &TileKey) -> Result<RgbImage, TerrainError>;

    fn abort(&self) {}

    fn clear_cache(&self) {}
}

impl<F> TileFetcher for F
where
    F: Fn(&TileKey) -> Result<RgbImage, TerrainError> + Send + Sync,
{
    fn fetch_rgb(&self, key: &TileKey) -> Result<RgbImage, TerrainError> {
        self(key)
    }
}

/// Provider decoding base-256 RGB height images, one pixel per sample.
pub struct RgbTerrain<F: TileFetcher> {
    fetcher: F,
    encoding: RgbEncoding,
    max_zoom: u8,
    tiling: TilingScheme,
    no_data: NoDataValues,
}

impl<F: TileFetcher> RgbTerrain<F> {
    pub fn new(fetcher: F, max_zoom: u8) -> Self {
        Self {
            fetcher,
            encoding: RgbEncoding::default(),
            max_zoom,
            tiling: TilingScheme::Mercator,
            no_data: NoDataValues::default(),
        }
    }

    pub fn with_encoding(mut self, encoding: RgbEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_tiling(mut self, tiling: TilingScheme) -> Self {
        self.tiling = tiling;
        self
    }

    pub fn with_no_data(mut self, no_data: NoDataValues) -> Self {
        self.no_data = no_data;
        self
    }

    pub fn encoding(&self) -> &RgbEncoding {
        &self.encoding
    }
}

impl<F: TileFetcher> TerrainProvider for RgbTerrain<F> {
    fn name(&self) -> &str {
        "rgb"
    }

    fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    fn tiling(&self) -> TilingScheme {
        self.tiling
    }

    fn fetch(&self, request: &TerrainRequest) -> Result<TerrainTile, TerrainError> {
        let key = request.key;
        if key.zoom > self.max_zoom {
            return Err(TerrainError::NoData(key));
        }
        let image = self.fetcher.fetch_rgb(&key)?;
        if image.width == 0 || image.width != image.height {
            return Err(TerrainError::Decode {
                key,
                reason: format!("expected a square image, got {}x{}", image.width, image.height),
            });
        }
        if image.channels < 3 || image.data.len() != image.width * image.height * image.channels {
            return Err(TerrainError::Decode {
                key,
                reason: format!(
                    "{} bytes do not match {}x{}x{}",
                    image.data.len(),
                    image.width,
                    image.height,
                    image.channels
                ),
            });
        }
        let samples = decode_rgb_elevation(&image.data, image.channels, &self.encoding);
        Ok(TerrainTile::new(image.width, SampleLayout::Pixels, samples))
    }

    fn no_data_values(&self) -> &[f32] {
        self.no_data.values()
    }

    fn height_bounds(&self) -> (f64, f64) {
        (-11_000.0, 9_000.0)
    }

    fn abort_loading(&self) {
        self.fetcher.abort();
    }

    fn clear_cache(&self) {
        self.fetcher.clear_cache();
    }
}
