//! Elevation sources for the globe and the machinery that streams them.
//!
//! A [`TerrainProvider`] turns a tile request into raw elevation samples on
//! a loader thread. The [`TerrainLoader`] deduplicates requests per tile,
//! carries a [`CancelToken`] for each one, and hands finished tiles back to
//! the frame loop through [`TerrainLoader::drain`].

mod cancel;
mod decode;
mod error;
mod key;
mod loader;
mod nodata;
mod procedural;
mod provider;
mod rgb;
mod tile;
mod tiling;

pub use cancel::CancelToken;
pub use decode::{RgbEncoding, decode_rgb_elevation};
pub use error::TerrainError;
pub use key::{MAX_KEY_ZOOM, TileGroup, TileKey};
pub use loader::{HeightQuery, LoadedTerrain, LoaderMode, TerrainLoader};
pub use nodata::NoDataValues;
pub use procedural::{ProceduralParams, ProceduralTerrain, SphereHeightSampler};
pub use provider::{EmptyTerrain, TerrainProvider};
pub use rgb::{RgbImage, RgbTerrain, TileFetcher};
pub use tile::{SampleLayout, TerrainRequest, TerrainTile};
pub use tiling::TilingScheme;
