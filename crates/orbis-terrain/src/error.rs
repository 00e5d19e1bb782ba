//! Terrain error types.

use crate::TileKey;

/// Errors produced while fetching or decoding elevation.
///
/// None of these are fatal to the frame loop: the quad-tree recovers from
/// each by falling back to ancestor data or a flat tile.
#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    /// The provider could not obtain the tile (network, storage, ...).
    #[error("failed to fetch tile {key}: {reason}")]
    Fetch { key: TileKey, reason: String },

    /// Raw data was obtained but could not be turned into elevation.
    #[error("failed to decode tile {key}: {reason}")]
    Decode { key: TileKey, reason: String },

    /// The provider broke its contract and returned the wrong number of samples.
    #[error("tile {key} has {got} samples, expected {expected}")]
    MalformedTile {
        key: TileKey,
        expected: usize,
        got: usize,
    },

    /// The provider has no data at all for this tile.
    #[error("no elevation data for tile {0}")]
    NoData(TileKey),

    /// The request was cancelled before completion.
    #[error("request for tile {0} was cancelled")]
    Cancelled(TileKey),

    /// A loader worker thread could not be started.
    #[error("failed to spawn terrain worker: {0}")]
    Spawn(#[source] std::io::Error),
}
