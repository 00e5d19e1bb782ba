//! Imagery layers as seen by the quad-tree: something that can be asked for
//! a tile and later reports it ready. Decoding and texture upload live
//! behind the implementation.

use std::fmt;

use orbis_math::Extent;
use orbis_terrain::TileKey;

pub trait ImagerySource: Send + fmt::Debug {
    fn name(&self) -> &str;

    /// Start loading the tile. Repeated calls for a pending tile are no-ops.
    fn request(&mut self, key: &TileKey, extent: &Extent);

    /// A rendered tile holds its fade-in until every layer reports it ready.
    fn is_ready(&self, key: &TileKey) -> bool;

    /// Abandon a tile whose node was destroyed. No-op if nothing is pending.
    fn cancel(&mut self, key: &TileKey);

    /// Drop everything, pending requests included.
    fn clear(&mut self);
}
