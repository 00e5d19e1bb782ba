//! Tile addressing: `(group, zoom, x, y)` with rows counted from the north.

use std::fmt;

/// Which tiling family a tile belongs to.
///
/// Polar caps are tiled separately from the standard (mercator or
/// geographic) grid, so two tiles with the same `(zoom, x, y)` in different
/// groups are unrelated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TileGroup {
    Standard,
    North,
    South,
}

impl TileGroup {
    fn bits(self) -> u64 {
        match self {
            TileGroup::Standard => 0,
            TileGroup::North => 1,
            TileGroup::South => 2,
        }
    }
}

/// Address of one quad-tree tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub group: TileGroup,
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

/// Deepest zoom representable by [`TileKey::id`].
pub const MAX_KEY_ZOOM: u8 = 28;

impl TileKey {
    pub const fn new(group: TileGroup, zoom: u8, x: u32, y: u32) -> Self {
        Self { group, zoom, x, y }
    }

    /// The single zoom-0 tile of a group.
    pub const fn root(group: TileGroup) -> Self {
        Self::new(group, 0, 0, 0)
    }

    /// Stable 64-bit identifier: group, zoom, x and y packed into disjoint bit ranges.
    pub fn id(&self) -> u64 {
        debug_assert!(self.zoom <= MAX_KEY_ZOOM);
        (self.group.bits() << 62)
            | ((self.zoom as u64) << 56)
            | ((self.x as u64) << 28)
            | self.y as u64
    }

    /// Number of tiles per side at this zoom.
    pub fn tiles_per_side(&self) -> u32 {
        1 << self.zoom
    }

    pub fn parent(&self) -> Option<TileKey> {
        (self.zoom > 0).then(|| TileKey::new(self.group, self.zoom - 1, self.x >> 1, self.y >> 1))
    }

    /// Children in `[NW, NE, SW, SE]` order.
    pub fn children(&self) -> [TileKey; 4] {
        let (z, x, y) = (self.zoom + 1, self.x * 2, self.y * 2);
        [
            TileKey::new(self.group, z, x, y),
            TileKey::new(self.group, z, x + 1, y),
            TileKey::new(self.group, z, x, y + 1),
            TileKey::new(self.group, z, x + 1, y + 1),
        ]
    }

    /// Index of this tile among its siblings, matching [`children`](Self::children).
    pub fn child_index(&self) -> usize {
        ((self.y & 1) * 2 + (self.x & 1)) as usize
    }

    /// The ancestor at `zoom`, or `None` if `zoom` is deeper than this tile.
    pub fn ancestor(&self, zoom: u8) -> Option<TileKey> {
        (zoom <= self.zoom).then(|| {
            let dz = self.zoom - zoom;
            TileKey::new(self.group, zoom, self.x >> dz, self.y >> dz)
        })
    }

    /// Position of this tile inside its ancestor at `zoom`: the zoom
    /// difference and the tile offset `(dx, dy)` in units of this tile.
    pub fn offset_in_ancestor(&self, zoom: u8) -> Option<(u8, u32, u32)> {
        let ancestor = self.ancestor(zoom)?;
        let dz = self.zoom - zoom;
        Some((dz, self.x - (ancestor.x << dz), self.y - (ancestor.y << dz)))
    }

    /// Whether `self` lies strictly below `other` in the same group.
    pub fn is_descendant_of(&self, other: &TileKey) -> bool {
        self.group == other.group
            && self.zoom > other.zoom
            && self.ancestor(other.zoom) == Some(*other)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{}/{}/{}", self.group, self.zoom, self.x, self.y)
    }
}
