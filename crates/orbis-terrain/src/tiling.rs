//! Tile-key ↔ extent mapping for the supported tiling families.

use orbis_math::{Extent, LonLat, MAX_MERCATOR_LAT, POLE, forward_mercator_lat, inverse_mercator_lat};

use crate::{TileGroup, TileKey};

/// How the globe is cut into zoom-0 tiles and subdivided below them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TilingScheme {
    /// One root covering the whole globe, split evenly in lon/lat.
    #[default]
    Geographic,
    /// A web-mercator square (`|lat| ≤ 85.05°`) split evenly in mercator
    /// space, plus north and south polar caps split evenly in lon/lat.
    Mercator,
}

impl TilingScheme {
    /// Groups that have a root tile in this scheme.
    pub fn groups(&self) -> &'static [TileGroup] {
        match self {
            TilingScheme::Geographic => &[TileGroup::Standard],
            TilingScheme::Mercator => &[TileGroup::Standard, TileGroup::North, TileGroup::South],
        }
    }

    pub fn root_extent(&self, group: TileGroup) -> Extent {
        match (self, group) {
            (TilingScheme::Geographic, _) => Extent::whole_globe(),
            (TilingScheme::Mercator, TileGroup::Standard) => {
                Extent::from_degrees(-180.0, -MAX_MERCATOR_LAT, 180.0, MAX_MERCATOR_LAT)
            }
            (TilingScheme::Mercator, TileGroup::North) => {
                Extent::from_degrees(-180.0, MAX_MERCATOR_LAT, 180.0, 90.0)
            }
            (TilingScheme::Mercator, TileGroup::South) => {
                Extent::from_degrees(-180.0, -90.0, 180.0, -MAX_MERCATOR_LAT)
            }
        }
    }

    /// Whether rows of `group` are spaced evenly in mercator `y` rather than latitude.
    pub fn mercator_rows(&self, group: TileGroup) -> bool {
        matches!((self, group), (TilingScheme::Mercator, TileGroup::Standard))
    }

    pub fn tile_extent(&self, key: &TileKey) -> Extent {
        let root = self.root_extent(key.group);
        let n = key.tiles_per_side() as f64;
        let col_w = root.width() / n;
        let west = root.west() + key.x as f64 * col_w;
        let east = root.west() + (key.x + 1) as f64 * col_w;

        if self.mercator_rows(key.group) {
            let row_h = 2.0 * POLE / n;
            let top = POLE - key.y as f64 * row_h;
            let bottom = POLE - (key.y + 1) as f64 * row_h;
            Extent::from_degrees(west, inverse_mercator_lat(bottom), east, inverse_mercator_lat(top))
        } else {
            let row_h = root.height() / n;
            let north = root.north() - key.y as f64 * row_h;
            let south = root.north() - (key.y + 1) as f64 * row_h;
            Extent::from_degrees(west, south, east, north)
        }
    }

    /// Group a geodetic position falls into.
    pub fn group_at(&self, ll: &LonLat) -> TileGroup {
        match self {
            TilingScheme::Geographic => TileGroup::Standard,
            TilingScheme::Mercator if ll.lat > MAX_MERCATOR_LAT => TileGroup::North,
            TilingScheme::Mercator if ll.lat < -MAX_MERCATOR_LAT => TileGroup::South,
            TilingScheme::Mercator => TileGroup::Standard,
        }
    }

    /// Tile containing a position at `zoom`.
    pub fn tile_at(&self, ll: &LonLat, zoom: u8) -> TileKey {
        let ll = ll.normalized();
        let group = self.group_at(&ll);
        let root = self.root_extent(group);
        let n = (1u32 << zoom) as f64;
        let max = (1u32 << zoom) - 1;

        let u = (ll.lon - root.west()) / root.width();
        let v = if self.mercator_rows(group) {
            (POLE - forward_mercator_lat(ll.lat)) / (2.0 * POLE)
        } else {
            (root.north() - ll.lat) / root.height()
        };
        let x = ((u * n).floor().max(0.0) as u32).min(max);
        let y = ((v * n).floor().max(0.0) as u32).min(max);
        TileKey::new(group, zoom, x, y)
    }

    /// Normalised `(u, v)` of a position inside a tile's extent, `v` measured
    /// from the north edge in the tile's own row spacing.
    pub fn position_in_tile(&self, key: &TileKey, ll: &LonLat) -> (f64, f64) {
        let extent = self.tile_extent(key);
        let u = (ll.lon - extent.west()) / extent.width();
        let v = if self.mercator_rows(key.group) {
            let top = forward_mercator_lat(extent.north());
            let bottom = forward_mercator_lat(extent.south());
            (top - forward_mercator_lat(ll.lat)) / (top - bottom)
        } else {
            (extent.north() - ll.lat) / extent.height()
        };
        (u.clamp(0.0, 1.0), v.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geographic_zoom_two_tiles() {
        let scheme = TilingScheme::Geographic;
        let e = scheme.tile_extent(&TileKey::new(TileGroup::Standard, 2, 0, 0));
        assert_eq!(e, Extent::from_degrees(-180.0, 45.0, -90.0, 90.0));
        let e = scheme.tile_extent(&TileKey::new(TileGroup::Standard, 2, 3, 3));
        assert_eq!(e, Extent::from_degrees(90.0, -90.0, 180.0, -45.0));
    }

    /// Children computed from keys tile their parent exactly.
    #[test]
    fn test_key_children_share_edges() {
        for scheme in [TilingScheme::Geographic, TilingScheme::Mercator] {
            let parent = TileKey::new(TileGroup::Standard, 3, 5, 2);
            let pe = scheme.tile_extent(&parent);
            let [nw, ne, sw, se] = parent.children().map(|k| scheme.tile_extent(&k));
            assert_eq!(nw.west(), pe.west());
            assert_eq!(ne.east(), pe.east());
            assert_eq!(nw.east(), ne.west());
            assert_eq!(sw.east(), se.west());
            assert!((nw.north() - pe.north()).abs() < 1e-9);
            assert!((sw.south() - pe.south()).abs() < 1e-9);
            assert!((nw.south() - sw.north()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_tile_at_round_trip() {
        for scheme in [TilingScheme::Geographic, TilingScheme::Mercator] {
            for ll in [
                LonLat::new(0.5, 0.5),
                LonLat::new(-179.0, 80.0),
                LonLat::new(120.0, -30.0),
                LonLat::new(10.0, 89.0),
                LonLat::new(10.0, -88.0),
            ] {
                let key = scheme.tile_at(&ll, 6);
                let extent = scheme.tile_extent(&key);
                assert!(extent.contains(&ll), "{ll:?} not in {key} {extent:?}");
            }
        }
    }

    #[test]
    fn test_mercator_groups() {
        let scheme = TilingScheme::Mercator;
        assert_eq!(scheme.group_at(&LonLat::new(0.0, 86.0)), TileGroup::North);
        assert_eq!(scheme.group_at(&LonLat::new(0.0, -86.0)), TileGroup::South);
        assert_eq!(scheme.group_at(&LonLat::new(0.0, 85.0)), TileGroup::Standard);
        let root = scheme.tile_extent(&TileKey::root(TileGroup::Standard));
        assert!((root.north() - MAX_MERCATOR_LAT).abs() < 1e-9);
    }

    #[test]
    fn test_position_in_tile_corners() {
        let scheme = TilingScheme::Geographic;
        let key = TileKey::new(TileGroup::Standard, 1, 1, 0);
        let (u, v) = scheme.position_in_tile(&key, &LonLat::new(0.0, 90.0));
        assert_eq!((u, v), (0.0, 0.0));
        let (u, v) = scheme.position_in_tile(&key, &LonLat::new(90.0, 45.0));
        assert_eq!((u, v), (0.5, 0.5));
    }
}
