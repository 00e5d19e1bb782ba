//! Axis-aligned lon/lat rectangles.

use crate::LonLat;

/// A geodetic rectangle bounded by its south-west and north-east corners.
///
/// After [`normalize`](Self::normalize) the south-west corner is never east
/// or north of the north-east corner.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Extent {
    /// South-west corner (minimum lon and lat).
    pub south_west: LonLat,
    /// North-east corner (maximum lon and lat).
    pub north_east: LonLat,
}

impl Extent {
    pub const fn new(south_west: LonLat, north_east: LonLat) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Build an extent from `west, south, east, north` in degrees.
    pub const fn from_degrees(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self::new(LonLat::new(west, south), LonLat::new(east, north))
    }

    /// The whole globe `[-180, -90]..[180, 90]`.
    pub const fn whole_globe() -> Self {
        Self::from_degrees(-180.0, -90.0, 180.0, 90.0)
    }

    pub fn west(&self) -> f64 {
        self.south_west.lon
    }

    pub fn east(&self) -> f64 {
        self.north_east.lon
    }

    pub fn south(&self) -> f64 {
        self.south_west.lat
    }

    pub fn north(&self) -> f64 {
        self.north_east.lat
    }

    /// Longitudinal span in degrees.
    pub fn width(&self) -> f64 {
        self.north_east.lon - self.south_west.lon
    }

    /// Latitudinal span in degrees.
    pub fn height(&self) -> f64 {
        self.north_east.lat - self.south_west.lat
    }

    /// Geometric center in lon/lat space.
    pub fn center(&self) -> LonLat {
        LonLat::new(
            (self.south_west.lon + self.north_east.lon) * 0.5,
            (self.south_west.lat + self.north_east.lat) * 0.5,
        )
    }

    /// Swap corners where needed so that the invariant holds.
    pub fn normalize(&mut self) {
        if self.south_west.lon > self.north_east.lon {
            std::mem::swap(&mut self.south_west.lon, &mut self.north_east.lon);
        }
        if self.south_west.lat > self.north_east.lat {
            std::mem::swap(&mut self.south_west.lat, &mut self.north_east.lat);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.south_west.lon <= self.north_east.lon && self.south_west.lat <= self.north_east.lat
    }

    /// Inclusive point containment.
    pub fn contains(&self, p: &LonLat) -> bool {
        p.lon >= self.west() && p.lon <= self.east() && p.lat >= self.south() && p.lat <= self.north()
    }

    /// Whether `other` lies entirely inside this extent (edges may touch).
    pub fn contains_extent(&self, other: &Extent) -> bool {
        other.west() >= self.west()
            && other.east() <= self.east()
            && other.south() >= self.south()
            && other.north() <= self.north()
    }

    /// Whether the interiors of the two extents intersect.
    pub fn overlaps(&self, other: &Extent) -> bool {
        self.west() < other.east()
            && other.west() < self.east()
            && self.south() < other.north()
            && other.south() < self.north()
    }

    /// Split into `[NW, NE, SW, SE]` at the given dividing longitude and latitude.
    ///
    /// The dividing values are shared verbatim between neighbours so the four
    /// quadrants tile the parent with no gap and no overlap.
    pub fn split_at(&self, mid_lon: f64, mid_lat: f64) -> [Extent; 4] {
        let (w, s, e, n) = (self.west(), self.south(), self.east(), self.north());
        [
            Extent::from_degrees(w, mid_lat, mid_lon, n),
            Extent::from_degrees(mid_lon, mid_lat, e, n),
            Extent::from_degrees(w, s, mid_lon, mid_lat),
            Extent::from_degrees(mid_lon, s, e, mid_lat),
        ]
    }

    /// Split at the lon/lat midpoint into `[NW, NE, SW, SE]`.
    pub fn quadrants(&self) -> [Extent; 4] {
        let c = self.center();
        self.split_at(c.lon, c.lat)
    }

    /// Four corners in `[NW, NE, SW, SE]` order.
    pub fn corners(&self) -> [LonLat; 4] {
        [
            LonLat::new(self.west(), self.north()),
            LonLat::new(self.east(), self.north()),
            LonLat::new(self.west(), self.south()),
            LonLat::new(self.east(), self.south()),
        ]
    }

    /// Position inside the extent for normalised grid coordinates, `u` from
    /// the west edge and `v` from the north edge.
    pub fn lonlat_at(&self, u: f64, v: f64) -> LonLat {
        LonLat::new(
            self.west() + self.width() * u,
            self.north() - self.height() * v,
        )
    }
}
