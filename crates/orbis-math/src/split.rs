//! High/low single-precision splitting for relative-to-eye rendering.
//!
//! World positions stay in `f64` everywhere on the CPU. Only when data crosses
//! into the `f32` render path is each component split into a coarse `high`
//! part and a residual `low` part; the shader subtracts the eye's pair from
//! the vertex's pair before adding them, so the large magnitudes cancel
//! exactly and only the small camera-relative offset is rounded.

use glam::DVec3;
use static_assertions::assert_eq_size;

/// A double-precision 3-vector split into two `f32` triples.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SplitVec3 {
    pub high: [f32; 3],
    pub low: [f32; 3],
}

assert_eq_size!(SplitVec3, [f32; 6]);

impl SplitVec3 {
    /// Recombine into double precision.
    pub fn to_dvec3(&self) -> DVec3 {
        DVec3::new(
            self.high[0] as f64 + self.low[0] as f64,
            self.high[1] as f64 + self.low[1] as f64,
            self.high[2] as f64 + self.low[2] as f64,
        )
    }
}

/// Split one value: `high` is the nearest `f32`, `low` the rounded remainder.
#[inline]
pub fn split_f64(value: f64) -> (f32, f32) {
    let high = value as f32;
    let low = (value - high as f64) as f32;
    (high, low)
}

pub fn split_dvec3(v: DVec3) -> SplitVec3 {
    let (hx, lx) = split_f64(v.x);
    let (hy, ly) = split_f64(v.y);
    let (hz, lz) = split_f64(v.z);
    SplitVec3 {
        high: [hx, hy, hz],
        low: [lx, ly, lz],
    }
}

/// Split a packed `xyz` position array into parallel high and low arrays.
pub fn split_positions(positions: &[f64]) -> (Vec<f32>, Vec<f32>) {
    let mut high = Vec::with_capacity(positions.len());
    let mut low = Vec::with_capacity(positions.len());
    for &p in positions {
        let (h, l) = split_f64(p);
        high.push(h);
        low.push(l);
    }
    (high, low)
}
