//! No-data sentinel detection.

/// Elevation values that mean "no data here".
///
/// Sentinels are kept sorted so membership is a binary search. Values above
/// the sanity ceiling and NaN are treated as missing too.
#[derive(Clone, Debug, PartialEq)]
pub struct NoDataValues {
    sorted: Vec<f32>,
    max_valid_height: f32,
}

impl NoDataValues {
    pub fn new(values: impl IntoIterator<Item = f32>, max_valid_height: f32) -> Self {
        let mut sorted: Vec<f32> = values.into_iter().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(f32::total_cmp);
        sorted.dedup();
        Self {
            sorted,
            max_valid_height,
        }
    }

    /// Add more sentinels, keeping the list sorted.
    pub fn extend(&mut self, values: impl IntoIterator<Item = f32>) {
        self.sorted.extend(values.into_iter().filter(|v| !v.is_nan()));
        self.sorted.sort_by(f32::total_cmp);
        self.sorted.dedup();
    }

    pub fn is_no_data(&self, value: f32) -> bool {
        value.is_nan()
            || value > self.max_valid_height
            || self.sorted.binary_search_by(|v| v.total_cmp(&value)).is_ok()
    }

    pub fn values(&self) -> &[f32] {
        &self.sorted
    }

    pub fn max_valid_height(&self) -> f32 {
        self.max_valid_height
    }
}

impl Default for NoDataValues {
    fn default() -> Self {
        Self::new([-32_767.0, -9_999.0], 50_000.0)
    }
}
