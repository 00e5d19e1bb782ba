//! Globe camera: orientation, cascaded frustums, and the projected-size
//! metric that drives quad-tree level-of-detail selection.

mod camera;
mod frustum;

pub use camera::{Camera, CameraOptions, DEFAULT_FRUSTUMS};
pub use frustum::Frustum;
