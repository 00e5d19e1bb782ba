//! Globe quad-tree: per-frame LOD traversal over one or more root tiles,
//! segment elevation and geometry, LOD transition fading, and the
//! [`Planet`] driver that ties them to a camera and a terrain loader.

mod arena;
pub mod elevation;
pub mod equalize;
mod fading;
mod geometry;
mod gpu;
pub mod horizon;
mod imagery;
mod lock;
mod node;
mod options;
mod picking;
mod planet;
mod quadtree;
mod segment;
mod strategy;

#[cfg(test)]
mod scenario_tests;

pub use arena::{Arena, Handle};
pub use fading::{FadingController, RenderPasses};
pub use geometry::{GeometryCache, grid_indices, grid_texcoords};
pub use gpu::{BufferHandle, BufferInfo, BufferKind, RecordingBackend, RenderBackend, SegmentBuffers};
pub use imagery::ImagerySource;
pub use lock::LoadLock;
pub use node::{Node, NodeHandle, NodeState};
pub use options::{
    EqualZoomOptions, FadingOptions, HORIZON_TANGENT, LodOptions, MAX_NODES, MemoryOptions,
    PlanetOptions, TerrainOptions,
};
pub use picking::{
    MAX_PICK_ID, PickEvent, PickEventKind, Pickable, PickableHandle, PickableKind,
    PickingRegistry, color_to_id, id_to_color,
};
pub use planet::{FrameStats, Planet};
pub use quadtree::{QuadTree, RemovedNode, Traversal};
pub use segment::{
    ElevationContext, ElevationSource, ElevationState, LoadOutcome, Segment, SurfaceParams,
};
pub use strategy::{
    ChildSpec, CullContext, GeographicStrategy, MercatorStrategy, PartId, PolarCapStrategy,
    SubdivisionKind, SubdivisionStrategy, grid_position,
};
