use std::sync::Arc;

use orbis_math::{Extent, LonLat};
use orbis_terrain::TileKey;

use crate::{Handle, PartId, Segment, SubdivisionStrategy};

pub type NodeHandle = Handle<Node>;

/// What the traversal decided for a node this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeState {
    /// Split; the children were visited instead.
    Walkthrough,
    Rendering,
    /// Culled or not reached.
    #[default]
    NotRendering,
}

/// One quad-tree cell. Owns its segment; children and parent are arena handles.
#[derive(Debug)]
pub struct Node {
    pub part: PartId,
    pub key: TileKey,
    pub extent: Extent,
    pub parent: Option<NodeHandle>,
    pub children: Option<[NodeHandle; 4]>,
    pub segment: Segment,
    pub strategy: Arc<dyn SubdivisionStrategy>,
    pub state: NodeState,
    /// Bit `i` set when the node intersects camera frustum `i`.
    pub in_frustum: u32,
    /// Last frame in which the traversal reached this node.
    pub last_visit: u64,
    /// Fading-out nodes overlapping this one while it fades in.
    pub fading_nodes: Vec<NodeHandle>,
}

impl Node {
    pub fn zoom(&self) -> u8 {
        self.key.zoom
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn center(&self) -> LonLat {
        self.strategy.center(&self.extent)
    }

    /// Whether the two nodes cover part of the same surface.
    pub fn overlaps(&self, other: &Node) -> bool {
        self.key == other.key
            || self.key.is_descendant_of(&other.key)
            || other.key.is_descendant_of(&self.key)
    }

    pub fn is_in_frustum(&self, index: usize) -> bool {
        self.in_frustum & (1 << index) != 0
    }
}
