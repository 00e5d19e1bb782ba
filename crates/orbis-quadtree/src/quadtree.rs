//! The node arena and the per-frame LOD traversal.
//!
//! Nodes live in a generational [`Arena`]; parents own their children by
//! handle and children point back with a non-owning handle. A tile-key index
//! maps loaded results and neighbour lookups back to live nodes.

use std::sync::Arc;

use orbis_camera::Camera;
use orbis_terrain::TileKey;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::elevation::FallbackSource;
use crate::{
    Arena, CullContext, LodOptions, Node, NodeHandle, NodeState, PartId, Segment,
    SubdivisionStrategy, SurfaceParams,
};

/// Per-frame inputs and outputs of [`QuadTree::render_tree`].
pub struct Traversal<'a> {
    pub camera: &'a Camera,
    pub lod: &'a LodOptions,
    /// Projected-size threshold above which a node splits.
    pub lod_size: f64,
    pub frame: u64,
    pub surface: SurfaceParams,
    /// Provider height range used to bound nodes without data.
    pub height_hint: (f64, f64),
    pub rendered: Vec<NodeHandle>,
    /// Nodes created during this traversal.
    pub created: Vec<NodeHandle>,
}

impl<'a> Traversal<'a> {
    pub fn new(
        camera: &'a Camera,
        lod: &'a LodOptions,
        frame: u64,
        surface: SurfaceParams,
        height_hint: (f64, f64),
    ) -> Self {
        Self {
            camera,
            lod,
            lod_size: lod.lod_size(camera.slope()),
            frame,
            surface,
            height_hint,
            rendered: Vec::new(),
            created: Vec::new(),
        }
    }

    fn cull(&self) -> CullContext<'a> {
        CullContext {
            camera: self.camera,
            horizon_tangent: self.lod.horizon_tangent,
            horizon_tangent_min_zoom: self.lod.horizon_tangent_min_zoom,
        }
    }
}

/// A node detached from the tree, with the handle it had.
pub type RemovedNode = (NodeHandle, Node);

#[derive(Debug, Default)]
pub struct QuadTree {
    nodes: Arena<Node>,
    roots: Vec<NodeHandle>,
    strategies: Vec<Arc<dyn SubdivisionStrategy>>,
    index: FxHashMap<TileKey, NodeHandle>,
    /// Child grids pre-computed from a parent's raw data, keyed by child tile.
    child_cache: FxHashMap<TileKey, Vec<f32>>,
}

impl QuadTree {
    /// One root per strategy.
    pub fn new(
        strategies: Vec<Arc<dyn SubdivisionStrategy>>,
        root_grid: usize,
        surface: &SurfaceParams,
        height_hint: (f64, f64),
    ) -> Self {
        let mut tree = Self {
            strategies,
            ..Default::default()
        };
        tree.create_roots(root_grid, surface, height_hint);
        tree
    }

    fn create_roots(&mut self, grid: usize, surface: &SurfaceParams, height_hint: (f64, f64)) {
        for strategy in self.strategies.clone() {
            let key = TileKey::root(strategy.group());
            let extent = strategy.root_extent();
            let segment = Segment::new(key, extent, grid, strategy.as_ref(), surface, None, height_hint);
            let handle = self.nodes.insert(Node {
                part: PartId::Root,
                key,
                extent,
                parent: None,
                children: None,
                segment,
                strategy,
                state: NodeState::NotRendering,
                in_frustum: 0,
                last_visit: 0,
                fading_nodes: Vec::new(),
            });
            self.index.insert(key, handle);
            self.roots.push(handle);
        }
    }

    pub fn roots(&self) -> &[NodeHandle] {
        &self.roots
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains(handle)
    }

    pub fn node_for_key(&self, key: &TileKey) -> Option<NodeHandle> {
        self.index.get(key).copied()
    }

    /// Number of live nodes, roots included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &Node)> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NodeHandle, &mut Node)> {
        self.nodes.iter_mut()
    }

    /// Nearest node up the parent chain whose terrain is ready and exists.
    /// `inclusive` also considers `handle` itself.
    pub fn nearest_fallback(&self, handle: NodeHandle, inclusive: bool) -> Option<FallbackSource> {
        let mut current = if inclusive {
            Some(handle)
        } else {
            self.nodes.get(handle)?.parent
        };
        while let Some(h) = current {
            let node = self.nodes.get(h)?;
            if let Some(source) = node.segment.as_fallback() {
                return Some(source);
            }
            current = node.parent;
        }
        None
    }

    /// Nearest live ancestor-or-self of `key` in `set`.
    pub fn covering_node(&self, key: &TileKey, set: &FxHashSet<NodeHandle>) -> Option<NodeHandle> {
        let mut candidate = Some(*key);
        while let Some(k) = candidate {
            if let Some(&h) = self.index.get(&k)
                && set.contains(&h)
            {
                return Some(h);
            }
            candidate = k.parent();
        }
        None
    }

    pub fn store_child_grids(&mut self, parent: &TileKey, grids: [Vec<f32>; 4]) {
        for (key, grid) in parent.children().into_iter().zip(grids) {
            self.child_cache.insert(key, grid);
        }
    }

    pub fn take_child_grid(&mut self, key: &TileKey) -> Option<Vec<f32>> {
        self.child_cache.remove(key)
    }

    pub fn cached_child_grids(&self) -> usize {
        self.child_cache.len()
    }

    /// Create the four children of `handle` if it has none.
    pub fn ensure_children(&mut self, handle: NodeHandle, t: &mut Traversal<'_>) -> Option<[NodeHandle; 4]> {
        let node = self.nodes.get(handle)?;
        if let Some(children) = node.children {
            return Some(children);
        }
        let strategy = Arc::clone(&node.strategy);
        let specs = strategy.create_child_nodes(&node.key, &node.extent);
        let grid = t.lod.grid_size(node.key.zoom + 1);
        let fallback = self.nearest_fallback(handle, true);

        let children = specs.map(|spec| {
            let segment = Segment::new(
                spec.key,
                spec.extent,
                grid,
                strategy.as_ref(),
                &t.surface,
                fallback.as_ref(),
                t.height_hint,
            );
            let child = self.nodes.insert(Node {
                part: spec.part,
                key: spec.key,
                extent: spec.extent,
                parent: Some(handle),
                children: None,
                segment,
                strategy: Arc::clone(&strategy),
                state: NodeState::NotRendering,
                in_frustum: 0,
                last_visit: t.frame,
                fading_nodes: Vec::new(),
            });
            self.index.insert(spec.key, child);
            t.created.push(child);
            child
        });
        if let Some(node) = self.nodes.get_mut(handle) {
            node.children = Some(children);
        }
        Some(children)
    }

    /// Cull and classify `handle`, recording its frustum mask. Returns the mask.
    fn visit(&mut self, handle: NodeHandle, t: &Traversal<'_>) -> u32 {
        let Some(node) = self.nodes.get_mut(handle) else {
            return 0;
        };
        node.last_visit = t.frame;
        let max_height = node.segment.cull_max_height(t.surface.height_factor);
        let mask = node.strategy.is_visible(
            &t.cull(),
            &node.extent,
            node.segment.bounds(),
            max_height,
            node.key.zoom,
        );
        node.in_frustum = mask;
        if mask == 0 {
            node.state = NodeState::NotRendering;
        }
        mask
    }

    /// Select the nodes to draw under `handle` for this frame.
    pub fn render_tree(&mut self, handle: NodeHandle, t: &mut Traversal<'_>) {
        if self.visit(handle, t) == 0 {
            return;
        }
        let Some(node) = self.nodes.get(handle) else {
            return;
        };
        let bounds = node.segment.bounds();
        let size = t.camera.projected_size(bounds.center, bounds.radius);
        let split = size > t.lod_size
            && node.key.zoom < t.lod.max_node_zoom
            && node.segment.render_frame != t.frame;

        if split {
            if let Some(node) = self.nodes.get_mut(handle) {
                node.state = NodeState::Walkthrough;
            }
            if let Some(children) = self.ensure_children(handle, t) {
                for child in children {
                    self.render_tree(child, t);
                }
            }
        } else {
            self.render_node(handle, t);
        }
    }

    fn render_node(&mut self, handle: NodeHandle, t: &mut Traversal<'_>) {
        if let Some(node) = self.nodes.get_mut(handle) {
            node.state = NodeState::Rendering;
            node.segment.render_frame = t.frame;
            t.rendered.push(handle);
        }
    }

    /// Re-subdivide every rendered node coarser than `target` down to `target`.
    ///
    /// A node none of whose descendants at `target` is visible keeps rendering.
    pub fn equalize_rendered_zoom(&mut self, target: u8, t: &mut Traversal<'_>) {
        let selected = std::mem::take(&mut t.rendered);
        for handle in selected {
            let zoom = match self.nodes.get(handle) {
                Some(node) => node.key.zoom,
                None => continue,
            };
            if zoom >= target {
                t.rendered.push(handle);
                continue;
            }
            let before = t.rendered.len();
            self.descend_to_zoom(handle, target, t);
            if t.rendered.len() == before {
                t.rendered.push(handle);
            } else if let Some(node) = self.nodes.get_mut(handle) {
                node.state = NodeState::Walkthrough;
            }
        }
    }

    fn descend_to_zoom(&mut self, handle: NodeHandle, target: u8, t: &mut Traversal<'_>) {
        let Some(children) = self.ensure_children(handle, t) else {
            return;
        };
        for child in children {
            if self.visit(child, t) == 0 {
                continue;
            }
            let reached = self.nodes.get(child).is_some_and(|n| n.key.zoom >= target);
            if reached {
                self.render_node(child, t);
                continue;
            }
            let before = t.rendered.len();
            self.descend_to_zoom(child, target, t);
            if t.rendered.len() == before {
                self.render_node(child, t);
            } else if let Some(node) = self.nodes.get_mut(child) {
                node.state = NodeState::Walkthrough;
            }
        }
    }

    /// Destroy every subtree whose children all went unvisited for more than
    /// `idle_frames`.
    pub fn prune(&mut self, frame: u64, idle_frames: u64) -> Vec<RemovedNode> {
        let stale: Vec<NodeHandle> = self
            .nodes
            .iter()
            .filter(|(_, node)| {
                node.children.is_some_and(|children| {
                    children.iter().all(|&c| {
                        self.nodes
                            .get(c)
                            .is_some_and(|n| n.is_leaf() && frame.saturating_sub(n.last_visit) > idle_frames)
                    })
                })
            })
            .map(|(h, _)| h)
            .collect();
        let mut removed = Vec::new();
        for handle in stale {
            removed.extend(self.destroy_children(handle));
        }
        removed
    }

    /// Detach and return the whole branch below `handle`.
    pub fn destroy_children(&mut self, handle: NodeHandle) -> Vec<RemovedNode> {
        let mut removed = Vec::new();
        let Some(children) = self.nodes.get_mut(handle).and_then(|n| n.children.take()) else {
            return removed;
        };
        let mut stack = children.to_vec();
        while let Some(h) = stack.pop() {
            if let Some(mut node) = self.nodes.remove(h) {
                if let Some(grandchildren) = node.children.take() {
                    stack.extend(grandchildren);
                }
                self.index.remove(&node.key);
                for key in node.key.children() {
                    self.child_cache.remove(&key);
                }
                removed.push((h, node));
            }
        }
        removed
    }

    /// Drop everything below the roots.
    pub fn clear_below_roots(&mut self) -> Vec<RemovedNode> {
        let mut removed = Vec::new();
        for root in self.roots.clone() {
            removed.extend(self.destroy_children(root));
        }
        self.child_cache.clear();
        removed
    }

    /// Destroy the whole tree, roots included, and rebuild fresh roots.
    pub fn reset(
        &mut self,
        root_grid: usize,
        surface: &SurfaceParams,
        height_hint: (f64, f64),
    ) -> Vec<RemovedNode> {
        let mut removed = self.clear_below_roots();
        for root in std::mem::take(&mut self.roots) {
            if let Some(node) = self.nodes.remove(root) {
                self.index.remove(&node.key);
                removed.push((root, node));
            }
        }
        self.create_roots(root_grid, surface, height_hint);
        removed
    }
}
