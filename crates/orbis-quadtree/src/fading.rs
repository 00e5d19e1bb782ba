//! Transition opacity between LOD levels.
//!
//! A node entering the rendered set fades in from 0. A node leaving it keeps
//! drawing in a separate fade-out map, keyed by tile id, while its opacity
//! falls to 0. The fade-out holds at its current opacity while an
//! overlapping fade-in still waits for data, for at most `max_hold_frames`.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{FadingOptions, Node, NodeHandle, QuadTree};

/// Draw lists for one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderPasses {
    /// Fully opaque rendered nodes.
    pub opaque: Vec<NodeHandle>,
    /// Nodes with opacity below 1, fading in or out, coarse first.
    pub transparent: Vec<NodeHandle>,
}

impl RenderPasses {
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }
}

#[derive(Clone, Copy, Debug)]
struct FadeOut {
    handle: NodeHandle,
    held: u32,
}

#[derive(Debug)]
pub struct FadingController {
    options: FadingOptions,
    /// Rendered nodes below full opacity and the frames they waited for data.
    fading_in: FxHashMap<NodeHandle, u32>,
    fading_out: FxHashMap<u64, FadeOut>,
    previous: FxHashSet<NodeHandle>,
}

impl FadingController {
    pub fn new(options: FadingOptions) -> Self {
        Self {
            options,
            fading_in: FxHashMap::default(),
            fading_out: FxHashMap::default(),
            previous: FxHashSet::default(),
        }
    }

    pub fn options(&self) -> &FadingOptions {
        &self.options
    }

    pub fn fading_in_count(&self) -> usize {
        self.fading_in.len()
    }

    pub fn fading_out_count(&self) -> usize {
        self.fading_out.len()
    }

    pub fn fading_in_handles(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.fading_in.keys().copied()
    }

    pub fn fading_out_handles(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.fading_out.values().map(|f| f.handle)
    }

    /// Reconcile with this frame's rendered set and step every fade.
    pub fn update(&mut self, tree: &mut QuadTree, rendered: &[NodeHandle]) -> RenderPasses {
        let current: FxHashSet<NodeHandle> = rendered.iter().copied().collect();
        if !self.options.enabled {
            for &h in rendered {
                if let Some(node) = tree.get_mut(h) {
                    node.segment.transition_opacity = 1.0;
                    node.fading_nodes.clear();
                }
            }
            self.fading_in.clear();
            self.fading_out.clear();
            self.previous = current;
            return RenderPasses {
                opaque: rendered.to_vec(),
                transparent: Vec::new(),
            };
        }

        // Entering nodes continue from a fade-out or start from zero.
        for &h in rendered {
            if self.previous.contains(&h) {
                continue;
            }
            let Some(node) = tree.get_mut(h) else {
                continue;
            };
            if self.fading_out.remove(&node.key.id()).is_none() {
                node.segment.transition_opacity = 0.0;
            }
            if node.segment.transition_opacity < 1.0 {
                self.fading_in.insert(h, 0);
            }
        }

        // Leaving nodes start fading out.
        for &h in &self.previous {
            if current.contains(&h) {
                continue;
            }
            self.fading_in.remove(&h);
            if let Some(node) = tree.get_mut(h) {
                node.fading_nodes.clear();
                if node.segment.transition_opacity > 0.0 {
                    self.fading_out.insert(node.key.id(), FadeOut { handle: h, held: 0 });
                }
            }
        }

        let rate = self.options.rate.max(f32::EPSILON);
        let max_hold = self.options.max_hold_frames;

        self.fading_in.retain(|&h, waited| {
            let Some(node) = tree.get_mut(h) else {
                return false;
            };
            let segment = &mut node.segment;
            if segment.is_drawable() || *waited >= max_hold {
                segment.transition_opacity = (segment.transition_opacity + rate).min(1.0);
            } else {
                *waited += 1;
            }
            segment.transition_opacity < 1.0
        });

        let waiting: Vec<NodeHandle> = self
            .fading_in
            .iter()
            .filter(|(h, _)| tree.get(**h).is_some_and(|n| !n.segment.is_drawable()))
            .map(|(h, _)| *h)
            .collect();
        self.fading_out.retain(|_, fade| {
            let Some(node) = tree.get(fade.handle) else {
                return false;
            };
            let hold = fade.held < max_hold
                && waiting
                    .iter()
                    .any(|&w| tree.get(w).is_some_and(|n| n.overlaps(node)));
            let Some(node) = tree.get_mut(fade.handle) else {
                return false;
            };
            if hold {
                fade.held += 1;
            } else {
                node.segment.transition_opacity = (node.segment.transition_opacity - rate).max(0.0);
            }
            node.segment.transition_opacity > 0.0
        });

        self.link_fading_nodes(tree, rendered);
        self.previous = current;
        self.passes(tree, rendered)
    }

    /// Point every fading-in node at the fade-outs it overlaps.
    fn link_fading_nodes(&self, tree: &mut QuadTree, rendered: &[NodeHandle]) {
        let outs: Vec<NodeHandle> = self.fading_out_handles().collect();
        for &h in rendered {
            let linked: Vec<NodeHandle> = if self.fading_in.contains_key(&h) {
                let Some(node) = tree.get(h) else {
                    continue;
                };
                outs.iter()
                    .copied()
                    .filter(|&o| tree.get(o).is_some_and(|n| n.overlaps(node)))
                    .collect()
            } else {
                Vec::new()
            };
            if let Some(node) = tree.get_mut(h) {
                node.fading_nodes = linked;
            }
        }
    }

    fn passes(&self, tree: &QuadTree, rendered: &[NodeHandle]) -> RenderPasses {
        let mut passes = RenderPasses::default();
        for &h in rendered {
            if self.fading_in.contains_key(&h) {
                passes.transparent.push(h);
            } else {
                passes.opaque.push(h);
            }
        }
        passes.transparent.extend(self.fading_out_handles());
        passes
            .transparent
            .sort_by_key(|&h| tree.get(h).map(Node::zoom).unwrap_or(u8::MAX));
        passes
    }

    /// Stop tracking a destroyed node.
    pub fn forget(&mut self, node: &Node, handle: NodeHandle) {
        self.fading_in.remove(&handle);
        self.previous.remove(&handle);
        if self
            .fading_out
            .get(&node.key.id())
            .is_some_and(|f| f.handle == handle)
        {
            self.fading_out.remove(&node.key.id());
        }
    }

    pub fn clear(&mut self) {
        self.fading_in.clear();
        self.fading_out.clear();
        self.previous.clear();
    }
}
