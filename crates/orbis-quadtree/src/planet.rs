//! The per-frame driver tying the quad-tree to camera, loader and renderer.
//!
//! One call to [`Planet::frame`] applies finished terrain, walks the tree,
//! reconciles fades, issues new requests and prepares geometry for drawing.
//! Nothing in the frame returns an error: failed tiles degrade to ancestor
//! or flat data.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use glam::{DVec2, DVec3};
use orbis_camera::Camera;
use orbis_math::LonLat;
use orbis_terrain::{
    HeightQuery, LoaderMode, MAX_KEY_ZOOM, NoDataValues, TerrainError, TerrainLoader, TerrainProvider,
};
use rustc_hash::FxHashSet;

use crate::equalize::{NeighbourSurface, Side, edge_signature, equalize_edges};
use crate::quadtree::RemovedNode;
use crate::segment::{ElevationContext, LoadOutcome};
use crate::{
    FadingController, GeometryCache, ImagerySource, LoadLock, NodeHandle, PickEvent,
    PickEventKind, PickableHandle, PickableKind, PickingRegistry, PlanetOptions, QuadTree,
    RecordingBackend, RenderBackend, RenderPasses, SurfaceParams, TerrainOptions, Traversal,
};

/// Counters of one frame, logged at debug level.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    pub nodes: usize,
    pub rendered: usize,
    pub created: usize,
    pub removed: usize,
    pub applied: usize,
    pub requests: usize,
    pub in_flight: u64,
    pub fading_in: usize,
    pub fading_out: usize,
    pub geometry_builds: usize,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub equal_zoom: bool,
    pub mem_cleared: bool,
}

pub struct Planet<B: RenderBackend = RecordingBackend> {
    options: PlanetOptions,
    surface: SurfaceParams,
    tree: QuadTree,
    loader: TerrainLoader,
    no_data: NoDataValues,
    height_hint: (f64, f64),
    geometry: GeometryCache,
    fading: FadingController,
    picking: PickingRegistry,
    imagery: Vec<Box<dyn ImagerySource>>,
    terrain_lock: LoadLock,
    layer_lock: LoadLock,
    backend: B,
    frame: u64,
    rendered: Vec<NodeHandle>,
    rendered_in_frustum: Vec<Vec<NodeHandle>>,
    passes: RenderPasses,
    equal_zoom_active: bool,
    last_clear_eye: Option<DVec3>,
    stats: FrameStats,
}

fn no_data_for(provider: &dyn TerrainProvider, options: &TerrainOptions) -> NoDataValues {
    NoDataValues::new(
        provider
            .no_data_values()
            .iter()
            .chain(&options.extra_no_data)
            .copied(),
        options.max_valid_height,
    )
}

impl<B: RenderBackend> Planet<B> {
    pub fn new(
        mut options: PlanetOptions,
        provider: Arc<dyn TerrainProvider>,
        mode: LoaderMode,
        backend: B,
    ) -> Result<Self, TerrainError> {
        if provider.tiling() != options.subdivision.tiling() {
            tracing::warn!(
                provider = provider.name(),
                "terrain tiling differs from the planet subdivision; tiles are sampled by extent"
            );
        }
        if options.lod.max_node_zoom > MAX_KEY_ZOOM {
            tracing::warn!(
                max_node_zoom = options.lod.max_node_zoom,
                "max node zoom clamped to {MAX_KEY_ZOOM}"
            );
            options.lod.max_node_zoom = MAX_KEY_ZOOM;
        }
        let loader = TerrainLoader::new(provider, mode, options.terrain.max_in_flight)?;
        let no_data = no_data_for(loader.provider().as_ref(), &options.terrain);
        let height_hint = loader.provider().height_bounds();
        let surface = SurfaceParams {
            ellipsoid: options.ellipsoid,
            height_factor: options.height_factor,
        };
        let tree = QuadTree::new(
            options.subdivision.roots(),
            options.lod.grid_size(0),
            &surface,
            height_hint,
        );
        let mut geometry = GeometryCache::new();
        geometry.init(&options.lod.grid_size_by_zoom);
        tracing::info!(
            provider = loader.provider().name(),
            roots = tree.roots().len(),
            "planet created"
        );

        Ok(Self {
            fading: FadingController::new(options.fading.clone()),
            options,
            surface,
            tree,
            loader,
            no_data,
            height_hint,
            geometry,
            picking: PickingRegistry::new(),
            imagery: Vec::new(),
            terrain_lock: LoadLock::new(),
            layer_lock: LoadLock::new(),
            backend,
            frame: 0,
            rendered: Vec::new(),
            rendered_in_frustum: Vec::new(),
            passes: RenderPasses::default(),
            equal_zoom_active: false,
            last_clear_eye: None,
            stats: FrameStats::default(),
        })
    }

    /// Run one frame for `camera`.
    pub fn frame(&mut self, camera: &Camera) -> FrameStats {
        self.frame += 1;
        let frame = self.frame;
        let mut stats = FrameStats {
            frame,
            ..Default::default()
        };

        stats.applied = self.apply_loaded();
        stats.mem_cleared = self.check_memory(camera);

        let mut t = Traversal::new(
            camera,
            &self.options.lod,
            frame,
            self.surface,
            self.height_hint,
        );
        for root in self.tree.roots().to_vec() {
            self.tree.render_tree(root, &mut t);
        }
        self.equal_zoom_active = self.update_equal_zoom(camera);
        if self.equal_zoom_active {
            let target = t
                .rendered
                .iter()
                .filter_map(|&h| self.tree.get(h))
                .map(|n| n.zoom())
                .max();
            if let Some(target) = target {
                self.tree.equalize_rendered_zoom(target, &mut t);
            }
        }
        let Traversal {
            rendered, created, ..
        } = t;
        stats.created = created.len();
        for &h in &created {
            self.seed_from_child_cache(h);
        }

        self.rendered = rendered;
        self.rendered_in_frustum = self.collect_in_frustum(camera.frustum_count());
        self.poll_imagery();
        self.passes = self.fading.update(&mut self.tree, &self.rendered);

        stats.requests = self.issue_requests(camera);
        stats.geometry_builds = self.prepare_geometry();

        let removed = self.tree.prune(frame, self.options.lod.prune_after_frames);
        stats.removed = removed.len();
        self.discard_nodes(removed);

        let zooms = self.rendered.iter().filter_map(|&h| self.tree.get(h)).map(|n| n.zoom());
        stats.min_zoom = zooms.clone().min().unwrap_or(0);
        stats.max_zoom = zooms.max().unwrap_or(0);
        stats.nodes = self.tree.len();
        stats.rendered = self.rendered.len();
        stats.in_flight = self.loader.in_flight_count();
        stats.fading_in = self.fading.fading_in_count();
        stats.fading_out = self.fading.fading_out_count();
        stats.equal_zoom = self.equal_zoom_active;
        tracing::debug!(
            frame,
            nodes = stats.nodes,
            rendered = stats.rendered,
            created = stats.created,
            removed = stats.removed,
            requests = stats.requests,
            in_flight = stats.in_flight,
            zoom = ?(stats.min_zoom..=stats.max_zoom),
            equal_zoom = stats.equal_zoom,
            "frame"
        );
        self.stats = stats;
        stats
    }

    /// Apply finished requests to the segments still waiting for them.
    fn apply_loaded(&mut self) -> usize {
        let mut applied = 0;
        for loaded in self.loader.drain() {
            let Some(handle) = self.tree.node_for_key(&loaded.key) else {
                continue;
            };
            let waiting = self
                .tree
                .get(handle)
                .and_then(|n| n.segment.loading_token())
                .is_some_and(|token| token.same_as(&loaded.token));
            if !waiting {
                tracing::trace!(key = %loaded.key, "discarding stale terrain result");
                continue;
            }
            let fallback = self.tree.nearest_fallback(handle, false);
            let Some(node) = self.tree.get_mut(handle) else {
                continue;
            };
            let ctx = ElevationContext {
                no_data: &self.no_data,
                fallback,
                sea_level_zoom_diff: self.options.terrain.sea_level_zoom_diff,
                child_grid: self.options.lod.grid_size(node.key.zoom + 1),
            };
            let strategy = Arc::clone(&node.strategy);
            let child_grids = node.segment.handle_segment_terrain(
                loaded.result,
                &ctx,
                strategy.as_ref(),
                &self.surface,
                self.frame,
                &self.options.terrain,
            );
            let has_terrain = node.segment.terrain_exists();
            applied += 1;

            if let Some(grids) = child_grids {
                self.distribute_child_grids(handle, grids);
            }
            if has_terrain {
                self.refresh_descendants(handle);
            }
        }
        applied
    }

    /// Hand pre-computed grids to existing children without data, or keep
    /// them until the children are created.
    fn distribute_child_grids(&mut self, handle: NodeHandle, grids: [Vec<f32>; 4]) {
        let Some(node) = self.tree.get(handle) else {
            return;
        };
        let key = node.key;
        let Some(children) = node.children else {
            self.tree.store_child_grids(&key, grids);
            return;
        };
        let fallback = self.tree.nearest_fallback(handle, true);
        for (child, grid) in children.into_iter().zip(grids) {
            let Some(node) = self.tree.get_mut(child) else {
                continue;
            };
            if node.segment.is_ready() {
                continue;
            }
            if node.segment.is_loading() {
                node.segment.reset_loading();
                self.loader.cancel(&node.key);
            }
            let ctx = ElevationContext {
                no_data: &self.no_data,
                fallback: fallback.clone(),
                sea_level_zoom_diff: self.options.terrain.sea_level_zoom_diff,
                child_grid: self.options.lod.grid_size(node.key.zoom + 1),
            };
            let strategy = Arc::clone(&node.strategy);
            node.segment.apply_cached(grid, &ctx, strategy.as_ref(), &self.surface);
        }
    }

    /// Re-seed descendants that were built from coarser data than `handle` now has.
    fn refresh_descendants(&mut self, handle: NodeHandle) {
        let Some(fallback) = self.tree.nearest_fallback(handle, true) else {
            return;
        };
        let mut stack: Vec<NodeHandle> = self
            .tree
            .get(handle)
            .and_then(|n| n.children)
            .map(|c| c.to_vec())
            .unwrap_or_default();
        while let Some(h) = stack.pop() {
            let Some(node) = self.tree.get_mut(h) else {
                continue;
            };
            let strategy = Arc::clone(&node.strategy);
            node.segment.refresh_from_ancestor(
                &fallback,
                self.options.terrain.sea_level_zoom_diff,
                strategy.as_ref(),
                &self.surface,
            );
            if let Some(children) = node.children {
                stack.extend(children);
            }
        }
    }

    fn seed_from_child_cache(&mut self, handle: NodeHandle) {
        let Some(key) = self.tree.get(handle).map(|n| n.key) else {
            return;
        };
        let Some(grid) = self.tree.take_child_grid(&key) else {
            return;
        };
        let fallback = self.tree.nearest_fallback(handle, false);
        let Some(node) = self.tree.get_mut(handle) else {
            return;
        };
        let ctx = ElevationContext {
            no_data: &self.no_data,
            fallback,
            sea_level_zoom_diff: self.options.terrain.sea_level_zoom_diff,
            child_grid: self.options.lod.grid_size(key.zoom + 1),
        };
        let strategy = Arc::clone(&node.strategy);
        node.segment.apply_cached(grid, &ctx, strategy.as_ref(), &self.surface);
    }

    /// Full clear once the tree is too large and the camera has travelled far enough.
    fn check_memory(&mut self, camera: &Camera) -> bool {
        let eye = camera.eye();
        let last = *self.last_clear_eye.get_or_insert(eye);
        let memory = &self.options.memory;
        if self.tree.len() > memory.max_nodes && last.distance(eye) > memory.min_clear_distance {
            self.mem_clear();
            self.last_clear_eye = Some(eye);
            return true;
        }
        false
    }

    /// Destroy every node below the roots and restart loading from scratch.
    pub fn mem_clear(&mut self) {
        tracing::info!(nodes = self.tree.len(), "clearing quad-tree");
        let removed = self.tree.clear_below_roots();
        self.discard_nodes(removed);
        for root in self.tree.roots().to_vec() {
            if let Some(node) = self.tree.get_mut(root) {
                if let Some(token) = node.segment.loading_token() {
                    token.cancel();
                    self.loader.cancel(&node.key);
                }
                node.segment.reset_loading();
            }
        }
        self.reset_frame_state();
    }

    fn reset_frame_state(&mut self) {
        self.fading.clear();
        self.rendered.clear();
        self.rendered_in_frustum.clear();
        self.passes = RenderPasses::default();
        self.geometry.clear(&mut self.backend);
        self.geometry.init(&self.options.lod.grid_size_by_zoom);
    }

    /// Throw the whole tree away, roots included.
    fn reset_tree(&mut self) {
        self.loader.abort_all();
        for layer in &mut self.imagery {
            layer.clear();
        }
        let removed = self.tree.reset(
            self.options.lod.grid_size(0),
            &self.surface,
            self.height_hint,
        );
        self.discard_nodes(removed);
        self.reset_frame_state();
    }

    fn discard_nodes(&mut self, removed: Vec<RemovedNode>) {
        for (handle, mut node) in removed {
            if node.segment.is_loading() {
                node.segment.reset_loading();
                self.loader.cancel(&node.key);
            }
            // A layer may have been added after this node's imagery request,
            // so every layer hears about the destruction.
            for layer in &mut self.imagery {
                layer.cancel(&node.key);
            }
            node.segment.release_gpu(&mut self.backend);
            self.fading.forget(&node, handle);
        }
    }

    fn update_equal_zoom(&self, camera: &Camera) -> bool {
        let eq = &self.options.equal_zoom;
        if !eq.enabled {
            return false;
        }
        let altitude = camera.altitude();
        // Steep views only: slope falls to 0 as the camera tilts to the horizon.
        let slope = camera.slope();
        if self.equal_zoom_active {
            altitude <= eq.max_altitude + eq.altitude_hysteresis
                && altitude >= eq.min_altitude - eq.altitude_hysteresis
                && slope >= eq.min_slope - eq.slope_hysteresis
        } else {
            altitude < eq.max_altitude - eq.altitude_hysteresis
                && altitude > eq.min_altitude + eq.altitude_hysteresis
                && slope > eq.min_slope + eq.slope_hysteresis
        }
    }

    fn collect_in_frustum(&self, count: usize) -> Vec<Vec<NodeHandle>> {
        let mut lists = vec![Vec::new(); count];
        for &h in &self.rendered {
            let Some(node) = self.tree.get(h) else {
                continue;
            };
            for (i, list) in lists.iter_mut().enumerate() {
                if node.is_in_frustum(i) {
                    list.push(h);
                }
            }
        }
        lists
    }

    /// Request terrain and imagery for rendered nodes, nearest first.
    fn issue_requests(&mut self, camera: &Camera) -> usize {
        let eye = camera.eye();
        let mut order: Vec<(f64, NodeHandle)> = self
            .rendered
            .iter()
            .filter_map(|&h| {
                self.tree
                    .get(h)
                    .map(|n| (n.segment.bounds().center.distance_squared(eye), h))
            })
            .collect();
        order.sort_by(|a, b| a.0.total_cmp(&b.0));

        let provider = Arc::clone(self.loader.provider());
        // Segments stay NotLoaded until the provider is usable.
        let terrain_open = !self.terrain_lock.is_locked() && provider.is_ready();
        let mut submitted = 0;
        for (_, handle) in order {
            if terrain_open && self.request_terrain(handle, provider.as_ref()) {
                submitted += 1;
            }
            if !self.layer_lock.is_locked() {
                self.request_imagery(handle);
            }
        }
        submitted
    }

    /// Bring one segment towards ready. Returns whether a request was submitted.
    fn request_terrain(&mut self, handle: NodeHandle, provider: &dyn TerrainProvider) -> bool {
        let frame = self.frame;
        let Some(node) = self.tree.get(handle) else {
            return false;
        };
        if !node.segment.needs_terrain(frame) {
            return false;
        }
        let key = node.key;
        let strategy = Arc::clone(&node.strategy);

        if provider.is_empty() || key.zoom < provider.min_zoom() {
            if let Some(node) = self.tree.get_mut(handle) {
                node.segment.mark_empty(strategy.as_ref(), &self.surface);
            }
            return false;
        }
        if key.zoom > provider.max_zoom() {
            // Finer than the provider goes: magnify the deepest ancestor it serves.
            let fallback = self.tree.nearest_fallback(handle, false);
            if let Some(node) = self.tree.get_mut(handle) {
                node.segment.apply_fallback(
                    fallback.as_ref(),
                    false,
                    self.options.terrain.sea_level_zoom_diff,
                    strategy.as_ref(),
                    &self.surface,
                );
            }
            let deepest = key
                .ancestor(provider.max_zoom())
                .and_then(|k| self.tree.node_for_key(&k));
            if let Some(node) = deepest.and_then(|h| self.tree.get_mut(h)) {
                return node.segment.load_terrain(&self.loader, frame, false) == LoadOutcome::Submitted;
            }
            return false;
        }
        match self.tree.get_mut(handle) {
            Some(node) => node.segment.load_terrain(&self.loader, frame, false) == LoadOutcome::Submitted,
            None => false,
        }
    }

    /// Refresh which rendered segments still wait on an imagery layer. A tile
    /// whose imagery was never requested, because the layer lock is held, waits too.
    fn poll_imagery(&mut self) {
        if self.imagery.is_empty() {
            return;
        }
        for &h in &self.rendered {
            let Some(node) = self.tree.get_mut(h) else {
                continue;
            };
            node.segment.imagery_pending = !node.segment.imagery_requested
                || !self.imagery.iter().all(|layer| layer.is_ready(&node.key));
        }
    }

    fn request_imagery(&mut self, handle: NodeHandle) {
        if self.imagery.is_empty() {
            return;
        }
        let Some(node) = self.tree.get_mut(handle) else {
            return;
        };
        if node.segment.imagery_requested {
            return;
        }
        for layer in &mut self.imagery {
            layer.request(&node.key, &node.extent);
        }
        node.segment.imagery_requested = true;
        node.segment.imagery_pending = !self.imagery.iter().all(|layer| layer.is_ready(&node.key));
    }

    /// Equalize, build and upload geometry for everything that will be drawn.
    fn prepare_geometry(&mut self) -> usize {
        let rendered: FxHashSet<NodeHandle> = self.rendered.iter().copied().collect();
        let mut drawn: Vec<NodeHandle> = self.rendered.clone();
        drawn.extend(self.fading.fading_out_handles());

        let mut builds = 0;
        for handle in drawn {
            let Some(node) = self.tree.get(handle) else {
                continue;
            };
            let key = node.key;
            let neighbours = Side::ALL.map(|side| {
                let coarser = side.neighbour_key(&key)?.parent()?;
                let h = self.tree.covering_node(&coarser, &rendered)?;
                let n = self.tree.get(h)?;
                Some(NeighbourSurface {
                    key: n.key,
                    grid: n.segment.grid_size(),
                    heights: Arc::clone(n.segment.elevations()),
                    data_version: n.segment.data_version(),
                })
            });
            let signature = edge_signature(&key, &neighbours);
            let grid = node.segment.grid_size();
            if !node.segment.has_geometry() || node.segment.equalized != Some(signature) {
                let heights = equalize_edges(&key, grid, node.segment.elevations(), &neighbours)
                    .unwrap_or_else(|| node.segment.elevations().to_vec());
                let strategy = Arc::clone(&node.strategy);
                if let Some(node) = self.tree.get_mut(handle) {
                    node.segment.build_geometry(&heights, strategy.as_ref(), &self.surface);
                    node.segment.equalized = Some(signature);
                    builds += 1;
                }
            }
            self.geometry.index_buffer(grid, &mut self.backend);
            if let Some(node) = self.tree.get_mut(handle) {
                node.segment.upload(&mut self.backend);
            }
        }
        builds
    }

    /// Nearest terrain point under a pixel, from the currently rendered nodes.
    pub fn get_cartesian_from_pixel_terrain(&mut self, camera: &Camera, px: DVec2) -> Option<DVec3> {
        let ray = camera.ray_from_pixel(px);
        if ray.is_degenerate() {
            return None;
        }
        let mut nearest: Option<f64> = None;
        for &h in &self.rendered {
            let Some(node) = self.tree.get(h) else {
                continue;
            };
            let bounds = node.segment.bounds();
            if ray.hit_sphere(bounds.center, bounds.radius).is_none() {
                continue;
            }
            let indices = self.geometry.indices(node.segment.grid_size());
            if let Some(t) = node.segment.intersect_ray(&ray, &indices) {
                nearest = Some(nearest.map_or(t, |n| n.min(t)));
            }
        }
        nearest.map(|t| ray.at(t))
    }

    pub fn get_lonlat_from_pixel_terrain(&mut self, camera: &Camera, px: DVec2) -> Option<LonLat> {
        self.get_cartesian_from_pixel_terrain(camera, px)
            .map(|p| self.surface.ellipsoid.cartesian_to_lonlat(p))
    }

    /// Point elevation query, answered off the frame loop.
    pub fn get_height_async(&self, lonlat: LonLat, zoom: u8) -> HeightQuery {
        self.loader.request_height(lonlat, zoom)
    }

    /// Receive pick events for the planet surface.
    pub fn subscribe_terrain_events(&mut self) -> Option<Receiver<PickEvent>> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let existing = self.picking.find_kind(PickableKind::Terrain);
        if let Some(h) = existing {
            self.picking.unregister(h);
        }
        self.picking.register(PickableKind::Terrain, Some(tx))?;
        Some(rx)
    }

    /// Route a pointer event: to the object under `color` if one is
    /// registered, otherwise to the terrain under `px`.
    pub fn dispatch_pick(
        &mut self,
        camera: &Camera,
        px: DVec2,
        event: PickEventKind,
        color: Option<[u8; 3]>,
    ) -> bool {
        let target: Option<PickableHandle> = color.and_then(|c| self.picking.handle_for_color(c));
        if let Some(h) = target {
            return self.picking.dispatch(h, event, px, None);
        }
        let Some(terrain) = self.picking.find_kind(PickableKind::Terrain) else {
            return false;
        };
        let Some(position) = self.get_cartesian_from_pixel_terrain(camera, px) else {
            return false;
        };
        self.picking.dispatch(terrain, event, px, Some(position))
    }

    /// Change vertical exaggeration. Rebuilds the tree.
    pub fn set_height_factor(&mut self, factor: f64) {
        if factor == self.surface.height_factor {
            return;
        }
        tracing::info!(factor, "height factor changed");
        self.surface.height_factor = factor;
        self.options.height_factor = factor;
        self.reset_tree();
    }

    /// Swap the elevation source. Rebuilds the tree.
    pub fn set_terrain_provider(
        &mut self,
        provider: Arc<dyn TerrainProvider>,
        mode: LoaderMode,
    ) -> Result<(), TerrainError> {
        let loader = TerrainLoader::new(provider, mode, self.options.terrain.max_in_flight)?;
        self.loader.abort_all();
        self.loader.provider().clear_cache();
        self.loader = loader;
        self.no_data = no_data_for(self.loader.provider().as_ref(), &self.options.terrain);
        self.height_hint = self.loader.provider().height_bounds();
        tracing::info!(provider = self.loader.provider().name(), "terrain provider changed");
        self.reset_tree();
        Ok(())
    }

    /// Attach an imagery layer. Tiles that already requested imagery request
    /// this layer too, unless the layer lock is held.
    pub fn add_imagery(&mut self, mut layer: Box<dyn ImagerySource>) {
        tracing::info!(layer = layer.name(), "imagery layer added");
        let mut stack = self.tree.roots().to_vec();
        while let Some(h) = stack.pop() {
            let Some(node) = self.tree.get_mut(h) else {
                continue;
            };
            if node.segment.imagery_requested {
                if self.layer_lock.is_locked() {
                    node.segment.imagery_requested = false;
                } else {
                    layer.request(&node.key, &node.extent);
                    node.segment.imagery_pending |= !layer.is_ready(&node.key);
                }
            }
            if let Some(children) = node.children {
                stack.extend(children);
            }
        }
        self.imagery.push(layer);
    }

    pub fn imagery(&self) -> &[Box<dyn ImagerySource>] {
        &self.imagery
    }

    pub fn options(&self) -> &PlanetOptions {
        &self.options
    }

    pub fn tree(&self) -> &QuadTree {
        &self.tree
    }

    pub fn loader(&self) -> &TerrainLoader {
        &self.loader
    }

    pub fn rendered_nodes(&self) -> &[NodeHandle] {
        &self.rendered
    }

    /// Rendered nodes intersecting camera frustum `index`.
    pub fn rendered_in_frustum(&self, index: usize) -> &[NodeHandle] {
        self.rendered_in_frustum
            .get(index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn render_passes(&self) -> &RenderPasses {
        &self.passes
    }

    pub fn fading(&self) -> &FadingController {
        &self.fading
    }

    pub fn geometry(&self) -> &GeometryCache {
        &self.geometry
    }

    pub fn picking(&self) -> &PickingRegistry {
        &self.picking
    }

    pub fn picking_mut(&mut self) -> &mut PickingRegistry {
        &mut self.picking
    }

    pub fn terrain_lock_mut(&mut self) -> &mut LoadLock {
        &mut self.terrain_lock
    }

    pub fn layer_lock_mut(&mut self) -> &mut LoadLock {
        &mut self.layer_lock
    }

    pub fn equal_zoom_active(&self) -> bool {
        self.equal_zoom_active
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: RenderBackend> Drop for Planet<B> {
    fn drop(&mut self) {
        self.loader.abort_all();
    }
}
