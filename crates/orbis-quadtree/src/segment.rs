//! Segments: one tile's elevation, geometry and GPU buffers.

use std::sync::Arc;

use glam::DVec3;
use orbis_math::{BoundingSphere, Ellipsoid, Extent, Ray, ray_triangle, split_positions};
use orbis_terrain::{
    CancelToken, NoDataValues, TerrainError, TerrainLoader, TerrainRequest, TerrainTile, TileKey,
};

use crate::elevation::{
    FallbackSource, extract_elevation, fallback_grid, flat_with_border, height_range,
    resolve_no_data,
};
use crate::equalize::EdgeSignature;
use crate::{RenderBackend, SegmentBuffers, SubdivisionStrategy, TerrainOptions, grid_position};

/// Elevation lifecycle of a segment.
#[derive(Clone, Debug)]
pub enum ElevationState {
    NotLoaded,
    Loading { token: CancelToken },
    Ready { terrain_exists: bool },
}

/// Where the current heights came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElevationSource {
    Flat,
    Ancestor { zoom: u8 },
    Provider,
    /// Pre-computed by the parent from its own raw data.
    ParentCache,
}

/// Planet-wide inputs of vertex positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceParams {
    pub ellipsoid: Ellipsoid,
    pub height_factor: f64,
}

/// Everything elevation application needs from outside the segment.
#[derive(Clone, Debug)]
pub struct ElevationContext<'a> {
    pub no_data: &'a NoDataValues,
    /// Nearest ancestor whose terrain is ready and exists.
    pub fallback: Option<FallbackSource>,
    pub sea_level_zoom_diff: u8,
    /// Grid size of this segment's children.
    pub child_grid: usize,
}

/// Outcome of [`Segment::load_terrain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Submitted,
    AlreadyLoading,
    AlreadyReady,
    /// Waiting for the retry schedule.
    Deferred,
    /// The loader is full; try again next frame.
    Saturated,
}

#[derive(Debug)]
pub struct Segment {
    key: TileKey,
    extent: Extent,
    grid: usize,
    mercator_rows: bool,
    state: ElevationState,
    source: ElevationSource,
    elevations: Arc<Vec<f32>>,
    data_version: u32,
    min_height: f32,
    max_height: f32,
    /// Provider-wide height range used until real data arrives.
    height_hint: (f64, f64),
    bounds: BoundingSphere,
    skip_positive_heights: bool,
    /// Set while the heights are a whole-grid ancestor fallback; holds the
    /// sea-level clamp flag it was applied with.
    fallback_clamp: Option<bool>,
    failures: u32,
    retry_at: Option<u64>,
    /// Fade progress in `[0, 1]`.
    pub transition_opacity: f32,
    /// Frame in which this segment was last committed to the rendered set.
    pub render_frame: u64,
    pub(crate) imagery_requested: bool,
    /// Some imagery layer has not delivered this tile yet.
    pub(crate) imagery_pending: bool,
    vertices: Vec<f64>,
    normals: Vec<f32>,
    pub(crate) equalized: Option<EdgeSignature>,
    gpu: Option<SegmentBuffers>,
    gpu_dirty: bool,
}

impl Segment {
    /// Create a segment, seeding its heights from an ancestor when one is available.
    pub fn new(
        key: TileKey,
        extent: Extent,
        grid: usize,
        strategy: &dyn SubdivisionStrategy,
        surface: &SurfaceParams,
        initial: Option<&FallbackSource>,
        height_hint: (f64, f64),
    ) -> Self {
        let (heights, source) = match initial {
            Some(f) => (fallback_grid(&key, grid, f), ElevationSource::Ancestor { zoom: f.key.zoom }),
            None => (vec![0.0; (grid + 1) * (grid + 1)], ElevationSource::Flat),
        };
        let mut segment = Self {
            key,
            extent,
            grid,
            mercator_rows: strategy.mercator_rows(),
            state: ElevationState::NotLoaded,
            source,
            elevations: Arc::new(Vec::new()),
            data_version: 0,
            min_height: 0.0,
            max_height: 0.0,
            height_hint,
            bounds: BoundingSphere::default(),
            skip_positive_heights: false,
            fallback_clamp: None,
            failures: 0,
            retry_at: None,
            transition_opacity: 0.0,
            render_frame: u64::MAX,
            imagery_requested: false,
            imagery_pending: false,
            vertices: Vec::new(),
            normals: Vec::new(),
            equalized: None,
            gpu: None,
            gpu_dirty: false,
        };
        segment.set_heights(heights, source, strategy, surface);
        segment
    }

    pub fn key(&self) -> &TileKey {
        &self.key
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    pub fn grid_size(&self) -> usize {
        self.grid
    }

    pub fn state(&self) -> &ElevationState {
        &self.state
    }

    pub fn source(&self) -> ElevationSource {
        self.source
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ElevationState::Ready { .. })
    }

    /// Terrain is ready and no imagery layer is still loading.
    pub fn is_drawable(&self) -> bool {
        self.is_ready() && !self.imagery_pending
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, ElevationState::Loading { .. })
    }

    pub fn terrain_exists(&self) -> bool {
        matches!(self.state, ElevationState::Ready { terrain_exists: true })
    }

    pub fn loading_token(&self) -> Option<&CancelToken> {
        match &self.state {
            ElevationState::Loading { token } => Some(token),
            _ => None,
        }
    }

    pub fn elevations(&self) -> &Arc<Vec<f32>> {
        &self.elevations
    }

    /// Bumped whenever the heights change.
    pub fn data_version(&self) -> u32 {
        self.data_version
    }

    pub fn bounds(&self) -> &BoundingSphere {
        &self.bounds
    }

    pub fn height_range(&self) -> (f32, f32) {
        (self.min_height, self.max_height)
    }

    /// Highest point used for horizon culling, scaled by the height factor.
    pub fn cull_max_height(&self, height_factor: f64) -> f64 {
        let max = self.max_height as f64 * height_factor;
        if self.is_ready() {
            max
        } else {
            max.max(self.height_hint.1 * height_factor)
        }
    }

    pub fn skip_positive_heights(&self) -> bool {
        self.skip_positive_heights
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Fallback data this segment can offer its descendants.
    pub fn as_fallback(&self) -> Option<FallbackSource> {
        self.terrain_exists().then(|| FallbackSource {
            key: self.key,
            grid: self.grid,
            heights: Arc::clone(&self.elevations),
        })
    }

    /// Whether the segment should ask for data at `frame`.
    pub fn needs_terrain(&self, frame: u64) -> bool {
        match self.state {
            ElevationState::NotLoaded => true,
            ElevationState::Loading { .. } => false,
            ElevationState::Ready { .. } => self.retry_at.is_some_and(|at| frame >= at),
        }
    }

    pub fn terrain_request(&self) -> TerrainRequest {
        TerrainRequest {
            key: self.key,
            extent: self.extent,
            grid_size: self.grid,
            mercator_rows: self.mercator_rows,
        }
    }

    /// Ask the loader for this segment's elevation.
    ///
    /// Idempotent while a request is outstanding. `force` ignores the retry
    /// schedule and reloads ready data.
    pub fn load_terrain(&mut self, loader: &TerrainLoader, frame: u64, force: bool) -> LoadOutcome {
        if self.is_loading() {
            return LoadOutcome::AlreadyLoading;
        }
        if !force && !self.needs_terrain(frame) {
            return if self.retry_at.is_some() {
                LoadOutcome::Deferred
            } else {
                LoadOutcome::AlreadyReady
            };
        }
        match loader.submit(self.terrain_request()) {
            Ok(token) => {
                self.state = ElevationState::Loading { token };
                LoadOutcome::Submitted
            }
            Err(_) => LoadOutcome::Saturated,
        }
    }

    /// Apply a finished provider request.
    ///
    /// Returns the children's grids when the raw data was fine enough to
    /// pre-compute them.
    pub fn handle_segment_terrain(
        &mut self,
        result: Result<TerrainTile, TerrainError>,
        ctx: &ElevationContext<'_>,
        strategy: &dyn SubdivisionStrategy,
        surface: &SurfaceParams,
        frame: u64,
        options: &TerrainOptions,
    ) -> Option<[Vec<f32>; 4]> {
        match result {
            Ok(tile) => {
                if let Err(err) = tile.validate(&self.key) {
                    debug_assert!(false, "{err}");
                    self.fail(ctx, strategy, surface, frame, options);
                    return None;
                }
                let extracted = extract_elevation(&tile, self.grid, ctx.child_grid, ctx.no_data);
                self.apply_heights(extracted.heights, ElevationSource::Provider, ctx, strategy, surface);
                extracted.children
            }
            Err(TerrainError::NoData(_)) => {
                self.apply_fallback(
                    ctx.fallback.as_ref(),
                    true,
                    ctx.sea_level_zoom_diff,
                    strategy,
                    surface,
                );
                None
            }
            Err(TerrainError::Cancelled(_)) => {
                self.state = ElevationState::NotLoaded;
                None
            }
            Err(_) => {
                self.fail(ctx, strategy, surface, frame, options);
                None
            }
        }
    }

    /// Apply a grid pre-computed by the parent.
    pub fn apply_cached(
        &mut self,
        heights: Vec<f32>,
        ctx: &ElevationContext<'_>,
        strategy: &dyn SubdivisionStrategy,
        surface: &SurfaceParams,
    ) {
        self.apply_heights(heights, ElevationSource::ParentCache, ctx, strategy, surface);
    }

    fn apply_heights(
        &mut self,
        mut heights: Vec<f32>,
        source: ElevationSource,
        ctx: &ElevationContext<'_>,
        strategy: &dyn SubdivisionStrategy,
        surface: &SurfaceParams,
    ) {
        let res = resolve_no_data(
            &mut heights,
            &self.key,
            self.grid,
            ctx.no_data,
            ctx.fallback.as_ref(),
            ctx.sea_level_zoom_diff,
        );
        let terrain_exists = res.missing < heights.len() || res.filled_from_ancestor > 0;
        self.skip_positive_heights = res.skip_positive_heights;
        self.fallback_clamp = None;
        self.failures = 0;
        self.retry_at = None;
        self.state = ElevationState::Ready { terrain_exists };
        self.set_heights(heights, source, strategy, surface);
    }

    /// Take the whole grid from the nearest ancestor with terrain.
    ///
    /// With `clamp_to_sea` a coarse ancestor only contributes heights at or
    /// below sea level.
    pub fn apply_fallback(
        &mut self,
        fallback: Option<&FallbackSource>,
        clamp_to_sea: bool,
        sea_level_zoom_diff: u8,
        strategy: &dyn SubdivisionStrategy,
        surface: &SurfaceParams,
    ) {
        let (mut heights, source) = match fallback {
            Some(f) => (
                fallback_grid(&self.key, self.grid, f),
                ElevationSource::Ancestor { zoom: f.key.zoom },
            ),
            None => (vec![0.0; (self.grid + 1) * (self.grid + 1)], ElevationSource::Flat),
        };
        self.skip_positive_heights = clamp_to_sea
            && fallback.is_some_and(|f| f.zoom_diff(&self.key) >= sea_level_zoom_diff);
        if self.skip_positive_heights {
            heights.iter_mut().for_each(|h| *h = h.min(0.0));
        }
        self.fallback_clamp = Some(clamp_to_sea);
        self.retry_at = None;
        self.state = ElevationState::Ready {
            terrain_exists: fallback.is_some(),
        };
        self.set_heights(heights, source, strategy, surface);
    }

    /// Re-derive ancestor-based heights once a closer ancestor has terrain.
    ///
    /// Only touches seeds of unloaded segments and whole-grid fallbacks.
    /// Returns whether the heights changed.
    pub fn refresh_from_ancestor(
        &mut self,
        fallback: &FallbackSource,
        sea_level_zoom_diff: u8,
        strategy: &dyn SubdivisionStrategy,
        surface: &SurfaceParams,
    ) -> bool {
        let coarser = match self.source {
            ElevationSource::Flat => true,
            ElevationSource::Ancestor { zoom } => zoom < fallback.key.zoom,
            _ => false,
        };
        if !coarser || !self.key.is_descendant_of(&fallback.key) {
            return false;
        }
        match (&self.state, self.fallback_clamp) {
            (ElevationState::Ready { .. }, Some(clamp)) => {
                self.apply_fallback(Some(fallback), clamp, sea_level_zoom_diff, strategy, surface);
                true
            }
            (ElevationState::NotLoaded | ElevationState::Loading { .. }, _) => {
                let heights = fallback_grid(&self.key, self.grid, fallback);
                let source = ElevationSource::Ancestor {
                    zoom: fallback.key.zoom,
                };
                self.set_heights(heights, source, strategy, surface);
                true
            }
            _ => false,
        }
    }

    /// Flat, no terrain, nothing to request.
    pub fn mark_empty(&mut self, strategy: &dyn SubdivisionStrategy, surface: &SurfaceParams) {
        self.retry_at = None;
        self.skip_positive_heights = false;
        self.fallback_clamp = None;
        self.state = ElevationState::Ready {
            terrain_exists: false,
        };
        let flat = vec![0.0; (self.grid + 1) * (self.grid + 1)];
        self.set_heights(flat, ElevationSource::Flat, strategy, surface);
    }

    /// A failed fetch renders flat with the ancestor's border and retries with backoff.
    fn fail(
        &mut self,
        ctx: &ElevationContext<'_>,
        strategy: &dyn SubdivisionStrategy,
        surface: &SurfaceParams,
        frame: u64,
        options: &TerrainOptions,
    ) {
        self.failures += 1;
        self.retry_at = (self.failures <= options.max_retries).then(|| {
            let shift = (self.failures - 1).min(16);
            frame + (options.retry_base_frames.max(1) << shift)
        });
        self.skip_positive_heights = false;
        self.fallback_clamp = None;
        self.state = ElevationState::Ready {
            terrain_exists: false,
        };
        let heights = flat_with_border(&self.key, self.grid, ctx.fallback.as_ref());
        self.set_heights(heights, ElevationSource::Flat, strategy, surface);
    }

    /// Drop an outstanding request so it is issued again later.
    pub fn reset_loading(&mut self) {
        if let ElevationState::Loading { token } = &self.state {
            token.cancel();
            self.state = ElevationState::NotLoaded;
        }
    }

    fn set_heights(
        &mut self,
        heights: Vec<f32>,
        source: ElevationSource,
        strategy: &dyn SubdivisionStrategy,
        surface: &SurfaceParams,
    ) {
        let (min, max) = height_range(&heights);
        self.min_height = min;
        self.max_height = max;
        self.source = source;
        self.elevations = Arc::new(heights);
        self.data_version = self.data_version.wrapping_add(1);
        self.equalized = None;
        self.vertices.clear();
        self.normals.clear();

        let hf = surface.height_factor;
        let (mut lo, mut hi) = (min as f64 * hf, max as f64 * hf);
        if !self.is_ready() {
            lo = lo.min(self.height_hint.0 * hf);
            hi = hi.max(self.height_hint.1 * hf);
        }
        self.bounds = strategy.set_extent_bounds(&surface.ellipsoid, &self.extent, lo, hi);
    }

    /// Rebuild vertex positions and normals from `heights`, which may differ
    /// from the stored elevations along the edges.
    pub fn build_geometry(
        &mut self,
        heights: &[f32],
        strategy: &dyn SubdivisionStrategy,
        surface: &SurfaceParams,
    ) {
        let side = self.grid + 1;
        let mut positions = Vec::with_capacity(side * side);
        for j in 0..side {
            for i in 0..side {
                let h = heights[j * side + i] as f64 * surface.height_factor;
                positions.push(grid_position(
                    strategy,
                    &surface.ellipsoid,
                    &self.extent,
                    self.grid,
                    i,
                    j,
                    h,
                ));
            }
        }
        self.normals = grid_normals(&positions, self.grid, &surface.ellipsoid);
        self.vertices = positions.iter().flat_map(|p| p.to_array()).collect();
        self.gpu_dirty = true;
    }

    pub fn has_geometry(&self) -> bool {
        !self.vertices.is_empty()
    }

    /// ECEF positions, three `f64` per vertex.
    pub fn vertices(&self) -> &[f64] {
        &self.vertices
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn vertex(&self, index: usize) -> DVec3 {
        DVec3::from_slice(&self.vertices[index * 3..index * 3 + 3])
    }

    pub fn gpu_buffers(&self) -> Option<&SegmentBuffers> {
        self.gpu.as_ref()
    }

    /// Upload positions as high/low pairs and normals if they changed.
    pub fn upload(&mut self, backend: &mut dyn RenderBackend) -> Option<SegmentBuffers> {
        if !self.has_geometry() {
            return None;
        }
        if self.gpu_dirty || self.gpu.is_none() {
            if let Some(old) = self.gpu.take() {
                old.release(backend);
            }
            let (high, low) = split_positions(&self.vertices);
            self.gpu = Some(SegmentBuffers {
                positions_high: backend.create_array_buffer(bytemuck::cast_slice(&high), 3),
                positions_low: backend.create_array_buffer(bytemuck::cast_slice(&low), 3),
                normals: backend.create_array_buffer(bytemuck::cast_slice(&self.normals), 3),
            });
            self.gpu_dirty = false;
        }
        self.gpu
    }

    pub fn release_gpu(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(buffers) = self.gpu.take() {
            buffers.release(backend);
        }
        self.gpu_dirty = true;
    }

    /// Nearest ray parameter at which `ray` hits the triangulated surface.
    pub fn intersect_ray(&self, ray: &Ray, indices: &[u32]) -> Option<f64> {
        if !self.has_geometry() {
            return None;
        }
        indices
            .chunks_exact(3)
            .filter_map(|tri| {
                ray_triangle(
                    ray,
                    self.vertex(tri[0] as usize),
                    self.vertex(tri[1] as usize),
                    self.vertex(tri[2] as usize),
                )
            })
            .min_by(f64::total_cmp)
    }
}

/// Per-vertex normals from grid neighbours; one-sided at the edges.
///
/// Falls back to the geodetic normal where the grid is degenerate (poles).
pub(crate) fn grid_normals(positions: &[DVec3], grid: usize, ellipsoid: &Ellipsoid) -> Vec<f32> {
    let side = grid + 1;
    let at = |i: usize, j: usize| positions[j * side + i];
    let mut normals = Vec::with_capacity(positions.len() * 3);
    for j in 0..side {
        for i in 0..side {
            let east = at((i + 1).min(grid), j) - at(i.saturating_sub(1), j);
            let south = at(i, (j + 1).min(grid)) - at(i, j.saturating_sub(1));
            let n = south.cross(east);
            let n = if n.length_squared() > 1e-18 {
                n.normalize()
            } else {
                ellipsoid.geodetic_surface_normal(at(i, j))
            };
            normals.extend_from_slice(&[n.x as f32, n.y as f32, n.z as f32]);
        }
    }
    normals
}
