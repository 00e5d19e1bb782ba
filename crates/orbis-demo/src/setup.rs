//! Translating the persisted [`Config`] into engine options.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use orbis_camera::CameraOptions;
use orbis_config::{Config, EllipsoidShape, Subdivision, TerrainSource};
use orbis_math::Ellipsoid;
use orbis_quadtree::{
    EqualZoomOptions, FadingOptions, LodOptions, MemoryOptions, PlanetOptions, SubdivisionKind,
    TerrainOptions,
};
use orbis_terrain::{EmptyTerrain, LoaderMode, ProceduralParams, ProceduralTerrain, TerrainProvider};

pub fn ellipsoid(config: &Config) -> Ellipsoid {
    match config.planet.shape {
        EllipsoidShape::Wgs84 => Ellipsoid::wgs84(),
        EllipsoidShape::Sphere => Ellipsoid::sphere(config.planet.radius_m.max(1.0)),
    }
}

pub fn camera_options(config: &Config) -> CameraOptions {
    CameraOptions {
        view_angle: config.camera.view_angle,
        width: f64::from(config.camera.width.max(1)),
        height: f64::from(config.camera.height.max(1)),
        ..Default::default()
    }
}

pub fn planet_options(config: &Config) -> PlanetOptions {
    let lod = &config.lod;
    let equal_zoom = EqualZoomOptions {
        enabled: lod.equal_zoom,
        min_slope: lod.equal_zoom_min_slope,
        min_altitude: lod.equal_zoom_min_altitude_m,
        max_altitude: lod.equal_zoom_max_altitude_m,
        ..Default::default()
    };
    PlanetOptions {
        ellipsoid: ellipsoid(config),
        subdivision: match config.planet.subdivision {
            Subdivision::Geographic => SubdivisionKind::Geographic,
            Subdivision::MercatorWithPoles => SubdivisionKind::MercatorWithPoles,
        },
        height_factor: config.planet.height_factor,
        lod: LodOptions {
            lod_size_near: lod.lod_size_near,
            lod_size_far: lod.lod_size_far,
            max_node_zoom: lod.max_node_zoom,
            horizon_tangent: lod.horizon_tangent,
            horizon_tangent_min_zoom: lod.horizon_tangent_min_zoom,
            grid_size_by_zoom: lod.grid_size_by_zoom.clone(),
            prune_after_frames: lod.prune_after_frames,
        },
        equal_zoom,
        fading: FadingOptions {
            enabled: config.fading.enabled,
            rate: config.fading.rate,
            max_hold_frames: config.fading.max_hold_frames,
        },
        memory: MemoryOptions {
            max_nodes: config.memory.max_nodes,
            min_clear_distance: config.memory.min_clear_distance_m,
        },
        terrain: TerrainOptions {
            sea_level_zoom_diff: config.terrain.sea_level_zoom_diff,
            max_retries: config.terrain.max_retries,
            retry_base_frames: config.terrain.retry_base_frames,
            max_in_flight: config.terrain.max_in_flight,
            extra_no_data: config.terrain.no_data.clone(),
            max_valid_height: config.terrain.max_valid_height_m,
        },
    }
}

pub fn terrain_provider(config: &Config) -> Arc<dyn TerrainProvider> {
    let terrain = &config.terrain;
    match terrain.source {
        TerrainSource::Empty => Arc::new(EmptyTerrain),
        TerrainSource::Procedural => Arc::new(ProceduralTerrain::new(ProceduralParams {
            seed: terrain.seed,
            octaves: terrain.octaves,
            amplitude: terrain.amplitude_m,
            mask_ocean: terrain.mask_ocean,
            data_multiplier: terrain.data_multiplier.max(1).next_power_of_two(),
            max_zoom: terrain.max_zoom,
            ..Default::default()
        })),
    }
}

/// Worker threads from config, or all but two cores.
pub fn loader_mode(config: &Config) -> LoaderMode {
    let threads = match config.terrain.loader_threads {
        0 => num_cpus::get().saturating_sub(2).clamp(1, 8),
        n => n,
    };
    LoaderMode::Threaded { threads }
}

/// Logs live in the per-user data directory, or beside an explicit `--config`.
pub fn log_dir(config_dir: &Path, explicit_config: bool) -> PathBuf {
    if !explicit_config && let Some(data) = dirs::data_local_dir() {
        return data.join("orbis").join("logs");
    }
    config_dir.join("logs")
}
