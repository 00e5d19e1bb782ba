//! Configuration structs with defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    /// Level-of-detail selection and the equal-zoom band.
    pub lod: LodConfig,
    pub fading: FadingConfig,
    pub memory: MemoryConfig,
    /// Elevation source and how its tiles are applied.
    pub terrain: TerrainConfig,
    pub planet: PlanetConfig,
    /// Scripted fly-over of the demo binary.
    pub demo: DemoConfig,
    pub debug: DebugConfig,
}

/// Camera configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical view angle in degrees.
    pub view_angle: f64,
    /// Viewport width in pixels.
    pub width: u32,
    /// Viewport height in pixels.
    pub height: u32,
}

/// Level-of-detail configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Split threshold in pixels when looking straight down.
    pub lod_size_near: f64,
    /// Split threshold in pixels at grazing angles.
    pub lod_size_far: f64,
    pub max_node_zoom: u8,
    /// Cosine cut-off of the cheap horizon reject.
    pub horizon_tangent: f64,
    pub horizon_tangent_min_zoom: u8,
    /// Cells per segment side by zoom; the last entry repeats.
    pub grid_size_by_zoom: Vec<usize>,
    /// Idle frames before unvisited children are destroyed.
    pub prune_after_frames: u64,
    pub equal_zoom: bool,
    pub equal_zoom_min_slope: f64,
    pub equal_zoom_min_altitude_m: f64,
    pub equal_zoom_max_altitude_m: f64,
}

/// Transition fading configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FadingConfig {
    pub enabled: bool,
    /// Opacity change per frame.
    pub rate: f32,
    pub max_hold_frames: u32,
}

/// Memory policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Live node count that triggers a full clear.
    pub max_nodes: usize,
    /// Camera travel in meters required between clears.
    pub min_clear_distance_m: f64,
}

/// Which elevation provider to build.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TerrainSource {
    /// Flat planet.
    Empty,
    #[default]
    Procedural,
}

/// Terrain configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    pub source: TerrainSource,
    /// Seed of the procedural generator.
    pub seed: u32,
    /// Amplitude of the first procedural octave in meters.
    pub amplitude_m: f64,
    pub octaves: u32,
    /// Mask procedural oceans with the no-data sentinel.
    pub mask_ocean: bool,
    /// Raw cells per grid cell; a power of two.
    pub data_multiplier: usize,
    pub max_zoom: u8,
    pub sea_level_zoom_diff: u8,
    pub max_retries: u32,
    pub retry_base_frames: u64,
    pub max_in_flight: usize,
    /// Loader threads; 0 picks one per core.
    pub loader_threads: usize,
    /// Extra no-data sentinels.
    pub no_data: Vec<f32>,
    pub max_valid_height_m: f32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum EllipsoidShape {
    #[default]
    Wgs84,
    /// A sphere of `PlanetConfig::radius_m`.
    Sphere,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Subdivision {
    /// One whole-globe root.
    #[default]
    Geographic,
    /// Web-mercator square with two polar caps.
    MercatorWithPoles,
}

/// Planet configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlanetConfig {
    pub shape: EllipsoidShape,
    /// Sphere radius in meters, used with `EllipsoidShape::Sphere`.
    pub radius_m: f64,
    pub subdivision: Subdivision,
    /// Vertical exaggeration.
    pub height_factor: f64,
}

/// Demo fly-over configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemoConfig {
    pub start_lon: f64,
    pub start_lat: f64,
    pub start_altitude_m: f64,
    /// Altitude the descent ends at.
    pub end_altitude_m: f64,
    /// Eastward pan during the flight, degrees per second.
    pub pan_deg_per_s: f64,
    pub duration_s: f64,
    /// Simulation ticks per second.
    pub tick_hz: u32,
    /// Stop after this many frames; 0 runs for `duration_s`.
    pub max_frames: u64,
}

/// Debug configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Log a frame summary every this many frames; 0 disables.
    pub stats_every: u64,
}

// --- Default implementations ---

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            view_angle: 47.0,
            width: 1280,
            height: 720,
        }
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            lod_size_near: 256.0,
            lod_size_far: 384.0,
            max_node_zoom: 20,
            horizon_tangent: 0.81,
            horizon_tangent_min_zoom: 8,
            grid_size_by_zoom: vec![32, 32, 32, 16],
            prune_after_frames: 120,
            equal_zoom: true,
            equal_zoom_min_slope: 0.8,
            equal_zoom_min_altitude_m: 10_000.0,
            equal_zoom_max_altitude_m: 15_000_000.0,
        }
    }
}

impl Default for FadingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 0.1,
            max_hold_frames: 30,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_nodes: 200,
            min_clear_distance_m: 10_000.0,
        }
    }
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            source: TerrainSource::Procedural,
            seed: 0,
            amplitude_m: 4_000.0,
            octaves: 8,
            mask_ocean: false,
            data_multiplier: 1,
            max_zoom: 14,
            sea_level_zoom_diff: 4,
            max_retries: 5,
            retry_base_frames: 8,
            max_in_flight: 64,
            loader_threads: 0,
            no_data: Vec::new(),
            max_valid_height_m: 50_000.0,
        }
    }
}

impl Default for PlanetConfig {
    fn default() -> Self {
        Self {
            shape: EllipsoidShape::Wgs84,
            radius_m: 6_378_137.0,
            subdivision: Subdivision::Geographic,
            height_factor: 1.0,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            start_lon: 7.65,
            start_lat: 45.97,
            start_altitude_m: 12_000_000.0,
            end_altitude_m: 8_000.0,
            pan_deg_per_s: 0.5,
            duration_s: 20.0,
            tick_hz: 60,
            max_frames: 0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            stats_every: 60,
        }
    }
}

/// Deepest zoom a tile key can address.
pub const MAX_NODE_ZOOM: u8 = 28;

/// Platform config directory for the application, e.g. `~/.config/orbis`.
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("orbis"))
        .ok_or(ConfigError::NoConfigDir)
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let mut config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.clamp_zooms();
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Pull zoom settings into the addressable range.
    pub fn clamp_zooms(&mut self) {
        if self.lod.max_node_zoom > MAX_NODE_ZOOM || self.terrain.max_zoom > MAX_NODE_ZOOM {
            log::warn!("Zoom settings above {MAX_NODE_ZOOM} are clamped");
        }
        self.lod.max_node_zoom = self.lod.max_node_zoom.min(MAX_NODE_ZOOM);
        self.terrain.max_zoom = self.terrain.max_zoom.min(MAX_NODE_ZOOM);
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let mut new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
        new_config.clamp_zooms();

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("horizon_tangent: 0.81"));
        assert!(ron_str.contains("max_nodes: 200"));
        assert!(ron_str.contains("source: Procedural"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.terrain.no_data = vec![-9_999.0];
        config.planet.subdivision = Subdivision::MercatorWithPoles;
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    /// Missing sections and fields fall back to their defaults.
    #[test]
    fn test_partial_config_uses_defaults() {
        let ron_str = "(lod: (max_node_zoom: 12), terrain: (source: Empty))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.lod.max_node_zoom, 12);
        assert_eq!(config.lod.lod_size_near, 256.0);
        assert_eq!(config.terrain.source, TerrainSource::Empty);
        assert_eq!(config.fading, FadingConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.camera.width = 1920;
        config.memory.max_nodes = 500;
        config.planet.shape = EllipsoidShape::Sphere;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("orbis");
        let config = Config::load_or_create(&nested).unwrap();
        assert_eq!(config, Config::default());
        assert!(nested.join("config.ron").exists());
    }

    /// Zooms past what a tile key can address are clamped on load.
    #[test]
    fn test_load_clamps_zooms() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.ron"),
            "(lod: (max_node_zoom: 40), terrain: (max_zoom: 33))",
        )
        .unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config.lod.max_node_zoom, MAX_NODE_ZOOM);
        assert_eq!(config.terrain.max_zoom, MAX_NODE_ZOOM);
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.fading.rate = 0.25;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().fading.rate, 0.25);
        assert!(modified.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.ron"), "{{not valid}}").unwrap();
        let result = Config::load_or_create(dir.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
