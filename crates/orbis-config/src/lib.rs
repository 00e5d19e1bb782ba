//! Configuration for the globe viewer.
//!
//! Settings persist to disk as RON, every section falls back to its
//! defaults when missing, and command-line flags override what was loaded.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CameraConfig, Config, DebugConfig, DemoConfig, EllipsoidShape, FadingConfig, LodConfig,
    MAX_NODE_ZOOM, MemoryConfig, PlanetConfig, Subdivision, TerrainConfig, TerrainSource,
    default_config_dir,
};
pub use error::ConfigError;
