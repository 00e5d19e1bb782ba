//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, TerrainSource};

/// Orbis command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "orbis", about = "Quad-tree globe terrain fly-over")]
pub struct CliArgs {
    /// Viewport width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Viewport height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Start longitude in degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Start latitude in degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Start altitude in meters.
    #[arg(long)]
    pub altitude: Option<f64>,

    /// Run a flat planet without elevation.
    #[arg(long)]
    pub flat: bool,

    /// Procedural terrain seed.
    #[arg(long)]
    pub seed: Option<u32>,

    /// Vertical exaggeration.
    #[arg(long)]
    pub height_factor: Option<f64>,

    /// Deepest quad-tree zoom.
    #[arg(long)]
    pub max_zoom: Option<u8>,

    /// Stop after this many frames.
    #[arg(long)]
    pub frames: Option<u64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.camera.width = w;
        }
        if let Some(h) = args.height {
            self.camera.height = h;
        }
        if let Some(lon) = args.lon {
            self.demo.start_lon = lon;
        }
        if let Some(lat) = args.lat {
            self.demo.start_lat = lat.clamp(-90.0, 90.0);
        }
        if let Some(altitude) = args.altitude {
            self.demo.start_altitude_m = altitude;
        }
        if args.flat {
            self.terrain.source = TerrainSource::Empty;
        }
        if let Some(seed) = args.seed {
            self.terrain.seed = seed;
        }
        if let Some(factor) = args.height_factor {
            self.planet.height_factor = factor;
        }
        if let Some(zoom) = args.max_zoom {
            self.lod.max_node_zoom = zoom;
            self.clamp_zooms();
        }
        if let Some(frames) = args.frames {
            self.demo.max_frames = frames;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
