//! Headless fly-over: descends over the globe while the quad-tree streams
//! terrain, logging frame statistics.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags:
//! `cargo run -p orbis-demo -- --lon 86.9 --lat 27.9 --frames 600`.

mod flight;
mod frame_loop;
mod setup;

use std::cell::Cell;
use std::process::ExitCode;

use clap::Parser;
use glam::DVec2;
use orbis_camera::Camera;
use orbis_config::{CliArgs, Config, default_config_dir};
use orbis_quadtree::{Planet, RecordingBackend};
use tracing::{error, info};

use flight::Flight;
use frame_loop::FrameLoop;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = match args.config.clone().map(Ok).unwrap_or_else(default_config_dir) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = setup::log_dir(&config_dir, args.config.is_some());
    orbis_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), orbis_terrain::TerrainError> {
    let options = setup::planet_options(config);
    let provider = setup::terrain_provider(config);
    let mut planet = Planet::new(
        options,
        provider,
        setup::loader_mode(config),
        RecordingBackend::new(),
    )?;
    let mut camera = Camera::new(setup::ellipsoid(config), &setup::camera_options(config));
    let flight = Flight::from_config(&config.demo);
    camera.look_down_at(&flight.position(0.0));

    info!(
        provider = planet.loader().provider().name(),
        duration_s = flight.duration(),
        "starting fly-over"
    );

    let mut frame_loop = FrameLoop::new(config.demo.tick_hz);
    let max_frames = config.demo.max_frames;
    let stats_every = config.debug.stats_every;
    let center = DVec2::new(camera.width() * 0.5, camera.height() * 0.5);
    let sim_time = Cell::new(0.0);

    loop {
        frame_loop.tick(
            |dt, t| sim_time.set(t + dt),
            |_alpha| {
                camera.look_down_at(&flight.position(sim_time.get()));
                let stats = planet.frame(&camera);
                if stats_every > 0 && stats.frame % stats_every == 0 {
                    info!(
                        frame = stats.frame,
                        altitude_km = camera.altitude() / 1000.0,
                        nodes = stats.nodes,
                        rendered = stats.rendered,
                        zoom = ?(stats.min_zoom..=stats.max_zoom),
                        in_flight = stats.in_flight,
                        fading = stats.fading_in + stats.fading_out,
                        "frame stats"
                    );
                }
            },
        );

        let frames = frame_loop.frame_count();
        let done = if max_frames > 0 {
            frames >= max_frames
        } else {
            flight.is_finished(sim_time.get())
        };
        if done {
            break;
        }
    }

    let ground = planet.get_lonlat_from_pixel_terrain(&camera, center);
    let height = planet
        .get_height_async(*camera.lonlat(), config.terrain.max_zoom)
        .wait(std::time::Duration::from_secs(2));
    info!(
        frames = frame_loop.frame_count(),
        updates = frame_loop.update_count(),
        gpu_buffers = planet.backend().live_count(),
        gpu_bytes = planet.backend().live_bytes(),
        ?ground,
        ?height,
        "fly-over finished"
    );
    Ok(())
}
