//! End-to-end frames through [`Planet`] and the segment fallback path.

use std::sync::Arc;

use orbis_camera::{Camera, CameraOptions};
use orbis_math::{Ellipsoid, LonLat};
use orbis_terrain::{
    EmptyTerrain, LoaderMode, NoDataValues, ProceduralParams, ProceduralTerrain, SampleLayout,
    TerrainProvider, TerrainTile, TileGroup, TileKey, TilingScheme,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::elevation::FallbackSource;
use crate::segment::ElevationContext;
use crate::{
    EqualZoomOptions, GeographicStrategy, LodOptions, MemoryOptions, NodeHandle, Planet,
    PlanetOptions, RecordingBackend, Segment, SurfaceParams, TerrainOptions,
};

const WGS84_A: f64 = 6_378_137.0;

fn planet(options: PlanetOptions, provider: Arc<dyn TerrainProvider>) -> Planet {
    Planet::new(options, provider, LoaderMode::Deferred, RecordingBackend::new()).unwrap()
}

fn look_down(ellipsoid: Ellipsoid, options: &CameraOptions, at: LonLat) -> Camera {
    let mut camera = Camera::new(ellipsoid, options);
    camera.look_down_at(&at);
    camera
}

fn assert_no_ancestor_pairs(planet: &Planet) {
    let keys: Vec<TileKey> = planet
        .rendered_nodes()
        .iter()
        .map(|&h| planet.tree().get(h).unwrap().key)
        .collect();
    let set: FxHashSet<TileKey> = keys.iter().copied().collect();
    assert_eq!(set.len(), keys.len(), "duplicate rendered node");
    for key in &keys {
        let mut parent = key.parent();
        while let Some(p) = parent {
            assert!(!set.contains(&p), "{key} rendered together with ancestor {p}");
            parent = p.parent();
        }
    }
}

/// The whole-globe root seen from four radii up: only the near hemisphere
/// survives the horizon test, two of four zoom-2 columns.
#[test]
fn test_single_root_keeps_near_hemisphere_at_zoom_two() {
    let ellipsoid = Ellipsoid::sphere(WGS84_A);
    let options = PlanetOptions {
        ellipsoid,
        lod: LodOptions {
            lod_size_near: 16.0,
            lod_size_far: 16.0,
            max_node_zoom: 2,
            grid_size_by_zoom: vec![8],
            ..Default::default()
        },
        equal_zoom: EqualZoomOptions {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut planet = planet(options, Arc::new(EmptyTerrain));
    let camera_options = CameraOptions {
        view_angle: 60.0,
        width: 1024.0,
        height: 1024.0,
        ..Default::default()
    };
    let camera = look_down(
        ellipsoid,
        &camera_options,
        LonLat::with_height(0.0, 0.0, 4.0 * WGS84_A),
    );
    planet.frame(&camera);

    let rendered = planet.rendered_nodes();
    assert_eq!(rendered.len(), 8);
    for &h in rendered {
        let node = planet.tree().get(h).unwrap();
        assert_eq!(node.zoom(), 2);
        assert!(node.extent.south_west.lon >= -90.0, "{}", node.key);
        assert!(node.extent.north_east.lon <= 90.0, "{}", node.key);
    }
    assert_no_ancestor_pairs(&planet);
}

/// A zoom-10 tile that is missing everywhere takes the zoom-8 ancestor's surface.
#[test]
fn test_missing_tile_takes_ancestor_surface() {
    let surface = SurfaceParams {
        ellipsoid: Ellipsoid::sphere(WGS84_A),
        height_factor: 1.0,
    };
    let grid = 4;
    let side = grid + 1;
    let ancestor = TileKey::new(TileGroup::Standard, 8, 300, 60);
    let ramp: Vec<f32> = (0..side * side)
        .map(|idx| ((idx % side) * 10 + idx / side) as f32)
        .collect();
    let fallback = FallbackSource {
        key: ancestor,
        grid,
        heights: Arc::new(ramp),
    };

    // NE child, then its SW child: offset (2, 1) in the zoom-8 tile.
    let key = ancestor.children()[1].children()[2];
    assert_eq!(key.zoom, 10);
    let mut segment = Segment::new(
        key,
        TilingScheme::Geographic.tile_extent(&key),
        grid,
        &GeographicStrategy,
        &surface,
        None,
        (0.0, 0.0),
    );
    let no_data = NoDataValues::default();
    let ctx = ElevationContext {
        no_data: &no_data,
        fallback: Some(fallback),
        sea_level_zoom_diff: 4,
        child_grid: grid,
    };
    let tile = TerrainTile::new(grid, SampleLayout::Vertices, vec![-32_767.0; side * side]);
    segment.handle_segment_terrain(
        Ok(tile),
        &ctx,
        &GeographicStrategy,
        &surface,
        1,
        &TerrainOptions::default(),
    );

    assert!(segment.is_ready());
    assert!(segment.terrain_exists());
    assert!(!segment.skip_positive_heights());
    let heights = segment.elevations();
    assert_eq!(heights.len(), side * side);
    for j in 0..side {
        for i in 0..side {
            let fx = 2.0 + i as f64 / grid as f64;
            let fy = 1.0 + j as f64 / grid as f64;
            let expected = (10.0 * fx + fy) as f32;
            let got = heights[j * side + i];
            assert!((got - expected).abs() < 1e-3, "({i},{j}): {got} != {expected}");
        }
    }
}

/// The same situation five zooms below the ancestor clamps land to sea level.
#[test]
fn test_coarse_fallback_clamps_to_sea_level() {
    let surface = SurfaceParams {
        ellipsoid: Ellipsoid::sphere(WGS84_A),
        height_factor: 1.0,
    };
    let ancestor = TileKey::new(TileGroup::Standard, 3, 2, 1);
    let fallback = FallbackSource {
        key: ancestor,
        grid: 2,
        heights: Arc::new(vec![-50.0, 80.0, 120.0, -10.0, 40.0, 200.0, -300.0, 5.0, 60.0]),
    };
    let key = ancestor.children()[0].children()[3].children()[1].children()[0].children()[2];
    let mut segment = Segment::new(
        key,
        TilingScheme::Geographic.tile_extent(&key),
        2,
        &GeographicStrategy,
        &surface,
        None,
        (0.0, 0.0),
    );
    let no_data = NoDataValues::default();
    let ctx = ElevationContext {
        no_data: &no_data,
        fallback: Some(fallback),
        sea_level_zoom_diff: 4,
        child_grid: 2,
    };
    segment.handle_segment_terrain(
        Ok(TerrainTile::new(2, SampleLayout::Vertices, vec![-32_767.0; 9])),
        &ctx,
        &GeographicStrategy,
        &surface,
        1,
        &TerrainOptions::default(),
    );
    assert!(segment.terrain_exists());
    assert!(segment.skip_positive_heights());
    assert!(segment.elevations().iter().all(|&h| h <= 0.0));
}

/// Descending over procedural terrain keeps opacity in range, never renders a
/// node with its ancestor, and settles fully opaque once the camera stops.
#[test]
fn test_descent_settles_opaque() {
    let ellipsoid = Ellipsoid::wgs84();
    let options = PlanetOptions {
        ellipsoid,
        lod: LodOptions {
            max_node_zoom: 12,
            grid_size_by_zoom: vec![16],
            ..Default::default()
        },
        memory: MemoryOptions {
            max_nodes: 1_000_000,
            ..Default::default()
        },
        ..Default::default()
    };
    let provider = Arc::new(ProceduralTerrain::new(ProceduralParams {
        max_zoom: 10,
        ..Default::default()
    }));
    let mut planet = planet(options, provider);
    let camera_options = CameraOptions::default();

    let at = |altitude: f64| look_down(ellipsoid, &camera_options, LonLat::with_height(7.0, 46.0, altitude));
    let steps = 30;
    for step in 0..steps {
        planet.frame(&at(5e6 * 0.85f64.powi(step)));
        assert_no_ancestor_pairs(&planet);
        for (_, node) in planet.tree().iter() {
            let opacity = node.segment.transition_opacity;
            assert!((0.0..=1.0).contains(&opacity), "{opacity}");
        }
        let fading: FxHashSet<NodeHandle> = planet.fading().fading_out_handles().collect();
        for &h in planet.rendered_nodes() {
            assert!(!fading.contains(&h), "node both rendered and fading out");
        }
    }

    let camera = at(5e6 * 0.85f64.powi(steps - 1));
    for _ in 0..80 {
        planet.frame(&camera);
    }
    assert_eq!(planet.fading().fading_out_count(), 0);
    assert!(planet.render_passes().transparent.is_empty());
    for &h in planet.rendered_nodes() {
        let node = planet.tree().get(h).unwrap();
        assert!(node.segment.is_ready());
        assert_eq!(node.segment.transition_opacity, 1.0);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Fade {
    In,
    Out,
}

/// Opacity of every transitioning segment, keyed by node.
fn fade_snapshot(planet: &Planet) -> FxHashMap<NodeHandle, (Fade, f32)> {
    let fading = planet.fading();
    let opacity = |h: NodeHandle| planet.tree().get(h).unwrap().segment.transition_opacity;
    fading
        .fading_in_handles()
        .map(|h| (h, (Fade::In, opacity(h))))
        .chain(fading.fading_out_handles().map(|h| (h, (Fade::Out, opacity(h)))))
        .collect()
}

/// While a node keeps fading in its opacity never drops, and while it keeps
/// fading out it never rises, through a descent and the climb back.
#[test]
fn test_fade_opacity_is_monotonic() {
    let ellipsoid = Ellipsoid::wgs84();
    let options = PlanetOptions {
        ellipsoid,
        lod: LodOptions {
            max_node_zoom: 10,
            grid_size_by_zoom: vec![8],
            ..Default::default()
        },
        memory: MemoryOptions {
            max_nodes: 1_000_000,
            ..Default::default()
        },
        ..Default::default()
    };
    let provider = Arc::new(ProceduralTerrain::new(ProceduralParams {
        max_zoom: 8,
        ..Default::default()
    }));
    let mut planet = planet(options, provider);
    let camera_options = CameraOptions::default();
    let at = |altitude: f64| look_down(ellipsoid, &camera_options, LonLat::with_height(-70.0, -33.0, altitude));

    let descent = (0..40).map(|i| 8e6 * 0.8f64.powi(i));
    let ascent = (0..40).rev().map(|i| 8e6 * 0.8f64.powi(i));
    let mut previous: FxHashMap<NodeHandle, (Fade, f32)> = FxHashMap::default();
    let mut saw_in = false;
    let mut saw_out = false;
    for altitude in descent.chain(ascent) {
        // Two frames per position so loads land mid-transition.
        for _ in 0..2 {
            planet.frame(&at(altitude));
            let current = fade_snapshot(&planet);
            for (h, &(fade, opacity)) in &current {
                assert!((0.0..=1.0).contains(&opacity), "{opacity}");
                let Some(&(was, before)) = previous.get(h) else {
                    continue;
                };
                match (was, fade) {
                    (Fade::In, Fade::In) => {
                        saw_in = true;
                        assert!(opacity >= before, "fade-in fell {before} -> {opacity}");
                    }
                    (Fade::Out, Fade::Out) => {
                        saw_out = true;
                        assert!(opacity <= before, "fade-out rose {before} -> {opacity}");
                    }
                    _ => {}
                }
            }
            for (_, node) in planet.tree().iter() {
                let opacity = node.segment.transition_opacity;
                assert!((0.0..=1.0).contains(&opacity), "{opacity}");
            }
            previous = current;
        }
    }
    assert!(saw_in && saw_out, "no transitions observed");
}

/// Hovering a metre either side of the altitude ceiling never toggles the pass.
#[test]
fn test_equal_zoom_threshold_does_not_oscillate() {
    let ellipsoid = Ellipsoid::wgs84();
    let options = PlanetOptions {
        ellipsoid,
        lod: LodOptions {
            max_node_zoom: 4,
            grid_size_by_zoom: vec![4],
            ..Default::default()
        },
        ..Default::default()
    };
    let ceiling = options.equal_zoom.max_altitude;
    let mut planet = planet(options, Arc::new(EmptyTerrain));
    let camera_options = CameraOptions::default();
    let at = |altitude: f64| look_down(ellipsoid, &camera_options, LonLat::with_height(0.0, 0.0, altitude));

    planet.frame(&at(ceiling - 5_000.0));
    assert!(planet.equal_zoom_active());
    let mut flips = 0;
    let mut last = planet.equal_zoom_active();
    for i in 0..100 {
        let offset = if i % 2 == 0 { 1.0 } else { -1.0 };
        planet.frame(&at(ceiling + offset));
        if planet.equal_zoom_active() != last {
            flips += 1;
            last = planet.equal_zoom_active();
        }
    }
    assert!(flips <= 1, "{flips} flips");

    // A steady climb crosses the band once.
    let mut flips = 0;
    let mut last = planet.equal_zoom_active();
    for i in 0..100 {
        planet.frame(&at(ceiling - 50_000.0 + i as f64 * 1_000.0));
        if planet.equal_zoom_active() != last {
            flips += 1;
            last = planet.equal_zoom_active();
        }
    }
    assert_eq!(flips, 1);
    assert!(!planet.equal_zoom_active());
}

/// Random views over random terrain keep the rendered set consistent with the tree.
#[test]
fn test_random_views_keep_tree_consistent() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x0b15);
    let ellipsoid = Ellipsoid::sphere(2_000_000.0);
    let options = PlanetOptions {
        ellipsoid,
        lod: LodOptions {
            max_node_zoom: 8,
            grid_size_by_zoom: vec![8],
            prune_after_frames: 3,
            ..Default::default()
        },
        memory: MemoryOptions {
            max_nodes: 400,
            min_clear_distance: 100_000.0,
        },
        ..Default::default()
    };
    let provider = Arc::new(ProceduralTerrain::new(ProceduralParams {
        seed: rng.random(),
        amplitude: 3_000.0,
        mask_ocean: true,
        max_zoom: 6,
        ..Default::default()
    }));
    let mut planet = planet(options, provider);
    let camera_options = CameraOptions::default();

    for _ in 0..30 {
        let at = LonLat::with_height(
            rng.random_range(-180.0..180.0),
            rng.random_range(-85.0..85.0),
            rng.random_range(20_000.0..3_000_000.0),
        );
        let camera = look_down(ellipsoid, &camera_options, at);
        for _ in 0..3 {
            planet.frame(&camera);
        }
        assert!(!planet.rendered_nodes().is_empty());
        assert_no_ancestor_pairs(&planet);
        for &h in planet.rendered_nodes() {
            let node = planet.tree().get(h).unwrap();
            assert_eq!(planet.tree().node_for_key(&node.key), Some(h));
            assert!(node.zoom() <= 8);
        }
        for (h, node) in planet.tree().iter() {
            if let Some(parent) = node.parent {
                let children = planet.tree().get(parent).unwrap().children.unwrap();
                assert!(children.contains(&h));
            }
        }
    }
}
