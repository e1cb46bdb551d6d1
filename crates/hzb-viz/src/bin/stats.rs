use std::time::Instant;

use clap::Parser;
use hzb_viz::{CubeField, OrbitCamera, summarize};
use raster_bvh::{BvhConfig, BvhError, HzbRenderer, RasterBvh, SplitMethod, TileConfig, TraversalMode};

#[derive(Parser)]
#[command(name = "stats", about = "Compare BVH split methods on a generated cube field")]
struct Cli {
    /// Split method to measure; repeat to compare several (default: all)
    #[arg(long = "method", short)]
    methods: Vec<SplitMethod>,
    /// Number of cubes in the field
    #[arg(long, default_value_t = 200)]
    cubes: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Camera positions evenly spaced around the field
    #[arg(long, default_value_t = 8)]
    views: usize,
    #[arg(long, default_value_t = 640)]
    width: u32,
    #[arg(long, default_value_t = 480)]
    height: u32,
    /// Tile edge length in pixels
    #[arg(long, default_value_t = 32)]
    tile: u32,
    /// Visit every node instead of skipping rejected subtrees
    #[arg(long)]
    exhaustive: bool,
}

fn main() -> Result<(), BvhError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let scene = CubeField {
        count: cli.cubes,
        ..CubeField::default()
    }
    .generate(cli.seed);
    let methods = if cli.methods.is_empty() {
        SplitMethod::ALL.to_vec()
    } else {
        cli.methods.clone()
    };
    let traversal = if cli.exhaustive {
        TraversalMode::Exhaustive
    } else {
        TraversalMode::Prune
    };
    let tiles = TileConfig::default().with_tile_size(cli.tile, cli.tile);
    let views = cli.views.max(1);
    let aspect = cli.width as f32 / cli.height as f32;

    for method in methods {
        let config = BvhConfig::default().with_split_method(method).with_traversal(traversal);
        let started = Instant::now();
        let mut bvh = RasterBvh::build(scene.view(), config)?;
        let build_time = started.elapsed();

        let mut renderer = HzbRenderer::new(scene.view(), cli.width, cli.height, tiles)?;
        let mut camera = OrbitCamera::new(110.0, 0.0, 0.3);
        let mut culled_nodes = 0.0;
        let mut culled_faces = 0.0;

        let started = Instant::now();
        for view in 0..views {
            camera.yaw = std::f32::consts::TAU * view as f32 / views as f32;
            let stats = renderer.render(&mut bvh, &camera.view_projection(aspect));
            log::debug!("{method} view {view}: {}", summarize(&stats));
            culled_nodes += stats.culled_node_ratio();
            culled_faces += stats.culled_face_ratio();
        }
        let frame_ms = started.elapsed().as_secs_f64() * 1000.0 / views as f64;

        let build = bvh.build_stats();
        log::info!(
            "{method}{}: {} nodes, {} leaves, depth {}, built in {:.1} ms | culled {:.1}% nodes, {:.1}% faces on average | {:.2} ms/frame",
            if method.is_experimental() { " (experimental)" } else { "" },
            build.total_nodes,
            build.leaf_count,
            build.max_depth,
            build_time.as_secs_f64() * 1000.0,
            culled_nodes * 100.0 / views as f32,
            culled_faces * 100.0 / views as f32,
            frame_ms,
        );
    }

    Ok(())
}
