use hzb_viz::{CubeField, FrameTexture, OrbitCamera, TreeNavigator, Viewport, draw_stats};
use macroquad::prelude::*;
use raster_bvh::{BvhConfig, HzbRenderer, RasterBvh, SplitMethod, TileConfig, TraversalMode};

const FRAME_WIDTH: u32 = 480;
const FRAME_HEIGHT: u32 = 320;
const HUD_HEIGHT: f32 = 170.0;

fn next_split_method(current: SplitMethod) -> SplitMethod {
    let i = SplitMethod::ALL.iter().position(|&m| m == current).unwrap_or(0);
    SplitMethod::ALL[(i + 1) % SplitMethod::ALL.len()]
}

#[macroquad::main("Hierarchical Z-Buffer")]
async fn main() {
    env_logger::init();

    let scene = CubeField::default().generate(42);
    let mut config = BvhConfig::default();
    let mut bvh = match RasterBvh::build(scene.view(), config) {
        Ok(bvh) => bvh,
        Err(err) => {
            log::error!("cannot build BVH: {err}");
            return;
        }
    };
    let mut renderer = match HzbRenderer::new(scene.view(), FRAME_WIDTH, FRAME_HEIGHT, TileConfig::default()) {
        Ok(renderer) => renderer,
        Err(err) => {
            log::error!("cannot create renderer: {err}");
            return;
        }
    };

    let mut camera = OrbitCamera::new(110.0, 0.0, 0.3).with_zoom(4.0, 20.0, 300.0);
    let mut navigator = TreeNavigator::new();
    let mut frame = FrameTexture::new(FRAME_WIDTH, FRAME_HEIGHT);
    let mut show_tile_depth = false;
    let mut auto_rotate = false;

    loop {
        camera.update();
        navigator.update(&bvh);

        if is_key_pressed(KeyCode::M) {
            config = config.with_split_method(next_split_method(config.split_method));
            match RasterBvh::build(scene.view(), config) {
                Ok(rebuilt) => {
                    bvh = rebuilt;
                    navigator.go_root();
                }
                Err(err) => log::error!("cannot rebuild BVH: {err}"),
            }
        }
        if is_key_pressed(KeyCode::T) {
            config.traversal = match config.traversal {
                TraversalMode::Prune => TraversalMode::Exhaustive,
                TraversalMode::Exhaustive => TraversalMode::Prune,
            };
            bvh.set_traversal_mode(config.traversal);
        }
        if is_key_pressed(KeyCode::O) {
            renderer.set_bounds_overlay(!renderer.bounds_overlay());
        }
        if is_key_pressed(KeyCode::Z) {
            show_tile_depth = !show_tile_depth;
        }
        if is_key_pressed(KeyCode::Space) {
            auto_rotate = !auto_rotate;
        }
        if auto_rotate {
            camera.orbit(0.005);
        }

        let view_proj = camera.view_projection(FRAME_WIDTH as f32 / FRAME_HEIGHT as f32);
        let stats = renderer.render(&mut bvh, &view_proj);
        if show_tile_depth {
            renderer.paint_tile_depth();
        }
        frame.upload(&renderer);

        clear_background(Color::from_rgba(15, 15, 25, 255));
        let viewport = Viewport::fit(FRAME_WIDTH, FRAME_HEIGHT, HUD_HEIGHT);
        frame.draw(&viewport);
        navigator.draw_selection(&bvh, FRAME_WIDTH, FRAME_HEIGHT, &viewport);

        draw_stats(config.split_method, bvh.build_stats(), &stats, 25.0);
        navigator.draw_ui(&bvh, 90.0);
        draw_text(
            &format!(
                "[M]ethod | [T]raversal: {:?} | [O]verlay | [Z] tile depth | [Space] spin | FPS: {}",
                config.traversal,
                get_fps()
            ),
            10.0,
            HUD_HEIGHT - 5.0,
            16.0,
            DARKGRAY,
        );

        next_frame().await
    }
}
