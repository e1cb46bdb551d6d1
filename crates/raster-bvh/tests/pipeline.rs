use nalgebra::{Isometry3, Matrix4, Perspective3, Point3, Vector3};
use raster_bvh::{BvhConfig, Face, HzbRenderer, RasterBvh, Scene, SplitMethod, TileConfig, TraversalMode, Vertex};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 64;
const CUBES: usize = 20;

fn push_box(scene: &mut Scene, center: Point3<f32>, half: f32) {
    let corners: Vec<Vertex> = (0..8)
        .map(|i| {
            let sign = |bit: usize| if i & bit == 0 { -half } else { half };
            Vertex::from_position(center + Vector3::new(sign(1), sign(2), sign(4)))
        })
        .collect();
    let faces = [
        [0, 2, 3, 1],
        [4, 5, 7, 6],
        [0, 1, 5, 4],
        [2, 6, 7, 3],
        [0, 4, 6, 2],
        [1, 3, 7, 5],
    ]
    .iter()
    .flat_map(|&[a, b, c, d]| [Face::new(a, b, c), Face::new(a, c, d)])
    .collect::<Vec<_>>();
    scene.push_mesh(&corners, &faces);
}

/// A wall filling the view at z = 5 with a column of boxes hidden behind it.
fn walled_scene() -> Scene {
    let mut scene = Scene::new();
    let normal = Vector3::new(0.0, 0.0, -1.0);
    scene.push_mesh(
        &[
            Vertex::new(Point3::new(-4.0, -4.0, 5.0), normal),
            Vertex::new(Point3::new(4.0, -4.0, 5.0), normal),
            Vertex::new(Point3::new(4.0, 4.0, 5.0), normal),
            Vertex::new(Point3::new(-4.0, 4.0, 5.0), normal),
        ],
        &[Face::new(0, 1, 2), Face::new(0, 2, 3)],
    );
    for i in 0..CUBES {
        let center = Point3::new((i % 5) as f32 - 2.0, (i / 5) as f32 - 1.5, 20.0 + 4.0 * i as f32);
        push_box(&mut scene, center, 0.5);
    }
    scene
}

/// Eye at the origin looking down +z.
fn camera() -> Matrix4<f32> {
    let view = Isometry3::look_at_rh(&Point3::origin(), &Point3::new(0.0, 0.0, 1.0), &Vector3::y());
    Perspective3::new(1.0, std::f32::consts::FRAC_PI_3, 0.1, 1000.0).as_matrix() * view.to_homogeneous()
}

fn tiles() -> TileConfig {
    TileConfig::default().with_tile_size(16, 16)
}

#[test]
fn wall_hides_everything_behind_it() {
    let scene = walled_scene();
    let config = BvhConfig::default().with_split_method(SplitMethod::Middle);
    let mut bvh = RasterBvh::build(scene.view(), config).unwrap();
    let mut renderer = HzbRenderer::new(scene.view(), WIDTH, HEIGHT, tiles()).unwrap();

    let stats = renderer.render(&mut bvh, &camera());

    assert_eq!(stats.total_faces, 2 + CUBES * 12);
    assert_eq!(stats.drawn_faces(), 2);
    assert!(stats.visited_nodes < bvh.build_stats().total_nodes);
    assert!(stats.culled_face_ratio() > 0.99);
}

#[test]
fn exhaustive_traversal_visits_every_node_but_draws_the_same() {
    let scene = walled_scene();
    let config = BvhConfig::default()
        .with_split_method(SplitMethod::Middle)
        .with_traversal(TraversalMode::Exhaustive);
    let mut bvh = RasterBvh::build(scene.view(), config).unwrap();
    let mut renderer = HzbRenderer::new(scene.view(), WIDTH, HEIGHT, tiles()).unwrap();

    let stats = renderer.render(&mut bvh, &camera());

    assert_eq!(stats.visited_nodes, bvh.build_stats().total_nodes);
    assert_eq!(stats.drawn_faces(), 2);
}

#[test]
fn every_split_method_sees_only_the_wall() {
    let scene = walled_scene();

    for method in SplitMethod::ALL {
        let config = BvhConfig::default().with_split_method(method);
        let mut bvh = RasterBvh::build(scene.view(), config).unwrap();
        let mut renderer = HzbRenderer::new(scene.view(), WIDTH, HEIGHT, tiles()).unwrap();
        renderer.render(&mut bvh, &camera());

        let depth = renderer.depth_buffer();
        let wall = depth[0];
        assert!(wall > -1.0 && wall < 1.0, "{method}: wall depth {wall}");
        assert!(depth.iter().all(|&z| (z - wall).abs() < 1e-5), "{method}");
    }
}

#[test]
fn rendering_twice_is_stable() {
    let scene = walled_scene();
    let mut bvh = RasterBvh::build(scene.view(), BvhConfig::default()).unwrap();
    let mut renderer = HzbRenderer::new(scene.view(), WIDTH, HEIGHT, tiles()).unwrap();

    let first = renderer.render(&mut bvh, &camera());
    let image = renderer.rgba8();
    let second = renderer.render(&mut bvh, &camera());

    assert_eq!(first, second);
    assert_eq!(renderer.rgba8(), image);
    assert_eq!(bvh.last_traversal(), &second);
}
