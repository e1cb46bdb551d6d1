//! Scenes, camera and drawing helpers shared by the HZB viewers.

use macroquad::prelude::*;
use nalgebra::{Isometry3, Matrix4, Perspective3, Point3, Rotation3, Unit, Vector3};
use raster_bvh::{BuildStats, Face, HzbRenderer, Scene, SplitMethod, TraversalStats, Vertex};

pub mod navigator;
pub use navigator::TreeNavigator;

/// Corner offsets of a unit cube centered on the origin.
const CUBE_CORNERS: [[f32; 3]; 8] = [
    [-0.5, -0.5, -0.5], // 0: left-bottom-back
    [0.5, -0.5, -0.5],  // 1: right-bottom-back
    [0.5, 0.5, -0.5],   // 2: right-top-back
    [-0.5, 0.5, -0.5],  // 3: left-top-back
    [-0.5, -0.5, 0.5],  // 4: left-bottom-front
    [0.5, -0.5, 0.5],   // 5: right-bottom-front
    [0.5, 0.5, 0.5],    // 6: right-top-front
    [-0.5, 0.5, 0.5],   // 7: left-top-front
];

/// Cube sides as counter-clockwise corner quads (seen from outside) with
/// their outward normal.
const CUBE_SIDES: [([usize; 4], [f32; 3]); 6] = [
    ([4, 5, 6, 7], [0.0, 0.0, 1.0]),
    ([1, 0, 3, 2], [0.0, 0.0, -1.0]),
    ([0, 4, 7, 3], [-1.0, 0.0, 0.0]),
    ([5, 1, 2, 6], [1.0, 0.0, 0.0]),
    ([7, 6, 2, 3], [0.0, 1.0, 0.0]),
    ([0, 1, 5, 4], [0.0, -1.0, 0.0]),
];

/// Appends a quad split into two triangles. All four corners share `normal`.
fn push_quad(scene: &mut Scene, corners: [Point3<f32>; 4], normal: Vector3<f32>) {
    let vertices = corners.map(|p| Vertex::new(p, normal));
    scene.push_mesh(&vertices, &[Face::new(0, 1, 2), Face::new(0, 2, 3)]);
}

/// Appends a rotated cube with flat-shaded sides. The renderer colors pixels
/// by normal, so each side gets its own color.
pub fn push_cube(scene: &mut Scene, center: Point3<f32>, size: f32, rotation: &Rotation3<f32>) {
    let corners = CUBE_CORNERS.map(|[x, y, z]| center + rotation * (Vector3::new(x, y, z) * size));
    for (quad, [nx, ny, nz]) in CUBE_SIDES {
        push_quad(scene, quad.map(|i| corners[i]), rotation * Vector3::new(nx, ny, nz));
    }
}

/// Appends a horizontal square of side `2 * half_extent` at height `y`,
/// facing up.
pub fn push_floor(scene: &mut Scene, y: f32, half_extent: f32) {
    let h = half_extent;
    push_quad(
        scene,
        [
            Point3::new(-h, y, h),
            Point3::new(h, y, h),
            Point3::new(h, y, -h),
            Point3::new(-h, y, -h),
        ],
        Vector3::y(),
    );
}

/// Simple seeded random number generator (LCG).
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Uniform value in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.state >> 40) as f32 / (1u64 << 24) as f32
    }

    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// A random unit axis; falls back to +x for near-zero samples.
    pub fn axis(&mut self) -> Unit<Vector3<f32>> {
        let v = Vector3::new(self.next_f32() - 0.5, self.next_f32() - 0.5, self.next_f32() - 0.5);
        if v.norm() > 0.01 {
            Unit::new_normalize(v)
        } else {
            Vector3::x_axis()
        }
    }
}

/// Layout of a generated cube field.
#[derive(Debug, Clone, Copy)]
pub struct CubeField {
    pub count: usize,
    /// Cubes are centered inside `[-world_size / 2, world_size / 2]` on each axis.
    pub world_size: f32,
    pub min_size: f32,
    pub max_size: f32,
    pub rotated: bool,
    /// Adds a floor under the field.
    pub floor: bool,
}

impl Default for CubeField {
    fn default() -> Self {
        Self {
            count: 200,
            world_size: 60.0,
            min_size: 1.5,
            max_size: 6.0,
            rotated: true,
            floor: true,
        }
    }
}

impl CubeField {
    pub fn generate(&self, seed: u64) -> Scene {
        let mut rng = Rng::new(seed);
        let mut scene = Scene::new();

        for _ in 0..self.count {
            let center = Point3::new(
                (rng.next_f32() - 0.5) * self.world_size,
                (rng.next_f32() - 0.5) * self.world_size,
                (rng.next_f32() - 0.5) * self.world_size,
            );
            let size = rng.range(self.min_size, self.max_size);
            let rotation = if self.rotated {
                let axis = rng.axis();
                Rotation3::from_axis_angle(&axis, rng.next_f32() * std::f32::consts::TAU)
            } else {
                Rotation3::identity()
            };
            push_cube(&mut scene, center, size, &rotation);
        }

        if self.floor {
            push_floor(&mut scene, -0.5 * self.world_size - self.max_size, self.world_size);
        }

        log::info!(
            "generated {} cubes: {} vertices, {} faces",
            self.count,
            scene.vertices().len(),
            scene.faces().len()
        );
        scene
    }
}

/// Simple orbit camera for 3D scene navigation.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub target: Point3<f32>,
    /// Vertical field of view in radians.
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
    /// Multiplier for scroll wheel zoom
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl OrbitCamera {
    pub fn new(distance: f32, yaw: f32, pitch: f32) -> Self {
        Self {
            distance,
            yaw,
            pitch,
            target: Point3::origin(),
            fovy: std::f32::consts::FRAC_PI_3,
            znear: 0.5,
            zfar: 500.0,
            zoom_speed: 5.0,
            min_distance: 10.0,
            max_distance: 300.0,
        }
    }

    /// Sets the zoom configuration (speed and distance limits).
    pub fn with_zoom(mut self, speed: f32, min: f32, max: f32) -> Self {
        self.zoom_speed = speed;
        self.min_distance = min;
        self.max_distance = max;
        self
    }

    pub fn with_target(mut self, target: Point3<f32>) -> Self {
        self.target = target;
        self
    }

    /// Updates camera state from user input (mouse drag, scroll, arrow keys).
    pub fn update(&mut self) {
        if is_mouse_button_down(MouseButton::Left) {
            let delta = mouse_delta_position();
            self.yaw -= delta.x * 2.0;
            self.pitch -= delta.y * 2.0;
        }

        let scroll = mouse_wheel().1;
        self.distance -= scroll * self.zoom_speed;
        self.distance = self.distance.clamp(self.min_distance, self.max_distance);

        if is_key_down(KeyCode::Left) {
            self.yaw += 0.02;
        }
        if is_key_down(KeyCode::Right) {
            self.yaw -= 0.02;
        }
        if is_key_down(KeyCode::Up) {
            self.pitch += 0.02;
        }
        if is_key_down(KeyCode::Down) {
            self.pitch -= 0.02;
        }

        self.pitch = self.pitch.clamp(-1.5, 1.5);
    }

    /// Spins the camera around the target by `radians`.
    pub fn orbit(&mut self, radians: f32) {
        self.yaw += radians;
    }

    pub fn position(&self) -> Point3<f32> {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vector3::new(x, y, z)
    }

    /// World to clip space for a viewport of the given aspect ratio.
    pub fn view_projection(&self, aspect: f32) -> Matrix4<f32> {
        let view = Isometry3::look_at_rh(&self.position(), &self.target, &Vector3::y());
        let projection = Perspective3::new(aspect, self.fovy, self.znear, self.zfar);
        projection.as_matrix() * view.to_homogeneous()
    }
}

/// Window-space placement of the rendered framebuffer.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

impl Viewport {
    /// Largest scale that fits a `width` x `height` frame into the window
    /// below `top`, centered horizontally.
    pub fn fit(width: u32, height: u32, top: f32) -> Self {
        let scale = (screen_width() / width as f32).min((screen_height() - top) / height as f32).max(0.1);
        Self {
            x: (screen_width() - width as f32 * scale) * 0.5,
            y: top,
            scale,
        }
    }
}

/// GPU texture mirroring the renderer's color buffer.
pub struct FrameTexture {
    texture: Texture2D,
    image: Image,
}

impl FrameTexture {
    pub fn new(width: u32, height: u32) -> Self {
        let image = Image::gen_image_color(width as u16, height as u16, BLACK);
        let texture = Texture2D::from_image(&image);
        texture.set_filter(FilterMode::Nearest);
        Self { texture, image }
    }

    /// Uploads the renderer's current color buffer.
    pub fn upload(&mut self, renderer: &HzbRenderer<'_>) {
        self.image.bytes = renderer.rgba8();
        self.texture.update(&self.image);
    }

    /// Draws the frame; framebuffer row 0 is the bottom of the image.
    pub fn draw(&self, viewport: &Viewport) {
        let size = vec2(
            self.image.width as f32 * viewport.scale,
            self.image.height as f32 * viewport.scale,
        );
        draw_texture_ex(
            &self.texture,
            viewport.x,
            viewport.y,
            WHITE,
            DrawTextureParams {
                dest_size: Some(size),
                flip_y: true,
                ..Default::default()
            },
        );
    }
}

/// Draws build and culling counters as a text block starting at `y`.
pub fn draw_stats(method: SplitMethod, build: &BuildStats, traversal: &TraversalStats, y: f32) {
    let label = if method.is_experimental() {
        format!("{method} (experimental)")
    } else {
        method.to_string()
    };
    draw_text(&format!("Split method: {label}"), 10.0, y, 20.0, WHITE);
    draw_text(
        &format!(
            "Faces: {} | Nodes: {} ({} leaves) | Depth: {}",
            build.total_faces, build.total_nodes, build.leaf_count, build.max_depth
        ),
        10.0,
        y + 20.0,
        18.0,
        GRAY,
    );
    draw_text(
        &format!(
            "Visited {} nodes | Culled {:.1}% nodes, {:.1}% faces ({} drawn)",
            traversal.visited_nodes,
            traversal.culled_node_ratio() * 100.0,
            traversal.culled_face_ratio() * 100.0,
            traversal.drawn_faces()
        ),
        10.0,
        y + 40.0,
        18.0,
        GREEN,
    );
}

/// Short text summary of one traversal, for logs.
pub fn summarize(traversal: &TraversalStats) -> String {
    format!(
        "visited {}/{} nodes, culled {:.1}% nodes and {:.1}% faces",
        traversal.visited_nodes,
        traversal.total_nodes,
        traversal.culled_node_ratio() * 100.0,
        traversal.culled_face_ratio() * 100.0
    )
}
