//! Software rasterizer that culls through the BVH and the tile grid.
//!
//! [`HzbRenderer`] is a [`BvhVisitor`]: interior nodes are accepted while any
//! tile they cover could still show them, and leaves are rasterized into a
//! depth and color buffer, after which the tiles they touched refresh their
//! farthest depth.

use nalgebra::{Matrix4, Point3};

use crate::{Aabb, BvhError, BvhNode, BvhVisitor, Face, RasterBvh, SceneView, ScreenRect, TileConfig, TileCuller, TraversalStats};

/// Color of the bounding box overlay.
pub const WIREFRAME_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// Pairs of [`Aabb::corners`] forming the twelve box edges.
const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// Lines with an endpoint farther than this many framebuffers away are not
/// drawn.
const GUARD_BAND: i64 = 8;

/// Depth and color buffers plus the tile grid for one framebuffer size.
///
/// Buffers are laid out row by row, with row 0 at the bottom of the screen.
#[derive(Debug, Clone)]
pub struct HzbRenderer<'s> {
    scene: SceneView<'s>,
    width: u32,
    height: u32,
    depth: Vec<f32>,
    color: Vec<f32>,
    tiles: TileCuller,
    view_proj: Matrix4<f32>,
    draw_bounds: bool,
    /// Tiles a leaf needs, collected before rasterizing it.
    pending_tiles: Vec<(u32, u32)>,
}

impl<'s> HzbRenderer<'s> {
    pub fn new(scene: SceneView<'s>, width: u32, height: u32, tiles: TileConfig) -> Result<Self, BvhError> {
        let tiles = TileCuller::new(width, height, tiles)?;
        let pixels = width as usize * height as usize;
        Ok(Self {
            scene,
            width,
            height,
            depth: vec![f32::INFINITY; pixels],
            color: vec![0.0; pixels * 3],
            tiles,
            view_proj: Matrix4::identity(),
            draw_bounds: false,
            pending_tiles: Vec::new(),
        })
    }

    /// Draws the object-space bounds of every visited node over the image.
    pub fn with_bounds_overlay(mut self, enabled: bool) -> Self {
        self.draw_bounds = enabled;
        self
    }

    pub fn set_bounds_overlay(&mut self, enabled: bool) {
        self.draw_bounds = enabled;
    }

    #[inline]
    pub fn bounds_overlay(&self) -> bool {
        self.draw_bounds
    }

    /// Clears depth to +inf, color to black and every tile to unresolved.
    pub fn begin_frame(&mut self) {
        self.depth.fill(f32::INFINITY);
        self.color.fill(0.0);
        self.tiles.reset_max_z();
    }

    /// Renders one frame of `bvh` seen through `view_proj`.
    pub fn render(&mut self, bvh: &mut RasterBvh<'_>, view_proj: &Matrix4<f32>) -> TraversalStats {
        self.begin_frame();
        self.view_proj = *view_proj;
        bvh.implement_transform(view_proj);
        bvh.traverse(self)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Post-divide depth per pixel; +inf where nothing was drawn.
    #[inline]
    pub fn depth_buffer(&self) -> &[f32] {
        &self.depth
    }

    /// RGB floats per pixel.
    #[inline]
    pub fn color_buffer(&self) -> &[f32] {
        &self.color
    }

    #[inline]
    pub fn tiles(&self) -> &TileCuller {
        &self.tiles
    }

    /// Overwrites the color buffer with each resolved tile's farthest depth.
    pub fn paint_tile_depth(&mut self) {
        self.tiles.write_tile_depth(&mut self.color);
    }

    /// The color buffer clamped to `[0, 1]` and packed as RGBA bytes.
    pub fn rgba8(&self) -> Vec<u8> {
        let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        self.color
            .chunks_exact(3)
            .flat_map(|rgb| [to_byte(rgb[0]), to_byte(rgb[1]), to_byte(rgb[2]), u8::MAX])
            .collect()
    }

    /// Projects a point to pixel coordinates, keeping post-divide depth in z.
    /// Returns `None` for points at or behind the eye.
    fn to_screen(&self, p: &Point3<f32>) -> Option<Point3<f32>> {
        let h = self.view_proj * p.to_homogeneous();
        if h.w <= 0.0 {
            return None;
        }
        Some(Point3::new(
            (h.x / h.w + 1.0) * 0.5 * self.width as f32,
            (h.y / h.w + 1.0) * 0.5 * self.height as f32,
            h.z / h.w,
        ))
    }

    fn draw_triangle(&mut self, face: &Face) {
        let scene = self.scene;
        let [a, b, c] = face.indices();
        let vertices = [&scene.vertices[a], &scene.vertices[b], &scene.vertices[c]];
        let (Some(p0), Some(p1), Some(p2)) = (
            self.to_screen(&vertices[0].position),
            self.to_screen(&vertices[1].position),
            self.to_screen(&vertices[2].position),
        ) else {
            return;
        };

        let area = edge(&p0, &p1, &p2);
        if area == 0.0 || !area.is_finite() {
            return;
        }

        let x0 = p0.x.min(p1.x).min(p2.x).floor().max(0.0);
        let x1 = p0.x.max(p1.x).max(p2.x).ceil().min(self.width as f32 - 1.0);
        let y0 = p0.y.min(p1.y).min(p2.y).floor().max(0.0);
        let y1 = p0.y.max(p1.y).max(p2.y).ceil().min(self.height as f32 - 1.0);
        if x0 > x1 || y0 > y1 {
            return;
        }

        let width = self.width as usize;
        for y in y0 as usize..=y1 as usize {
            for x in x0 as usize..=x1 as usize {
                let sample = Point3::new(x as f32 + 0.5, y as f32 + 0.5, 0.0);
                let l0 = edge(&p1, &p2, &sample) / area;
                let l1 = edge(&p2, &p0, &sample) / area;
                let l2 = edge(&p0, &p1, &sample) / area;
                if l0 < 0.0 || l1 < 0.0 || l2 < 0.0 {
                    continue;
                }

                let pixel = y * width + x;
                let z = l0 * p0.z + l1 * p1.z + l2 * p2.z;
                if z <= self.depth[pixel] {
                    let normal = vertices[0].normal * l0 + vertices[1].normal * l1 + vertices[2].normal * l2;
                    self.depth[pixel] = z;
                    self.color[pixel * 3..pixel * 3 + 3].copy_from_slice(normal.as_slice());
                }
            }
        }
    }

    fn draw_box(&mut self, bounds: &Aabb) {
        let corners = bounds.corners().map(|c| self.to_screen(&c));
        for (from, to) in BOX_EDGES {
            if let (Some(p0), Some(p1)) = (corners[from], corners[to]) {
                self.draw_line(&p0, &p1);
            }
        }
    }

    /// Bresenham line in pixel space; color only, depth is untouched.
    fn draw_line(&mut self, from: &Point3<f32>, to: &Point3<f32>) {
        let (w, h) = (self.width as i64, self.height as i64);
        let reach = GUARD_BAND * w.max(h);
        let in_band = |p: &Point3<f32>| p.x.is_finite() && p.y.is_finite() && (p.x as i64).abs() <= reach && (p.y as i64).abs() <= reach;
        if !in_band(from) || !in_band(to) {
            return;
        }

        let (mut x0, mut y0) = (from.x as i64, from.y as i64);
        let (x1, y1) = (to.x as i64, to.y as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            if (0..w).contains(&x0) && (0..h).contains(&y0) {
                let pixel = (y0 * w + x0) as usize;
                self.color[pixel * 3..pixel * 3 + 3].copy_from_slice(&WIREFRAME_COLOR);
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }
}

/// Twice the signed area of `(a, b, p)` in the xy plane.
#[inline]
fn edge(a: &Point3<f32>, b: &Point3<f32>, p: &Point3<f32>) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

impl BvhVisitor for HzbRenderer<'_> {
    fn visit(&mut self, node: &BvhNode, faces: &[usize], stats: &mut TraversalStats) -> bool {
        let projected = node.projected();
        let rect = ScreenRect::from_projected(projected, self.width, self.height);
        let min_z = projected.min_z;

        if !node.is_leaf() {
            return self
                .tiles
                .overlapping_tiles(&rect)
                .any(|(tx, ty)| self.tiles.tile_needs_render(&rect, tx, ty, min_z));
        }

        self.pending_tiles.clear();
        self.pending_tiles.extend(
            self.tiles
                .overlapping_tiles(&rect)
                .filter(|&(tx, ty)| self.tiles.tile_needs_render(&rect, tx, ty, min_z)),
        );
        if self.pending_tiles.is_empty() {
            return false;
        }

        let scene = self.scene;
        for &face in faces {
            self.draw_triangle(scene.face(face));
        }
        for &(tx, ty) in &self.pending_tiles {
            self.tiles.update_tile_max_z(tx, ty, &self.depth);
        }

        stats.mark_faces_drawn(faces.len());
        true
    }

    fn debug_bounds(&mut self, bounds: &Aabb) {
        if self.draw_bounds {
            self.draw_box(bounds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BvhConfig, Scene, SplitMethod, Vertex};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    /// Two triangles spanning `[-s, s]` in x and y at height `z`, facing +z.
    fn quad(scene: &mut Scene, s: f32, z: f32) {
        let normal = Vector3::new(0.0, 0.0, 1.0);
        let vertices = [
            Vertex::new(Point3::new(-s, -s, z), normal),
            Vertex::new(Point3::new(s, -s, z), normal),
            Vertex::new(Point3::new(s, s, z), normal),
            Vertex::new(Point3::new(-s, s, z), normal),
        ];
        scene.push_mesh(&vertices, &[Face::new(0, 1, 2), Face::new(0, 2, 3)]);
    }

    /// Orthographic view straight down -z: x and y pass through, world z in
    /// `[-10, 10]` maps to depth `[-1, 1]`.
    fn flat_view() -> Matrix4<f32> {
        Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, 0.1))
    }

    fn tiles() -> TileConfig {
        TileConfig::default().with_tile_size(16, 16)
    }

    #[test]
    fn full_screen_quad_fills_every_pixel() {
        let mut scene = Scene::new();
        quad(&mut scene, 1.0, -5.0);
        let mut bvh = RasterBvh::build(scene.view(), BvhConfig::default()).unwrap();
        let mut renderer = HzbRenderer::new(scene.view(), 32, 32, tiles()).unwrap();

        let stats = renderer.render(&mut bvh, &flat_view());

        assert_eq!(stats.culled_faces, 0);
        for &z in renderer.depth_buffer() {
            assert_relative_eq!(z, -0.5, epsilon = 1e-5);
        }
        let rgba = renderer.rgba8();
        assert_eq!(rgba.len(), 32 * 32 * 4);
        assert_eq!(&rgba[..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn occluded_quad_is_culled() {
        let mut scene = Scene::new();
        quad(&mut scene, 1.0, -8.0);
        quad(&mut scene, 0.5, 8.0);
        let config = BvhConfig::default().with_split_method(SplitMethod::Middle);
        let mut bvh = RasterBvh::build(scene.view(), config).unwrap();
        assert_eq!(bvh.build_stats().total_nodes, 7);

        let mut renderer = HzbRenderer::new(scene.view(), 64, 64, tiles()).unwrap();
        let stats = renderer.render(&mut bvh, &flat_view());

        // Root, the near quad and its two leaves are drawn; the far subtree
        // is rejected at its root.
        assert_eq!(stats.visited_nodes, 5);
        assert_eq!(stats.culled_nodes, 3);
        assert_eq!(stats.culled_faces, 2);
        assert!(renderer.depth_buffer().iter().all(|&z| z < 0.0));

        let (gx, gy) = renderer.tiles().grid_size();
        for ty in 0..gy {
            for tx in 0..gx {
                assert_relative_eq!(renderer.tiles().tile_max_z(tx, ty), -0.8, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn occluded_quad_is_drawn_first_then_overwritten() {
        // The far quad sits in the left subtree, so it is drawn before the
        // near one hides it.
        let mut scene = Scene::new();
        quad(&mut scene, 1.0, -8.0);
        quad(&mut scene, 0.5, 8.0);
        let mut bvh = RasterBvh::build(scene.view(), BvhConfig::default()).unwrap();
        let mut renderer = HzbRenderer::new(scene.view(), 64, 64, tiles()).unwrap();

        let flipped = flat_view() * Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, -1.0));
        let stats = renderer.render(&mut bvh, &flipped);

        assert_eq!(stats.culled_faces, 0);
        let center = 32 * 64 + 32;
        assert_relative_eq!(renderer.depth_buffer()[center], -0.8, epsilon = 1e-5);
    }

    #[test]
    fn small_near_quad_does_not_hide_the_rest_of_its_tile() {
        let mut scene = Scene::new();
        quad(&mut scene, 0.25, -8.0);
        quad(&mut scene, 1.0, 8.0);
        let config = BvhConfig::default().with_split_method(SplitMethod::Middle);
        let mut bvh = RasterBvh::build(scene.view(), config).unwrap();
        let mut renderer = HzbRenderer::new(scene.view(), 16, 16, tiles()).unwrap();
        assert_eq!(renderer.tiles().grid_size(), (1, 1));

        let stats = renderer.render(&mut bvh, &flat_view());

        assert_eq!(stats.drawn_faces(), 4);
        assert_eq!(stats.culled_faces, 0);
        let depth = renderer.depth_buffer();
        assert_relative_eq!(depth[0], 0.8, epsilon = 1e-5);
        assert_relative_eq!(depth[7 * 16 + 8], -0.8, epsilon = 1e-5);
        assert_relative_eq!(renderer.tiles().tile_max_z(0, 0), 0.8, epsilon = 1e-5);
    }

    #[test]
    fn skipping_unresolved_pixels_trades_coverage_for_culling() {
        let mut scene = Scene::new();
        quad(&mut scene, 0.25, -8.0);
        quad(&mut scene, 1.0, 8.0);
        let config = BvhConfig::default().with_split_method(SplitMethod::Middle);
        let mut bvh = RasterBvh::build(scene.view(), config).unwrap();
        let mut renderer = HzbRenderer::new(scene.view(), 16, 16, tiles().with_skip_unresolved(true)).unwrap();

        let stats = renderer.render(&mut bvh, &flat_view());

        assert!(stats.culled_faces > 0);
        assert!(renderer.depth_buffer()[0].is_infinite());
    }

    #[test]
    fn triangles_behind_the_eye_are_skipped() {
        let mut scene = Scene::new();
        quad(&mut scene, 1.0, 5.0);
        let mut bvh = RasterBvh::build(scene.view(), BvhConfig::default()).unwrap();
        let mut renderer = HzbRenderer::new(scene.view(), 16, 16, tiles()).unwrap();

        // Camera at the origin looking down -z; the quad is behind it.
        let projection = Matrix4::new_perspective(1.0, 1.2, 0.1, 100.0);
        renderer.render(&mut bvh, &projection);

        assert!(renderer.depth_buffer().iter().all(|z| z.is_infinite()));
        assert!(renderer.color_buffer().iter().all(|&c| c == 0.0));
    }

    #[test]
    fn bounds_overlay_draws_without_touching_depth() {
        let mut scene = Scene::new();
        quad(&mut scene, 0.5, 0.0);
        let mut bvh = RasterBvh::build(scene.view(), BvhConfig::default()).unwrap();
        let mut renderer = HzbRenderer::new(scene.view(), 32, 32, tiles())
            .unwrap()
            .with_bounds_overlay(true);

        renderer.render(&mut bvh, &flat_view());

        let white = renderer
            .color_buffer()
            .chunks_exact(3)
            .filter(|rgb| *rgb == WIREFRAME_COLOR)
            .count();
        assert!(white > 0);
        assert!(renderer.depth_buffer()[0].is_infinite());
    }

    #[test]
    fn zero_sized_framebuffer_is_rejected() {
        let scene = Scene::new();
        let err = HzbRenderer::new(scene.view(), 0, 0, TileConfig::default()).unwrap_err();
        assert_eq!(err, BvhError::EmptyFramebuffer { width: 0, height: 0 });
    }
}
