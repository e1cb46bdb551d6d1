//! Screen tiles holding the farthest resolved depth, used to reject nodes
//! whose projected bounds lie behind everything already drawn.
//!
//! Screen coordinates follow normalized device coordinates: pixel row 0 is
//! `y = -1`, and column 0 is `x = -1`.

use nalgebra::Point2;

use crate::{BvhError, ProjectedBounds, TileConfig};

/// Inclusive pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenRect {
    pub min: Point2<i32>,
    pub max: Point2<i32>,
}

impl ScreenRect {
    pub fn new(min: Point2<i32>, max: Point2<i32>) -> Self {
        Self { min, max }
    }

    /// Maps projected bounds to pixels of a `width` x `height` framebuffer,
    /// rounding the minimum corner down and the maximum corner up.
    ///
    /// Bounds that were never projected produce a rectangle that overlaps
    /// nothing.
    pub fn from_projected(projected: &ProjectedBounds, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        let to_pixel = |ndc: f32, size: f32| (ndc + 1.0) * size * 0.5;
        Self {
            min: Point2::new(
                to_pixel(projected.min.x, w).floor() as i32,
                to_pixel(projected.min.y, h).floor() as i32,
            ),
            max: Point2::new(
                to_pixel(projected.max.x, w).ceil() as i32,
                to_pixel(projected.max.y, h).ceil() as i32,
            ),
        }
    }

    #[inline]
    pub fn overlaps(&self, other: &ScreenRect) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x && self.min.y <= other.max.y && self.max.y >= other.min.y
    }
}

/// A grid of screen tiles, each remembering the largest depth resolved inside
/// it during the current frame.
#[derive(Debug, Clone)]
pub struct TileCuller {
    width: u32,
    height: u32,
    config: TileConfig,
    tiles_x: u32,
    tiles_y: u32,
    max_z: Vec<f32>,
}

impl TileCuller {
    /// Creates a grid covering a `width` x `height` framebuffer. Partial tiles
    /// are added on the right and top edges.
    pub fn new(width: u32, height: u32, config: TileConfig) -> Result<Self, BvhError> {
        config.validate()?;
        if width == 0 || height == 0 {
            return Err(BvhError::EmptyFramebuffer { width, height });
        }

        let tiles_x = width.div_ceil(config.tile_width);
        let tiles_y = height.div_ceil(config.tile_height);
        log::debug!(
            "tile grid: {tiles_x}x{tiles_y} tiles of {}x{} pixels over {width}x{height}",
            config.tile_width,
            config.tile_height,
        );

        Ok(Self {
            width,
            height,
            config,
            tiles_x,
            tiles_y,
            max_z: vec![f32::INFINITY; tiles_x as usize * tiles_y as usize],
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn config(&self) -> &TileConfig {
        &self.config
    }

    /// Number of tiles along x and y.
    #[inline]
    pub fn grid_size(&self) -> (u32, u32) {
        (self.tiles_x, self.tiles_y)
    }

    /// Marks every tile as unresolved.
    pub fn reset_max_z(&mut self) {
        self.max_z.fill(f32::INFINITY);
    }

    pub fn tile_max_z(&self, tx: u32, ty: u32) -> f32 {
        self.max_z[self.tile_index(tx, ty)]
    }

    fn tile_index(&self, tx: u32, ty: u32) -> usize {
        assert!(
            tx < self.tiles_x && ty < self.tiles_y,
            "tile ({tx}, {ty}) out of range for a {}x{} grid",
            self.tiles_x,
            self.tiles_y
        );
        (ty * self.tiles_x + tx) as usize
    }

    /// The tile's pixel rectangle used for overlap tests.
    ///
    /// The maximum corner is the first pixel of the next tile, clamped to the
    /// framebuffer, so neighbouring tiles share one column or row.
    pub fn tile_rect(&self, tx: u32, ty: u32) -> ScreenRect {
        let (tw, th) = (self.config.tile_width as i64, self.config.tile_height as i64);
        let (tx, ty) = (tx as i64, ty as i64);
        let max_x = ((tx + 1) * tw).min(self.width as i64 - 1);
        let max_y = ((ty + 1) * th).min(self.height as i64 - 1);
        ScreenRect::new(
            Point2::new((tx * tw) as i32, (ty * th) as i32),
            Point2::new(max_x as i32, max_y as i32),
        )
    }

    /// Returns `true` if `rect` overlaps the tile and something at `min_z`
    /// could still be in front of the tile's farthest resolved depth.
    ///
    /// # Panics
    /// Panics if the tile is outside the grid.
    pub fn tile_needs_render(&self, rect: &ScreenRect, tx: u32, ty: u32, min_z: f32) -> bool {
        let index = self.tile_index(tx, ty);
        rect.overlaps(&self.tile_rect(tx, ty)) && min_z < self.max_z[index]
    }

    /// Tiles whose rectangle overlaps `rect`, row by row.
    pub fn overlapping_tiles(&self, rect: &ScreenRect) -> impl Iterator<Item = (u32, u32)> + '_ {
        let rect = *rect;
        let (tw, th) = (self.config.tile_width as i64, self.config.tile_height as i64);
        // A rect starting on a tile boundary also touches the previous tile.
        let x_lo = (rect.min.x as i64 - 1).div_euclid(tw).max(0);
        let x_hi = (rect.max.x as i64).div_euclid(tw).min(self.tiles_x as i64 - 1);
        let y_lo = (rect.min.y as i64 - 1).div_euclid(th).max(0);
        let y_hi = (rect.max.y as i64).div_euclid(th).min(self.tiles_y as i64 - 1);

        (y_lo..=y_hi)
            .flat_map(move |ty| (x_lo..=x_hi).map(move |tx| (tx as u32, ty as u32)))
            .filter(move |&(tx, ty)| self.tile_rect(tx, ty).overlaps(&rect))
    }

    /// Recomputes a tile's farthest depth from the resolved depth buffer,
    /// laid out as `row * width + column`.
    ///
    /// A pixel still at +inf keeps the whole tile at +inf. With
    /// `skip_unresolved` set such pixels are ignored instead, and only a tile
    /// with no resolved pixel stays at +inf.
    ///
    /// # Panics
    /// Panics if the tile is outside the grid or `depth` does not match the
    /// framebuffer size.
    pub fn update_tile_max_z(&mut self, tx: u32, ty: u32, depth: &[f32]) {
        let index = self.tile_index(tx, ty);
        assert_eq!(
            depth.len(),
            self.width as usize * self.height as usize,
            "depth buffer does not match the {}x{} framebuffer",
            self.width,
            self.height
        );

        let width = self.width as usize;
        let mut farthest: Option<f32> = None;
        for row in self.tile_rows(ty) {
            for &z in &depth[row * width..][self.tile_columns(tx)] {
                if self.config.skip_unresolved && z == f32::INFINITY {
                    continue;
                }
                farthest = Some(farthest.map_or(z, |f| f.max(z)));
            }
        }

        self.max_z[index] = farthest.unwrap_or(f32::INFINITY);
    }

    /// Paints every resolved tile's farthest depth as a grey level into an
    /// RGB buffer. Unresolved tiles are left untouched.
    ///
    /// # Panics
    /// Panics if `color` does not hold three floats per pixel.
    pub fn write_tile_depth(&self, color: &mut [f32]) {
        assert_eq!(color.len(), self.width as usize * self.height as usize * 3);

        let width = self.width as usize;
        for ty in 0..self.tiles_y {
            for tx in 0..self.tiles_x {
                let z = self.tile_max_z(tx, ty);
                if z == f32::INFINITY {
                    continue;
                }
                for row in self.tile_rows(ty) {
                    let columns = self.tile_columns(tx);
                    color[(row * width + columns.start) * 3..(row * width + columns.end) * 3].fill(z);
                }
            }
        }
    }

    fn tile_rows(&self, ty: u32) -> std::ops::Range<usize> {
        let th = self.config.tile_height as usize;
        let ty = ty as usize;
        ty * th..((ty + 1) * th).min(self.height as usize)
    }

    fn tile_columns(&self, tx: u32) -> std::ops::Range<usize> {
        let tw = self.config.tile_width as usize;
        let tx = tx as usize;
        tx * tw..((tx + 1) * tw).min(self.width as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn culler(width: u32, height: u32, tile: u32) -> TileCuller {
        TileCuller::new(width, height, TileConfig::default().with_tile_size(tile, tile)).unwrap()
    }

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> ScreenRect {
        ScreenRect::new(Point2::new(x0, y0), Point2::new(x1, y1))
    }

    #[test]
    fn partial_tiles_round_up() {
        let tiles = culler(100, 64, 32);
        assert_eq!(tiles.grid_size(), (4, 2));
        assert_eq!(tiles.tile_rect(3, 1), rect(96, 32, 99, 63));
        assert_eq!(tiles.tile_rect(0, 0), rect(0, 0, 32, 32));
    }

    #[test]
    fn empty_framebuffer_is_rejected() {
        let err = TileCuller::new(0, 10, TileConfig::default()).unwrap_err();
        assert_eq!(err, BvhError::EmptyFramebuffer { width: 0, height: 10 });
        assert!(TileCuller::new(10, 10, TileConfig::default().with_tile_size(0, 8)).is_err());
    }

    #[test]
    fn fresh_tiles_accept_any_overlapping_depth() {
        let tiles = culler(64, 64, 32);
        assert!(tiles.tile_needs_render(&rect(10, 10, 20, 20), 0, 0, 0.9));
        assert!(!tiles.tile_needs_render(&rect(40, 40, 50, 50), 0, 0, 0.9));
    }

    #[test]
    fn rect_on_tile_boundary_touches_both_tiles() {
        let tiles = culler(64, 64, 32);
        let on_edge = rect(32, 5, 32, 5);
        assert!(tiles.tile_needs_render(&on_edge, 0, 0, 0.0));
        assert!(tiles.tile_needs_render(&on_edge, 1, 0, 0.0));
        assert_eq!(tiles.overlapping_tiles(&on_edge).collect::<Vec<_>>(), vec![(0, 0), (1, 0)]);
    }

    #[test]
    fn overlapping_tiles_match_a_full_scan() {
        let tiles = culler(100, 70, 16);
        let rects = [
            rect(-20, -20, 5, 5),
            rect(17, 3, 64, 40),
            rect(90, 60, 400, 400),
            rect(-50, -50, -10, -10),
            rect(101, 0, 120, 10),
        ];
        let (gx, gy) = tiles.grid_size();
        for r in rects {
            let mut scanned = Vec::new();
            for ty in 0..gy {
                for tx in 0..gx {
                    if tiles.tile_needs_render(&r, tx, ty, 0.0) {
                        scanned.push((tx, ty));
                    }
                }
            }
            assert_eq!(tiles.overlapping_tiles(&r).collect::<Vec<_>>(), scanned, "{r:?}");
        }
    }

    #[test]
    fn resolved_depth_culls_farther_bounds() {
        let mut tiles = culler(4, 4, 2);
        let mut depth = vec![f32::INFINITY; 16];
        for row in 0..2 {
            for col in 0..2 {
                depth[row * 4 + col] = 0.25 + 0.25 * col as f32;
            }
        }

        tiles.update_tile_max_z(0, 0, &depth);
        assert_eq!(tiles.tile_max_z(0, 0), 0.5);

        let everywhere = rect(0, 0, 3, 3);
        assert!(tiles.tile_needs_render(&everywhere, 0, 0, 0.3));
        assert!(!tiles.tile_needs_render(&everywhere, 0, 0, 0.5));
        assert!(!tiles.tile_needs_render(&everywhere, 0, 0, 0.75));

        tiles.reset_max_z();
        assert!(tiles.tile_needs_render(&everywhere, 0, 0, 0.75));
    }

    #[test]
    fn partly_covered_tile_keeps_culling_off() {
        let mut tiles = culler(4, 4, 2);
        let mut depth = vec![f32::INFINITY; 16];
        depth[0] = 0.5;

        tiles.update_tile_max_z(0, 0, &depth);
        assert_eq!(tiles.tile_max_z(0, 0), f32::INFINITY);
        assert!(tiles.tile_needs_render(&rect(0, 0, 1, 1), 0, 0, 0.75));

        depth[1] = 0.25;
        depth[4] = 0.25;
        depth[5] = 0.25;
        tiles.update_tile_max_z(0, 0, &depth);
        assert_eq!(tiles.tile_max_z(0, 0), 0.5);
    }

    #[test]
    fn skipping_unresolved_pixels_is_opt_in() {
        let config = TileConfig::default().with_tile_size(2, 2).with_skip_unresolved(true);
        let mut tiles = TileCuller::new(4, 4, config).unwrap();
        let mut depth = vec![f32::INFINITY; 16];
        depth[0] = 0.5;

        tiles.update_tile_max_z(0, 0, &depth);
        assert_eq!(tiles.tile_max_z(0, 0), 0.5);

        tiles.update_tile_max_z(1, 1, &depth);
        assert_eq!(tiles.tile_max_z(1, 1), f32::INFINITY);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_tile_panics() {
        let tiles = culler(64, 64, 32);
        tiles.tile_needs_render(&rect(0, 0, 1, 1), 2, 0, 0.0);
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn mismatched_depth_buffer_panics() {
        let mut tiles = culler(4, 4, 2);
        tiles.update_tile_max_z(0, 0, &[0.0; 4]);
    }

    #[test]
    #[should_panic(expected = "does not match the 70000x70000 framebuffer")]
    fn pixel_count_of_a_huge_framebuffer_does_not_wrap() {
        let mut tiles = culler(70_000, 70_000, 65_536);
        assert_eq!(tiles.grid_size(), (2, 2));
        tiles.update_tile_max_z(0, 0, &[0.0; 4]);
    }

    #[test]
    fn projected_bounds_map_to_pixels() {
        let projected = ProjectedBounds {
            min: Point3::new(-1.0, -0.5, 0.0),
            max: Point3::new(0.01, 1.0, 0.5),
            min_z: 0.0,
        };
        assert_eq!(ScreenRect::from_projected(&projected, 100, 40), rect(0, 10, 51, 40));

        let never = ScreenRect::from_projected(&ProjectedBounds::unprojected(), 100, 40);
        assert!(!never.overlaps(&rect(0, 0, 99, 39)));
    }

    #[test]
    fn tile_depth_is_painted_into_resolved_tiles() {
        let mut tiles = culler(4, 2, 2);
        let depth = [0.5, 0.5, f32::INFINITY, f32::INFINITY, 0.5, 0.5, f32::INFINITY, f32::INFINITY];
        tiles.update_tile_max_z(0, 0, &depth);

        let mut color = vec![0.0; 4 * 2 * 3];
        tiles.write_tile_depth(&mut color);

        assert!(color[..6].iter().all(|&c| c == 0.5));
        assert!(color[6..12].iter().all(|&c| c == 0.0));
        assert!(color[12..18].iter().all(|&c| c == 0.5));
    }
}
