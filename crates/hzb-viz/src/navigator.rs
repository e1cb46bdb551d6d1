//! BVH navigation utilities for interactive visualization.

use macroquad::prelude::*;
use raster_bvh::{BvhNode, NodeId, RasterBvh, ScreenRect};

use crate::Viewport;

/// Child taken at each node in the navigation path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Interactive BVH navigator for exploring tree structure.
#[derive(Debug, Default)]
pub struct TreeNavigator {
    path: Vec<Direction>,
}

impl TreeNavigator {
    /// Creates a new navigator starting at the root.
    pub fn new() -> Self {
        Self { path: Vec::new() }
    }

    pub fn path(&self) -> &[Direction] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Attempts to descend into `dir`. Returns true if successful.
    pub fn descend(&mut self, bvh: &RasterBvh<'_>, dir: Direction) -> bool {
        let has_children = self
            .current_node(bvh)
            .is_some_and(|id| bvh.node(id).children().is_some());
        if has_children {
            self.path.push(dir);
        }
        has_children
    }

    /// Navigates to the parent node. Returns true if not already at root.
    pub fn go_parent(&mut self) -> bool {
        self.path.pop().is_some()
    }

    pub fn go_root(&mut self) {
        self.path.clear();
    }

    /// Handles keyboard input for navigation.
    /// Returns true if navigation state changed.
    pub fn update(&mut self, bvh: &RasterBvh<'_>) -> bool {
        let mut changed = false;

        if is_key_pressed(KeyCode::LeftBracket) {
            changed = self.descend(bvh, Direction::Left);
        }
        if is_key_pressed(KeyCode::RightBracket) {
            changed = self.descend(bvh, Direction::Right);
        }
        if is_key_pressed(KeyCode::P) {
            changed = self.go_parent();
        }
        if is_key_pressed(KeyCode::R) && !self.path.is_empty() {
            self.go_root();
            changed = true;
        }

        changed
    }

    /// The selected node, or `None` for an empty tree or a path that no longer
    /// exists (after a rebuild).
    pub fn current_node(&self, bvh: &RasterBvh<'_>) -> Option<NodeId> {
        let mut current = bvh.root()?;
        for dir in &self.path {
            let [left, right] = bvh.node(current).children()?;
            current = match dir {
                Direction::Left => left,
                Direction::Right => right,
            };
        }
        Some(current)
    }

    /// Outlines the selected node's projected bounds over the frame drawn at
    /// `viewport`. The tree must have been transformed this frame.
    pub fn draw_selection(&self, bvh: &RasterBvh<'_>, frame_width: u32, frame_height: u32, viewport: &Viewport) {
        let Some(id) = self.current_node(bvh) else {
            return;
        };
        let rect = ScreenRect::from_projected(bvh.node(id).projected(), frame_width, frame_height);
        if rect.min.x > rect.max.x || rect.min.y > rect.max.y {
            return;
        }

        // Clamp to the frame so huge rects stay drawable.
        let clamp_x = |x: i32| x.clamp(0, frame_width as i32) as f32;
        let clamp_y = |y: i32| y.clamp(0, frame_height as i32) as f32;
        let (x0, x1) = (clamp_x(rect.min.x), clamp_x(rect.max.x));
        // Frame rows grow upwards, window rows downwards.
        let top = frame_height as f32 - clamp_y(rect.max.y);
        let bottom = frame_height as f32 - clamp_y(rect.min.y);

        let s = viewport.scale;
        draw_rectangle_lines(
            viewport.x + x0 * s,
            viewport.y + top * s,
            (x1 - x0) * s,
            (bottom - top) * s,
            2.0,
            YELLOW,
        );
    }

    /// Draws the navigation UI overlay.
    pub fn draw_ui(&self, bvh: &RasterBvh<'_>, y_offset: f32) {
        let node: Option<&BvhNode> = self.current_node(bvh).map(|id| bvh.node(id));
        let (faces, is_leaf) = node.map_or((0, true), |n| (n.primitive_count(), n.is_leaf()));
        let axis = node.and_then(|n| match n.split_axis() {
            0 => Some("x"),
            1 => Some("y"),
            2 => Some("z"),
            _ => None,
        });

        let path_str = if self.path.is_empty() {
            "root".to_string()
        } else {
            self.path
                .iter()
                .map(|d| match d {
                    Direction::Left => "L",
                    Direction::Right => "R",
                })
                .collect::<Vec<_>>()
                .join(" -> ")
        };

        draw_text(&format!("Subtree: {faces} faces"), 10.0, y_offset, 18.0, WHITE);
        draw_text(
            &format!("Path: {} (depth {})", path_str, self.path.len()),
            10.0,
            y_offset + 20.0,
            18.0,
            YELLOW,
        );
        draw_text(
            &match axis {
                Some(axis) => format!("Split on {axis}: [ left | ] right"),
                None => "(leaf)".to_string(),
            },
            10.0,
            y_offset + 40.0,
            18.0,
            if is_leaf { ORANGE } else { GREEN },
        );
        draw_text("[P]arent | [R]oot", 10.0, y_offset + 60.0, 16.0, DARKGRAY);
    }
}
