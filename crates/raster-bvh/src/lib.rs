//! Occlusion culling for a software rasterizer.
//!
//! A [`RasterBvh`] is built once over a static triangle scene. Each frame its
//! node bounds are projected to screen space and walked front to back by a
//! [`BvhVisitor`]; the [`HzbRenderer`] uses a coarse grid of per-tile depth
//! maxima ([`TileCuller`]) to skip subtrees hidden behind what has already
//! been drawn.

pub mod arena;
pub mod bvh;
mod config;
mod error;
mod geometry;
pub mod hzb;
pub mod tiles;

pub use arena::Arena;
pub use bvh::{BuildStats, BvhNode, BvhVisitor, FnVisitor, LEAF_SPLIT_AXIS, LeafCollector, NodeId, NodeKind, RasterBvh, TraversalStats};
pub use config::{BvhConfig, SplitMethod, TileConfig, TraversalMode};
pub use error::BvhError;
pub use geometry::{Aabb, Axis, Face, ProjectedBounds, Scene, SceneView, Vertex};
pub use hzb::HzbRenderer;
pub use tiles::{ScreenRect, TileCuller};
