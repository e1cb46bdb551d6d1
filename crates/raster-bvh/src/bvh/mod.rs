//! Bounding volume hierarchy for rasterization-time culling.
//!
//! The tree is built once over a static scene. Every frame the node bounds
//! are re-projected through the camera's view-projection matrix, then a
//! visitor walks the tree and decides node by node whether a subtree can be
//! skipped. The usual visitor is the [`HzbRenderer`](crate::HzbRenderer),
//! which tests projected bounds against per-tile depth maxima.
//!
//! # Example
//!
//! ```ignore
//! use raster_bvh::{BvhConfig, RasterBvh, Scene, SplitMethod};
//! use raster_bvh::bvh::LeafCollector;
//!
//! let scene: Scene = /* load or generate geometry */;
//! let config = BvhConfig::default().with_split_method(SplitMethod::EqualCounts);
//! let mut bvh = RasterBvh::build(scene.view(), config)?;
//!
//! bvh.implement_transform(&view_projection);
//! let mut visitor = LeafCollector::new();
//! let stats = bvh.traverse(&mut visitor);
//! ```
//!
//! # Architecture
//!
//! - [`RasterBvh`]: the tree, its node arena and the face-order array
//! - [`BvhNode`]: object-space bounds, cached projected bounds, leaf or interior
//! - [`SplitMethod::partition`](crate::SplitMethod::partition): how a node's faces are divided
//! - [`BvhVisitor`]: the per-node accept/reject hook used by traversal

mod node;
mod split;
mod stats;
mod tree;
mod visitor;

pub use node::{BvhNode, LEAF_SPLIT_AXIS, NodeId, NodeKind};
pub use split::{SAH_BUCKETS, partition_equal_counts, partition_middle, partition_sah};
pub use stats::{BuildStats, TraversalStats};
pub use tree::RasterBvh;
pub use visitor::{BvhVisitor, FnVisitor, LeafCollector};
