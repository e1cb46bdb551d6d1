//! BVH container, construction and traversal.

use nalgebra::Matrix4;

use crate::arena::Arena;
use crate::{Aabb, BvhConfig, BvhError, SceneView, TraversalMode};

use super::node::{BvhNode, NodeId};
use super::stats::{BuildStats, TraversalStats};
use super::visitor::BvhVisitor;

/// A bounding volume hierarchy over a static triangle scene, used to cull
/// geometry before rasterization.
///
/// # Construction
///
/// The whole tree is built by [`RasterBvh::build`]. Faces are partitioned
/// recursively with the configured [`SplitMethod`](crate::SplitMethod); nodes
/// live in an arena and leaves refer to contiguous runs of the face-order
/// array.
///
/// ```ignore
/// let bvh = RasterBvh::build(scene.view(), BvhConfig::default())?;
/// ```
///
/// # Per frame
///
/// Re-project every node with [`RasterBvh::implement_transform`], then walk
/// the tree with [`RasterBvh::traverse`]:
///
/// ```ignore
/// bvh.implement_transform(&view_projection);
/// let stats = bvh.traverse(&mut renderer);
/// ```
///
/// The projected bounds are not tracked for staleness, so the transform must
/// be applied every frame before traversing.
#[derive(Debug)]
pub struct RasterBvh<'s> {
    scene: SceneView<'s>,
    config: BvhConfig,
    arena: Arena<BvhNode>,
    root: Option<NodeId>,
    face_order: Vec<usize>,
    build_stats: BuildStats,
    last_traversal: TraversalStats,
}

impl<'s> RasterBvh<'s> {
    /// Builds a tree over every face of `scene`.
    ///
    /// An empty scene yields an empty tree.
    pub fn build(scene: SceneView<'s>, config: BvhConfig) -> Result<Self, BvhError> {
        config.validate()?;
        validate_indices(&scene)?;

        let face_count = scene.faces.len();
        // A binary tree over n faces never has more than 2n - 1 nodes.
        let max_nodes = (2 * face_count).saturating_sub(1).max(1);
        let block_bytes = config
            .arena_bytes()
            .min(max_nodes * std::mem::size_of::<BvhNode>());

        let mut builder = Builder {
            scene,
            config: &config,
            arena: Arena::with_block_bytes(block_bytes),
            permutation: (0..face_count).collect(),
            face_order: Vec::with_capacity(face_count),
            depth: 0,
            stats: BuildStats {
                total_faces: face_count,
                ..BuildStats::default()
            },
        };

        let root = if face_count == 0 {
            log::warn!("building a BVH over an empty scene; the tree will have no root");
            None
        } else {
            Some(builder.recursive_build(0, face_count))
        };

        let Builder {
            arena,
            face_order,
            stats,
            ..
        } = builder;

        log::info!(
            "built BVH ({}): {} faces, {} nodes, {} leaves, depth {}, {} KiB arena",
            config.split_method,
            stats.total_faces,
            stats.total_nodes,
            stats.leaf_count,
            stats.max_depth,
            arena.total_allocated() / 1024,
        );

        Ok(Self {
            scene,
            config,
            arena,
            root,
            face_order,
            build_stats: stats,
            last_traversal: TraversalStats::default(),
        })
    }

    /// Returns `true` if the tree has no root.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[inline]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &BvhNode {
        &self.arena[id]
    }

    /// Every node, in allocation order (children before parents).
    pub fn nodes(&self) -> impl Iterator<Item = &BvhNode> {
        self.arena.iter()
    }

    /// The permutation of face indices that leaves point into.
    #[inline]
    pub fn face_order(&self) -> &[usize] {
        &self.face_order
    }

    /// Original face indices held by a leaf; empty for interior nodes.
    pub fn leaf_faces(&self, node: &BvhNode) -> &[usize] {
        node.leaf_range().map_or(&[], |range| &self.face_order[range])
    }

    #[inline]
    pub fn scene(&self) -> SceneView<'s> {
        self.scene
    }

    #[inline]
    pub fn config(&self) -> &BvhConfig {
        &self.config
    }

    #[inline]
    pub fn build_stats(&self) -> &BuildStats {
        &self.build_stats
    }

    /// Statistics of the most recent [`RasterBvh::traverse`].
    #[inline]
    pub fn last_traversal(&self) -> &TraversalStats {
        &self.last_traversal
    }

    /// Bounds of the whole scene, if the tree is not empty.
    pub fn scene_bounds(&self) -> Option<Aabb> {
        self.root.map(|root| *self.arena[root].bounds())
    }

    /// Re-projects every node's bounds through `m`, depth-first from the root.
    ///
    /// Only the cached projected bounds change. Does nothing on an empty tree.
    pub fn implement_transform(&mut self, m: &Matrix4<f32>) {
        let Some(root) = self.root else {
            return;
        };

        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &mut self.arena[id];
            node.project(m);
            if let Some([left, right]) = node.children() {
                stack.push(right);
                stack.push(left);
            }
        }
    }

    /// Walks the tree depth-first, left child first, handing every visited
    /// node to `visitor`.
    ///
    /// With [`TraversalMode::Prune`] the children of a rejected interior node
    /// are skipped; with [`TraversalMode::Exhaustive`] every node is visited.
    /// Returns the traversal's statistics, which are also kept in
    /// [`RasterBvh::last_traversal`].
    pub fn traverse<V: BvhVisitor>(&mut self, visitor: &mut V) -> TraversalStats {
        let mut stats = TraversalStats::begin(self.build_stats.total_nodes, self.build_stats.total_faces);

        if let Some(root) = self.root {
            let mut stack = Vec::with_capacity(self.build_stats.max_depth * 2);
            stack.push(root);

            while let Some(id) = stack.pop() {
                let node = &self.arena[id];
                visitor.debug_bounds(node.bounds());

                let faces = node.leaf_range().map_or(&[][..], |range| &self.face_order[range]);
                stats.visited_nodes += 1;
                let accepted = visitor.visit(node, faces, &mut stats);
                if accepted {
                    stats.mark_node_accepted();
                }

                if let Some([left, right]) = node.children() {
                    if accepted || self.config.traversal == TraversalMode::Exhaustive {
                        stack.push(right);
                        stack.push(left);
                    }
                }
            }
        }

        log::debug!(
            "BVH traversal: visited {} of {} nodes, culled {} nodes and {} faces",
            stats.visited_nodes,
            stats.total_nodes,
            stats.culled_nodes,
            stats.culled_faces,
        );

        self.last_traversal = stats;
        stats
    }

    /// Changes how [`RasterBvh::traverse`] treats rejected interior nodes.
    pub fn set_traversal_mode(&mut self, mode: TraversalMode) {
        self.config.traversal = mode;
    }
}

fn validate_indices(scene: &SceneView<'_>) -> Result<(), BvhError> {
    let vertex_count = scene.vertices.len();
    for (face, f) in scene.faces.iter().enumerate() {
        if let Some(vertex) = f.indices().into_iter().find(|&v| v >= vertex_count) {
            return Err(BvhError::VertexOutOfRange {
                face,
                vertex,
                vertex_count,
            });
        }
    }
    Ok(())
}

/// State threaded through the recursive build.
struct Builder<'a, 's> {
    scene: SceneView<'s>,
    config: &'a BvhConfig,
    arena: Arena<BvhNode>,
    /// Working permutation of face indices, reordered by the partitions.
    permutation: Vec<usize>,
    /// Leaf face runs, appended as leaves are created.
    face_order: Vec<usize>,
    depth: usize,
    stats: BuildStats,
}

impl Builder<'_, '_> {
    /// Builds the subtree over `permutation[start..end]` and returns its id.
    fn recursive_build(&mut self, start: usize, end: usize) -> NodeId {
        self.depth += 1;
        self.stats.max_depth = self.stats.max_depth.max(self.depth);
        self.stats.total_nodes += 1;

        let scene = self.scene;
        let bounds = self.permutation[start..end]
            .iter()
            .fold(Aabb::empty(), |b, &face| b.union(&scene.face_bounds(face)));
        let count = end - start;

        let node = if bounds.is_smaller_than(self.config.min_bound_length) {
            self.make_leaf(start, end, bounds.inflated(self.config.voxel_length))
        } else if count == 1 {
            self.make_leaf(start, end, bounds)
        } else {
            let axis = bounds.maximum_extent();
            let mid = start
                + self.config.split_method.partition(
                    &mut self.permutation[start..end],
                    &bounds,
                    axis,
                    &scene,
                );

            let left = self.recursive_build(start, mid);
            let right = self.recursive_build(mid, end);
            let union = self.arena[left].bounds().union(self.arena[right].bounds());
            BvhNode::interior(axis, [left, right], union, count)
        };

        self.depth -= 1;
        self.arena.alloc(node)
    }

    fn make_leaf(&mut self, start: usize, end: usize, bounds: Aabb) -> BvhNode {
        let first = self.face_order.len();
        self.face_order.extend_from_slice(&self.permutation[start..end]);
        self.stats.leaf_count += 1;
        BvhNode::leaf(first, end - start, bounds)
    }
}
