//! Visitor pattern for BVH traversal.
//!
//! Visitors decide, node by node, whether a subtree is worth descending into
//! and what to do with a leaf's faces, without coupling the traversal to a
//! particular renderer.

use crate::{Aabb, BvhNode, TraversalStats};

/// Visitor for processing nodes during BVH traversal.
pub trait BvhVisitor {
    /// Called for each visited node.
    ///
    /// `faces` holds the original face indices of a leaf and is empty for
    /// interior nodes. Return `true` to accept the node. The visitor is
    /// responsible for calling [`TraversalStats::mark_faces_drawn`] for the
    /// faces it actually draws.
    fn visit(&mut self, node: &BvhNode, faces: &[usize], stats: &mut TraversalStats) -> bool;

    /// Called with every visited node's bounds before [`BvhVisitor::visit`].
    fn debug_bounds(&mut self, _bounds: &Aabb) {}
}

/// Accepts every node and collects leaf faces in visit order.
#[derive(Debug, Default)]
pub struct LeafCollector {
    faces: Vec<usize>,
    leaves: usize,
}

impl LeafCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Face indices of every visited leaf, in visit order.
    pub fn faces(&self) -> &[usize] {
        &self.faces
    }

    pub fn into_faces(self) -> Vec<usize> {
        self.faces
    }

    /// Number of leaves visited.
    pub fn leaf_count(&self) -> usize {
        self.leaves
    }
}

impl BvhVisitor for LeafCollector {
    fn visit(&mut self, node: &BvhNode, faces: &[usize], stats: &mut TraversalStats) -> bool {
        if node.is_leaf() {
            self.leaves += 1;
            self.faces.extend_from_slice(faces);
            stats.mark_faces_drawn(faces.len());
        }
        true
    }
}

/// A visitor that calls a closure for each node.
pub struct FnVisitor<F>
where
    F: FnMut(&BvhNode, &[usize], &mut TraversalStats) -> bool,
{
    func: F,
}

impl<F> FnVisitor<F>
where
    F: FnMut(&BvhNode, &[usize], &mut TraversalStats) -> bool,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> BvhVisitor for FnVisitor<F>
where
    F: FnMut(&BvhNode, &[usize], &mut TraversalStats) -> bool,
{
    fn visit(&mut self, node: &BvhNode, faces: &[usize], stats: &mut TraversalStats) -> bool {
        (self.func)(node, faces, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn leaf(first: usize, count: usize) -> BvhNode {
        BvhNode::leaf(first, count, Aabb::from_points([Point3::origin()]))
    }

    #[test]
    fn leaf_collector_empty() {
        let collector = LeafCollector::new();
        assert!(collector.faces().is_empty());
        assert_eq!(collector.leaf_count(), 0);
    }

    #[test]
    fn leaf_collector_collects_leaves_only() {
        let mut collector = LeafCollector::new();
        let mut stats = TraversalStats::begin(3, 3);
        let interior = BvhNode::interior(crate::Axis::X, [0, 1], Aabb::empty(), 3);

        assert!(collector.visit(&interior, &[], &mut stats));
        assert!(collector.visit(&leaf(0, 2), &[4, 2], &mut stats));
        assert!(collector.visit(&leaf(2, 1), &[0], &mut stats));

        assert_eq!(collector.leaf_count(), 2);
        assert_eq!(stats.culled_faces, 0);
        assert_eq!(collector.into_faces(), vec![4, 2, 0]);
    }

    #[test]
    fn fn_visitor_calls_closure() {
        let mut seen = 0;
        {
            let mut visitor = FnVisitor::new(|node: &BvhNode, faces: &[usize], _: &mut TraversalStats| {
                seen += faces.len();
                node.is_leaf()
            });
            let mut stats = TraversalStats::default();
            assert!(visitor.visit(&leaf(0, 2), &[1, 2], &mut stats));
        }
        assert_eq!(seen, 2);
    }
}
