//! BVH node implementation.

use std::ops::Range;

use nalgebra::Matrix4;

use crate::{Aabb, Axis, ProjectedBounds};

/// Index of a node inside the tree's arena.
pub type NodeId = usize;

/// Value reported by [`BvhNode::split_axis`] for leaves.
pub const LEAF_SPLIT_AXIS: usize = 3;

/// Interior/leaf discriminant of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Two children split along `axis`.
    Interior { axis: Axis, children: [NodeId; 2] },
    /// A contiguous run `[first_offset, first_offset + count)` of the tree's
    /// face-order array.
    Leaf { first_offset: usize, count: usize },
}

/// A node in the BVH.
///
/// Each node stores its object-space bounds and the projected bounds cached by
/// the most recent transform. Nodes are owned by the tree's arena and refer to
/// their children by index.
#[derive(Debug, Clone)]
#[repr(align(64))]
pub struct BvhNode {
    bounds: Aabb,
    projected: ProjectedBounds,
    kind: NodeKind,
    primitive_count: usize,
}

impl BvhNode {
    /// Creates a leaf over `count` entries of the face-order array.
    pub fn leaf(first_offset: usize, count: usize, bounds: Aabb) -> Self {
        Self {
            bounds,
            projected: ProjectedBounds::unprojected(),
            kind: NodeKind::Leaf {
                first_offset,
                count,
            },
            primitive_count: count,
        }
    }

    /// Creates an interior node. `bounds` should be the union of the
    /// children's bounds.
    pub fn interior(axis: Axis, children: [NodeId; 2], bounds: Aabb, primitive_count: usize) -> Self {
        Self {
            bounds,
            projected: ProjectedBounds::unprojected(),
            kind: NodeKind::Interior { axis, children },
            primitive_count,
        }
    }

    /// Object-space bounds.
    #[inline]
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Bounds as of the last transform.
    #[inline]
    pub fn projected(&self) -> &ProjectedBounds {
        &self.projected
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Split axis index, or [`LEAF_SPLIT_AXIS`] for leaves.
    pub fn split_axis(&self) -> usize {
        match self.kind {
            NodeKind::Interior { axis, .. } => axis.index(),
            NodeKind::Leaf { .. } => LEAF_SPLIT_AXIS,
        }
    }

    #[inline]
    pub fn children(&self) -> Option<[NodeId; 2]> {
        match self.kind {
            NodeKind::Interior { children, .. } => Some(children),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// The leaf's slice of the face-order array.
    #[inline]
    pub fn leaf_range(&self) -> Option<Range<usize>> {
        match self.kind {
            NodeKind::Leaf {
                first_offset,
                count,
            } => Some(first_offset..first_offset + count),
            NodeKind::Interior { .. } => None,
        }
    }

    /// Number of faces in this subtree.
    #[inline]
    pub fn primitive_count(&self) -> usize {
        self.primitive_count
    }

    /// Recomputes the cached projected bounds. Object-space bounds are left
    /// untouched.
    pub(crate) fn project(&mut self, m: &Matrix4<f32>) {
        self.projected = self.bounds.project(m);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn unit_box() -> Aabb {
        Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn leaf_reports_sentinel_axis() {
        let node = BvhNode::leaf(4, 2, unit_box());

        assert!(node.is_leaf());
        assert_eq!(node.split_axis(), LEAF_SPLIT_AXIS);
        assert_eq!(node.leaf_range(), Some(4..6));
        assert_eq!(node.children(), None);
        assert_eq!(node.primitive_count(), 2);
    }

    #[test]
    fn interior_reports_axis_and_children() {
        let node = BvhNode::interior(Axis::Y, [3, 7], unit_box(), 5);

        assert!(!node.is_leaf());
        assert_eq!(node.split_axis(), 1);
        assert_eq!(node.children(), Some([3, 7]));
        assert_eq!(node.leaf_range(), None);
        assert_eq!(node.primitive_count(), 5);
    }

    #[test]
    fn projection_starts_empty_and_keeps_object_bounds() {
        let mut node = BvhNode::leaf(0, 1, unit_box());
        assert_eq!(node.projected().min_z, f32::INFINITY);

        let mut m = Matrix4::identity();
        m[(2, 3)] = 5.0;
        node.project(&m);

        assert_eq!(node.projected().min_z, 5.0);
        assert_eq!(node.projected().max.z, 6.0);
        assert_eq!(*node.bounds(), unit_box());
    }

    #[test]
    fn nodes_are_cache_line_aligned() {
        assert_eq!(std::mem::align_of::<BvhNode>(), 64);
    }
}
