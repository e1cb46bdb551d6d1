//! Build and traversal counters.

/// Counters gathered while building a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub total_nodes: usize,
    pub leaf_count: usize,
    /// Deepest recursion level reached; the root is at depth 1.
    pub max_depth: usize,
    pub total_faces: usize,
}

impl BuildStats {
    pub fn interior_count(&self) -> usize {
        self.total_nodes - self.leaf_count
    }
}

/// Counters for one traversal.
///
/// `culled_nodes` and `culled_faces` start at the totals and are decremented
/// as nodes are accepted and faces are drawn, so after the traversal they hold
/// what was skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    pub total_nodes: usize,
    pub total_faces: usize,
    pub visited_nodes: usize,
    pub culled_nodes: usize,
    pub culled_faces: usize,
}

impl TraversalStats {
    /// Counters at the start of a traversal: everything culled.
    pub fn begin(total_nodes: usize, total_faces: usize) -> Self {
        Self {
            total_nodes,
            total_faces,
            visited_nodes: 0,
            culled_nodes: total_nodes,
            culled_faces: total_faces,
        }
    }

    /// Records that `count` faces were drawn.
    #[inline]
    pub fn mark_faces_drawn(&mut self, count: usize) {
        self.culled_faces = self.culled_faces.saturating_sub(count);
    }

    #[inline]
    pub(crate) fn mark_node_accepted(&mut self) {
        self.culled_nodes = self.culled_nodes.saturating_sub(1);
    }

    pub fn drawn_faces(&self) -> usize {
        self.total_faces - self.culled_faces
    }

    /// Fraction of nodes culled, in `[0, 1]`.
    pub fn culled_node_ratio(&self) -> f32 {
        ratio(self.culled_nodes, self.total_nodes)
    }

    /// Fraction of faces culled, in `[0, 1]`.
    pub fn culled_face_ratio(&self) -> f32 {
        ratio(self.culled_faces, self.total_faces)
    }
}

fn ratio(part: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        part as f32 / total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_counts_everything_as_culled() {
        let stats = TraversalStats::begin(7, 4);
        assert_eq!(stats.culled_nodes, 7);
        assert_eq!(stats.culled_faces, 4);
        assert_eq!(stats.culled_face_ratio(), 1.0);
    }

    #[test]
    fn drawing_faces_lowers_the_cull_ratio() {
        let mut stats = TraversalStats::begin(7, 4);
        stats.mark_faces_drawn(1);
        stats.mark_node_accepted();

        assert_eq!(stats.drawn_faces(), 1);
        assert_eq!(stats.culled_face_ratio(), 0.75);
        assert_eq!(stats.culled_nodes, 6);

        stats.mark_faces_drawn(10);
        assert_eq!(stats.culled_faces, 0);
    }

    #[test]
    fn empty_totals_have_zero_ratio() {
        let stats = TraversalStats::default();
        assert_eq!(stats.culled_node_ratio(), 0.0);
        assert_eq!(stats.culled_face_ratio(), 0.0);
    }
}
