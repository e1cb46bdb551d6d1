//! Partition strategies for BVH construction.
//!
//! Each strategy reorders a slice of face indices in place and returns the
//! split point `mid`, so that `order[..mid]` becomes the first child and
//! `order[mid..]` the second. The returned point is always in `1..len` for
//! slices of two or more faces.

use crate::{Aabb, Axis, SceneView, SplitMethod};

/// Number of buckets evaluated by the surface area heuristic.
pub const SAH_BUCKETS: usize = 12;

impl SplitMethod {
    /// Partitions `order` along `axis` of the node `bounds`.
    pub fn partition(self, order: &mut [usize], bounds: &Aabb, axis: Axis, scene: &SceneView<'_>) -> usize {
        debug_assert!(order.len() >= 2, "partition needs at least two faces");
        match self {
            SplitMethod::Middle => partition_middle(order, bounds, axis, scene),
            SplitMethod::EqualCounts => partition_equal_counts(order, axis, scene),
            SplitMethod::Sah => partition_sah(order, bounds, axis, scene),
        }
    }
}

/// Splits at the spatial midpoint of `bounds`, falling back to the index
/// midpoint when every centroid lands on one side.
pub fn partition_middle(order: &mut [usize], bounds: &Aabb, axis: Axis, scene: &SceneView<'_>) -> usize {
    let a = axis.index();
    let pivot = (bounds.min[a] + bounds.max[a]) * 0.5;
    let mid = partition_in_place(order, |face| scene.centroid_on(face, axis) < pivot);
    if mid == 0 || mid == order.len() {
        order.len() / 2
    } else {
        mid
    }
}

/// Places the median centroid at `len / 2` with smaller centroids before it.
pub fn partition_equal_counts(order: &mut [usize], axis: Axis, scene: &SceneView<'_>) -> usize {
    let mid = order.len() / 2;
    order.select_nth_unstable_by(mid, |&lhs, &rhs| {
        scene
            .centroid_on(lhs, axis)
            .total_cmp(&scene.centroid_on(rhs, axis))
    });
    mid
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    count: usize,
    bounds: Aabb,
}

/// Buckets centroids along `axis` and splits at the cheapest bucket boundary.
pub fn partition_sah(order: &mut [usize], bounds: &Aabb, axis: Axis, scene: &SceneView<'_>) -> usize {
    let fallback = order.len() / 2;

    let centroid_bounds = Aabb::from_points(
        order
            .iter()
            .map(|&face| scene.face(face).centroid(scene.vertices)),
    );
    let a = axis.index();
    let (lo, hi) = (centroid_bounds.min[a], centroid_bounds.max[a]);
    if hi <= lo {
        return fallback;
    }

    let bucket_of = |face: usize| {
        let t = (scene.centroid_on(face, axis) - lo) / (hi - lo);
        ((t * SAH_BUCKETS as f32) as usize).min(SAH_BUCKETS - 1)
    };

    let mut buckets = [Bucket::default(); SAH_BUCKETS];
    for &face in order.iter() {
        let bucket = &mut buckets[bucket_of(face)];
        bucket.count += 1;
        bucket.bounds = bucket.bounds.union(&scene.face_bounds(face));
    }

    let total_area = bounds.surface_area();
    if total_area <= 0.0 {
        return fallback;
    }

    let mut best_cost = f32::INFINITY;
    let mut best_split = 0;
    for split in 0..SAH_BUCKETS - 1 {
        let (below, above) = buckets.split_at(split + 1);
        let (n0, b0) = accumulate(below);
        let (n1, b1) = accumulate(above);
        let cost = 1.0 + (n0 as f32 * b0.surface_area() + n1 as f32 * b1.surface_area()) / total_area;
        if cost < best_cost {
            best_cost = cost;
            best_split = split;
        }
    }

    let mid = partition_in_place(order, |face| bucket_of(face) <= best_split);
    if mid == 0 || mid == order.len() {
        fallback
    } else {
        mid
    }
}

fn accumulate(buckets: &[Bucket]) -> (usize, Aabb) {
    buckets.iter().fold((0, Aabb::empty()), |(count, bounds), b| {
        (count + b.count, bounds.union(&b.bounds))
    })
}

/// Moves every element matching `pred` to the front and returns how many
/// matched.
fn partition_in_place<F>(items: &mut [usize], mut pred: F) -> usize
where
    F: FnMut(usize) -> bool,
{
    let mut split = 0;
    for i in 0..items.len() {
        if pred(items[i]) {
            items.swap(split, i);
            split += 1;
        }
    }
    split
}
