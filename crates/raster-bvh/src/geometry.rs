//! Scene geometry and axis-aligned bounds.

use nalgebra::{Matrix4, Point3, Vector3};

/// A scene vertex.
///
/// The normal is carried alongside the position and is reused as a debug
/// color channel by the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
}

impl Vertex {
    pub fn new(position: Point3<f32>, normal: Vector3<f32>) -> Self {
        Self { position, normal }
    }

    /// Creates a vertex with a zero normal.
    pub fn from_position(position: Point3<f32>) -> Self {
        Self {
            position,
            normal: Vector3::zeros(),
        }
    }
}

/// A triangle given by three indices into a scene-wide vertex array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Face {
    pub v0: u32,
    pub v1: u32,
    pub v2: u32,
}

impl Face {
    pub fn new(v0: u32, v1: u32, v2: u32) -> Self {
        Self { v0, v1, v2 }
    }

    /// Returns the three vertex indices.
    #[inline]
    pub fn indices(&self) -> [usize; 3] {
        [self.v0 as usize, self.v1 as usize, self.v2 as usize]
    }

    /// Returns the positions of the three vertices.
    ///
    /// # Panics
    /// Panics if an index is outside `vertices`.
    pub fn positions(&self, vertices: &[Vertex]) -> [Point3<f32>; 3] {
        self.indices().map(|i| vertices[i].position)
    }

    /// Computes the centroid of the triangle.
    pub fn centroid(&self, vertices: &[Vertex]) -> Point3<f32> {
        let [a, b, c] = self.positions(vertices);
        Point3::from((a.coords + b.coords + c.coords) / 3.0)
    }

    /// Computes the tight bounds of the triangle.
    pub fn bounds(&self, vertices: &[Vertex]) -> Aabb {
        Aabb::from_points(self.positions(vertices))
    }
}

/// An owned scene: a vertex array and the faces indexing into it.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    vertices: Vec<Vertex>,
    faces: Vec<Face>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(vertices: Vec<Vertex>, faces: Vec<Face>) -> Self {
        Self { vertices, faces }
    }

    /// Appends a mesh, offsetting its face indices past the vertices already
    /// in the scene.
    pub fn push_mesh(&mut self, vertices: &[Vertex], faces: &[Face]) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(vertices);
        self.faces.extend(
            faces
                .iter()
                .map(|f| Face::new(f.v0 + offset, f.v1 + offset, f.v2 + offset)),
        );
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Borrows the scene for building and rendering.
    #[inline]
    pub fn view(&self) -> SceneView<'_> {
        SceneView::new(&self.faces, &self.vertices)
    }
}

/// Borrowed scene geometry.
///
/// The BVH and the renderer hold this view rather than copies of the
/// geometry, so the scene must outlive both.
#[derive(Debug, Clone, Copy)]
pub struct SceneView<'s> {
    pub faces: &'s [Face],
    pub vertices: &'s [Vertex],
}

impl<'s> SceneView<'s> {
    pub fn new(faces: &'s [Face], vertices: &'s [Vertex]) -> Self {
        Self { faces, vertices }
    }

    #[inline]
    pub fn face(&self, index: usize) -> &'s Face {
        &self.faces[index]
    }

    #[inline]
    pub fn face_bounds(&self, index: usize) -> Aabb {
        self.faces[index].bounds(self.vertices)
    }

    /// Centroid coordinate of a face along one axis.
    #[inline]
    pub fn centroid_on(&self, index: usize, axis: Axis) -> f32 {
        self.faces[index].centroid(self.vertices)[axis.index()]
    }
}

/// One of the three coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Returns the coordinate index (0, 1 or 2).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// An axis-aligned bounding box in object (world) space.
///
/// The empty box has `min = +inf` and `max = -inf`, so it is the identity
/// for [`Aabb::union`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// Builds the tightest box containing every point.
    pub fn from_points<I: IntoIterator<Item = Point3<f32>>>(points: I) -> Self {
        points
            .into_iter()
            .fold(Self::empty(), |bounds, p| bounds.grow(&p))
    }

    /// Returns `true` if the box contains no point.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Returns the smallest box containing both boxes.
    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Returns the smallest box containing this box and a point.
    #[inline]
    pub fn grow(&self, point: &Point3<f32>) -> Aabb {
        Aabb {
            min: self.min.inf(point),
            max: self.max.sup(point),
        }
    }

    #[inline]
    pub fn diagonal(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn centroid(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Surface area of the box; zero for the empty box.
    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.diagonal();
        2.0 * (d.x * d.y + d.x * d.z + d.y * d.z)
    }

    /// Returns the axis of longest extent.
    ///
    /// X wins only when strictly longer than both others, then Y when strictly
    /// longer than Z; otherwise Z.
    pub fn maximum_extent(&self) -> Axis {
        let d = self.diagonal();
        if d.x > d.y && d.x > d.z {
            Axis::X
        } else if d.y > d.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    /// Returns `true` if every extent is strictly below `length`.
    pub fn is_smaller_than(&self, length: f32) -> bool {
        self.diagonal().iter().all(|&d| d < length)
    }

    /// Grows the box by `amount` in every direction.
    pub fn inflated(&self, amount: f32) -> Aabb {
        let delta = Vector3::repeat(amount);
        Aabb {
            min: self.min - delta,
            max: self.max + delta,
        }
    }

    /// Returns the eight corners of the box.
    pub fn corners(&self) -> [Point3<f32>; 8] {
        let (lo, hi) = (&self.min, &self.max);
        [
            Point3::new(lo.x, lo.y, lo.z),
            Point3::new(hi.x, lo.y, lo.z),
            Point3::new(hi.x, hi.y, lo.z),
            Point3::new(lo.x, hi.y, lo.z),
            Point3::new(lo.x, lo.y, hi.z),
            Point3::new(hi.x, lo.y, hi.z),
            Point3::new(hi.x, hi.y, hi.z),
            Point3::new(lo.x, hi.y, hi.z),
        ]
    }

    /// Transforms all eight corners by `m`, divides by `w`, and folds the
    /// results into projected bounds.
    ///
    /// A box with a corner at or behind the eye (`w <= 0`) cannot be bounded
    /// on screen and projects to [`ProjectedBounds::unbounded`].
    pub fn project(&self, m: &Matrix4<f32>) -> ProjectedBounds {
        let mut projected = ProjectedBounds::unprojected();
        for corner in self.corners() {
            let h = m * corner.to_homogeneous();
            if h.w <= 0.0 {
                return ProjectedBounds::unbounded();
            }
            let p = Point3::new(h.x / h.w, h.y / h.w, h.z / h.w);
            projected = ProjectedBounds {
                min: projected.min.inf(&p),
                max: projected.max.sup(&p),
                min_z: projected.min_z.min(p.z),
            };
        }
        projected
    }
}

/// Bounds of a box after transform and perspective divide.
///
/// Only meaningful after the owning tree's most recent
/// [`implement_transform`](crate::RasterBvh::implement_transform).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedBounds {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
    /// Smallest post-divide Z among the eight transformed corners.
    pub min_z: f32,
}

impl Default for ProjectedBounds {
    fn default() -> Self {
        Self::unprojected()
    }
}

impl ProjectedBounds {
    /// Empty bounds, used before the first transform.
    pub fn unprojected() -> Self {
        let empty = Aabb::empty();
        Self {
            min: empty.min,
            max: empty.max,
            min_z: f32::INFINITY,
        }
    }

    /// Bounds covering all of screen space at every depth.
    pub fn unbounded() -> Self {
        let empty = Aabb::empty();
        Self {
            min: empty.max,
            max: empty.min,
            min_z: f32::NEG_INFINITY,
        }
    }
}
