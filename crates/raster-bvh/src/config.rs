//! Build, traversal and tiling configuration.

use std::fmt;
use std::str::FromStr;

use crate::BvhError;

/// Strategy used to partition a node's faces into two children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SplitMethod {
    /// Split at the spatial midpoint of the longest axis.
    #[default]
    Middle,
    /// Split so both halves hold the same number of faces.
    EqualCounts,
    /// Bucketed surface area heuristic.
    ///
    /// Experimental: produces valid trees, but its split quality has not been
    /// tuned or validated against the other methods.
    Sah,
}

impl SplitMethod {
    pub const ALL: [SplitMethod; 3] = [
        SplitMethod::Middle,
        SplitMethod::EqualCounts,
        SplitMethod::Sah,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SplitMethod::Middle => "middle",
            SplitMethod::EqualCounts => "equal-counts",
            SplitMethod::Sah => "sah",
        }
    }

    /// Returns `true` for methods that are not a correctness target.
    pub fn is_experimental(self) -> bool {
        matches!(self, SplitMethod::Sah)
    }
}

impl fmt::Display for SplitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SplitMethod {
    type Err = BvhError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "middle" => Ok(SplitMethod::Middle),
            "equal-counts" | "equal_counts" | "equalcounts" => Ok(SplitMethod::EqualCounts),
            "sah" => Ok(SplitMethod::Sah),
            _ => Err(BvhError::UnknownSplitMethod(s.to_string())),
        }
    }
}

/// What traversal does with the children of a rejected interior node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TraversalMode {
    /// Skip the subtree.
    #[default]
    Prune,
    /// Visit every node regardless of the visitor's answer.
    Exhaustive,
}

/// Parameters of [`RasterBvh::build`](crate::RasterBvh::build).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhConfig {
    /// Amount a degenerate leaf bound is grown by in every direction.
    pub voxel_length: f32,
    /// A bound whose extents are all below this becomes an inflated leaf.
    pub min_bound_length: f32,
    pub split_method: SplitMethod,
    /// Upper bound on the node arena block size, in megabytes.
    pub arena_megabytes: usize,
    pub traversal: TraversalMode,
}

impl Default for BvhConfig {
    fn default() -> Self {
        Self {
            voxel_length: 0.01,
            min_bound_length: 0.02,
            split_method: SplitMethod::Middle,
            arena_megabytes: 128,
            traversal: TraversalMode::Prune,
        }
    }
}

impl BvhConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_split_method(mut self, method: SplitMethod) -> Self {
        self.split_method = method;
        self
    }

    /// Sets the degenerate-leaf inflation and the threshold that triggers it.
    pub fn with_degenerate_bounds(mut self, voxel_length: f32, min_bound_length: f32) -> Self {
        self.voxel_length = voxel_length;
        self.min_bound_length = min_bound_length;
        self
    }

    pub fn with_arena_megabytes(mut self, megabytes: usize) -> Self {
        self.arena_megabytes = megabytes;
        self
    }

    pub fn with_traversal(mut self, traversal: TraversalMode) -> Self {
        self.traversal = traversal;
        self
    }

    pub fn arena_bytes(&self) -> usize {
        self.arena_megabytes.saturating_mul(1024 * 1024)
    }

    pub fn validate(&self) -> Result<(), BvhError> {
        if !self.voxel_length.is_finite() || self.voxel_length < 0.0 {
            return Err(BvhError::InvalidConfig(
                "voxel length must be finite and non-negative",
            ));
        }
        if !self.min_bound_length.is_finite() || self.min_bound_length < 0.0 {
            return Err(BvhError::InvalidConfig(
                "minimum bound length must be finite and non-negative",
            ));
        }
        if self.arena_megabytes == 0 {
            return Err(BvhError::InvalidConfig("arena budget must be at least 1 MB"));
        }
        Ok(())
    }
}

/// Parameters of a [`TileCuller`](crate::TileCuller).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileConfig {
    pub tile_width: u32,
    pub tile_height: u32,
    /// Ignore pixels still at +inf (background) when computing a tile's
    /// maximum depth. Off by default: a tile then only starts culling once
    /// every one of its pixels is covered. Turning it on culls more but can
    /// reject geometry that would land on uncovered pixels.
    pub skip_unresolved: bool,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            tile_width: 32,
            tile_height: 32,
            skip_unresolved: false,
        }
    }
}

impl TileConfig {
    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    pub fn with_skip_unresolved(mut self, skip: bool) -> Self {
        self.skip_unresolved = skip;
        self
    }

    pub fn validate(&self) -> Result<(), BvhError> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(BvhError::InvalidConfig("tile dimensions must be non-zero"));
        }
        Ok(())
    }
}
