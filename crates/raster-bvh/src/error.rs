//! Errors raised while setting up a tree or a tile grid.

use thiserror::Error;

/// Construction-time errors.
///
/// Misuse at render time (tile indices out of range, mismatched buffer
/// sizes) is a programming error and panics instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BvhError {
    #[error("unknown split method `{0}` (expected one of: middle, equal-counts, sah)")]
    UnknownSplitMethod(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("face {face} references vertex {vertex}, but the scene has {vertex_count} vertices")]
    VertexOutOfRange {
        face: usize,
        vertex: usize,
        vertex_count: usize,
    },

    #[error("framebuffer of {width}x{height} pixels cannot be tiled")]
    EmptyFramebuffer { width: u32, height: u32 },
}
