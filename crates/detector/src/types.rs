use crate::geometry::NormalizedRect;

/// A single post-processed detection.
///
/// Invariants upheld by [`crate::PostProcessor`]: `confidence` is at least the
/// configured threshold and `rect` lies inside `[0, 1]` with positive width and height.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub class_id: usize,
    pub confidence: f32,
    pub rect: NormalizedRect,
}
