//! Model-input pixel space ↔ normalised `[0, 1]` rectangles.
//!
//! Mapping normalised rectangles onto the screen (viewport size and display
//! rotation) is the consumer's job and lives in the `tracker` crate.

use crate::geometry::NormalizedRect;
use crate::processing::filter::Candidate;

/// Convert a pixel-space centre/size box into a normalised rectangle.
///
/// Corners are clamped to the input square before dividing, so partially
/// out-of-frame boxes are cropped rather than rejected.
pub fn pixel_to_normalized(cx: f32, cy: f32, w: f32, h: f32, input_size: f32) -> NormalizedRect {
    let half_w = w / 2.0;
    let half_h = h / 2.0;

    let left = (cx - half_w).clamp(0.0, input_size);
    let top = (cy - half_h).clamp(0.0, input_size);
    let right = (cx + half_w).clamp(0.0, input_size);
    let bottom = (cy + half_h).clamp(0.0, input_size);

    NormalizedRect::new(
        left / input_size,
        top / input_size,
        right / input_size,
        bottom / input_size,
    )
}

/// Inverse of [`pixel_to_normalized`] for boxes that were not clamped.
/// Returns `(cx, cy, w, h)` in pixel space.
pub fn normalized_to_pixel(rect: &NormalizedRect, input_size: f32) -> (f32, f32, f32, f32) {
    let (cx, cy) = rect.center();
    (
        cx * input_size,
        cy * input_size,
        rect.width() * input_size,
        rect.height() * input_size,
    )
}

/// Bounds, ordering and minimum-size check on a normalised rectangle.
pub fn is_valid_box(rect: &NormalizedRect, min_size: f32) -> bool {
    if rect.left < 0.0 || rect.top < 0.0 || rect.right > 1.0 || rect.bottom > 1.0 {
        return false;
    }

    if !(rect.left < rect.right && rect.top < rect.bottom) {
        return false;
    }

    rect.width() >= min_size && rect.height() >= min_size
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    input_size: f32,
    min_normalized_size: f32,
}

impl CoordinateMapper {
    pub fn new(input_size: u32, min_normalized_size: f32) -> Self {
        Self {
            input_size: input_size as f32,
            min_normalized_size,
        }
    }

    /// Normalised rectangle for `candidate`, or `None` if it fails the final validity check.
    pub fn map(&self, candidate: &Candidate) -> Option<NormalizedRect> {
        let rect = pixel_to_normalized(
            candidate.cx,
            candidate.cy,
            candidate.w,
            candidate.h,
            self.input_size,
        );
        is_valid_box(&rect, self.min_normalized_size).then_some(rect)
    }
}
