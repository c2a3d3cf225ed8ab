//! Normalised detection rectangle → on-screen pixels.
//!
//! The camera image arrives in sensor orientation; the viewport is in display
//! orientation. For quarter turns the image axes swap before scaling.

use crate::error::TrackerError;
use detector::NormalizedRect;

/// Clockwise display rotation relative to the camera image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// True when image width maps onto viewport height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl TryFrom<u32> for Rotation {
    type Error = TrackerError;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(TrackerError::InvalidRotation(other)),
        }
    }
}

/// Integer screen-pixel rectangle, edges inclusive-exclusive like a view rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScreenRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScreenRect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }
}

/// Maps rectangles from one camera image geometry onto one viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    image_width: f32,
    image_height: f32,
    viewport_width: i32,
    viewport_height: i32,
    rotation: Rotation,
    scale_x: f32,
    scale_y: f32,
}

impl ViewportTransform {
    pub fn new(
        image_width: u32,
        image_height: u32,
        viewport_width: u32,
        viewport_height: u32,
        rotation: Rotation,
    ) -> Result<Self, TrackerError> {
        if image_width == 0 || image_height == 0 || viewport_width == 0 || viewport_height == 0 {
            return Err(TrackerError::EmptyDimensions {
                image_width,
                image_height,
                viewport_width,
                viewport_height,
            });
        }

        // Rotated image extent along the viewport axes
        let (rotated_width, rotated_height) = if rotation.swaps_axes() {
            (image_height, image_width)
        } else {
            (image_width, image_height)
        };

        Ok(Self {
            image_width: image_width as f32,
            image_height: image_height as f32,
            viewport_width: viewport_width as i32,
            viewport_height: viewport_height as i32,
            rotation,
            scale_x: viewport_width as f32 / rotated_width as f32,
            scale_y: viewport_height as f32 / rotated_height as f32,
        })
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn viewport_size(&self) -> (i32, i32) {
        (self.viewport_width, self.viewport_height)
    }

    pub fn viewport_area(&self) -> i64 {
        self.viewport_width as i64 * self.viewport_height as i64
    }

    /// Screen rectangle for `rect`, clamped to the viewport and rounded to
    /// the nearest pixel.
    pub fn map(&self, rect: &NormalizedRect) -> ScreenRect {
        let (w, h) = (self.image_width, self.image_height);

        let left = rect.left * w;
        let top = rect.top * h;
        let right = rect.right * w;
        let bottom = rect.bottom * h;

        let (left, top, right, bottom) = match self.rotation {
            Rotation::Deg0 => (left, top, right, bottom),
            Rotation::Deg90 => (top, w - right, bottom, w - left),
            Rotation::Deg180 => (w - right, h - bottom, w - left, h - top),
            Rotation::Deg270 => (h - bottom, left, h - top, right),
        };

        let x = |v: f32| ((v * self.scale_x).round() as i32).clamp(0, self.viewport_width);
        let y = |v: f32| ((v * self.scale_y).round() as i32).clamp(0, self.viewport_height);

        ScreenRect::new(x(left), y(top), x(right), y(bottom))
    }
}
