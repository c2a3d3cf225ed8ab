use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Unsupported display rotation: {0} degrees")]
    InvalidRotation(u32),

    #[error("Empty image ({image_width}x{image_height}) or viewport ({viewport_width}x{viewport_height})")]
    EmptyDimensions {
        image_width: u32,
        image_height: u32,
        viewport_width: u32,
        viewport_height: u32,
    },
}
