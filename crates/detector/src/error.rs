use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Tensor size mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Unsupported output tensor shape: {0:?}")]
    UnsupportedShape(Vec<usize>),

    #[error("Label map is empty")]
    EmptyLabels,
}
