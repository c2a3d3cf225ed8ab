pub mod backend;
pub mod config;
pub mod detector;
pub mod error;
pub mod geometry;
pub mod labels;
pub mod processing;
pub mod types;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, InferenceOutput};
#[cfg(feature = "ort-backend")]
pub use backend::ort::{ExecutionProvider, OrtBackend};
pub use config::{DetectorConfig, ScoreActivation};
pub use detector::{DetectionSummary, Detector, anchor_count};
pub use error::DetectionError;
pub use geometry::NormalizedRect;
pub use labels::LabelMap;
pub use preprocess::InputLayout;
pub use processing::{
    decode::{OutputShape, TensorDecoder, TensorLayout},
    post::PostProcessor,
};
pub use types::Detection;
