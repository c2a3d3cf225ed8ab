use crate::processing::decode::TensorLayout;
use common::DetectionMode;
use preprocess::{DEFAULT_INPUT_SIZE, InputLayout};
use std::str::FromStr;

/// How raw class scores in the output tensor turn into probabilities.
///
/// This is a property of the model export and is never guessed from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreActivation {
    /// Scores are raw logits
    #[default]
    Sigmoid,
    /// Scores are already probabilities
    Identity,
}

impl ScoreActivation {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            ScoreActivation::Sigmoid => sigmoid(x),
            ScoreActivation::Identity => x,
        }
    }
}

impl FromStr for ScoreActivation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sigmoid" | "logits" => Ok(ScoreActivation::Sigmoid),
            "identity" | "none" | "probabilities" => Ok(ScoreActivation::Identity),
            other => anyhow::bail!("Unknown score activation: {}", other),
        }
    }
}

/// Sigmoid activation function
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Square model input resolution; decoded box coordinates are in this pixel space
    pub input_size: u32,
    pub input_layout: InputLayout,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Pixel bounds (model input space) for both box width and height
    pub min_box_size: f32,
    pub max_box_size: f32,
    pub min_aspect_ratio: f32,
    pub max_aspect_ratio: f32,
    /// Smallest accepted normalised width/height
    pub min_normalized_size: f32,
    pub tensor_layout: TensorLayout,
    pub score_activation: ScoreActivation,
}

impl DetectorConfig {
    pub fn for_mode(mode: DetectionMode) -> Self {
        let confidence_threshold = match mode {
            DetectionMode::Performance => 0.40,
            DetectionMode::Balanced => 0.35,
            DetectionMode::Quality => 0.30,
            DetectionMode::BatterySaver => 0.45,
        };

        Self {
            input_size: DEFAULT_INPUT_SIZE,
            input_layout: InputLayout::Nhwc,
            confidence_threshold,
            iou_threshold: 0.45,
            min_box_size: 15.0,
            max_box_size: 600.0,
            min_aspect_ratio: 0.1,
            max_aspect_ratio: 10.0,
            min_normalized_size: 0.02,
            tensor_layout: TensorLayout::Transposed,
            score_activation: ScoreActivation::Sigmoid,
        }
    }

    pub fn with_confidence_threshold(mut self, confidence_threshold: f32) -> Self {
        self.confidence_threshold = confidence_threshold;
        self
    }

    pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Self {
        self.iou_threshold = iou_threshold;
        self
    }

    pub fn with_box_size(mut self, min_box_size: f32, max_box_size: f32) -> Self {
        self.min_box_size = min_box_size;
        self.max_box_size = max_box_size;
        self
    }

    pub fn with_tensor_layout(mut self, tensor_layout: TensorLayout) -> Self {
        self.tensor_layout = tensor_layout;
        self
    }

    pub fn with_score_activation(mut self, score_activation: ScoreActivation) -> Self {
        self.score_activation = score_activation;
        self
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::for_mode(DetectionMode::Balanced)
    }
}
