use crate::config::DetectorConfig;
use crate::error::DetectionError;
use crate::labels::LabelMap;
use crate::processing::{
    coords::CoordinateMapper,
    decode::{OutputShape, TensorDecoder},
    filter::{CandidateFilter, Rejection},
    nms::class_aware_nms,
};
use crate::types::Detection;
use std::borrow::Cow;

/// Raw output tensor → final per-frame detection list.
///
/// Decode, filter, normalise, then class-aware NMS. Output is sorted by
/// confidence, highest first.
pub struct PostProcessor {
    decoder: TensorDecoder,
    filter: CandidateFilter,
    mapper: CoordinateMapper,
    iou_threshold: f32,
    labels: LabelMap,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct RejectionCounts {
    geometry: usize,
    low_confidence: usize,
    unknown_label: usize,
    invalid_box: usize,
}

impl PostProcessor {
    pub fn new(config: &DetectorConfig, shape: OutputShape, labels: LabelMap) -> Self {
        if shape.num_classes != labels.len() {
            tracing::warn!(
                model_classes = shape.num_classes,
                labels = labels.len(),
                "Model class count differs from label file, unknown classes will be dropped"
            );
        }

        Self {
            decoder: TensorDecoder::new(shape, config.tensor_layout, config.score_activation),
            filter: CandidateFilter::new(config),
            mapper: CoordinateMapper::new(config.input_size, config.min_normalized_size),
            iou_threshold: config.iou_threshold,
            labels,
        }
    }

    pub fn shape(&self) -> OutputShape {
        self.decoder.shape()
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Parse detections from a flat output buffer laid out as configured.
    #[tracing::instrument(skip(self, output), fields(values = output.len()))]
    pub fn process(&self, output: &[f32]) -> Result<Vec<Detection>, DetectionError> {
        let mut rejected = RejectionCounts::default();
        let mut detections = Vec::new();

        for candidate in self.decoder.decode(output)? {
            let candidate = match self.filter.evaluate(&candidate) {
                Ok(candidate) => candidate,
                Err(Rejection::LowConfidence) => {
                    rejected.low_confidence += 1;
                    continue;
                }
                Err(_) => {
                    rejected.geometry += 1;
                    continue;
                }
            };

            // Class index beyond the label file: model/label mismatch, drop quietly
            let Some(label) = self.labels.get(candidate.class_id) else {
                rejected.unknown_label += 1;
                continue;
            };

            let Some(rect) = self.mapper.map(&candidate) else {
                rejected.invalid_box += 1;
                continue;
            };

            detections.push(Detection {
                label: label.to_string(),
                class_id: candidate.class_id,
                confidence: candidate.confidence,
                rect,
            });
        }

        let raw = detections.len();
        let detections = class_aware_nms(detections, self.iou_threshold);

        tracing::trace!(
            raw,
            kept = detections.len(),
            rejected_geometry = rejected.geometry,
            rejected_confidence = rejected.low_confidence,
            rejected_label = rejected.unknown_label,
            rejected_box = rejected.invalid_box,
            "Post-processing complete"
        );

        Ok(detections)
    }

    /// Same as [`PostProcessor::process`] for a backend-produced tensor of any shape
    /// holding the configured number of values.
    pub fn process_view(
        &self,
        output: &ndarray::ArrayViewD<f32>,
    ) -> Result<Vec<Detection>, DetectionError> {
        let values: Cow<[f32]> = match output.as_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(output.iter().copied().collect()),
        };
        self.process(&values)
    }
}
