use crate::config::DetectorConfig;
use crate::processing::decode::DecodedCandidate;

/// A candidate that survived geometric and confidence filtering, still in
/// model-input pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub class_id: usize,
    pub confidence: f32,
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

/// Why a candidate was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Centre outside the model input square
    OutOfFrame,
    /// Non-positive width or height
    Degenerate,
    /// Width or height outside the configured pixel range
    Size,
    AspectRatio,
    /// Model reported zero classes
    NoClasses,
    LowConfidence,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateFilter {
    input_size: f32,
    min_box_size: f32,
    max_box_size: f32,
    min_aspect_ratio: f32,
    max_aspect_ratio: f32,
    confidence_threshold: f32,
}

impl CandidateFilter {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            input_size: config.input_size as f32,
            min_box_size: config.min_box_size,
            max_box_size: config.max_box_size,
            min_aspect_ratio: config.min_aspect_ratio,
            max_aspect_ratio: config.max_aspect_ratio,
            confidence_threshold: config.confidence_threshold,
        }
    }

    /// Geometry checks run before the class argmax so rejected anchors never
    /// pay for score activation.
    ///
    /// Every comparison is written so that NaN fails it.
    pub fn evaluate(&self, candidate: &DecodedCandidate<'_>) -> Result<Candidate, Rejection> {
        let DecodedCandidate { cx, cy, w, h, .. } = *candidate;

        let frame = 0.0..=self.input_size;
        if !frame.contains(&cx) || !frame.contains(&cy) {
            return Err(Rejection::OutOfFrame);
        }

        if !(w > 0.0 && h > 0.0) {
            return Err(Rejection::Degenerate);
        }

        let size = self.min_box_size..=self.max_box_size;
        if !size.contains(&w) || !size.contains(&h) {
            return Err(Rejection::Size);
        }

        let aspect_ratio = w / h;
        if !(self.min_aspect_ratio..=self.max_aspect_ratio).contains(&aspect_ratio) {
            return Err(Rejection::AspectRatio);
        }

        let (class_id, confidence) = candidate.best_class().ok_or(Rejection::NoClasses)?;
        if !(confidence >= self.confidence_threshold) {
            return Err(Rejection::LowConfidence);
        }

        Ok(Candidate {
            class_id,
            confidence,
            cx,
            cy,
            w,
            h,
        })
    }
}
