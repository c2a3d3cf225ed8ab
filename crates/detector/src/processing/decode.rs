//! Raw YOLO output tensor → per-anchor candidates.
//!
//! Box coordinates come out of the model in PIXEL space of the model input
//! (e.g. 0..640), not normalised. Nothing in this module rescales them.

use crate::config::ScoreActivation;
use crate::error::DetectionError;
use ndarray::{ArrayView1, ArrayView2, Axis, s};
use std::str::FromStr;

/// Number of box values (cx, cy, w, h) preceding the class scores.
pub const BOX_VALUES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// `[1, num_boxes, 4 + num_classes]`: each candidate is contiguous
    Standard,
    /// `[1, 4 + num_classes, num_boxes]`: all cx, then all cy, w, h, then one
    /// block of `num_boxes` scores per class
    #[default]
    Transposed,
}

/// Candidate count and class count of a detection head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputShape {
    pub num_boxes: usize,
    pub num_classes: usize,
}

impl OutputShape {
    pub fn values_per_box(&self) -> usize {
        BOX_VALUES + self.num_classes
    }

    pub fn len(&self) -> usize {
        self.num_boxes * self.values_per_box()
    }

    pub fn is_empty(&self) -> bool {
        self.num_boxes == 0
    }
}

impl TensorLayout {
    /// Work out the layout of a `[1, a, b]` output tensor.
    ///
    /// Meant for model load time only. The feature axis is the one equal to
    /// `4 + expected_classes` when known, otherwise the shorter axis
    /// (YOLO heads have far more anchors than features).
    pub fn infer(
        shape: &[usize],
        expected_classes: Option<usize>,
    ) -> Result<(Self, OutputShape), DetectionError> {
        let &[1, a, b] = shape else {
            return Err(DetectionError::UnsupportedShape(shape.to_vec()));
        };

        let transposed = match expected_classes {
            Some(classes) if a == BOX_VALUES + classes => true,
            Some(classes) if b == BOX_VALUES + classes => false,
            _ => a < b,
        };

        let (features, num_boxes) = if transposed { (a, b) } else { (b, a) };
        if features <= BOX_VALUES {
            return Err(DetectionError::UnsupportedShape(shape.to_vec()));
        }

        let layout = if transposed {
            TensorLayout::Transposed
        } else {
            TensorLayout::Standard
        };
        Ok((
            layout,
            OutputShape {
                num_boxes,
                num_classes: features - BOX_VALUES,
            },
        ))
    }
}

impl FromStr for TensorLayout {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "interleaved" => Ok(TensorLayout::Standard),
            "transposed" => Ok(TensorLayout::Transposed),
            other => anyhow::bail!("Unknown tensor layout: {}", other),
        }
    }
}

/// One anchor of the output tensor with its activated class scores.
#[derive(Debug, Clone)]
pub struct DecodedCandidate<'a> {
    pub index: usize,
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    raw_scores: ArrayView1<'a, f32>,
    activation: ScoreActivation,
}

impl<'a> DecodedCandidate<'a> {
    pub fn num_classes(&self) -> usize {
        self.raw_scores.len()
    }

    pub fn score(&self, class_id: usize) -> Option<f32> {
        self.raw_scores
            .get(class_id)
            .map(|&raw| self.activation.apply(raw))
    }

    pub fn scores(&self) -> impl Iterator<Item = f32> + '_ {
        let activation = self.activation;
        self.raw_scores.iter().map(move |&raw| activation.apply(raw))
    }

    /// Argmax over the class scores. Ties keep the lowest class id.
    pub fn best_class(&self) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for (class_id, score) in self.scores().enumerate() {
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((class_id, score));
            }
        }
        best
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorDecoder {
    shape: OutputShape,
    layout: TensorLayout,
    activation: ScoreActivation,
}

impl TensorDecoder {
    pub fn new(shape: OutputShape, layout: TensorLayout, activation: ScoreActivation) -> Self {
        Self {
            shape,
            layout,
            activation,
        }
    }

    pub fn shape(&self) -> OutputShape {
        self.shape
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    /// View the flat buffer as `[num_boxes, 4 + num_classes]` whatever the layout.
    pub fn rows<'a>(&self, data: &'a [f32]) -> Result<ArrayView2<'a, f32>, DetectionError> {
        let expected = self.shape.len();
        if data.len() != expected {
            return Err(DetectionError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }

        let num_boxes = self.shape.num_boxes;
        let features = self.shape.values_per_box();
        let view = match self.layout {
            TensorLayout::Standard => ArrayView2::from_shape((num_boxes, features), data),
            TensorLayout::Transposed => {
                ArrayView2::from_shape((features, num_boxes), data).map(|v| v.reversed_axes())
            }
        };

        view.map_err(|_| DetectionError::ShapeMismatch {
            expected,
            actual: data.len(),
        })
    }

    /// Lazily decode every anchor of `data`.
    pub fn decode<'a>(
        &self,
        data: &'a [f32],
    ) -> Result<impl Iterator<Item = DecodedCandidate<'a>> + use<'a>, DetectionError> {
        let rows = self.rows(data)?;
        let activation = self.activation;

        Ok((0..rows.len_of(Axis(0))).map(move |index| {
            let row = rows.index_axis_move(Axis(0), index);
            DecodedCandidate {
                index,
                cx: row[0],
                cy: row[1],
                w: row[2],
                h: row[3],
                raw_scores: row.slice_move(s![BOX_VALUES..]),
                activation,
            }
        }))
    }
}
