use crate::backend::InferenceBackend;
use crate::config::DetectorConfig;
use crate::error::DetectionError;
use crate::labels::LabelMap;
use crate::processing::decode::{OutputShape, TensorLayout};
use crate::processing::post::PostProcessor;
use crate::types::Detection;
use preprocess::{CpuPreProcessor, Preprocess};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Number of recent inferences averaged in [`DetectionSummary::average_time`].
const TIMING_WINDOW: usize = 20;

/// Anchor count of a YOLOv8 head at `input_size`: one per cell of the
/// stride 8, 16 and 32 grids (8400 at 640).
pub fn anchor_count(input_size: u32) -> usize {
    [8, 16, 32]
        .iter()
        .map(|stride| {
            let cells = (input_size / stride) as usize;
            cells * cells
        })
        .sum()
}

/// Snapshot of the detector's rolling statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionSummary {
    pub total_inferences: u64,
    /// Inferences that produced at least one detection
    pub successful_detections: u64,
    pub average_time: Duration,
    /// Percentage of inferences with at least one detection
    pub success_rate: u8,
}

#[derive(Debug, Default)]
struct DetectionStats {
    total_inferences: u64,
    successful_detections: u64,
    recent: VecDeque<Duration>,
}

impl DetectionStats {
    fn record(&mut self, elapsed: Duration, detections: usize) {
        if self.recent.len() == TIMING_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(elapsed);

        if detections > 0 {
            self.successful_detections += 1;
        }
    }

    fn summary(&self) -> DetectionSummary {
        let average_time = if self.recent.is_empty() {
            Duration::ZERO
        } else {
            self.recent.iter().sum::<Duration>() / self.recent.len() as u32
        };

        let success_rate = if self.total_inferences > 0 {
            (self.successful_detections * 100 / self.total_inferences) as u8
        } else {
            0
        };

        DetectionSummary {
            total_inferences: self.total_inferences,
            successful_detections: self.successful_detections,
            average_time,
            success_rate,
        }
    }
}

/// Frame in, sorted detections out.
///
/// Owns the backend session; the model is loaded by the caller and injected.
pub struct Detector<B: InferenceBackend> {
    backend: B,
    preprocessor: CpuPreProcessor,
    postprocessor: PostProcessor,
    stats: DetectionStats,
}

impl<B: InferenceBackend> Detector<B> {
    /// Build a detector around a loaded backend.
    ///
    /// When the backend reports its output shape the tensor layout is read
    /// from it once here; otherwise the configured layout and the YOLOv8
    /// anchor count for the input size are assumed. A backend-reported input
    /// layout likewise wins over the configured one.
    pub fn new(
        backend: B,
        config: &DetectorConfig,
        labels: LabelMap,
    ) -> Result<Self, DetectionError> {
        let mut config = config.clone();
        if let Some(layout) = backend.input_layout()
            && layout != config.input_layout
        {
            tracing::warn!(
                configured = ?config.input_layout,
                required = ?layout,
                "Backend requires a different input layout, using the backend's"
            );
            config.input_layout = layout;
        }

        let (config, shape) = match backend.output_shape() {
            Some(dims) => {
                let (layout, shape) = TensorLayout::infer(&dims, Some(labels.len()))?;
                if layout != config.tensor_layout {
                    tracing::warn!(
                        configured = ?config.tensor_layout,
                        detected = ?layout,
                        "Model output layout differs from configuration, using detected layout"
                    );
                }
                (config.with_tensor_layout(layout), shape)
            }
            None => {
                let shape = OutputShape {
                    num_boxes: anchor_count(config.input_size),
                    num_classes: labels.len(),
                };
                (config, shape)
            }
        };

        Ok(Self::with_shape(backend, &config, shape, labels))
    }

    /// Build a detector for a model whose output shape is already known.
    pub fn with_shape(
        backend: B,
        config: &DetectorConfig,
        shape: OutputShape,
        labels: LabelMap,
    ) -> Self {
        tracing::info!(
            input_size = config.input_size,
            num_boxes = shape.num_boxes,
            num_classes = shape.num_classes,
            layout = ?config.tensor_layout,
            activation = ?config.score_activation,
            confidence_threshold = config.confidence_threshold,
            "Detector ready"
        );

        Self {
            backend,
            preprocessor: CpuPreProcessor::new(config.input_size, config.input_layout),
            postprocessor: PostProcessor::new(config, shape, labels),
            stats: DetectionStats::default(),
        }
    }

    pub fn labels(&self) -> &LabelMap {
        self.postprocessor.labels()
    }

    pub fn output_shape(&self) -> OutputShape {
        self.postprocessor.shape()
    }

    /// Run one frame through preprocess, inference and post-processing.
    pub fn try_detect(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<Vec<Detection>> {
        let start = Instant::now();
        self.stats.total_inferences += 1;

        let input = self.preprocessor.preprocess(pixels, width, height)?;
        let output = self.backend.infer(&input)?;
        let detections = self.postprocessor.process_view(&output.output.view())?;

        let elapsed = start.elapsed();
        self.stats.record(elapsed, detections.len());

        tracing::debug!(
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            detections = detections.len(),
            "Inference complete"
        );
        for det in detections.iter().take(3) {
            tracing::trace!(label = %det.label, confidence = det.confidence, "Detection");
        }

        Ok(detections)
    }

    /// Like [`Detector::try_detect`], but never fails: an unusable frame or a
    /// failed inference yields an empty list.
    pub fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Vec<Detection> {
        if width == 0 || height == 0 || pixels.is_empty() {
            tracing::warn!(width, height, "Invalid frame dimensions, skipping");
            return Vec::new();
        }

        match self.try_detect(pixels, width, height) {
            Ok(detections) => detections,
            Err(e) => {
                tracing::error!(error = %e, "Detection failed");
                Vec::new()
            }
        }
    }

    pub fn summary(&self) -> DetectionSummary {
        self.stats.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InferenceOutput;
    use ndarray::{Array, ArrayD, IxDyn};
    use preprocess::InputLayout;

    /// Backend returning a canned output tensor, or failing on demand.
    struct MockBackend {
        output: ArrayD<f32>,
        reported_shape: Option<Vec<usize>>,
        required_layout: Option<InputLayout>,
        fail: bool,
        calls: usize,
        last_input: Vec<usize>,
    }

    impl MockBackend {
        fn returning(output: ArrayD<f32>) -> Self {
            Self {
                output,
                reported_shape: None,
                required_layout: None,
                fail: false,
                calls: 0,
                last_input: Vec::new(),
            }
        }
    }

    impl InferenceBackend for MockBackend {
        fn load_model(_path: &str) -> anyhow::Result<Self> {
            anyhow::bail!("mock backend has no model")
        }

        fn infer(&mut self, input: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput> {
            self.calls += 1;
            self.last_input = input.shape().to_vec();
            if self.fail {
                anyhow::bail!("delegate crashed");
            }
            Ok(InferenceOutput {
                output: self.output.clone(),
            })
        }

        fn output_shape(&self) -> Option<Vec<usize>> {
            self.reported_shape.clone()
        }

        fn input_layout(&self) -> Option<InputLayout> {
            self.required_layout
        }
    }

    const INPUT: u32 = 64;

    fn labels() -> LabelMap {
        LabelMap::from_text("person\ncup").unwrap()
    }

    fn config() -> DetectorConfig {
        DetectorConfig {
            input_size: INPUT,
            min_box_size: 2.0,
            max_box_size: 64.0,
            ..DetectorConfig::default()
        }
    }

    fn shape(num_boxes: usize) -> OutputShape {
        OutputShape {
            num_boxes,
            num_classes: 2,
        }
    }

    /// Transposed `[1, 6, 2]` output: a confident cup and a weak anchor.
    fn cup_output() -> ArrayD<f32> {
        let data = vec![
            32.0, 10.0, // cx
            32.0, 10.0, // cy
            16.0, 8.0, // w
            16.0, 8.0, // h
            -10.0, -10.0, // person
            4.0, -10.0, // cup
        ];
        Array::from_shape_vec(IxDyn(&[1, 6, 2]), data).unwrap()
    }

    fn frame() -> Vec<u8> {
        vec![128u8; (INPUT * INPUT * 3) as usize]
    }

    #[test]
    fn test_anchor_count() {
        assert_eq!(anchor_count(640), 8400);
        assert_eq!(anchor_count(320), 2100);
    }

    #[test]
    fn test_detect_returns_post_processed_detections() {
        let backend = MockBackend::returning(cup_output());
        let mut detector = Detector::with_shape(backend, &config(), shape(2), labels());

        let detections = detector.detect(&frame(), INPUT, INPUT);

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "cup");
        assert!((detections[0].rect.left - 0.375).abs() < 1e-6);
        assert!((detections[0].rect.right - 0.625).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_frame_is_skipped_without_inference() {
        let backend = MockBackend::returning(cup_output());
        let mut detector = Detector::with_shape(backend, &config(), shape(2), labels());

        assert!(detector.detect(&[], 0, 0).is_empty());
        assert!(detector.detect(&frame(), 0, INPUT).is_empty());
        assert_eq!(detector.backend.calls, 0);
    }

    #[test]
    fn test_backend_failure_degrades_to_empty() {
        let mut backend = MockBackend::returning(cup_output());
        backend.fail = true;
        let mut detector = Detector::with_shape(backend, &config(), shape(2), labels());

        assert!(detector.detect(&frame(), INPUT, INPUT).is_empty());
        assert!(detector.try_detect(&frame(), INPUT, INPUT).is_err());
    }

    #[test]
    fn test_shape_mismatch_degrades_to_empty() {
        let backend = MockBackend::returning(cup_output());
        // Expecting 5 anchors but the model emits 2
        let mut detector = Detector::with_shape(backend, &config(), shape(5), labels());

        assert!(detector.detect(&frame(), INPUT, INPUT).is_empty());
        let err = detector.try_detect(&frame(), INPUT, INPUT).unwrap_err();
        assert!(err.downcast_ref::<DetectionError>().is_some());
    }

    #[test]
    fn test_layout_read_from_reported_shape() {
        let mut backend = MockBackend::returning(cup_output());
        backend.reported_shape = Some(vec![1, 6, 2]);
        let config = config().with_tensor_layout(TensorLayout::Standard);

        let mut detector = Detector::new(backend, &config, labels()).unwrap();

        assert_eq!(detector.output_shape(), shape(2));
        assert_eq!(detector.detect(&frame(), INPUT, INPUT).len(), 1);
    }

    #[test]
    fn test_backend_input_layout_overrides_config() {
        let mut backend = MockBackend::returning(cup_output());
        backend.reported_shape = Some(vec![1, 6, 2]);
        backend.required_layout = Some(InputLayout::Nchw);
        let config = DetectorConfig {
            input_layout: InputLayout::Nhwc,
            ..config()
        };

        let mut detector = Detector::new(backend, &config, labels()).unwrap();
        assert_eq!(detector.detect(&frame(), INPUT, INPUT).len(), 1);

        let expected = vec![1, 3, INPUT as usize, INPUT as usize];
        assert_eq!(detector.backend.last_input, expected, "NCHW graph must get NCHW input");
    }

    #[test]
    fn test_configured_input_layout_without_backend_preference() {
        let backend = MockBackend::returning(cup_output());
        let mut detector = Detector::with_shape(backend, &config(), shape(2), labels());

        detector.detect(&frame(), INPUT, INPUT);
        assert_eq!(
            detector.backend.last_input,
            vec![1, INPUT as usize, INPUT as usize, 3]
        );
    }

    #[test]
    fn test_default_shape_without_reported_shape() {
        let backend = MockBackend::returning(cup_output());
        let detector = Detector::new(backend, &DetectorConfig::default(), labels()).unwrap();

        assert_eq!(detector.output_shape(), shape(8400));
    }

    #[test]
    fn test_unsupported_reported_shape() {
        let mut backend = MockBackend::returning(cup_output());
        backend.reported_shape = Some(vec![6, 2]);

        let result = Detector::new(backend, &config(), labels());
        assert!(matches!(result, Err(DetectionError::UnsupportedShape(_))));
    }

    #[test]
    fn test_summary_tracks_success_rate() {
        let backend = MockBackend::returning(cup_output());
        let mut detector = Detector::with_shape(backend, &config(), shape(2), labels());

        assert_eq!(detector.summary().success_rate, 0);

        detector.detect(&frame(), INPUT, INPUT);
        detector.backend.fail = true;
        detector.detect(&frame(), INPUT, INPUT);

        let summary = detector.summary();
        assert_eq!(summary.total_inferences, 2);
        assert_eq!(summary.successful_detections, 1);
        assert_eq!(summary.success_rate, 50);
    }

    #[test]
    fn test_timing_window_is_bounded() {
        let mut stats = DetectionStats::default();
        for _ in 0..TIMING_WINDOW {
            stats.record(Duration::from_millis(100), 0);
        }
        for _ in 0..TIMING_WINDOW {
            stats.record(Duration::from_millis(20), 1);
        }

        assert_eq!(stats.recent.len(), TIMING_WINDOW);
        assert_eq!(stats.summary().average_time, Duration::from_millis(20));
    }
}
