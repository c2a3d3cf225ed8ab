use common::{DetectionMode, Environment, ScenePreset};
use detector::{DetectorConfig, InputLayout, ScoreActivation, TensorLayout};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracker::{ScreenFilterConfig, TrackerConfig};

/// Frames between inferences, adapted at runtime within `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub base_interval: u32,
    pub min_interval: u32,
    pub max_interval: u32,
}

impl SchedulerConfig {
    pub fn for_mode(mode: DetectionMode) -> Self {
        let (base_interval, min_interval, max_interval) = match mode {
            DetectionMode::Performance => (4, 3, 10),
            DetectionMode::Balanced => (3, 2, 8),
            DetectionMode::Quality => (2, 1, 6),
            DetectionMode::BatterySaver => (6, 4, 12),
        };

        Self {
            base_interval,
            min_interval,
            max_interval,
        }
    }

    /// Replace the base interval, widening the bounds to include it.
    pub fn with_base_interval(mut self, base_interval: u32) -> Self {
        let base_interval = base_interval.max(1);
        self.base_interval = base_interval;
        self.min_interval = self.min_interval.min(base_interval);
        self.max_interval = self.max_interval.max(base_interval);
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::for_mode(DetectionMode::Balanced)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub environment: Environment,
    pub mode: DetectionMode,
    pub preset: Option<ScenePreset>,
    pub model_path: String,
    /// One label per line; the built-in COCO list when unset
    pub labels_path: Option<String>,
    pub detector: DetectorConfig,
    pub screen: ScreenFilterConfig,
    pub tracker: TrackerConfig,
    pub scheduler: SchedulerConfig,
}

impl PipelineConfig {
    pub fn for_mode(mode: DetectionMode) -> Self {
        Self {
            environment: Environment::Development,
            mode,
            preset: None,
            model_path: "models/yolov8n.onnx".to_string(),
            labels_path: None,
            detector: DetectorConfig::for_mode(mode),
            screen: ScreenFilterConfig::for_mode(mode),
            tracker: TrackerConfig::for_mode(mode),
            scheduler: SchedulerConfig::for_mode(mode),
        }
    }

    /// Layer scene adjustments over the mode defaults.
    ///
    /// The preset's confidence applies to both the model output and the
    /// screen filter; its minimum box size only to the screen filter.
    pub fn with_preset(mut self, preset: ScenePreset) -> Self {
        self.preset = Some(preset);
        self.screen = self.screen.with_preset(preset);
        self.tracker = self.tracker.with_preset(preset);
        self.detector = self
            .detector
            .with_confidence_threshold(self.screen.confidence_threshold);
        self
    }

    pub fn with_confidence_threshold(mut self, confidence_threshold: f32) -> Self {
        self.detector = self.detector.with_confidence_threshold(confidence_threshold);
        self.screen.confidence_threshold = confidence_threshold;
        self
    }

    /// Load configuration from environment variables on top of the mode
    /// and preset they select. Unset or empty variables keep the defaults;
    /// unparsable values are an error.
    pub fn from_env() -> anyhow::Result<Self> {
        let mode = parse_var::<DetectionMode>("DETECTION_MODE")?.unwrap_or_default();
        let mut config = Self::for_mode(mode);
        config.environment = Environment::from_env();

        if let Some(preset) = parse_var::<ScenePreset>("SCENE_PRESET")? {
            config = config.with_preset(preset);
        }

        if let Ok(model_path) = env::var("MODEL_PATH") {
            config.model_path = model_path;
        }
        config.labels_path = env::var("LABELS_PATH").ok().filter(|p| !p.trim().is_empty());

        if let Some(input_size) = parse_var::<u32>("INPUT_SIZE")? {
            anyhow::ensure!(input_size > 0, "INPUT_SIZE must be positive");
            config.detector.input_size = input_size;
        }
        if let Some(threshold) = parse_var::<f32>("CONFIDENCE_THRESHOLD")? {
            anyhow::ensure!(
                (0.0..=1.0).contains(&threshold),
                "CONFIDENCE_THRESHOLD must be within [0, 1]"
            );
            config = config.with_confidence_threshold(threshold);
        }
        if let Some(iou) = parse_var::<f32>("IOU_THRESHOLD")? {
            config.detector.iou_threshold = iou;
        }
        if let Some(min_box_size) = parse_var::<f32>("MIN_BOX_SIZE")? {
            config.detector.min_box_size = min_box_size;
        }
        if let Some(max_box_size) = parse_var::<f32>("MAX_BOX_SIZE")? {
            config.detector.max_box_size = max_box_size;
        }
        if let Some(layout) = parse_var::<InputLayout>("INPUT_LAYOUT")? {
            config.detector.input_layout = layout;
        }
        if let Some(layout) = parse_var::<TensorLayout>("TENSOR_LAYOUT")? {
            config.detector.tensor_layout = layout;
        }
        if let Some(activation) = parse_var::<ScoreActivation>("SCORE_ACTIVATION")? {
            config.detector.score_activation = activation;
        }

        if let Some(smoothing) = parse_var::<f32>("SMOOTHING_FACTOR")? {
            anyhow::ensure!(
                (0.0..=1.0).contains(&smoothing),
                "SMOOTHING_FACTOR must be within [0, 1]"
            );
            config.tracker.smoothing_factor = smoothing;
        }
        if let Some(frames) = parse_var::<u32>("STABILITY_FRAMES")? {
            config.tracker.stability_frames = frames;
        }
        if let Some(timeout_ms) = parse_var::<u64>("TRACKING_TIMEOUT_MS")? {
            config.tracker.timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(interval) = parse_var::<u32>("DETECTION_INTERVAL")? {
            config.scheduler = config.scheduler.with_base_interval(interval);
        }

        Ok(config)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::for_mode(DetectionMode::Balanced)
    }
}

/// `Ok(None)` when `name` is unset or blank.
fn parse_var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {}={:?}: {}", name, raw, e)),
        _ => Ok(None),
    }
}
