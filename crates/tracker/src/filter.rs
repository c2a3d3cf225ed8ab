//! Second-stage filtering on screen-space boxes, after rotation mapping.

use crate::viewport::{ScreenRect, ViewportTransform};
use common::{DetectionMode, ScenePreset};
use detector::Detection;

/// A detection projected onto the viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenDetection {
    pub label: String,
    pub confidence: f32,
    pub rect: ScreenRect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Per-label thresholds for common COCO classes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectSettings {
    pub min_confidence: f32,
    pub min_size: i32,
    pub preferred_aspect_ratio: f32,
    pub priority: Priority,
}

impl ObjectSettings {
    /// Settings for `label` (case-insensitive), or the filter's own defaults
    /// for labels without dedicated tuning.
    pub fn for_label(label: &str, defaults: &ScreenFilterConfig) -> Self {
        let (min_confidence, min_size, preferred_aspect_ratio, priority) =
            match label.to_lowercase().as_str() {
                "person" => (0.40, 50, 0.5, Priority::High),
                "car" | "truck" | "bus" => (0.45, 60, 1.5, Priority::High),
                "cell phone" | "phone" => (0.35, 30, 0.6, Priority::Medium),
                "laptop" | "computer" => (0.40, 50, 1.4, Priority::Medium),
                "cup" | "bottle" | "glass" => (0.30, 25, 0.4, Priority::Low),
                "chair" | "couch" => (0.40, 60, 1.0, Priority::Medium),
                _ => (
                    defaults.confidence_threshold,
                    defaults.min_box_size,
                    1.0,
                    Priority::Medium,
                ),
            };

        Self {
            min_confidence,
            min_size,
            preferred_aspect_ratio,
            priority,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenFilterConfig {
    pub confidence_threshold: f32,
    /// Minimum width and height in screen pixels
    pub min_box_size: i32,
    pub min_aspect_ratio: f32,
    pub max_aspect_ratio: f32,
    /// Largest accepted box area as a fraction of the viewport
    pub max_area_ratio: f32,
    pub min_area: i64,
    /// Use [`ObjectSettings`] thresholds instead of the global ones
    pub label_overrides: bool,
}

impl ScreenFilterConfig {
    pub fn for_mode(mode: DetectionMode) -> Self {
        let confidence_threshold = match mode {
            DetectionMode::Performance => 0.40,
            DetectionMode::Balanced => 0.35,
            DetectionMode::Quality => 0.30,
            DetectionMode::BatterySaver => 0.45,
        };

        Self {
            confidence_threshold,
            min_box_size: 30,
            min_aspect_ratio: 0.1,
            max_aspect_ratio: 10.0,
            max_area_ratio: 0.90,
            min_area: 100,
            label_overrides: false,
        }
    }

    /// Override confidence and minimum box size for a scene.
    pub fn with_preset(mut self, preset: ScenePreset) -> Self {
        let (confidence_threshold, min_box_size) = match preset {
            ScenePreset::Indoor => (0.35, 30),
            ScenePreset::Outdoor => (0.40, 40),
            ScenePreset::CloseRange => (0.30, 25),
            ScenePreset::FarRange => (0.45, 20),
        };
        self.confidence_threshold = confidence_threshold;
        self.min_box_size = min_box_size;
        self
    }

    pub fn with_label_overrides(mut self, enabled: bool) -> Self {
        self.label_overrides = enabled;
        self
    }
}

impl Default for ScreenFilterConfig {
    fn default() -> Self {
        Self::for_mode(DetectionMode::Balanced)
    }
}

/// Why a screen-space box was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenRejection {
    LowConfidence,
    TooSmall,
    AspectRatio,
    /// Covers most of the viewport, usually a misfire on the whole scene
    TooLarge,
    TinyArea,
}

/// Projects a frame's detections onto the viewport and drops boxes that are
/// implausible on screen.
#[derive(Debug, Clone)]
pub struct ScreenFilter {
    config: ScreenFilterConfig,
    transform: ViewportTransform,
}

impl ScreenFilter {
    pub fn new(config: ScreenFilterConfig, transform: ViewportTransform) -> Self {
        Self { config, transform }
    }

    pub fn config(&self) -> &ScreenFilterConfig {
        &self.config
    }

    pub fn transform(&self) -> &ViewportTransform {
        &self.transform
    }

    fn thresholds(&self, label: &str) -> (f32, i32) {
        if self.config.label_overrides {
            let settings = ObjectSettings::for_label(label, &self.config);
            (settings.min_confidence, settings.min_size)
        } else {
            (self.config.confidence_threshold, self.config.min_box_size)
        }
    }

    /// Map one detection, or report why it is rejected.
    pub fn check(&self, detection: &Detection) -> Result<ScreenDetection, ScreenRejection> {
        let (min_confidence, min_size) = self.thresholds(&detection.label);
        if !(detection.confidence >= min_confidence) {
            return Err(ScreenRejection::LowConfidence);
        }

        let rect = self.transform.map(&detection.rect);
        let (w, h) = (rect.width(), rect.height());
        if w < min_size || h < min_size {
            return Err(ScreenRejection::TooSmall);
        }

        let aspect_ratio = w as f32 / h as f32;
        if !(self.config.min_aspect_ratio..=self.config.max_aspect_ratio).contains(&aspect_ratio)
        {
            return Err(ScreenRejection::AspectRatio);
        }

        let area = rect.area();
        if area as f64 > self.transform.viewport_area() as f64 * self.config.max_area_ratio as f64 {
            return Err(ScreenRejection::TooLarge);
        }
        if area < self.config.min_area {
            return Err(ScreenRejection::TinyArea);
        }

        Ok(ScreenDetection {
            label: detection.label.clone(),
            confidence: detection.confidence,
            rect,
        })
    }

    pub fn project(&self, detections: &[Detection]) -> Vec<ScreenDetection> {
        let projected: Vec<ScreenDetection> = detections
            .iter()
            .filter_map(|det| match self.check(det) {
                Ok(screen) => Some(screen),
                Err(reason) => {
                    tracing::trace!(label = %det.label, ?reason, "Screen box rejected");
                    None
                }
            })
            .collect();

        tracing::debug!(
            input = detections.len(),
            kept = projected.len(),
            "Projected detections onto viewport"
        );
        projected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::Rotation;
    use detector::NormalizedRect;

    fn detection(label: &str, confidence: f32, rect: [f32; 4]) -> Detection {
        Detection {
            label: label.to_string(),
            class_id: 0,
            confidence,
            rect: NormalizedRect::new(rect[0], rect[1], rect[2], rect[3]),
        }
    }

    /// 1000x1000 viewport over a 1000x1000 image: normalised units map to
    /// thousandths of the screen.
    fn filter(config: ScreenFilterConfig) -> ScreenFilter {
        let transform = ViewportTransform::new(1000, 1000, 1000, 1000, Rotation::Deg0).unwrap();
        ScreenFilter::new(config, transform)
    }

    #[test]
    fn test_accepts_plausible_box() {
        let f = filter(ScreenFilterConfig::default());
        let screen = f.check(&detection("cup", 0.8, [0.1, 0.1, 0.2, 0.3])).unwrap();
        assert_eq!(screen.rect, ScreenRect::new(100, 100, 200, 300));
        assert_eq!(screen.label, "cup");
    }

    #[test]
    fn test_rejections() {
        let f = filter(ScreenFilterConfig::default());
        let cases = [
            (detection("cup", 0.2, [0.1, 0.1, 0.2, 0.2]), ScreenRejection::LowConfidence),
            (detection("cup", 0.9, [0.1, 0.1, 0.12, 0.2]), ScreenRejection::TooSmall),
            (detection("cup", 0.9, [0.0, 0.1, 0.95, 0.14]), ScreenRejection::AspectRatio),
            (detection("cup", 0.9, [0.0, 0.0, 0.99, 0.99]), ScreenRejection::TooLarge),
        ];
        for (det, expected) in cases {
            assert_eq!(f.check(&det), Err(expected), "{:?}", det.rect);
        }
    }

    #[test]
    fn test_tiny_area_with_small_min_size() {
        let config = ScreenFilterConfig {
            min_box_size: 5,
            ..ScreenFilterConfig::default()
        };
        let f = filter(config);
        // 8x8 px passes the size check but not the 100 px² floor
        let det = detection("cup", 0.9, [0.1, 0.1, 0.108, 0.108]);
        assert_eq!(f.check(&det), Err(ScreenRejection::TinyArea));
    }

    #[test]
    fn test_label_overrides() {
        let base = ScreenFilterConfig::default();
        // 40x40 px person at 0.38: passes global thresholds, fails person settings
        let person = detection("person", 0.38, [0.1, 0.1, 0.14, 0.14]);

        assert!(filter(base.clone()).check(&person).is_ok());
        assert!(filter(base.with_label_overrides(true)).check(&person).is_err());
    }

    #[test]
    fn test_object_settings_lookup() {
        let defaults = ScreenFilterConfig::default();

        let phone = ObjectSettings::for_label("Cell Phone", &defaults);
        assert_eq!((phone.min_confidence, phone.min_size), (0.35, 30));

        let bus = ObjectSettings::for_label("bus", &defaults);
        assert_eq!(bus.priority, Priority::High);
        assert_eq!(bus.min_size, 60);

        let kite = ObjectSettings::for_label("kite", &defaults);
        assert_eq!(kite.min_confidence, defaults.confidence_threshold);
        assert_eq!(kite.min_size, defaults.min_box_size);
    }

    #[test]
    fn test_presets() {
        let far = ScreenFilterConfig::default().with_preset(ScenePreset::FarRange);
        assert_eq!((far.confidence_threshold, far.min_box_size), (0.45, 20));

        let close = ScreenFilterConfig::default().with_preset(ScenePreset::CloseRange);
        assert_eq!((close.confidence_threshold, close.min_box_size), (0.30, 25));
    }

    #[test]
    fn test_project_keeps_order_of_survivors() {
        let f = filter(ScreenFilterConfig::default());
        let detections = [
            detection("laptop", 0.9, [0.5, 0.5, 0.8, 0.7]),
            detection("cup", 0.1, [0.1, 0.1, 0.2, 0.2]),
            detection("cup", 0.6, [0.1, 0.1, 0.2, 0.2]),
        ];

        let projected = f.project(&detections);

        let labels: Vec<&str> = projected.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, ["laptop", "cup"]);
    }
}
