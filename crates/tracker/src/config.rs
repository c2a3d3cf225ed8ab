use common::{DetectionMode, ScenePreset};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Cell size in screen pixels of the grid used to build tracker ids
    pub grid_size: i32,
    /// Weight of the new raw rectangle in the smoothed one
    pub smoothing_factor: f32,
    /// Detections before a tracked object counts as stable
    pub stability_frames: u32,
    /// Added to the displayed confidence once stable, capped at 1.0
    pub confidence_boost: f32,
    pub timeout: Duration,
    /// Weight of the running average when blending in a new confidence
    pub confidence_history_weight: f32,
}

impl TrackerConfig {
    pub fn for_mode(mode: DetectionMode) -> Self {
        let (timeout_ms, smoothing_factor, stability_frames) = match mode {
            DetectionMode::Performance => (2000, 0.40, 2),
            DetectionMode::Balanced => (2500, 0.35, 3),
            DetectionMode::Quality => (3000, 0.30, 4),
            DetectionMode::BatterySaver => (2000, 0.40, 2),
        };

        Self {
            grid_size: 100,
            smoothing_factor,
            stability_frames,
            confidence_boost: 0.05,
            timeout: Duration::from_millis(timeout_ms),
            confidence_history_weight: 0.7,
        }
    }

    /// Override smoothing and timeout for a scene.
    pub fn with_preset(mut self, preset: ScenePreset) -> Self {
        let (smoothing_factor, timeout_ms) = match preset {
            ScenePreset::Indoor => (0.35, 2500),
            ScenePreset::Outdoor => (0.40, 2000),
            ScenePreset::CloseRange => (0.30, 3000),
            ScenePreset::FarRange => (0.35, 2000),
        };
        self.smoothing_factor = smoothing_factor;
        self.timeout = Duration::from_millis(timeout_ms);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_smoothing_factor(mut self, smoothing_factor: f32) -> Self {
        self.smoothing_factor = smoothing_factor;
        self
    }

    pub fn with_stability_frames(mut self, stability_frames: u32) -> Self {
        self.stability_frames = stability_frames;
        self
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::for_mode(DetectionMode::Balanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.grid_size, 100);
        assert_eq!(config.smoothing_factor, 0.35);
        assert_eq!(config.stability_frames, 3);
        assert_eq!(config.confidence_boost, 0.05);
        assert_eq!(config.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_leaner_modes_time_out_sooner() {
        let balanced = TrackerConfig::for_mode(DetectionMode::Balanced);
        for mode in [DetectionMode::Performance, DetectionMode::BatterySaver] {
            let lean = TrackerConfig::for_mode(mode);
            assert!(lean.timeout < balanced.timeout, "{} timeout", mode);
            assert!(lean.stability_frames < balanced.stability_frames);
        }
        assert_eq!(
            TrackerConfig::for_mode(DetectionMode::Quality).timeout,
            Duration::from_millis(3000)
        );
    }

    #[test]
    fn test_preset_overrides_smoothing_and_timeout() {
        let config = TrackerConfig::for_mode(DetectionMode::Quality).with_preset(ScenePreset::Outdoor);
        assert_eq!(config.smoothing_factor, 0.40);
        assert_eq!(config.timeout, Duration::from_millis(2000));
        assert_eq!(config.stability_frames, 4, "Preset keeps the mode's stability");
    }
}
