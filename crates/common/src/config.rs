use std::env;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn from_env() -> Self {
        match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Throughput/accuracy trade-off the detector and tracker are tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionMode {
    /// 30+ FPS, higher threshold, shorter tracking memory
    Performance,
    #[default]
    Balanced,
    /// Lower threshold, longer tracking memory, more frequent inference
    Quality,
    /// Infrequent inference for power-constrained devices
    BatterySaver,
}

impl DetectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMode::Performance => "performance",
            DetectionMode::Balanced => "balanced",
            DetectionMode::Quality => "quality",
            DetectionMode::BatterySaver => "battery_saver",
        }
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "performance" | "perf" => Ok(DetectionMode::Performance),
            "balanced" => Ok(DetectionMode::Balanced),
            "quality" => Ok(DetectionMode::Quality),
            "battery_saver" | "battery" => Ok(DetectionMode::BatterySaver),
            other => anyhow::bail!("Unknown detection mode: {}", other),
        }
    }
}

/// Scene-specific adjustments layered on top of a [`DetectionMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenePreset {
    Indoor,
    Outdoor,
    CloseRange,
    FarRange,
}

impl FromStr for ScenePreset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "indoor" => Ok(ScenePreset::Indoor),
            "outdoor" => Ok(ScenePreset::Outdoor),
            "close_range" | "close" => Ok(ScenePreset::CloseRange),
            "far_range" | "far" => Ok(ScenePreset::FarRange),
            other => anyhow::bail!("Unknown scene preset: {}", other),
        }
    }
}
