pub mod config;
pub mod logging;

pub use config::{DetectionMode, Environment, ScenePreset};
pub use logging::setup_logging;
