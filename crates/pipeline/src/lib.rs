pub mod config;
pub mod metrics;
pub mod scheduler;
pub mod service;

pub use config::{PipelineConfig, SchedulerConfig};
pub use scheduler::DetectionScheduler;
pub use service::{CameraFrame, DetectionService};
