pub mod config;
pub mod error;
pub mod filter;
pub mod tracker;
pub mod viewport;

pub use config::TrackerConfig;
pub use error::TrackerError;
pub use filter::{
    ObjectSettings, Priority, ScreenDetection, ScreenFilter, ScreenFilterConfig, ScreenRejection,
};
pub use tracker::{DisplayBox, DisplayFrame, TemporalTracker, TrackedObject};
pub use viewport::{Rotation, ScreenRect, ViewportTransform};
