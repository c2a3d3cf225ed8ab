use crate::config::SchedulerConfig;

/// Decides on which rendered frames inference should run.
///
/// The interval grows when many objects are already tracked (little to gain
/// from frequent re-detection) and when nothing is in view.
#[derive(Debug, Clone)]
pub struct DetectionScheduler {
    config: SchedulerConfig,
    interval: u32,
    frame_counter: u64,
}

impl DetectionScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            interval: config.base_interval.clamp(config.min_interval, config.max_interval).max(1),
            config,
            frame_counter: 0,
        }
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Count a rendered frame. True when it falls on the current interval.
    pub fn tick(&mut self) -> bool {
        self.frame_counter += 1;
        self.frame_counter.is_multiple_of(self.interval as u64)
    }

    /// Interval for the given number of live trackers.
    pub fn interval_for(&self, tracked: usize) -> u32 {
        let base = self.config.base_interval;
        let interval = match tracked {
            5.. => base + 2,
            2.. => base + 1,
            1 => base,
            0 => base + 1,
        };
        interval.clamp(self.config.min_interval, self.config.max_interval).max(1)
    }

    /// Re-tune the interval from the number of live trackers.
    pub fn adjust(&mut self, tracked: usize) -> u32 {
        let interval = self.interval_for(tracked);
        if interval != self.interval {
            tracing::debug!(from = self.interval, to = interval, tracked, "Detection interval changed");
            self.interval = interval;
        }
        interval
    }
}
