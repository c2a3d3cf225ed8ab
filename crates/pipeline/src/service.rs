use crate::{config::PipelineConfig, metrics::ServiceMetrics, scheduler::DetectionScheduler};
use detector::{DetectionSummary, Detector, InferenceBackend};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicU64, Ordering},
    mpsc::{self, Receiver, SyncSender},
};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracker::{
    DisplayBox, DisplayFrame, ScreenDetection, ScreenFilter, ScreenFilterConfig, TemporalTracker,
    ViewportTransform,
};

/// A decoded camera image plus the screen geometry it will be shown in.
pub struct CameraFrame {
    /// RGB, 3 bytes per pixel, row-major
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub transform: ViewportTransform,
}

/// State shared between the render thread and the inference worker.
struct Shared {
    busy: AtomicBool,
    closed: AtomicBool,
    tracker: Mutex<TemporalTracker>,
    summary: Mutex<Option<DetectionSummary>>,
}

impl Shared {
    fn new(tracker: TemporalTracker) -> Self {
        Self {
            busy: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            tracker: Mutex::new(tracker),
            summary: Mutex::new(None),
        }
    }

    fn tracker(&self) -> MutexGuard<'_, TemporalTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fold a detection result into the tracker. Returns false, leaving the
    /// tracker untouched, once the service is closed.
    ///
    /// `closed` is read under the tracker lock and only set under it, so a
    /// result is either applied before `close` or not at all.
    fn apply(&self, detections: &[ScreenDetection], now: Instant) -> bool {
        let mut tracker = self.tracker();
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        tracker.update(detections, now);
        true
    }

    /// Mark the service closed. False if it already was.
    fn mark_closed(&self) -> bool {
        let _tracker = self.tracker();
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

/// Runs inference off the render thread, one frame at a time, and keeps the
/// tracked display list up to date.
pub struct DetectionService {
    jobs: Option<SyncSender<CameraFrame>>,
    worker: Option<JoinHandle<()>>,
    shared: Arc<Shared>,
    scheduler: DetectionScheduler,
    metrics: ServiceMetrics,
    /// Tracker generation handed out by the last `display_frame`
    last_displayed: AtomicU64,
}

impl DetectionService {
    pub fn spawn<B>(detector: Detector<B>, config: &PipelineConfig) -> anyhow::Result<Self>
    where
        B: InferenceBackend + Send + 'static,
    {
        let shared = Arc::new(Shared::new(TemporalTracker::new(config.tracker.clone())));
        let metrics = ServiceMetrics::new("arsight", config.mode.as_str());

        // Capacity 1: the busy flag already guarantees at most one queued job
        let (jobs, rx) = mpsc::sync_channel::<CameraFrame>(1);

        let worker = Worker {
            detector,
            screen: config.screen.clone(),
            shared: Arc::clone(&shared),
            metrics: metrics.clone(),
        };
        let handle = thread::Builder::new()
            .name("arsight-detector".to_string())
            .spawn(move || worker.run(rx))?;

        tracing::info!(
            mode = %config.mode,
            interval = config.scheduler.base_interval,
            "Detection service started"
        );

        Ok(Self {
            jobs: Some(jobs),
            worker: Some(handle),
            shared,
            scheduler: DetectionScheduler::new(config.scheduler),
            metrics,
            last_displayed: AtomicU64::new(0),
        })
    }

    /// Call once per rendered frame.
    ///
    /// Evicts stale trackers, re-tunes the detection interval and returns
    /// whether a camera frame should be submitted for this frame.
    pub fn on_render_frame(&mut self, now: Instant) -> bool {
        let due = self.scheduler.tick();

        let tracked = {
            let mut tracker = self.shared.tracker();
            tracker.sweep(now);
            tracker.len()
        };
        self.scheduler.adjust(tracked);

        due && !self.is_busy() && !self.is_closed()
    }

    /// Hand a frame to the worker. Returns false, dropping the frame, when an
    /// inference is already in flight or the service is closed.
    pub fn submit(&self, frame: CameraFrame) -> bool {
        let Some(jobs) = self.jobs.as_ref().filter(|_| !self.is_closed()) else {
            return false;
        };

        if self
            .shared
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.metrics.record_skipped();
            tracing::trace!("Inference in flight, skipping frame");
            return false;
        }

        match jobs.try_send(frame) {
            Ok(()) => true,
            Err(e) => {
                self.shared.busy.store(false, Ordering::Release);
                tracing::warn!(error = %e, "Failed to queue frame");
                false
            }
        }
    }

    /// Smoothed display list from the latest tracker state.
    pub fn display(&self) -> Vec<DisplayBox> {
        self.shared.tracker().snapshot()
    }

    /// Display list for this render frame, flagged `updated` only when a
    /// detection result landed since the previous call.
    pub fn display_frame(&self) -> DisplayFrame {
        let seen = self.last_displayed.load(Ordering::Acquire);
        let frame = self.shared.tracker().display_since(seen);
        self.last_displayed.fetch_max(frame.generation, Ordering::AcqRel);
        frame
    }

    pub fn tracked_count(&self) -> usize {
        self.shared.tracker().len()
    }

    pub fn stable_count(&self) -> usize {
        self.shared.tracker().stable_count()
    }

    /// Detector statistics as of the last completed inference.
    pub fn summary(&self) -> Option<DetectionSummary> {
        *self
            .shared
            .summary
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn interval(&self) -> u32 {
        self.scheduler.interval()
    }

    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Stop accepting frames and wait for the worker. A result still in
    /// flight is discarded.
    pub fn close(&mut self) {
        if !self.shared.mark_closed() {
            return;
        }
        self.jobs.take();

        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            tracing::error!("Detection worker panicked");
        }
        tracing::info!("Detection service closed");
    }
}

impl Drop for DetectionService {
    fn drop(&mut self) {
        self.close();
    }
}

struct Worker<B: InferenceBackend> {
    detector: Detector<B>,
    screen: ScreenFilterConfig,
    shared: Arc<Shared>,
    metrics: ServiceMetrics,
}

impl<B: InferenceBackend> Worker<B> {
    fn run(mut self, jobs: Receiver<CameraFrame>) {
        for frame in jobs {
            self.process(frame);
            self.shared.busy.store(false, Ordering::Release);

            if self.shared.closed.load(Ordering::Acquire) {
                break;
            }
        }
        tracing::debug!("Detection worker exiting");
    }

    fn process(&mut self, frame: CameraFrame) {
        let _span = common::span!("detection_job");
        let start = Instant::now();

        let result = self.detector.try_detect(&frame.pixels, frame.width, frame.height);
        *self
            .shared
            .summary
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(self.detector.summary());

        let detections = match result {
            Ok(detections) => detections,
            Err(e) => {
                // Previous tracker state stays as it was
                tracing::error!(error = %e, "Detection failed");
                return;
            }
        };

        if self.shared.closed.load(Ordering::Acquire) {
            tracing::debug!("Service closed, dropping detection result");
            return;
        }

        let screen = ScreenFilter::new(self.screen.clone(), frame.transform).project(&detections);
        if !self.shared.apply(&screen, Instant::now()) {
            tracing::debug!("Service closed, dropping detection result");
            return;
        }
        self.metrics
            .record_frame(start.elapsed().as_secs_f64(), screen.len());

        tracing::debug!(
            detections = detections.len(),
            on_screen = screen.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Frame processed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker::{ScreenRect, TrackerConfig};

    fn cup() -> ScreenDetection {
        ScreenDetection {
            label: "cup".to_string(),
            confidence: 0.8,
            rect: ScreenRect::new(100, 100, 300, 300),
        }
    }

    #[test]
    fn result_applied_while_open() {
        let shared = Shared::new(TemporalTracker::new(TrackerConfig::default()));

        assert!(shared.apply(&[cup()], Instant::now()));
        assert_eq!(shared.tracker().len(), 1);
    }

    #[test]
    fn result_finishing_after_close_is_dropped() {
        let shared = Shared::new(TemporalTracker::new(TrackerConfig::default()));

        // Worker already past its early closed check when close lands
        assert!(shared.mark_closed());
        assert!(!shared.apply(&[cup()], Instant::now()));

        assert!(shared.tracker().is_empty());
        assert_eq!(shared.tracker().generation(), 0);
    }

    #[test]
    fn close_is_reported_once() {
        let shared = Shared::new(TemporalTracker::new(TrackerConfig::default()));

        assert!(shared.mark_closed());
        assert!(!shared.mark_closed());
    }

    #[test]
    fn close_waits_for_an_update_in_progress() {
        let shared = Arc::new(Shared::new(TemporalTracker::new(TrackerConfig::default())));

        let guard = shared.tracker();
        let closer = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || shared.mark_closed())
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(
            !shared.closed.load(Ordering::Acquire),
            "close must not land while the tracker is locked"
        );
        drop(guard);

        assert!(closer.join().unwrap());
        assert!(shared.closed.load(Ordering::Acquire));
    }
}
