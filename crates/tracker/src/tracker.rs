use crate::config::TrackerConfig;
use crate::filter::ScreenDetection;
use crate::viewport::ScreenRect;
use std::collections::BTreeMap;
use std::time::Instant;

/// Floating-point screen rectangle that trails the raw detections.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SmoothedRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl SmoothedRect {
    /// Move each edge `factor` of the way towards `target`.
    pub fn approach(&mut self, target: &ScreenRect, factor: f32) {
        self.left += (target.left as f32 - self.left) * factor;
        self.top += (target.top as f32 - self.top) * factor;
        self.right += (target.right as f32 - self.right) * factor;
        self.bottom += (target.bottom as f32 - self.bottom) * factor;
    }

    pub fn to_screen(&self) -> ScreenRect {
        ScreenRect::new(
            self.left.round() as i32,
            self.top.round() as i32,
            self.right.round() as i32,
            self.bottom.round() as i32,
        )
    }
}

impl From<ScreenRect> for SmoothedRect {
    fn from(rect: ScreenRect) -> Self {
        Self {
            left: rect.left as f32,
            top: rect.top as f32,
            right: rect.right as f32,
            bottom: rect.bottom as f32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    pub id: String,
    pub label: String,
    /// Displayed confidence: the running average, boosted once stable
    pub confidence: f32,
    pub avg_confidence: f32,
    /// Latest raw rectangle
    pub rect: ScreenRect,
    pub smoothed: SmoothedRect,
    pub last_seen: Instant,
    pub detection_count: u32,
    pub stable: bool,
}

/// One entry of the list handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayBox {
    pub id: String,
    pub label: String,
    pub confidence: f32,
    pub rect: ScreenRect,
    pub stable: bool,
}

/// Display list together with the tracker generation it was taken at.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayFrame {
    pub boxes: Vec<DisplayBox>,
    pub generation: u64,
    /// True when a detection result was folded in since the generation the
    /// caller last saw; false when the list is reused state
    pub updated: bool,
}

/// Tracker id: label plus the grid cell holding the rectangle centre.
///
/// Cell sizes below one pixel are treated as one.
pub fn tracker_id(label: &str, rect: &ScreenRect, grid_size: i32) -> String {
    let grid_size = grid_size.max(1);
    let (cx, cy) = rect.center();
    let gx = cx.div_euclid(grid_size);
    let gy = cy.div_euclid(grid_size);
    format!("{label}_{gx}_{gy}")
}

/// Frame-to-frame association of screen detections by label and grid cell.
///
/// Not synchronised; callers sharing it across threads wrap it in a mutex.
#[derive(Debug, Clone)]
pub struct TemporalTracker {
    config: TrackerConfig,
    objects: BTreeMap<String, TrackedObject>,
    generation: u64,
}

impl TemporalTracker {
    pub fn new(mut config: TrackerConfig) -> Self {
        if config.grid_size < 1 {
            tracing::warn!(grid_size = config.grid_size, "Grid size must be positive, using 1");
            config.grid_size = 1;
        }

        Self {
            config,
            objects: BTreeMap::new(),
            generation: 0,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Fold one frame of detections into the tracked set, then evict stale
    /// objects.
    pub fn update(&mut self, detections: &[ScreenDetection], now: Instant) {
        let mut created = 0usize;

        for det in detections {
            let id = tracker_id(&det.label, &det.rect, self.config.grid_size);

            match self.objects.get_mut(&id) {
                Some(tracked) => {
                    let history = self.config.confidence_history_weight;

                    tracked.rect = det.rect;
                    tracked.smoothed.approach(&det.rect, self.config.smoothing_factor);
                    tracked.last_seen = now;
                    tracked.detection_count += 1;
                    tracked.avg_confidence =
                        tracked.avg_confidence * history + det.confidence * (1.0 - history);
                    tracked.stable = tracked.detection_count >= self.config.stability_frames;
                    tracked.confidence = if tracked.stable {
                        (tracked.avg_confidence + self.config.confidence_boost).min(1.0)
                    } else {
                        tracked.avg_confidence
                    };
                }
                None => {
                    created += 1;
                    self.objects.insert(
                        id.clone(),
                        TrackedObject {
                            id,
                            label: det.label.clone(),
                            confidence: det.confidence,
                            avg_confidence: det.confidence,
                            rect: det.rect,
                            smoothed: SmoothedRect::from(det.rect),
                            last_seen: now,
                            detection_count: 1,
                            stable: 1 >= self.config.stability_frames,
                        },
                    );
                }
            }
        }

        let evicted = self.sweep(now);
        self.generation += 1;

        tracing::debug!(
            detections = detections.len(),
            created,
            evicted,
            tracked = self.objects.len(),
            "Tracker updated"
        );
    }

    /// Drop every object not seen for longer than the timeout. Returns the
    /// number removed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let timeout = self.config.timeout;
        let before = self.objects.len();
        self.objects
            .retain(|_, tracked| now.saturating_duration_since(tracked.last_seen) <= timeout);
        before - self.objects.len()
    }

    /// Current display list, highest confidence first. Safe to call on
    /// frames where no detection ran.
    pub fn snapshot(&self) -> Vec<DisplayBox> {
        let mut boxes: Vec<DisplayBox> = self
            .objects
            .values()
            .map(|tracked| DisplayBox {
                id: tracked.id.clone(),
                label: tracked.label.clone(),
                confidence: tracked.confidence,
                rect: tracked.smoothed.to_screen(),
                stable: tracked.stable,
            })
            .collect();
        boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        boxes
    }

    /// Number of detection results folded in so far. Sweeps alone do not
    /// advance it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Snapshot plus whether it is newer than `seen_generation`.
    pub fn display_since(&self, seen_generation: u64) -> DisplayFrame {
        DisplayFrame {
            boxes: self.snapshot(),
            generation: self.generation,
            updated: self.generation > seen_generation,
        }
    }

    pub fn get(&self, id: &str) -> Option<&TrackedObject> {
        self.objects.get(id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn stable_count(&self) -> usize {
        self.objects.values().filter(|t| t.stable).count()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

impl Default for TemporalTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn det(label: &str, confidence: f32, rect: (i32, i32, i32, i32)) -> ScreenDetection {
        ScreenDetection {
            label: label.to_string(),
            confidence,
            rect: ScreenRect::new(rect.0, rect.1, rect.2, rect.3),
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    // ========== Identity ==========

    #[test]
    fn tracker_id_uses_label_and_grid_cell() {
        let rect = ScreenRect::new(100, 200, 200, 300); // centre (150, 250)
        assert_eq!(tracker_id("cup", &rect, 100), "cup_1_2");
    }

    #[test]
    fn redetection_in_same_cell_reuses_id() {
        let mut tracker = TemporalTracker::default();
        let t0 = Instant::now();

        tracker.update(&[det("cup", 0.6, (100, 100, 200, 200))], t0);
        let t1 = t0 + Duration::from_millis(300);
        tracker.update(&[det("cup", 0.6, (110, 105, 210, 195))], t1);

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.get("cup_1_1").unwrap().detection_count, 2);
    }

    #[test]
    fn different_label_same_cell_is_separate() {
        let mut tracker = TemporalTracker::default();
        let t0 = Instant::now();

        tracker.update(
            &[
                det("cup", 0.6, (100, 100, 200, 200)),
                det("bottle", 0.6, (100, 100, 200, 200)),
            ],
            t0,
        );

        assert_eq!(tracker.len(), 2);
    }

    // ========== Smoothing ==========

    #[test]
    fn smoothing_moves_exactly_factor_towards_new_rect() {
        let mut tracker = TemporalTracker::default();
        let t0 = Instant::now();

        tracker.update(&[det("cup", 0.6, (100, 100, 200, 200))], t0);
        let t1 = t0 + Duration::from_millis(100);
        tracker.update(&[det("cup", 0.6, (120, 90, 220, 210))], t1);

        let tracked = tracker.get("cup_1_1").unwrap();
        let s = tracked.smoothed;
        assert!(approx(s.left, 107.0), "{:?}", s);
        assert!(approx(s.top, 96.5), "{:?}", s);
        assert!(approx(s.right, 207.0), "{:?}", s);
        assert!(approx(s.bottom, 203.5), "{:?}", s);
        assert_eq!(tracked.rect, ScreenRect::new(120, 90, 220, 210), "Raw rect is latest");
    }

    #[test]
    fn new_object_starts_at_raw_rect() {
        let mut tracker = TemporalTracker::default();
        tracker.update(&[det("cup", 0.6, (10, 20, 60, 90))], Instant::now());

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].rect, ScreenRect::new(10, 20, 60, 90));
        assert!(!snapshot[0].stable);
    }

    // ========== Confidence & Stability ==========

    #[test]
    fn confidence_is_exponentially_averaged() {
        let mut tracker = TemporalTracker::default();
        let t0 = Instant::now();

        tracker.update(&[det("cup", 0.5, (100, 100, 200, 200))], t0);
        tracker.update(&[det("cup", 0.9, (100, 100, 200, 200))], t0);

        let tracked = tracker.get("cup_1_1").unwrap();
        assert!(approx(tracked.avg_confidence, 0.62));
        assert!(approx(tracked.confidence, 0.62), "Not stable yet, no boost");
    }

    #[test]
    fn becomes_stable_after_threshold_and_boosts_confidence() {
        let mut tracker = TemporalTracker::default();
        let t0 = Instant::now();

        for i in 0..3 {
            let now = t0 + Duration::from_millis(i * 100);
            tracker.update(&[det("cup", 0.8, (100, 100, 200, 200))], now);
        }

        let tracked = tracker.get("cup_1_1").unwrap();
        assert!(tracked.stable);
        assert_eq!(tracked.detection_count, 3);
        assert!(approx(tracked.confidence, 0.85));
        assert_eq!(tracker.stable_count(), 1);
    }

    #[test]
    fn boosted_confidence_is_clamped() {
        let mut tracker = TemporalTracker::default();
        let t0 = Instant::now();

        for _ in 0..4 {
            tracker.update(&[det("cup", 0.99, (100, 100, 200, 200))], t0);
        }

        assert_eq!(tracker.get("cup_1_1").unwrap().confidence, 1.0);
    }

    // ========== Eviction ==========

    #[test]
    fn stale_object_is_evicted() {
        let mut tracker = TemporalTracker::default();
        let t0 = Instant::now();

        tracker.update(&[det("cup", 0.6, (100, 100, 200, 200))], t0);
        let at_timeout = t0 + Duration::from_millis(2500);
        assert_eq!(tracker.sweep(at_timeout), 0, "At timeout is kept");

        let evicted = tracker.sweep(t0 + Duration::from_millis(2501));

        assert_eq!(evicted, 1);
        assert!(tracker.snapshot().is_empty());
    }

    #[test]
    fn update_sweeps_other_stale_objects() {
        let mut tracker = TemporalTracker::default();
        let t0 = Instant::now();

        tracker.update(&[det("cup", 0.6, (100, 100, 200, 200))], t0);
        let t1 = t0 + Duration::from_secs(3);
        tracker.update(&[det("laptop", 0.7, (500, 500, 800, 700))], t1);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].label, "laptop");
    }

    #[test]
    fn empty_frame_keeps_state_until_timeout() {
        let mut tracker = TemporalTracker::default();
        let t0 = Instant::now();

        tracker.update(&[det("cup", 0.6, (100, 100, 200, 200))], t0);
        tracker.update(&[], t0 + Duration::from_secs(1));

        assert_eq!(tracker.len(), 1, "Failed or empty frames do not clear trackers");
    }

    #[test]
    fn snapshot_sorted_by_confidence() {
        let mut tracker = TemporalTracker::default();
        tracker.update(
            &[
                det("cup", 0.4, (0, 0, 50, 50)),
                det("laptop", 0.9, (300, 300, 600, 500)),
                det("person", 0.7, (700, 100, 900, 600)),
            ],
            Instant::now(),
        );

        let labels: Vec<String> = tracker.snapshot().into_iter().map(|b| b.label).collect();
        assert_eq!(labels, ["laptop", "person", "cup"]);
    }

    // ========== Display Generations ==========

    #[test]
    fn display_reuse_is_distinguishable_from_update() {
        let mut tracker = TemporalTracker::default();
        let t0 = Instant::now();

        let initial = tracker.display_since(0);
        assert!(!initial.updated);
        assert_eq!(initial.generation, 0);

        tracker.update(&[det("cup", 0.6, (100, 100, 200, 200))], t0);
        let fresh = tracker.display_since(initial.generation);
        assert!(fresh.updated);
        assert_eq!(fresh.boxes.len(), 1);

        // Render frame without a detection: same state, flagged as reused
        tracker.sweep(t0 + Duration::from_millis(500));
        let reused = tracker.display_since(fresh.generation);
        assert!(!reused.updated);
        assert_eq!(reused.generation, fresh.generation);
        assert_eq!(reused.boxes, fresh.boxes);
    }

    #[test]
    fn empty_detection_result_still_counts_as_update() {
        let mut tracker = TemporalTracker::default();
        tracker.update(&[], Instant::now());

        assert_eq!(tracker.generation(), 1);
        assert!(tracker.display_since(0).updated);
    }

    // ========== Configuration Guards ==========

    #[test]
    fn zero_grid_size_does_not_panic() {
        let config = TrackerConfig {
            grid_size: 0,
            ..TrackerConfig::default()
        };
        let mut tracker = TemporalTracker::new(config);
        assert_eq!(tracker.config().grid_size, 1);

        tracker.update(&[det("cup", 0.6, (100, 100, 200, 200))], Instant::now());
        assert!(tracker.get("cup_150_150").is_some());

        let rect = ScreenRect::new(0, 0, 10, 10);
        assert_eq!(tracker_id("cup", &rect, -5), "cup_5_5");
    }
}
