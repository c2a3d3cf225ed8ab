use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};

/// Instruments recorded by the detection service. Cheap to clone; clones
/// share the same underlying instruments.
#[derive(Clone)]
pub struct ServiceMetrics {
    duration: Histogram<f64>,
    frames: Counter<u64>,
    skipped: Counter<u64>,
    detections: Counter<u64>,
    attributes: Vec<KeyValue>,
}

impl ServiceMetrics {
    /// Build the instruments from the global meter provider. Without a
    /// provider installed by the host, recording is a no-op.
    pub fn new(meter_name: &'static str, mode: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.005, 0.01, 0.02, 0.03, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 1.0,
        ];

        Self {
            duration: meter
                .f64_histogram("arsight_inference_duration_seconds")
                .with_description("Time to run one frame through detection and tracking")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            frames: meter
                .u64_counter("arsight_frames_total")
                .with_description("Total frames sent to inference")
                .build(),
            skipped: meter
                .u64_counter("arsight_frames_skipped_total")
                .with_description("Frames dropped because an inference was already in flight")
                .build(),
            detections: meter
                .u64_counter("arsight_detections_total")
                .with_description("Total screen detections handed to the tracker")
                .build(),
            attributes: vec![KeyValue::new("mode", mode)],
        }
    }

    pub fn record_frame(&self, elapsed_secs: f64, detections: usize) {
        self.duration.record(elapsed_secs, &self.attributes);
        self.frames.add(1, &self.attributes);
        self.detections.add(detections as u64, &self.attributes);
    }

    pub fn record_skipped(&self) {
        self.skipped.add(1, &self.attributes);
    }
}
