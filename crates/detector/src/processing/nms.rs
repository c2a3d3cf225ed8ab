use crate::types::Detection;
use std::collections::BTreeMap;

/// Non-maximum suppression run independently per label.
///
/// Within a label, the highest-confidence remaining box is kept and every other
/// box of that label with IoU strictly above `iou_threshold` is discarded.
/// Boxes of different labels never suppress each other. The result is sorted by
/// confidence, highest first; equal confidences keep label order.
pub fn class_aware_nms(detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    if detections.is_empty() {
        return detections;
    }

    let mut by_label: BTreeMap<String, Vec<Detection>> = BTreeMap::new();
    for detection in detections {
        by_label
            .entry(detection.label.clone())
            .or_default()
            .push(detection);
    }

    let mut kept = Vec::new();
    for (_, group) in by_label {
        kept.extend(suppress(group, iou_threshold));
    }

    kept.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    kept
}

fn suppress(mut group: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    group.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::with_capacity(group.len());
    for candidate in group {
        let overlaps = keep
            .iter()
            .any(|kept| kept.rect.iou(&candidate.rect) > iou_threshold);
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}
