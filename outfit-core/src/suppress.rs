//! Garment-aware non-maximum suppression.
//!
//! Open-vocabulary detectors regularly fire on sub-parts of a garment (a
//! zipper, a logo) with high confidence. Ordering candidates garment-first
//! before the greedy pass keeps the whole garment instead of the fragment.

use std::cmp::Ordering;

use log::debug;

use crate::detection::Detection;

/// Default IoU above which a lower-priority detection is dropped.
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.5;

/// Priority order: garments before details, then higher score, then larger area.
///
/// Ties keep their input order because the sort is stable.
pub fn priority_order(a: &Detection, b: &Detection) -> Ordering {
    b.is_garment()
        .cmp(&a.is_garment())
        .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
        .then_with(|| {
            b.bbox
                .area()
                .partial_cmp(&a.bbox.area())
                .unwrap_or(Ordering::Equal)
        })
}

/// Greedy NMS over `detections` in [`priority_order`].
///
/// A detection is kept unless its IoU with an already-kept detection exceeds
/// `iou_threshold`. Suppressed detections are dropped, never merged. The
/// output is sorted by priority, so running it again is a no-op.
pub fn suppress(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(priority_order);

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for detection in detections {
        match kept
            .iter()
            .find(|k| detection.bbox.iou(&k.bbox) > iou_threshold)
        {
            Some(winner) => debug!(
                "Suppressed '{}' ({:.2}) in favour of '{}' ({:.2})",
                detection.phrase, detection.score, winner.phrase, winner.score
            ),
            None => kept.push(detection),
        }
    }
    kept
}
