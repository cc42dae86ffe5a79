//! Clothing detection reconciliation engine.
//!
//! Given an image and the list of items a describer expects in it, this
//! crate asks an injected open-vocabulary detector to locate them, removes
//! duplicate boxes, reconciles detections with expectations, retries for
//! anything still missing, and gates the matches into crop boxes.

/// Garment categories parsed from free text and their fallback relations.
pub mod category;
/// Detector output adapters and the expected-item model.
pub mod detection;
/// External model contracts and the replay detector.
pub mod detector;
pub mod error;
/// Quality gate and crop extraction.
pub mod gate;
/// Box arithmetic: IoU, clipping, margins and mask bounds.
pub mod geometry;
/// Bounded retry loop around the detector.
pub mod orchestrator;
/// Full per-image pipeline and batch driver.
pub mod pipeline;
pub mod prompt;
/// Count reconciliation between detections and expected items.
pub mod reconcile;
pub mod similarity;
/// Garment-first duplicate suppression.
pub mod suppress;

pub use category::GarmentCategory;
pub use detection::{Detection, ExpectedItem, ItemId, RawBox, RawDetection, prepare_detections};
pub use detector::{DetectionScript, MaskRefiner, ObjectDetector, ReplayDetector};
pub use error::PipelineError;
pub use gate::{
    CropResult, FilterReason, FilteredItem, GateConfig, GateDecision, QualityGate, extract_crop,
};
pub use geometry::{BoundingBox, Mask, PixelRect, clip, crop_ratio, iou, mask_to_bbox};
pub use orchestrator::{
    AttemptRecord, Completion, PipelineRun, RetryConfig, RetryOrchestrator, RunParts, RunState,
};
pub use pipeline::{
    BatchJob, BatchOutcome, MissingItem, OutfitPipeline, PipelineConfig, PipelineReport,
    process_batch,
};
pub use prompt::build_prompt;
pub use reconcile::{MatchedPair, ReconcileBranch, ReconcileConfig, ReconcileOutcome, Reconciler};
pub use similarity::similarity;
pub use suppress::{priority_order, suppress};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
