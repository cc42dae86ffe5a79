//! End-to-end driver: retry loop, quality gate, and the per-image report.

use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use log::{Level, info, warn};
use outfit_utils::{config::AppSettings, stage_timer};
use rayon::prelude::*;
use serde::Serialize;

use crate::detection::{ExpectedItem, ItemId};
use crate::detector::{MaskRefiner, ObjectDetector};
use crate::error::PipelineError;
use crate::gate::{CropResult, FilteredItem, GateConfig, GateDecision, QualityGate};
use crate::orchestrator::{AttemptRecord, Completion, RetryConfig, RetryOrchestrator};
use crate::reconcile::{ReconcileConfig, Reconciler};

/// Every tunable of the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub retry: RetryConfig,
    pub reconcile: ReconcileConfig,
    pub gate: GateConfig,
}

impl From<&AppSettings> for PipelineConfig {
    fn from(settings: &AppSettings) -> Self {
        Self {
            retry: RetryConfig::from(&settings.detection),
            reconcile: ReconcileConfig::from((&settings.detection, &settings.reconcile)),
            gate: GateConfig::from(&settings.crop),
        }
    }
}

/// An expected item that no detection satisfied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingItem {
    pub item: ItemId,
    pub label: String,
}

/// Result of processing one image.
///
/// Every expected item appears in exactly one of `crops`, `filtered` or
/// `missing`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    /// Number of expected items supplied.
    pub expected: usize,
    pub crops: Vec<CropResult>,
    pub filtered: Vec<FilteredItem>,
    pub missing: Vec<MissingItem>,
    /// Detector calls made.
    pub attempts: u32,
    pub completion: Completion,
    pub trace: Vec<AttemptRecord>,
}

impl PipelineReport {
    /// Whether crops, filtered and missing items partition the expected list.
    pub fn is_balanced(&self) -> bool {
        let mut ids: Vec<usize> = self
            .crops
            .iter()
            .map(|c| c.item.0)
            .chain(self.filtered.iter().map(|f| f.item.0))
            .chain(self.missing.iter().map(|m| m.item.0))
            .collect();
        ids.sort_unstable();
        ids.len() == self.expected && ids.iter().copied().eq(0..self.expected)
    }
}

/// Runs the full pipeline against injected models.
pub struct OutfitPipeline<'a> {
    detector: &'a dyn ObjectDetector,
    refiner: Option<&'a dyn MaskRefiner>,
    config: PipelineConfig,
}

impl<'a> OutfitPipeline<'a> {
    pub fn new(detector: &'a dyn ObjectDetector, config: PipelineConfig) -> Self {
        Self {
            detector,
            refiner: None,
            config,
        }
    }

    /// Tighten boxes with `refiner` before gating.
    pub fn with_refiner(mut self, refiner: &'a dyn MaskRefiner) -> Self {
        self.refiner = Some(refiner);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Locate, reconcile and gate `items` in `image`.
    pub fn process(
        &self,
        image: &DynamicImage,
        items: Vec<ExpectedItem>,
    ) -> Result<PipelineReport, PipelineError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidImage { width, height });
        }

        let orchestrator = RetryOrchestrator::new(
            self.detector,
            Reconciler::new(self.config.reconcile.clone()),
            self.config.retry.clone(),
        );
        let run = orchestrator.run(image, items)?;
        let attempts = run.attempts_made();
        let parts = run.into_parts();

        let gate = QualityGate::new(self.config.gate.clone());
        let mut crops = Vec::new();
        let mut filtered = Vec::new();
        {
            let _timer = stage_timer("outfit_core::gate", Level::Debug);
            for pair in &parts.matched {
                let description = parts
                    .items
                    .get(pair.item.0)
                    .and_then(|item| item.description.as_deref());
                match gate.evaluate(image, pair, description, self.refiner) {
                    GateDecision::Accepted(crop) => crops.push(crop),
                    GateDecision::Filtered(item) => filtered.push(item),
                }
            }
        }
        crops.sort_by_key(|c| c.item);
        filtered.sort_by_key(|f| f.item);

        let missing: Vec<MissingItem> = parts
            .still_missing
            .iter()
            .map(|&id| MissingItem {
                item: id,
                label: parts
                    .items
                    .get(id.0)
                    .map(|item| item.label.clone())
                    .unwrap_or_default(),
            })
            .collect();

        info!(
            "{} item(s): {} cropped ({} rescued), {} filtered, {} missing",
            parts.items.len(),
            crops.len(),
            crops.iter().filter(|c| c.rescued).count(),
            filtered.len(),
            missing.len()
        );

        Ok(PipelineReport {
            expected: parts.items.len(),
            crops,
            filtered,
            missing,
            attempts,
            completion: parts.completion,
            trace: parts.trace,
        })
    }
}

/// One image queued for [`process_batch`].
pub struct BatchJob {
    pub name: String,
    pub image: DynamicImage,
    pub items: Vec<ExpectedItem>,
    /// Detector for this image; clone one `Arc` across jobs to share a model.
    pub detector: Arc<dyn ObjectDetector>,
}

/// Outcome of one batch job, errors kept per image.
pub struct BatchOutcome {
    pub name: String,
    pub image: DynamicImage,
    pub result: Result<PipelineReport, PipelineError>,
}

/// Process independent images in parallel.
///
/// Outcomes are returned in job order; a failing image never affects the
/// others.
pub fn process_batch(
    jobs: Vec<BatchJob>,
    config: &PipelineConfig,
    refiner: Option<&dyn MaskRefiner>,
) -> Vec<BatchOutcome> {
    jobs.into_par_iter()
        .map(|job| {
            let BatchJob {
                name,
                image,
                items,
                detector,
            } = job;
            let mut pipeline = OutfitPipeline::new(detector.as_ref(), config.clone());
            if let Some(refiner) = refiner {
                pipeline = pipeline.with_refiner(refiner);
            }
            let result = pipeline.process(&image, items);
            if let Err(err) = &result {
                warn!("{name}: {err}");
            }
            BatchOutcome {
                name,
                image,
                result,
            }
        })
        .collect()
}
