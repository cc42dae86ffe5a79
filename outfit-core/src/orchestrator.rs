//! Bounded retry loop around the detector.
//!
//! One [`PipelineRun`] walks the state machine
//!
//! ```text
//! Attempting --detector ok--> Reconciling --all matched--> Finished(AllMatched)
//!     ^                           |--budget spent--> Finished(BudgetExhausted)
//!     |                           v
//!     +-------------------- Retrying (attempt += 1)
//! ```
//!
//! Each attempt prompts only for the items that are still missing. A
//! detector error ends the run immediately; semantic misses only ever cause
//! another attempt, and never more than `max_retry_attempts` calls in total.

use image::{DynamicImage, GenericImageView};
use log::{Level, debug, info};
use outfit_utils::{config::DetectionSettings, stage_timer};
use serde::Serialize;

use crate::detection::{Detection, ExpectedItem, ItemId, prepare_detections};
use crate::detector::ObjectDetector;
use crate::error::PipelineError;
use crate::prompt::build_prompt;
use crate::reconcile::{MatchedPair, ReconcileBranch, Reconciler};
use crate::suppress::{DEFAULT_IOU_THRESHOLD, suppress};

/// Retry-loop parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub iou_threshold: f32,
    /// Total detector calls allowed per image (at least one).
    pub max_retry_attempts: u32,
    /// Prepended to the first prompt only.
    pub prompt_prefixes: Vec<String>,
    pub prompt_separator: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_retry_attempts: 2,
            prompt_prefixes: Vec::new(),
            prompt_separator: " . ".to_string(),
        }
    }
}

impl From<&DetectionSettings> for RetryConfig {
    fn from(settings: &DetectionSettings) -> Self {
        Self {
            iou_threshold: settings.iou_threshold,
            max_retry_attempts: settings.max_retry_attempts.max(1),
            prompt_prefixes: settings.prompt_prefixes.clone(),
            prompt_separator: settings.prompt_separator.clone(),
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// Every expected item was matched.
    AllMatched,
    /// The attempt budget ran out with items still missing.
    BudgetExhausted,
}

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Attempting,
    Reconciling,
    Retrying,
    Finished(Completion),
}

impl RunState {
    /// Starting state for `pending` outstanding items.
    pub fn initial(pending: usize) -> Self {
        if pending == 0 {
            RunState::Finished(Completion::AllMatched)
        } else {
            RunState::Attempting
        }
    }

    /// Transition taken once an attempt has been reconciled.
    pub fn after_reconcile(still_missing: usize, attempt: u32, max_attempts: u32) -> Self {
        if still_missing == 0 {
            RunState::Finished(Completion::AllMatched)
        } else if attempt >= max_attempts {
            RunState::Finished(Completion::BudgetExhausted)
        } else {
            RunState::Retrying
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, RunState::Finished(_))
    }
}

/// What happened during one detector attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub prompt: String,
    pub raw_detections: usize,
    pub kept_detections: usize,
    pub branch: ReconcileBranch,
    pub matched: Vec<ItemId>,
    pub still_missing: Vec<ItemId>,
}

/// Per-image state threaded through the retry loop.
#[derive(Debug)]
pub struct PipelineRun {
    items: Vec<ExpectedItem>,
    matched: Vec<MatchedPair>,
    still_missing: Vec<ItemId>,
    attempt: u32,
    state: RunState,
    in_flight: Option<InFlight>,
    trace: Vec<AttemptRecord>,
}

#[derive(Debug)]
struct InFlight {
    prompt: String,
    raw_detections: usize,
    kept: Vec<Detection>,
}

impl PipelineRun {
    pub fn new(items: Vec<ExpectedItem>) -> Self {
        let still_missing: Vec<ItemId> = (0..items.len()).map(ItemId).collect();
        Self {
            state: RunState::initial(still_missing.len()),
            items,
            matched: Vec::new(),
            still_missing,
            attempt: 1,
            in_flight: None,
            trace: Vec::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// 1-based number of the current (or last) attempt.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Number of detector calls made so far.
    pub fn attempts_made(&self) -> u32 {
        self.trace.len() as u32
    }

    pub fn items(&self) -> &[ExpectedItem] {
        &self.items
    }

    pub fn matched(&self) -> &[MatchedPair] {
        &self.matched
    }

    pub fn still_missing(&self) -> &[ItemId] {
        &self.still_missing
    }

    pub fn trace(&self) -> &[AttemptRecord] {
        &self.trace
    }

    pub fn completion(&self) -> Option<Completion> {
        match self.state {
            RunState::Finished(completion) => Some(completion),
            _ => None,
        }
    }

    /// Consume the run, returning matched pairs and missing ids.
    pub fn into_parts(self) -> RunParts {
        RunParts {
            items: self.items,
            matched: self.matched,
            still_missing: self.still_missing,
            completion: match self.state {
                RunState::Finished(completion) => completion,
                _ => Completion::BudgetExhausted,
            },
            trace: self.trace,
        }
    }

    fn pending(&self) -> Vec<(ItemId, &ExpectedItem)> {
        self.still_missing
            .iter()
            .map(|&id| (id, &self.items[id.0]))
            .collect()
    }
}

/// Owned pieces of a finished run.
#[derive(Debug)]
pub struct RunParts {
    pub items: Vec<ExpectedItem>,
    pub matched: Vec<MatchedPair>,
    pub still_missing: Vec<ItemId>,
    pub completion: Completion,
    pub trace: Vec<AttemptRecord>,
}

/// Drives [`PipelineRun`]s against an injected detector.
pub struct RetryOrchestrator<'a> {
    detector: &'a dyn ObjectDetector,
    reconciler: Reconciler,
    config: RetryConfig,
}

impl<'a> RetryOrchestrator<'a> {
    pub fn new(
        detector: &'a dyn ObjectDetector,
        reconciler: Reconciler,
        config: RetryConfig,
    ) -> Self {
        Self {
            detector,
            reconciler,
            config,
        }
    }

    /// Run the loop to completion for one image.
    pub fn run(
        &self,
        image: &DynamicImage,
        items: Vec<ExpectedItem>,
    ) -> Result<PipelineRun, PipelineError> {
        let mut run = PipelineRun::new(items);
        while !run.state.is_finished() {
            self.step(image, &mut run)?;
        }
        info!(
            "Run finished after {} attempt(s): {} matched, {} missing",
            run.attempts_made(),
            run.matched.len(),
            run.still_missing.len()
        );
        Ok(run)
    }

    /// Advance `run` by exactly one transition.
    ///
    /// On a detector error the run is left in `Attempting` and nothing it
    /// already holds is modified.
    pub fn step(&self, image: &DynamicImage, run: &mut PipelineRun) -> Result<(), PipelineError> {
        match run.state {
            RunState::Attempting => {
                let (width, height) = image.dimensions();
                let prompt = self.prompt_for(run);
                debug!("Attempt {} prompt: {prompt}", run.attempt);

                let raw = {
                    let _timer = stage_timer("outfit_core::detect", Level::Debug);
                    self.detector
                        .detect(image, &prompt)
                        .map_err(|source| PipelineError::Detector {
                            attempt: run.attempt,
                            source,
                        })?
                };
                let raw_detections = raw.len();
                let kept = {
                    let _timer = stage_timer("outfit_core::suppress", Level::Trace);
                    suppress(
                        prepare_detections(raw, width, height),
                        self.config.iou_threshold,
                    )
                };
                debug!(
                    "Attempt {}: {} raw detection(s), {} after suppression",
                    run.attempt,
                    raw_detections,
                    kept.len()
                );

                run.in_flight = Some(InFlight {
                    prompt,
                    raw_detections,
                    kept,
                });
                run.state = RunState::Reconciling;
            }
            RunState::Reconciling => {
                let Some(in_flight) = run.in_flight.take() else {
                    run.state = RunState::Attempting;
                    return Ok(());
                };

                let anchors: Vec<Detection> = run
                    .matched
                    .iter()
                    .filter(|pair| !pair.is_fallback)
                    .map(|pair| pair.detection.clone())
                    .collect();
                let outcome = {
                    let _timer = stage_timer("outfit_core::reconcile", Level::Trace);
                    self.reconciler
                        .reconcile(&in_flight.kept, &run.pending(), &anchors)
                };
                debug!(
                    "Attempt {} reconciled as {:?}: {} pair(s), {} still missing",
                    run.attempt,
                    outcome.branch,
                    outcome.pairs.len(),
                    outcome.still_missing.len()
                );

                let attempt = run.attempt;
                let matched_ids: Vec<ItemId> = outcome.pairs.iter().map(|p| p.item).collect();
                run.matched.extend(outcome.pairs.into_iter().map(|mut pair| {
                    pair.attempt = attempt;
                    pair
                }));
                run.still_missing = outcome.still_missing;
                run.trace.push(AttemptRecord {
                    attempt,
                    prompt: in_flight.prompt,
                    raw_detections: in_flight.raw_detections,
                    kept_detections: in_flight.kept.len(),
                    branch: outcome.branch,
                    matched: matched_ids,
                    still_missing: run.still_missing.clone(),
                });

                run.state = RunState::after_reconcile(
                    run.still_missing.len(),
                    attempt,
                    self.config.max_retry_attempts.max(1),
                );
            }
            RunState::Retrying => {
                run.attempt += 1;
                run.state = RunState::Attempting;
            }
            RunState::Finished(_) => {}
        }
        Ok(())
    }

    fn prompt_for(&self, run: &PipelineRun) -> String {
        let prefixes: &[String] = if run.attempt == 1 {
            &self.config.prompt_prefixes
        } else {
            &[]
        };
        build_prompt(
            prefixes,
            run.still_missing
                .iter()
                .map(|id| run.items[id.0].label.as_str()),
            &self.config.prompt_separator,
        )
    }
}
