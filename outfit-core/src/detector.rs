//! Contracts for the external models the pipeline consumes.
//!
//! The pipeline never constructs a model itself: callers build a detector
//! (and optionally a mask refiner) once and pass it in, which keeps every
//! run independently testable and safe to execute in parallel.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::detection::RawDetection;
use crate::geometry::{BoundingBox, Mask};

/// Open-vocabulary object detector.
///
/// Implementations carry their own transport timeouts. An `Err` is treated as
/// fatal for the image being processed and is never retried by the pipeline.
pub trait ObjectDetector: Send + Sync {
    /// Detect regions matching `prompt`; an empty list is a valid answer.
    fn detect(&self, image: &DynamicImage, prompt: &str) -> Result<Vec<RawDetection>>;
}

/// Optional segmentation model used to tighten boxes before cropping.
pub trait MaskRefiner: Send + Sync {
    /// Segment the object inside `bbox`; `None` when nothing was segmented.
    ///
    /// The mask is expected to cover the full image.
    fn segment(&self, image: &DynamicImage, bbox: &BoundingBox) -> Result<Option<Mask>>;
}

impl<T: ObjectDetector + ?Sized> ObjectDetector for &T {
    fn detect(&self, image: &DynamicImage, prompt: &str) -> Result<Vec<RawDetection>> {
        (**self).detect(image, prompt)
    }
}

impl<T: ObjectDetector + ?Sized> ObjectDetector for Arc<T> {
    fn detect(&self, image: &DynamicImage, prompt: &str) -> Result<Vec<RawDetection>> {
        (**self).detect(image, prompt)
    }
}

impl<T: MaskRefiner + ?Sized> MaskRefiner for &T {
    fn segment(&self, image: &DynamicImage, bbox: &BoundingBox) -> Result<Option<Mask>> {
        (**self).segment(image, bbox)
    }
}

/// Recorded detector responses, one list per attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionScript {
    pub attempts: Vec<Vec<RawDetection>>,
}

/// Detector that replays a [`DetectionScript`].
///
/// Call *n* returns the script's *n*-th response; once the script is
/// exhausted every call returns an empty list. Received prompts are kept for
/// inspection.
#[derive(Debug, Default)]
pub struct ReplayDetector {
    script: DetectionScript,
    prompts: Mutex<Vec<String>>,
}

impl ReplayDetector {
    pub fn new(script: DetectionScript) -> Self {
        Self {
            script,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Load a script from a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let script: DetectionScript = outfit_utils::load_json(path.as_ref())?;
        Ok(Self::new(script))
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }

    /// Number of `detect` calls made so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }
}

impl ObjectDetector for ReplayDetector {
    fn detect(&self, _image: &DynamicImage, prompt: &str) -> Result<Vec<RawDetection>> {
        let mut prompts = self
            .prompts
            .lock()
            .map_err(|_| anyhow::anyhow!("replay detector state poisoned"))?;
        let call = prompts.len();
        prompts.push(prompt.to_string());
        Ok(self.script.attempts.get(call).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::RawBox;

    fn script() -> DetectionScript {
        DetectionScript {
            attempts: vec![
                vec![RawDetection {
                    region: RawBox::Xyxy([0.0, 0.0, 10.0, 10.0]),
                    score: 0.9,
                    phrase: "shirt".into(),
                }],
                Vec::new(),
            ],
        }
    }

    #[test]
    fn replay_serves_attempts_in_order_then_empty() {
        let detector = ReplayDetector::new(script());
        let image = DynamicImage::new_rgb8(10, 10);

        assert_eq!(detector.detect(&image, "shirt").unwrap().len(), 1);
        assert!(detector.detect(&image, "shirt").unwrap().is_empty());
        assert!(detector.detect(&image, "shirt").unwrap().is_empty());
        assert_eq!(detector.calls(), 3);
        assert_eq!(detector.prompts(), vec!["shirt", "shirt", "shirt"]);
    }

    #[test]
    fn replay_works_through_shared_references() {
        let detector = Arc::new(ReplayDetector::new(script()));
        let image = DynamicImage::new_rgb8(10, 10);
        let shared: &dyn ObjectDetector = &detector;
        assert_eq!(shared.detect(&image, "a").unwrap().len(), 1);
        assert_eq!(detector.calls(), 1);
    }

    #[test]
    fn script_parses_from_json() {
        let script: DetectionScript = serde_json::from_str(
            r#"{"attempts": [[{"box": {"xyxy": [1, 2, 3, 4]}, "score": 0.5, "phrase": "hat"}], []]}"#,
        )
        .expect("parse script");
        assert_eq!(script.attempts.len(), 2);
        assert_eq!(script.attempts[0][0].phrase, "hat");
    }
}
