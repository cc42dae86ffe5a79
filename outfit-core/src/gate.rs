//! Quality gate: turns matched pairs into crop boxes or structured rejections.
//!
//! For each pair the detector box (or a mask-derived box when a refiner is
//! available) is padded by a margin and clipped to the image. The crop is
//! accepted when it is large enough and the detection confident enough. A
//! crop that is too small but comfortably confident is expanded once and
//! accepted as *rescued*, so small-but-certain items such as jewellery are not
//! lost purely on size.

use image::{DynamicImage, GenericImageView};
use log::{info, warn};
use outfit_utils::config::CropSettings;
use serde::{Deserialize, Serialize};

use crate::detection::ItemId;
use crate::detector::MaskRefiner;
use crate::geometry::{BoundingBox, PixelRect, mask_to_bbox};
use crate::reconcile::MatchedPair;

/// Quality-gate thresholds. The rescue parameters were tuned by hand.
#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    /// Fraction of box width/height added on each side.
    pub margin_pct: f32,
    /// Minimum crop area relative to the image area.
    pub min_crop_ratio: f32,
    pub min_confidence: f32,
    /// Confidence above `min_confidence` required for a rescue.
    pub rescue_confidence_margin: f32,
    /// Fraction of crop width/height added on each side when rescuing.
    pub rescue_expand_pct: f32,
    pub use_mask_refinement: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            margin_pct: 0.05,
            min_crop_ratio: 0.003,
            min_confidence: 0.3,
            rescue_confidence_margin: 0.1,
            rescue_expand_pct: 0.10,
            use_mask_refinement: true,
        }
    }
}

impl From<&CropSettings> for GateConfig {
    fn from(settings: &CropSettings) -> Self {
        Self {
            margin_pct: settings.margin_pct,
            min_crop_ratio: settings.min_crop_ratio,
            min_confidence: settings.min_confidence,
            rescue_confidence_margin: settings.rescue_confidence_margin,
            rescue_expand_pct: settings.rescue_expand_pct,
            use_mask_refinement: settings.use_mask_refinement,
        }
    }
}

/// An accepted crop for one expected item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropResult {
    pub item: ItemId,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Detector phrase the crop came from.
    pub phrase: String,
    pub crop_box: BoundingBox,
    pub rect: PixelRect,
    pub confidence: f32,
    pub similarity: f32,
    pub is_fallback: bool,
    /// Set when the crop was expanded to pass the size check.
    pub rescued: bool,
    pub mask_refined: bool,
    pub attempt: u32,
}

/// Why a matched pair was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterReason {
    TooSmall,
    LowConfidence,
}

/// A matched pair the gate refused, returned to the caller for handling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredItem {
    pub item: ItemId,
    pub label: String,
    pub phrase: String,
    pub reason: FilterReason,
    pub crop_box: BoundingBox,
    pub crop_ratio: f32,
    pub confidence: f32,
}

/// Outcome of gating a single pair.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Accepted(CropResult),
    Filtered(FilteredItem),
}

/// Applies margins, optional mask refinement and the acceptance thresholds.
#[derive(Debug, Clone, Default)]
pub struct QualityGate {
    config: GateConfig,
}

impl QualityGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// Gate one pair. `description` is copied onto an accepted crop.
    pub fn evaluate(
        &self,
        image: &DynamicImage,
        pair: &MatchedPair,
        description: Option<&str>,
        refiner: Option<&dyn MaskRefiner>,
    ) -> GateDecision {
        let (width, height) = image.dimensions();
        let detection = &pair.detection;
        let confidence = detection.score;

        let (base, mask_refined) = match refiner.filter(|_| self.config.use_mask_refinement) {
            Some(refiner) => match refine_box(refiner, image, &detection.bbox) {
                Some(refined) => (refined, true),
                None => (detection.bbox, false),
            },
            None => (detection.bbox, false),
        };

        let crop_box = base.expand(self.config.margin_pct).clip(width, height);
        let ratio = crop_box.crop_ratio(width, height);

        let filtered = |reason: FilterReason| {
            info!(
                "Filtered {} '{}' ({:?}): ratio {:.4}, confidence {:.2}",
                pair.item, pair.label, reason, ratio, confidence
            );
            GateDecision::Filtered(FilteredItem {
                item: pair.item,
                label: pair.label.clone(),
                phrase: detection.phrase.clone(),
                reason,
                crop_box,
                crop_ratio: ratio,
                confidence,
            })
        };

        if confidence < self.config.min_confidence {
            return filtered(FilterReason::LowConfidence);
        }

        let (final_box, rescued) = if ratio >= self.config.min_crop_ratio {
            (crop_box, false)
        } else if confidence > self.config.min_confidence + self.config.rescue_confidence_margin {
            let expanded = crop_box
                .expand(self.config.rescue_expand_pct)
                .clip(width, height);
            (expanded, true)
        } else {
            return filtered(FilterReason::TooSmall);
        };

        let Some(rect) = final_box.to_pixel_rect(width, height) else {
            return filtered(FilterReason::TooSmall);
        };

        GateDecision::Accepted(CropResult {
            item: pair.item,
            label: pair.label.clone(),
            description: description.map(str::to_string),
            phrase: detection.phrase.clone(),
            crop_box: final_box,
            rect,
            confidence,
            similarity: pair.similarity,
            is_fallback: pair.is_fallback,
            rescued,
            mask_refined,
            attempt: pair.attempt,
        })
    }
}

/// Mask-derived box for `bbox`, or `None` when the refiner has nothing usable.
///
/// Refiner errors are logged and treated as "no mask".
fn refine_box(
    refiner: &dyn MaskRefiner,
    image: &DynamicImage,
    bbox: &BoundingBox,
) -> Option<BoundingBox> {
    match refiner.segment(image, bbox) {
        Ok(Some(mask)) => mask_to_bbox(&mask).filter(|refined| !refined.is_empty()),
        Ok(None) => None,
        Err(err) => {
            warn!("Mask refinement failed, using detector box: {err:#}");
            None
        }
    }
}

/// Cut the accepted region out of `image`.
pub fn extract_crop(image: &DynamicImage, crop: &CropResult) -> DynamicImage {
    let PixelRect {
        x,
        y,
        width,
        height,
    } = crop.rect;
    image.crop_imm(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Detection;
    use crate::geometry::Mask;

    const EPS: f32 = 1e-4;

    fn pair(bbox: BoundingBox, score: f32) -> MatchedPair {
        MatchedPair {
            item: ItemId(0),
            label: "gold ring".to_string(),
            detection: Detection::new(bbox, score, "ring"),
            similarity: 0.5,
            is_fallback: false,
            attempt: 1,
        }
    }

    // 30x30 box + 5% margin = 33x33 = 1089 px on a 1000x1000 image (ratio ~0.001).
    fn tiny_box() -> BoundingBox {
        BoundingBox::new(500.0, 500.0, 530.0, 530.0)
    }

    fn image() -> DynamicImage {
        DynamicImage::new_rgb8(1000, 1000)
    }

    struct FixedMask(BoundingBox);

    impl MaskRefiner for FixedMask {
        fn segment(
            &self,
            image: &DynamicImage,
            _bbox: &BoundingBox,
        ) -> anyhow::Result<Option<Mask>> {
            let (w, h) = image.dimensions();
            let mut mask = Mask::from_elem((h as usize, w as usize), false);
            for y in self.0.y1 as usize..self.0.y2 as usize {
                for x in self.0.x1 as usize..self.0.x2 as usize {
                    mask[[y, x]] = true;
                }
            }
            Ok(Some(mask))
        }
    }

    struct BrokenMask;

    impl MaskRefiner for BrokenMask {
        fn segment(
            &self,
            _image: &DynamicImage,
            _bbox: &BoundingBox,
        ) -> anyhow::Result<Option<Mask>> {
            anyhow::bail!("segmentation service unavailable")
        }
    }

    #[test]
    fn accepts_large_confident_crop_with_margin() {
        let gate = QualityGate::default();
        let decision = gate.evaluate(
            &image(),
            &pair(BoundingBox::new(100.0, 100.0, 300.0, 500.0), 0.9),
            Some("gold band"),
            None,
        );
        let GateDecision::Accepted(crop) = decision else {
            panic!("expected acceptance");
        };
        assert!(!crop.rescued);
        assert!((crop.crop_box.x1 - 90.0).abs() < EPS);
        assert!((crop.crop_box.y1 - 80.0).abs() < EPS);
        assert!((crop.crop_box.x2 - 310.0).abs() < EPS);
        assert!((crop.crop_box.y2 - 520.0).abs() < EPS);
        assert_eq!(crop.description.as_deref(), Some("gold band"));
    }

    #[test]
    fn small_confident_crop_is_rescued() {
        let decision = QualityGate::default().evaluate(&image(), &pair(tiny_box(), 0.5), None, None);
        let GateDecision::Accepted(crop) = decision else {
            panic!("expected rescue");
        };
        assert!(crop.rescued);
        // 33px crop grown by 10% per side.
        assert!((crop.crop_box.width() - 39.6).abs() < 1e-3);
    }

    #[test]
    fn small_marginal_crop_is_filtered_too_small() {
        let decision =
            QualityGate::default().evaluate(&image(), &pair(tiny_box(), 0.31), None, None);
        let GateDecision::Filtered(filtered) = decision else {
            panic!("expected filtering");
        };
        assert_eq!(filtered.reason, FilterReason::TooSmall);
        assert!(filtered.crop_ratio < 0.003);
        assert!((filtered.crop_ratio - 0.001089).abs() < 1e-5);
    }

    #[test]
    fn low_confidence_is_filtered_regardless_of_size() {
        let decision = QualityGate::default().evaluate(
            &image(),
            &pair(BoundingBox::new(0.0, 0.0, 500.0, 500.0), 0.2),
            None,
            None,
        );
        let GateDecision::Filtered(filtered) = decision else {
            panic!("expected filtering");
        };
        assert_eq!(filtered.reason, FilterReason::LowConfidence);
    }

    #[test]
    fn mask_box_replaces_detector_box() {
        let refiner = FixedMask(BoundingBox::new(200.0, 200.0, 400.0, 400.0));
        let decision = QualityGate::default().evaluate(
            &image(),
            &pair(BoundingBox::new(150.0, 150.0, 450.0, 450.0), 0.9),
            None,
            Some(&refiner),
        );
        let GateDecision::Accepted(crop) = decision else {
            panic!("expected acceptance");
        };
        assert!(crop.mask_refined);
        assert!((crop.crop_box.x1 - 190.0).abs() < EPS);
        assert!((crop.crop_box.x2 - 410.0).abs() < EPS);
    }

    #[test]
    fn mask_refinement_can_be_disabled() {
        let refiner = FixedMask(BoundingBox::new(200.0, 200.0, 400.0, 400.0));
        let gate = QualityGate::new(GateConfig {
            use_mask_refinement: false,
            ..GateConfig::default()
        });
        let decision = gate.evaluate(
            &image(),
            &pair(BoundingBox::new(150.0, 150.0, 450.0, 450.0), 0.9),
            None,
            Some(&refiner),
        );
        let GateDecision::Accepted(crop) = decision else {
            panic!("expected acceptance");
        };
        assert!(!crop.mask_refined);
        assert!((crop.crop_box.x1 - 135.0).abs() < EPS);
    }

    #[test]
    fn refiner_failure_falls_back_to_detector_box() {
        let decision = QualityGate::default().evaluate(
            &image(),
            &pair(BoundingBox::new(100.0, 100.0, 300.0, 300.0), 0.9),
            None,
            Some(&BrokenMask),
        );
        let GateDecision::Accepted(crop) = decision else {
            panic!("expected acceptance");
        };
        assert!(!crop.mask_refined);
        assert!((crop.crop_box.x1 - 90.0).abs() < EPS);
    }

    #[test]
    fn extract_crop_matches_rect() {
        let decision = QualityGate::default().evaluate(
            &image(),
            &pair(BoundingBox::new(100.0, 100.0, 300.0, 500.0), 0.9),
            None,
            None,
        );
        let GateDecision::Accepted(crop) = decision else {
            panic!("expected acceptance");
        };
        let cropped = extract_crop(&image(), &crop);
        assert_eq!(cropped.dimensions(), (crop.rect.width, crop.rect.height));
        assert_eq!(cropped.dimensions(), (220, 440));
    }
}
