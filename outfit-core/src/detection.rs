//! Records exchanged with the external detector and threaded through the
//! pipeline.
//!
//! [`RawDetection`] is exactly what a detector hands back; [`prepare_detections`]
//! is the boundary adapter that resolves its box convention into clipped pixel
//! coordinates, validates scores, and tags the phrase with a category.

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::category::GarmentCategory;
use crate::geometry::BoundingBox;

/// A box in whichever convention the detector reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawBox {
    /// Corner form in image pixels.
    Xyxy([f32; 4]),
    /// Center/size form normalized to `[0, 1]` by the image dimensions.
    Cxcywh([f32; 4]),
}

impl RawBox {
    /// Resolve into a pixel box clipped to the image.
    pub fn resolve(&self, width: u32, height: u32) -> BoundingBox {
        let bbox = match *self {
            RawBox::Xyxy([x1, y1, x2, y2]) => BoundingBox::new(x1, y1, x2, y2),
            RawBox::Cxcywh([cx, cy, w, h]) => {
                BoundingBox::from_cxcywh_normalized(cx, cy, w, h, width, height)
            }
        };
        bbox.clip(width, height)
    }
}

/// One region returned by a single detector call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(rename = "box")]
    pub region: RawBox,
    pub score: f32,
    pub phrase: String,
}

/// A validated detection in pixel space, tagged with its garment category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub score: f32,
    pub phrase: String,
    /// `None` for detail fragments (zippers, logos, collars, ...).
    pub category: Option<GarmentCategory>,
}

impl Detection {
    pub fn new(bbox: BoundingBox, score: f32, phrase: impl Into<String>) -> Self {
        let phrase = phrase.into();
        Self {
            category: GarmentCategory::from_text(&phrase),
            bbox,
            score,
            phrase,
        }
    }

    /// Whether the phrase names a whole wearable item.
    pub fn is_garment(&self) -> bool {
        self.category.is_some()
    }
}

/// Index of an expected item in the caller's original list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub usize);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something the caller wants located, as supplied by the describer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedItem {
    /// Short detection-prompt label, e.g. `gray shirt`.
    pub label: String,
    /// Longer human-readable description, carried through to the output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ExpectedItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(&self) -> Option<GarmentCategory> {
        GarmentCategory::from_text(&self.label)
    }
}

impl From<&str> for ExpectedItem {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// Convert raw detector output into validated pixel-space detections.
///
/// Non-finite scores or boxes and boxes with no area inside the image are
/// dropped; scores are clamped into `[0, 1]`. Order is preserved.
pub fn prepare_detections(raw: Vec<RawDetection>, width: u32, height: u32) -> Vec<Detection> {
    raw.into_iter()
        .filter_map(|det| {
            if !det.score.is_finite() {
                warn!("Dropping '{}' with non-finite score", det.phrase);
                return None;
            }
            let bbox = det.region.resolve(width, height);
            if !bbox.is_finite() || bbox.is_empty() {
                warn!("Dropping '{}' with empty or invalid box", det.phrase);
                return None;
            }
            Some(Detection::new(bbox, det.score.clamp(0.0, 1.0), det.phrase))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(region: RawBox, score: f32, phrase: &str) -> RawDetection {
        RawDetection {
            region,
            score,
            phrase: phrase.to_string(),
        }
    }

    #[test]
    fn prepare_resolves_both_box_conventions() {
        let detections = prepare_detections(
            vec![
                raw(RawBox::Xyxy([10.0, 20.0, 60.0, 80.0]), 0.9, "gray shirt"),
                raw(RawBox::Cxcywh([0.5, 0.5, 0.5, 0.5]), 0.7, "zipper"),
            ],
            200,
            100,
        );
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].bbox, BoundingBox::new(10.0, 20.0, 60.0, 80.0));
        assert_eq!(detections[0].category, Some(GarmentCategory::Top));
        assert!(detections[0].is_garment());
        assert_eq!(detections[1].bbox, BoundingBox::new(50.0, 25.0, 150.0, 75.0));
        assert!(!detections[1].is_garment());
    }

    #[test]
    fn prepare_drops_invalid_and_clamps_scores() {
        let detections = prepare_detections(
            vec![
                raw(RawBox::Xyxy([0.0, 0.0, 10.0, 10.0]), f32::NAN, "shirt"),
                raw(RawBox::Xyxy([300.0, 0.0, 400.0, 10.0]), 0.9, "offscreen"),
                raw(RawBox::Xyxy([5.0, 5.0, 5.0, 40.0]), 0.9, "flat"),
                raw(RawBox::Xyxy([0.0, 0.0, 10.0, 10.0]), 1.7, "hat"),
            ],
            200,
            100,
        );
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].phrase, "hat");
        assert_eq!(detections[0].score, 1.0);
    }

    #[test]
    fn raw_detection_json_shape() {
        let parsed: RawDetection = serde_json::from_str(
            r#"{"box": {"cxcywh": [0.5, 0.5, 0.2, 0.2]}, "score": 0.8, "phrase": "belt"}"#,
        )
        .expect("parse raw detection");
        assert_eq!(parsed.region, RawBox::Cxcywh([0.5, 0.5, 0.2, 0.2]));
        assert_eq!(parsed.phrase, "belt");
    }

    #[test]
    fn expected_item_knows_its_category() {
        let item = ExpectedItem::new("white socks").with_description("ankle socks, white cotton");
        assert_eq!(item.category(), Some(GarmentCategory::Socks));
        assert_eq!(item.description.as_deref(), Some("ankle socks, white cotton"));
    }

    #[test]
    fn item_ids_display_with_hash() {
        assert_eq!(ItemId(3).to_string(), "#3");
        assert_eq!(serde_json::to_string(&ItemId(3)).expect("encode id"), "3");
    }
}
