//! Box and mask geometry shared by every pipeline stage.
//!
//! All boxes are corner-form (`x1, y1, x2, y2`) in image pixel space. None of
//! the helpers here can fail; degenerate input (inverted or zero-area boxes,
//! empty images) collapses to zero areas and zero overlaps instead.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Binary segmentation mask indexed as `[row, column]` (i.e. `[y, x]`).
pub type Mask = Array2<bool>;

/// Axis-aligned bounding box in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build a pixel box from a normalized center/size box.
    pub fn from_cxcywh_normalized(
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
        width: u32,
        height: u32,
    ) -> Self {
        let (img_w, img_h) = (width as f32, height as f32);
        Self {
            x1: (cx - w / 2.0) * img_w,
            y1: (cy - h / 2.0) * img_h,
            x2: (cx + w / 2.0) * img_w,
            y2: (cy + h / 2.0) * img_h,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn is_empty(&self) -> bool {
        self.area() <= 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    /// Clamp all four coordinates into `[0, width] x [0, height]`.
    pub fn clip(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }

    /// Grow the box by `pct` of its own width/height on every side.
    ///
    /// The result is not clipped; callers clip against the image afterwards.
    pub fn expand(&self, pct: f32) -> Self {
        let dx = self.width() * pct;
        let dy = self.height() * pct;
        Self {
            x1: self.x1 - dx,
            y1: self.y1 - dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }

    /// Intersection over union with `other`; zero for disjoint or degenerate boxes.
    pub fn iou(&self, other: &Self) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if intersection <= 0.0 {
            return 0.0;
        }

        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            (intersection / union).min(1.0)
        }
    }

    /// Fraction of the image covered by this box.
    pub fn crop_ratio(&self, width: u32, height: u32) -> f32 {
        let image_area = width as f32 * height as f32;
        if image_area <= 0.0 {
            return 0.0;
        }
        self.clip(width, height).area() / image_area
    }

    /// Integer pixel rectangle covering this box, or `None` when nothing of it
    /// lies inside the image.
    pub fn to_pixel_rect(&self, width: u32, height: u32) -> Option<PixelRect> {
        let clipped = self.clip(width, height);
        let x1 = clipped.x1.floor() as u32;
        let y1 = clipped.y1.floor() as u32;
        let x2 = (clipped.x2.ceil() as u32).min(width);
        let y2 = (clipped.y2.ceil() as u32).min(height);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(PixelRect {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}

/// Whole-pixel crop rectangle, always inside the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Free-function form of [`BoundingBox::clip`].
pub fn clip(bbox: &BoundingBox, width: u32, height: u32) -> BoundingBox {
    bbox.clip(width, height)
}

/// Free-function form of [`BoundingBox::iou`].
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    a.iou(b)
}

/// Free-function form of [`BoundingBox::crop_ratio`].
pub fn crop_ratio(bbox: &BoundingBox, width: u32, height: u32) -> f32 {
    bbox.crop_ratio(width, height)
}

/// Tight bounding box around every `true` pixel, or `None` for an empty mask.
///
/// The returned box uses exclusive right/bottom edges, so a single set pixel
/// at `(x, y)` yields `(x, y, x + 1, y + 1)`.
pub fn mask_to_bbox(mask: &Mask) -> Option<BoundingBox> {
    let mut bounds: Option<(usize, usize, usize, usize)> = None;
    for ((row, col), &set) in mask.indexed_iter() {
        if !set {
            continue;
        }
        bounds = Some(match bounds {
            None => (col, row, col, row),
            Some((min_x, min_y, max_x, max_y)) => {
                (min_x.min(col), min_y.min(row), max_x.max(col), max_y.max(row))
            }
        });
    }

    bounds.map(|(min_x, min_y, max_x, max_y)| {
        BoundingBox::new(
            min_x as f32,
            min_y as f32,
            (max_x + 1) as f32,
            (max_y + 1) as f32,
        )
    })
}
