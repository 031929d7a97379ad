use serde::{Deserialize, Serialize};

use crate::detection::infrastructure::math::bbox_iou;

/// Axis-aligned box in absolute pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Corner form `[x1, y1, x2, y2]`.
    pub fn corners(&self) -> [f64; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self::new(self.x * sx, self.y * sy, self.width * sx, self.height * sy)
    }
}

/// A candidate face: confidence score plus where it was found.
///
/// Only backends create these; tasks select, order and pair them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    score: f64,
    #[serde(rename = "box")]
    bbox: BoundingBox,
    image_width: u32,
    image_height: u32,
}

impl FaceDetection {
    pub fn new(score: f64, bbox: BoundingBox, image_dims: (u32, u32)) -> Self {
        Self {
            score,
            bbox,
            image_width: image_dims.0,
            image_height: image_dims.1,
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn image_dims(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    /// Box normalised to the 0..1 range of the source image.
    ///
    /// Returns the absolute box unchanged when the image dimensions are unknown.
    pub fn relative_box(&self) -> BoundingBox {
        if self.image_width == 0 || self.image_height == 0 {
            return self.bbox;
        }
        self.bbox.scaled(
            1.0 / self.image_width as f64,
            1.0 / self.image_height as f64,
        )
    }

    /// Same detection mapped onto an image of another size.
    pub fn for_size(&self, width: u32, height: u32) -> Self {
        let rel = self.relative_box();
        Self::new(
            self.score,
            rel.scaled(width as f64, height as f64),
            (width, height),
        )
    }

    pub fn iou(&self, other: &FaceDetection) -> f64 {
        bbox_iou(&self.bbox.corners(), &other.bbox.corners())
    }
}
