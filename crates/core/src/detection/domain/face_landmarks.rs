//! Face keypoint sets: the 5-point output of MTCNN and the 68-point output
//! of the landmark nets.
use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Point = (f64, f64);

const LEFT_EYE: usize = 0;
const RIGHT_EYE: usize = 1;
const NOSE: usize = 2;

pub const NUM_LANDMARKS_68: usize = 68;

const JAW: Range<usize> = 0..17;
const LEFT_EYEBROW: Range<usize> = 17..22;
const RIGHT_EYEBROW: Range<usize> = 22..27;
const NOSE_68: Range<usize> = 27..36;
const LEFT_EYE_68: Range<usize> = 36..42;
const RIGHT_EYE_68: Range<usize> = 42..48;
const MOUTH: Range<usize> = 48..68;
const NOSE_TIP_68: usize = 30;
const MOUTH_LEFT_68: usize = 48;
const MOUTH_RIGHT_68: usize = 54;

#[derive(Debug, Error, PartialEq)]
pub enum LandmarkError {
    #[error("expected {expected} landmark points, got {actual}")]
    PointCount { expected: usize, actual: usize },
}

/// Five keypoints in image coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceLandmarks5 {
    /// Points with x <= 0 are treated as invisible.
    points: [Point; 5],
}

impl FaceLandmarks5 {
    pub fn new(points: [Point; 5]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point; 5] {
        &self.points
    }

    /// How far the head is turned: 0.0 frontal, 1.0 full profile.
    ///
    /// Nose offset from the eye midpoint relative to eye span; 0.0 when the
    /// eyes or nose are not visible.
    pub fn profile_ratio(&self) -> f64 {
        let nose = self.points[NOSE];
        let left_eye = self.points[LEFT_EYE];
        let right_eye = self.points[RIGHT_EYE];

        if nose.0 <= 0.0 || left_eye.0 <= 0.0 || right_eye.0 <= 0.0 {
            return 0.0;
        }

        let eye_span = (right_eye.0 - left_eye.0).abs();
        if eye_span <= 0.0 {
            return 0.0;
        }
        let eye_mid_x = (left_eye.0 + right_eye.0) / 2.0;
        ((nose.0 - eye_mid_x).abs() / eye_span).min(1.0)
    }
}

/// 68 keypoints in image coordinates, in the iBUG 300-W ordering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct FaceLandmarks68 {
    positions: Vec<Point>,
}

impl FaceLandmarks68 {
    pub fn new(positions: Vec<Point>) -> Result<Self, LandmarkError> {
        if positions.len() != NUM_LANDMARKS_68 {
            return Err(LandmarkError::PointCount {
                expected: NUM_LANDMARKS_68,
                actual: positions.len(),
            });
        }
        Ok(Self { positions })
    }

    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    pub fn jaw_outline(&self) -> &[Point] {
        &self.positions[JAW]
    }

    pub fn left_eyebrow(&self) -> &[Point] {
        &self.positions[LEFT_EYEBROW]
    }

    pub fn right_eyebrow(&self) -> &[Point] {
        &self.positions[RIGHT_EYEBROW]
    }

    pub fn nose(&self) -> &[Point] {
        &self.positions[NOSE_68]
    }

    pub fn left_eye(&self) -> &[Point] {
        &self.positions[LEFT_EYE_68]
    }

    pub fn right_eye(&self) -> &[Point] {
        &self.positions[RIGHT_EYE_68]
    }

    pub fn mouth(&self) -> &[Point] {
        &self.positions[MOUTH]
    }

    /// Collapses to the MTCNN layout: eye centroids, nose tip, mouth corners.
    pub fn to_five_point(&self) -> FaceLandmarks5 {
        FaceLandmarks5::new([
            centroid(self.left_eye()),
            centroid(self.right_eye()),
            self.positions[NOSE_TIP_68],
            self.positions[MOUTH_LEFT_68],
            self.positions[MOUTH_RIGHT_68],
        ])
    }
}

impl TryFrom<Vec<Point>> for FaceLandmarks68 {
    type Error = LandmarkError;

    fn try_from(positions: Vec<Point>) -> Result<Self, Self::Error> {
        Self::new(positions)
    }
}

impl From<FaceLandmarks68> for Vec<Point> {
    fn from(landmarks: FaceLandmarks68) -> Self {
        landmarks.positions
    }
}

fn centroid(points: &[Point]) -> Point {
    let n = points.len().max(1) as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    (sx / n, sy / n)
}
