use std::cmp::Ordering;

use crate::detection::domain::face_detection::FaceDetection;

/// How a single-face task collapses all detections into one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Most confident detection.
    #[default]
    HighestScore,
    /// Least confident detection; the ordering older callers relied on.
    LowestScore,
}

impl SelectionPolicy {
    /// Picks one detection, or `None` when there are none.
    ///
    /// Scores compare with `f64::total_cmp`; among equal scores the earliest
    /// detection in backend order wins.
    pub fn select(self, detections: Vec<FaceDetection>) -> Option<FaceDetection> {
        let wanted = match self {
            Self::HighestScore => Ordering::Greater,
            Self::LowestScore => Ordering::Less,
        };
        detections.into_iter().reduce(|best, candidate| {
            if candidate.score().total_cmp(&best.score()) == wanted {
                candidate
            } else {
                best
            }
        })
    }
}
