//! Backends that replay a recorded inference pass.
//!
//! A recording holds every face a detector reported for one image together
//! with its keypoints. Replaying it lets the task chains run end to end
//! without model weights, while each detector still applies its own score
//! thresholds and limits to the recorded faces.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::detector_options::{
    MtcnnOptions, SsdMobilenetV1Options, TinyDetectorParams, TinyFaceDetectorOptions,
    TinyYolov2Options,
};
use crate::detection::domain::face_detection::{BoundingBox, FaceDetection};
use crate::detection::domain::face_detector::{
    BackendError, FaceLandmarkNet, FaceLocator, MtcnnNet, MtcnnResult,
};
use crate::detection::domain::face_landmarks::{FaceLandmarks5, FaceLandmarks68};
use crate::detection::domain::nets::{LandmarkModel, Nets};
use crate::shared::cancellation::CancellationToken;
use crate::shared::net_input::NetInput;

use super::math::best_overlap;

/// Minimum IoU between a requested face and a recorded one to reuse its landmarks.
const LANDMARK_MATCH_IOU: f64 = 0.5;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read recording {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed recording: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no recorded landmarks overlap the face at ({x:.0}, {y:.0})")]
    Landmarks { x: f64, y: f64 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedFace {
    pub score: f64,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks5: Option<FaceLandmarks5>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks68: Option<FaceLandmarks68>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub image_width: u32,
    pub image_height: u32,
    pub faces: Vec<RecordedFace>,
}

impl Recording {
    fn detection(&self, face: &RecordedFace) -> FaceDetection {
        FaceDetection::new(face.score, face.bbox, (self.image_width, self.image_height))
    }

    fn warn_on_size_mismatch(&self, input: &NetInput) {
        let dims = (input.width(), input.height());
        if dims != (0, 0) && dims != (self.image_width, self.image_height) {
            log::warn!(
                "Replaying a {}x{} recording for a {}x{} input; boxes are not rescaled",
                self.image_width,
                self.image_height,
                dims.0,
                dims.1
            );
        }
    }
}

/// Loads a recording and hands out replay backends for every net slot.
#[derive(Clone, Debug)]
pub struct ReplayNets {
    recording: Arc<Recording>,
    hits: Arc<AtomicUsize>,
}

impl ReplayNets {
    pub fn new(recording: Recording) -> Self {
        Self {
            recording: Arc::new(recording),
            hits: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn from_path(path: &Path) -> Result<Self, ReplayError> {
        let json = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn recording(&self) -> &Recording {
        &self.recording
    }

    /// Backend calls served so far, across all nets.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn to_nets(&self) -> Nets {
        let locator = Arc::new(ReplayLocator {
            source: self.clone(),
        });
        Nets::builder()
            .ssd_mobilenet_v1(locator.clone())
            .tiny_face_detector(locator.clone())
            .tiny_yolov2(locator)
            .mtcnn(Arc::new(ReplayMtcnn {
                source: self.clone(),
            }))
            .face_landmark_68(Arc::new(ReplayLandmarkNet {
                source: self.clone(),
                model: LandmarkModel::Full,
            }))
            .face_landmark_68_tiny(Arc::new(ReplayLandmarkNet {
                source: self.clone(),
                model: LandmarkModel::Tiny,
            }))
            .build()
    }

    fn begin(
        &self,
        input: &NetInput,
        cancel: &CancellationToken,
    ) -> Result<&Recording, BackendError> {
        cancel.check()?;
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.recording.warn_on_size_mismatch(input);
        Ok(&self.recording)
    }
}

/// Replays recorded faces for the single-shot detectors.
struct ReplayLocator {
    source: ReplayNets,
}

impl ReplayLocator {
    fn above_threshold(&self, recording: &Recording, threshold: f64) -> Vec<FaceDetection> {
        recording
            .faces
            .iter()
            .filter(|f| f.score >= threshold)
            .map(|f| recording.detection(f))
            .collect()
    }

    fn tiny(
        &self,
        input: &NetInput,
        params: &TinyDetectorParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<FaceDetection>, BackendError> {
        let recording = self.source.begin(input, cancel)?;
        Ok(self.above_threshold(recording, params.score_threshold()))
    }
}

#[async_trait]
impl FaceLocator<SsdMobilenetV1Options> for ReplayLocator {
    async fn locate_faces(
        &self,
        input: &NetInput,
        options: &SsdMobilenetV1Options,
        cancel: &CancellationToken,
    ) -> Result<Vec<FaceDetection>, BackendError> {
        let recording = self.source.begin(input, cancel)?;
        let mut detections = self.above_threshold(recording, options.min_confidence());
        detections.sort_by(|a, b| b.score().total_cmp(&a.score()));
        detections.truncate(options.max_results());
        Ok(detections)
    }
}

#[async_trait]
impl FaceLocator<TinyFaceDetectorOptions> for ReplayLocator {
    async fn locate_faces(
        &self,
        input: &NetInput,
        options: &TinyFaceDetectorOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<FaceDetection>, BackendError> {
        self.tiny(input, options.params(), cancel)
    }
}

#[async_trait]
impl FaceLocator<TinyYolov2Options> for ReplayLocator {
    async fn locate_faces(
        &self,
        input: &NetInput,
        options: &TinyYolov2Options,
        cancel: &CancellationToken,
    ) -> Result<Vec<FaceDetection>, BackendError> {
        self.tiny(input, options.params(), cancel)
    }
}

struct ReplayMtcnn {
    source: ReplayNets,
}

#[async_trait]
impl MtcnnNet for ReplayMtcnn {
    async fn forward(
        &self,
        input: &NetInput,
        options: &MtcnnOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<MtcnnResult>, BackendError> {
        let recording = self.source.begin(input, cancel)?;
        let [_, _, onet_threshold] = options.score_thresholds();
        let min_size = options.min_face_size() as f64;

        Ok(recording
            .faces
            .iter()
            .filter(|f| f.score >= onet_threshold)
            .filter(|f| f.bbox.width.min(f.bbox.height) >= min_size)
            .map(|f| MtcnnResult {
                detection: recording.detection(f),
                landmarks: five_point(f),
            })
            .collect())
    }
}

/// Recorded 5-point set, else the 68-point set collapsed, else all invisible.
fn five_point(face: &RecordedFace) -> FaceLandmarks5 {
    face.landmarks5
        .clone()
        .or_else(|| face.landmarks68.as_ref().map(FaceLandmarks68::to_five_point))
        .unwrap_or_else(|| FaceLandmarks5::new([(0.0, 0.0); 5]))
}

struct ReplayLandmarkNet {
    source: ReplayNets,
    model: LandmarkModel,
}

#[async_trait]
impl FaceLandmarkNet for ReplayLandmarkNet {
    async fn detect_landmarks(
        &self,
        input: &NetInput,
        detection: &FaceDetection,
        cancel: &CancellationToken,
    ) -> Result<FaceLandmarks68, BackendError> {
        let recording = self.source.begin(input, cancel)?;
        let with_landmarks: Vec<(&FaceLandmarks68, [f64; 4])> = recording
            .faces
            .iter()
            .filter_map(|f| f.landmarks68.as_ref().map(|lm| (lm, f.bbox.corners())))
            .collect();

        let target = detection.bbox().corners();
        match best_overlap(&target, with_landmarks.iter().map(|(_, corners)| corners)) {
            Some((idx, iou)) if iou >= LANDMARK_MATCH_IOU => Ok(with_landmarks[idx].0.clone()),
            _ => {
                log::warn!(
                    "{}: no recorded landmarks for face at ({:.0}, {:.0})",
                    self.model.net_name(),
                    target[0],
                    target[1]
                );
                Err(Box::new(ReplayError::Landmarks {
                    x: target[0],
                    y: target[1],
                }))
            }
        }
    }
}
