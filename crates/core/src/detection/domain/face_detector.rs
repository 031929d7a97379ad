//! Backend capabilities consumed by the detection tasks.
//!
//! Implementations wrap an inference engine and are shared between tasks,
//! hence `&self` and `Send + Sync`. Errors are opaque to the tasks and are
//! passed through untouched.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::detection::domain::face_detection::FaceDetection;
use crate::detection::domain::face_landmarks::{FaceLandmarks5, FaceLandmarks68};
use crate::detection::domain::detector_options::MtcnnOptions;
use crate::shared::cancellation::CancellationToken;
use crate::shared::net_input::NetInput;

pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// One face from the MTCNN cascade with the keypoints its O-Net regressed.
#[derive(Clone, Debug, PartialEq)]
pub struct MtcnnResult {
    pub detection: FaceDetection,
    pub landmarks: FaceLandmarks5,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceDetectionWithLandmarks {
    pub detection: FaceDetection,
    pub landmarks: FaceLandmarks68,
}

/// "Locate faces" for a single-shot detector tuned by options `O`.
#[async_trait]
pub trait FaceLocator<O>: Send + Sync {
    async fn locate_faces(
        &self,
        input: &NetInput,
        options: &O,
        cancel: &CancellationToken,
    ) -> Result<Vec<FaceDetection>, BackendError>;
}

/// Multi-stage MTCNN forward pass.
#[async_trait]
pub trait MtcnnNet: Send + Sync {
    async fn forward(
        &self,
        input: &NetInput,
        options: &MtcnnOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<MtcnnResult>, BackendError>;
}

/// 68-point landmark regression for one detected face.
#[async_trait]
pub trait FaceLandmarkNet: Send + Sync {
    async fn detect_landmarks(
        &self,
        input: &NetInput,
        detection: &FaceDetection,
        cancel: &CancellationToken,
    ) -> Result<FaceLandmarks68, BackendError>;
}
