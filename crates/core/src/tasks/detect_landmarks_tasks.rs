//! Landmark stages appended to a detection task.
//!
//! Each stage owns its parent, awaits it in full, then runs the landmark net
//! over what the parent produced. A landmark failure fails the whole stage;
//! detections are never returned without their landmarks.
use async_trait::async_trait;

use crate::detection::domain::face_detection::FaceDetection;
use crate::detection::domain::face_detector::FaceDetectionWithLandmarks;
use crate::detection::domain::nets::LandmarkModel;
use crate::shared::cancellation::CancellationToken;
use crate::tasks::composable_task::ComposableTask;
use crate::tasks::detect_faces_tasks::{DetectAllFacesTask, DetectSingleFaceTask, DetectionPlan};
use crate::tasks::error::TaskError;

async fn landmarks_for(
    plan: &DetectionPlan,
    model: LandmarkModel,
    detection: FaceDetection,
    cancel: &CancellationToken,
) -> Result<FaceDetectionWithLandmarks, TaskError> {
    cancel.check()?;
    log::trace!(
        "Running {} on face at ({:.0}, {:.0})",
        model.net_name(),
        detection.bbox().x,
        detection.bbox().y
    );
    let landmarks = plan
        .nets()
        .face_landmarks(model)?
        .detect_landmarks(plan.input(), &detection, cancel)
        .await?;
    Ok(FaceDetectionWithLandmarks {
        detection,
        landmarks,
    })
}

/// Landmarks for every face the parent found, in the parent's order.
#[derive(Clone, Debug)]
pub struct DetectAllFaceLandmarksTask {
    parent: DetectAllFacesTask,
    model: LandmarkModel,
}

impl DetectAllFaceLandmarksTask {
    pub(crate) fn new(parent: DetectAllFacesTask, model: LandmarkModel) -> Self {
        Self { parent, model }
    }

    pub fn landmark_model(&self) -> LandmarkModel {
        self.model
    }
}

#[async_trait]
impl ComposableTask for DetectAllFaceLandmarksTask {
    type Output = Vec<FaceDetectionWithLandmarks>;

    async fn run_with(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<FaceDetectionWithLandmarks>, TaskError> {
        let detections = self.parent.run_with(cancel).await?;
        log::debug!(
            "Extracting landmarks for {} faces with {}",
            detections.len(),
            self.model.net_name()
        );

        let plan = self.parent.plan();
        let mut results = Vec::with_capacity(detections.len());
        for detection in detections {
            results.push(landmarks_for(plan, self.model, detection, cancel).await?);
        }
        Ok(results)
    }
}

/// Landmarks for the parent's single face, if it found one.
#[derive(Clone, Debug)]
pub struct DetectSingleFaceLandmarksTask {
    parent: DetectSingleFaceTask,
    model: LandmarkModel,
}

impl DetectSingleFaceLandmarksTask {
    pub(crate) fn new(parent: DetectSingleFaceTask, model: LandmarkModel) -> Self {
        Self { parent, model }
    }

    pub fn landmark_model(&self) -> LandmarkModel {
        self.model
    }
}

#[async_trait]
impl ComposableTask for DetectSingleFaceLandmarksTask {
    type Output = Option<FaceDetectionWithLandmarks>;

    async fn run_with(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<FaceDetectionWithLandmarks>, TaskError> {
        let Some(detection) = self.parent.run_with(cancel).await? else {
            log::debug!("No face found, skipping {}", self.model.net_name());
            return Ok(None);
        };
        let with_landmarks =
            landmarks_for(self.parent.plan(), self.model, detection, cancel).await?;
        Ok(Some(with_landmarks))
    }
}
