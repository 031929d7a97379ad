//! Face detection tasks and the factories that start a chain.
//!
//! Building a task only records a plan (nets, input, options). Backends are
//! called when the terminal task of a chain is run, and again on every
//! further run.
use async_trait::async_trait;

use crate::detection::domain::detector_options::DetectorOptions;
use crate::detection::domain::face_detection::FaceDetection;
use crate::detection::domain::nets::{LandmarkModel, Nets};
use crate::shared::cancellation::CancellationToken;
use crate::shared::net_input::NetInput;
use crate::tasks::composable_task::ComposableTask;
use crate::tasks::detect_landmarks_tasks::{
    DetectAllFaceLandmarksTask, DetectSingleFaceLandmarksTask,
};
use crate::tasks::error::TaskError;
use crate::tasks::selection::SelectionPolicy;

/// Starts a chain that finds every face in `input`.
///
/// Pass `DetectorOptions::default()` for the SSD MobileNet V1 detector.
pub fn detect_all_faces(
    nets: &Nets,
    input: impl Into<NetInput>,
    options: DetectorOptions,
) -> DetectAllFacesTask {
    DetectAllFacesTask {
        plan: DetectionPlan::new(nets, input.into(), options),
    }
}

/// Starts a chain that yields at most one face from `input`.
pub fn detect_single_face(
    nets: &Nets,
    input: impl Into<NetInput>,
    options: DetectorOptions,
) -> DetectSingleFaceTask {
    DetectSingleFaceTask {
        plan: DetectionPlan::new(nets, input.into(), options),
        selection: SelectionPolicy::default(),
    }
}

/// What a detection stage needs to reach its backend.
#[derive(Clone, Debug)]
pub(crate) struct DetectionPlan {
    nets: Nets,
    input: NetInput,
    options: DetectorOptions,
}

impl DetectionPlan {
    fn new(nets: &Nets, input: NetInput, options: DetectorOptions) -> Self {
        Self {
            nets: nets.clone(),
            input,
            options,
        }
    }

    pub(crate) fn nets(&self) -> &Nets {
        &self.nets
    }

    pub(crate) fn input(&self) -> &NetInput {
        &self.input
    }

    /// Calls exactly the backend selected by the options.
    async fn detect_all(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<FaceDetection>, TaskError> {
        cancel.check()?;
        let kind = self.options.kind();
        log::debug!(
            "Dispatching {} input ({}x{}) to {kind}",
            self.input.kind(),
            self.input.width(),
            self.input.height()
        );

        let nets = &self.nets;
        let input = &self.input;
        let detections = match &self.options {
            // Landmarks from the O-Net are dropped; landmark stages recompute them.
            DetectorOptions::Mtcnn(options) => nets
                .mtcnn()?
                .forward(input, options, cancel)
                .await?
                .into_iter()
                .map(|result| result.detection)
                .collect(),
            DetectorOptions::TinyFaceDetector(options) => {
                nets.tiny_face_detector()?
                    .locate_faces(input, options, cancel)
                    .await?
            }
            DetectorOptions::SsdMobilenetV1(options) => {
                nets.ssd_mobilenet_v1()?
                    .locate_faces(input, options, cancel)
                    .await?
            }
            DetectorOptions::TinyYolov2(options) => {
                nets.tiny_yolov2()?
                    .locate_faces(input, options, cancel)
                    .await?
            }
        };

        log::debug!("{kind} found {} faces", detections.len());
        Ok(detections)
    }
}

/// All faces in the input, in the order the backend reports them.
#[derive(Clone, Debug)]
pub struct DetectAllFacesTask {
    plan: DetectionPlan,
}

impl DetectAllFacesTask {
    pub fn input(&self) -> &NetInput {
        &self.plan.input
    }

    pub fn options(&self) -> &DetectorOptions {
        &self.plan.options
    }

    /// Chains a landmark stage after this detection.
    pub fn with_face_landmarks(&self, use_tiny_landmark_net: bool) -> DetectAllFaceLandmarksTask {
        DetectAllFaceLandmarksTask::new(
            self.clone(),
            LandmarkModel::from_tiny_flag(use_tiny_landmark_net),
        )
    }

    pub(crate) fn plan(&self) -> &DetectionPlan {
        &self.plan
    }
}

#[async_trait]
impl ComposableTask for DetectAllFacesTask {
    type Output = Vec<FaceDetection>;

    async fn run_with(&self, cancel: &CancellationToken) -> Result<Vec<FaceDetection>, TaskError> {
        self.plan.detect_all(cancel).await
    }
}

/// At most one face, picked from a fresh all-faces run by a [`SelectionPolicy`].
#[derive(Clone, Debug)]
pub struct DetectSingleFaceTask {
    plan: DetectionPlan,
    selection: SelectionPolicy,
}

impl DetectSingleFaceTask {
    pub fn input(&self) -> &NetInput {
        &self.plan.input
    }

    pub fn options(&self) -> &DetectorOptions {
        &self.plan.options
    }

    pub fn selection(&self) -> SelectionPolicy {
        self.selection
    }

    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    /// Chains a landmark stage after this detection.
    pub fn with_face_landmarks(
        &self,
        use_tiny_landmark_net: bool,
    ) -> DetectSingleFaceLandmarksTask {
        DetectSingleFaceLandmarksTask::new(
            self.clone(),
            LandmarkModel::from_tiny_flag(use_tiny_landmark_net),
        )
    }

    pub(crate) fn plan(&self) -> &DetectionPlan {
        &self.plan
    }
}

#[async_trait]
impl ComposableTask for DetectSingleFaceTask {
    type Output = Option<FaceDetection>;

    async fn run_with(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<FaceDetection>, TaskError> {
        let all = DetectAllFacesTask {
            plan: self.plan.clone(),
        };
        let detections = all.run_with(cancel).await?;
        Ok(self.selection.select(detections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use approx::assert_relative_eq;
    use pollster::block_on;
    use rstest::rstest;

    use crate::detection::domain::detector_options::{
        MtcnnOptions, SsdMobilenetV1Options, TinyFaceDetectorOptions, TinyYolov2Options,
    };
    use crate::tasks::test_support::{
        input, scored, three_faces, StubBackends, StubError, StubLocator,
    };

    // ── dispatch ────────────────────────────────────────────────────

    #[rstest]
    #[case::mtcnn(MtcnnOptions::default().into(), [1, 0, 0, 0])]
    #[case::tiny_face_detector(TinyFaceDetectorOptions::default().into(), [0, 1, 0, 0])]
    #[case::ssd_mobilenet_v1(SsdMobilenetV1Options::default().into(), [0, 0, 1, 0])]
    #[case::tiny_yolov2(TinyYolov2Options::default().into(), [0, 0, 0, 1])]
    fn test_each_variant_calls_only_its_backend(
        #[case] options: DetectorOptions,
        #[case] expected_calls: [usize; 4],
    ) {
        let stubs = StubBackends::new();
        let detections = block_on(detect_all_faces(&stubs.nets(), input(), options).run()).unwrap();
        assert_eq!(detections, three_faces());
        assert_eq!(stubs.detector_calls(), expected_calls);
    }

    #[test]
    fn test_default_options_use_ssd_mobilenet_v1() {
        let stubs = StubBackends::new();
        let task = detect_all_faces(&stubs.nets(), input(), DetectorOptions::default());
        block_on(task.run()).unwrap();
        assert_eq!(stubs.detector_calls(), [0, 0, 1, 0]);
    }

    #[test]
    fn test_mtcnn_projects_detections_and_drops_landmarks() {
        let stubs = StubBackends::new();
        let task = detect_all_faces(&stubs.nets(), input(), MtcnnOptions::default().into());
        let detections = block_on(task.run()).unwrap();
        let expected: Vec<FaceDetection> = stubs
            .mtcnn
            .results()
            .iter()
            .map(|r| r.detection.clone())
            .collect();
        assert_eq!(detections, expected);
    }

    #[test]
    fn test_backend_order_is_preserved() {
        let stubs = StubBackends::with_detections(vec![
            scored(0.2, 0.0),
            scored(0.8, 1.0),
            scored(0.5, 2.0),
        ]);
        let task = detect_all_faces(&stubs.nets(), input(), DetectorOptions::default());
        let scores: Vec<f64> = block_on(task.run()).unwrap().iter().map(|d| d.score()).collect();
        assert_eq!(scores, vec![0.2, 0.8, 0.5]);
    }

    #[test]
    fn test_unsupported_configuration_calls_no_backend() {
        let stubs = StubBackends::new();
        let nets = stubs.nets();
        let result = DetectorOptions::from_json(r#"{"detector": "retinaface"}"#)
            .map(|options| detect_all_faces(&nets, input(), options))
            .map_err(TaskError::from);
        assert!(matches!(
            result,
            Err(TaskError::UnsupportedConfiguration { .. })
        ));
        assert_eq!(stubs.detector_calls(), [0, 0, 0, 0]);
    }

    #[test]
    fn test_missing_net_fails_without_other_calls() {
        let stubs = StubBackends::new();
        let nets = Nets::builder().ssd_mobilenet_v1(stubs.ssd.clone()).build();
        let task = detect_all_faces(&nets, input(), TinyYolov2Options::default().into());
        let err = block_on(task.run()).unwrap_err();
        assert!(matches!(err, TaskError::NetNotLoaded { net: "tiny_yolov2" }));
        assert_eq!(stubs.detector_calls(), [0, 0, 0, 0]);
    }

    #[test]
    fn test_backend_error_is_propagated_unchanged() {
        let nets = Nets::builder()
            .ssd_mobilenet_v1(Arc::new(StubLocator::failing("ssd weights missing")))
            .build();
        let task = detect_all_faces(&nets, input(), DetectorOptions::default());
        let err = block_on(task.run()).unwrap_err();
        match err {
            TaskError::Backend(inner) => assert_eq!(
                inner.downcast_ref::<StubError>(),
                Some(&StubError("ssd weights missing"))
            ),
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[test]
    fn test_all_faces_run_twice_calls_backend_twice() {
        let stubs = StubBackends::new();
        let task = detect_all_faces(&stubs.nets(), input(), DetectorOptions::default());
        block_on(task.run()).unwrap();
        block_on(task.run()).unwrap();
        assert_eq!(stubs.ssd.calls(), 2);
    }

    #[test]
    fn test_cancelled_token_stops_before_backend() {
        let stubs = StubBackends::new();
        let task = detect_all_faces(&stubs.nets(), input(), DetectorOptions::default());
        let token = CancellationToken::new();
        token.cancel();
        let err = block_on(task.run_with(&token)).unwrap_err();
        assert!(matches!(err, TaskError::Cancelled));
        assert_eq!(stubs.detector_calls(), [0, 0, 0, 0]);
    }

    #[test]
    fn test_accessors_expose_plan() {
        let stubs = StubBackends::new();
        let options: DetectorOptions = TinyFaceDetectorOptions::new(320, 0.4).unwrap().into();
        let task = detect_all_faces(&stubs.nets(), input(), options.clone());
        assert_eq!(task.options(), &options);
        assert_eq!(task.input().width(), 100);
    }

    // ── single face ─────────────────────────────────────────────────

    #[test]
    fn test_single_face_default_policy_picks_highest_score() {
        let stubs = StubBackends::new();
        let task = detect_single_face(&stubs.nets(), input(), DetectorOptions::default());
        assert_eq!(task.selection(), SelectionPolicy::HighestScore);
        let face = block_on(task.run()).unwrap().unwrap();
        assert_relative_eq!(face.score(), 0.9);
    }

    #[test]
    fn test_single_face_lowest_score_policy_picks_lowest() {
        let stubs = StubBackends::new();
        let task = detect_single_face(&stubs.nets(), input(), DetectorOptions::default())
            .with_selection(SelectionPolicy::LowestScore);
        let face = block_on(task.run()).unwrap().unwrap();
        assert_relative_eq!(face.score(), 0.3);
    }

    #[test]
    fn test_single_face_empty_result_is_none() {
        let stubs = StubBackends::with_detections(Vec::new());
        let task = detect_single_face(&stubs.nets(), input(), TinyYolov2Options::default().into());
        assert_eq!(block_on(task.run()).unwrap(), None);
    }

    #[test]
    fn test_single_face_run_twice_calls_backend_twice() {
        let stubs = StubBackends::new();
        let task = detect_single_face(&stubs.nets(), input(), MtcnnOptions::default().into());
        block_on(task.run()).unwrap();
        block_on(task.run()).unwrap();
        assert_eq!(stubs.mtcnn.calls(), 2);
        assert_eq!(stubs.detector_calls(), [2, 0, 0, 0]);
    }
}
