//! Call-counting stub backends shared by the task tests.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use crate::detection::domain::detector_options::MtcnnOptions;
use crate::detection::domain::face_detection::{BoundingBox, FaceDetection};
use crate::detection::domain::face_detector::{
    BackendError, FaceLandmarkNet, FaceLocator, MtcnnNet, MtcnnResult,
};
use crate::detection::domain::face_landmarks::{FaceLandmarks68, NUM_LANDMARKS_68};
use crate::detection::domain::nets::Nets;
use crate::shared::cancellation::CancellationToken;
use crate::shared::net_input::NetInput;

#[derive(Debug, Error, PartialEq)]
#[error("{0}")]
pub struct StubError(pub &'static str);

pub fn input() -> NetInput {
    NetInput::from(image::RgbImage::new(100, 100))
}

pub fn scored(score: f64, x: f64) -> FaceDetection {
    FaceDetection::new(score, BoundingBox::new(x, 10.0, 20.0, 20.0), (100, 100))
}

/// Detections with scores 0.9, 0.3, 0.6 in that backend order.
pub fn three_faces() -> Vec<FaceDetection> {
    vec![scored(0.9, 0.0), scored(0.3, 30.0), scored(0.6, 60.0)]
}

/// Deterministic landmarks anchored at the detection's top-left corner.
pub fn landmarks_for(detection: &FaceDetection) -> FaceLandmarks68 {
    let b = detection.bbox();
    let pts = (0..NUM_LANDMARKS_68)
        .map(|i| (b.x + i as f64 * 0.1, b.y + i as f64 * 0.1))
        .collect();
    FaceLandmarks68::new(pts).unwrap()
}

pub struct StubLocator {
    detections: Vec<FaceDetection>,
    error: Option<&'static str>,
    calls: AtomicUsize,
}

impl StubLocator {
    pub fn new(detections: Vec<FaceDetection>) -> Self {
        Self {
            detections,
            error: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &'static str) -> Self {
        Self {
            error: Some(message),
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<O: Sync> FaceLocator<O> for StubLocator {
    async fn locate_faces(
        &self,
        _input: &NetInput,
        _options: &O,
        _cancel: &CancellationToken,
    ) -> Result<Vec<FaceDetection>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.error {
            Some(message) => Err(Box::new(StubError(message))),
            None => Ok(self.detections.clone()),
        }
    }
}

pub struct StubMtcnn {
    results: Vec<MtcnnResult>,
    calls: AtomicUsize,
}

impl StubMtcnn {
    pub fn new(detections: Vec<FaceDetection>) -> Self {
        let results = detections
            .into_iter()
            .map(|detection| MtcnnResult {
                landmarks: landmarks_for(&detection).to_five_point(),
                detection,
            })
            .collect();
        Self {
            results,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn results(&self) -> &[MtcnnResult] {
        &self.results
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MtcnnNet for StubMtcnn {
    async fn forward(
        &self,
        _input: &NetInput,
        _options: &MtcnnOptions,
        _cancel: &CancellationToken,
    ) -> Result<Vec<MtcnnResult>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }
}

#[derive(Default)]
pub struct StubLandmarkNet {
    /// 1-based call number that fails.
    fail_on_call: Option<usize>,
    /// Token cancelled right after the first call returns.
    cancel_after_first: Option<CancellationToken>,
    calls: AtomicUsize,
    seen: Mutex<Vec<FaceDetection>>,
}

impl StubLandmarkNet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn cancelling(token: CancellationToken) -> Self {
        Self {
            cancel_after_first: Some(token),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<FaceDetection> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl FaceLandmarkNet for StubLandmarkNet {
    async fn detect_landmarks(
        &self,
        _input: &NetInput,
        detection: &FaceDetection,
        _cancel: &CancellationToken,
    ) -> Result<FaceLandmarks68, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen.lock().unwrap().push(detection.clone());
        if let Some(token) = &self.cancel_after_first {
            token.cancel();
        }
        if self.fail_on_call == Some(call) {
            return Err(Box::new(StubError("landmark regression failed")));
        }
        Ok(landmarks_for(detection))
    }
}

/// One stub per slot so each backend's calls can be counted separately.
pub struct StubBackends {
    pub ssd: Arc<StubLocator>,
    pub tiny_face: Arc<StubLocator>,
    pub tiny_yolo: Arc<StubLocator>,
    pub mtcnn: Arc<StubMtcnn>,
    pub landmarks: Arc<StubLandmarkNet>,
    pub landmarks_tiny: Arc<StubLandmarkNet>,
}

impl StubBackends {
    pub fn new() -> Self {
        Self::with_detections(three_faces())
    }

    pub fn with_detections(detections: Vec<FaceDetection>) -> Self {
        Self {
            ssd: Arc::new(StubLocator::new(detections.clone())),
            tiny_face: Arc::new(StubLocator::new(detections.clone())),
            tiny_yolo: Arc::new(StubLocator::new(detections.clone())),
            mtcnn: Arc::new(StubMtcnn::new(detections)),
            landmarks: Arc::new(StubLandmarkNet::new()),
            landmarks_tiny: Arc::new(StubLandmarkNet::new()),
        }
    }

    pub fn nets(&self) -> Nets {
        Nets::builder()
            .ssd_mobilenet_v1(self.ssd.clone())
            .tiny_face_detector(self.tiny_face.clone())
            .tiny_yolov2(self.tiny_yolo.clone())
            .mtcnn(self.mtcnn.clone())
            .face_landmark_68(self.landmarks.clone())
            .face_landmark_68_tiny(self.landmarks_tiny.clone())
            .build()
    }

    /// Calls per detector as `[mtcnn, tiny_face_detector, ssd_mobilenet_v1, tiny_yolov2]`.
    pub fn detector_calls(&self) -> [usize; 4] {
        [
            self.mtcnn.calls(),
            self.tiny_face.calls(),
            self.ssd.calls(),
            self.tiny_yolo.calls(),
        ]
    }
}
