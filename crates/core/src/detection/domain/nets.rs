use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::detection::domain::detector_options::{
    SsdMobilenetV1Options, TinyFaceDetectorOptions, TinyYolov2Options,
};
use crate::detection::domain::face_detector::{FaceLandmarkNet, FaceLocator, MtcnnNet};
use crate::shared::constants::{
    FACE_LANDMARK_68_NET, FACE_LANDMARK_68_TINY_NET, MTCNN_NET, SSD_MOBILENET_V1_NET,
    TINY_FACE_DETECTOR_NET, TINY_YOLOV2_NET,
};

/// A dispatch needed a net that was never registered.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{net} is not loaded")]
pub struct NetNotLoaded {
    pub net: &'static str,
}

/// Which landmark net a landmark stage calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LandmarkModel {
    Full,
    /// Lightweight net; faster, less precise on the jaw outline.
    Tiny,
}

impl LandmarkModel {
    pub fn from_tiny_flag(use_tiny_landmark_net: bool) -> Self {
        if use_tiny_landmark_net {
            Self::Tiny
        } else {
            Self::Full
        }
    }

    pub fn net_name(self) -> &'static str {
        match self {
            Self::Full => FACE_LANDMARK_68_NET,
            Self::Tiny => FACE_LANDMARK_68_TINY_NET,
        }
    }
}

/// The backends a chain may dispatch to.
///
/// Cloning is cheap: every slot is reference counted. A slot left empty
/// fails the dispatch that needs it with [`NetNotLoaded`].
#[derive(Clone, Default)]
pub struct Nets {
    ssd_mobilenet_v1: Option<Arc<dyn FaceLocator<SsdMobilenetV1Options>>>,
    tiny_face_detector: Option<Arc<dyn FaceLocator<TinyFaceDetectorOptions>>>,
    tiny_yolov2: Option<Arc<dyn FaceLocator<TinyYolov2Options>>>,
    mtcnn: Option<Arc<dyn MtcnnNet>>,
    face_landmark_68: Option<Arc<dyn FaceLandmarkNet>>,
    face_landmark_68_tiny: Option<Arc<dyn FaceLandmarkNet>>,
}

fn loaded<'a, T: ?Sized>(
    slot: &'a Option<Arc<T>>,
    net: &'static str,
) -> Result<&'a Arc<T>, NetNotLoaded> {
    slot.as_ref().ok_or(NetNotLoaded { net })
}

impl Nets {
    pub fn builder() -> NetsBuilder {
        NetsBuilder::default()
    }

    pub fn ssd_mobilenet_v1(
        &self,
    ) -> Result<&Arc<dyn FaceLocator<SsdMobilenetV1Options>>, NetNotLoaded> {
        loaded(&self.ssd_mobilenet_v1, SSD_MOBILENET_V1_NET)
    }

    pub fn tiny_face_detector(
        &self,
    ) -> Result<&Arc<dyn FaceLocator<TinyFaceDetectorOptions>>, NetNotLoaded> {
        loaded(&self.tiny_face_detector, TINY_FACE_DETECTOR_NET)
    }

    pub fn tiny_yolov2(&self) -> Result<&Arc<dyn FaceLocator<TinyYolov2Options>>, NetNotLoaded> {
        loaded(&self.tiny_yolov2, TINY_YOLOV2_NET)
    }

    pub fn mtcnn(&self) -> Result<&Arc<dyn MtcnnNet>, NetNotLoaded> {
        loaded(&self.mtcnn, MTCNN_NET)
    }

    pub fn face_landmarks(
        &self,
        model: LandmarkModel,
    ) -> Result<&Arc<dyn FaceLandmarkNet>, NetNotLoaded> {
        match model {
            LandmarkModel::Full => loaded(&self.face_landmark_68, FACE_LANDMARK_68_NET),
            LandmarkModel::Tiny => loaded(&self.face_landmark_68_tiny, FACE_LANDMARK_68_TINY_NET),
        }
    }

    fn loaded_names(&self) -> Vec<&'static str> {
        [
            (self.ssd_mobilenet_v1.is_some(), SSD_MOBILENET_V1_NET),
            (self.tiny_face_detector.is_some(), TINY_FACE_DETECTOR_NET),
            (self.tiny_yolov2.is_some(), TINY_YOLOV2_NET),
            (self.mtcnn.is_some(), MTCNN_NET),
            (self.face_landmark_68.is_some(), FACE_LANDMARK_68_NET),
            (self.face_landmark_68_tiny.is_some(), FACE_LANDMARK_68_TINY_NET),
        ]
        .into_iter()
        .filter_map(|(present, name)| present.then_some(name))
        .collect()
    }
}

impl fmt::Debug for Nets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nets")
            .field("loaded", &self.loaded_names())
            .finish()
    }
}

#[derive(Default)]
pub struct NetsBuilder {
    nets: Nets,
}

impl NetsBuilder {
    pub fn ssd_mobilenet_v1(mut self, net: Arc<dyn FaceLocator<SsdMobilenetV1Options>>) -> Self {
        self.nets.ssd_mobilenet_v1 = Some(net);
        self
    }

    pub fn tiny_face_detector(
        mut self,
        net: Arc<dyn FaceLocator<TinyFaceDetectorOptions>>,
    ) -> Self {
        self.nets.tiny_face_detector = Some(net);
        self
    }

    pub fn tiny_yolov2(mut self, net: Arc<dyn FaceLocator<TinyYolov2Options>>) -> Self {
        self.nets.tiny_yolov2 = Some(net);
        self
    }

    pub fn mtcnn(mut self, net: Arc<dyn MtcnnNet>) -> Self {
        self.nets.mtcnn = Some(net);
        self
    }

    pub fn face_landmark_68(mut self, net: Arc<dyn FaceLandmarkNet>) -> Self {
        self.nets.face_landmark_68 = Some(net);
        self
    }

    pub fn face_landmark_68_tiny(mut self, net: Arc<dyn FaceLandmarkNet>) -> Self {
        self.nets.face_landmark_68_tiny = Some(net);
        self
    }

    pub fn build(self) -> Nets {
        self.nets
    }
}
