use thiserror::Error;

use crate::detection::domain::detector_options::{ConfigError, OptionsError, UnsupportedDetector};
use crate::detection::domain::face_detector::BackendError;
use crate::detection::domain::nets::NetNotLoaded;
use crate::shared::cancellation::Cancelled;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(
        "unsupported detector configuration `{found}`: expected one of \
         mtcnn | tiny_face_detector | ssd_mobilenet_v1 | tiny_yolov2"
    )]
    UnsupportedConfiguration { found: String },
    #[error("invalid detector options: {0}")]
    InvalidOptions(#[from] OptionsError),
    #[error("{net} is not loaded")]
    NetNotLoaded { net: &'static str },
    #[error("task cancelled")]
    Cancelled,
    /// Failure raised by a backend, passed through as is.
    #[error(transparent)]
    Backend(BackendError),
}

impl From<Cancelled> for TaskError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// A backend that noticed the token itself reports [`Cancelled`]; that is
/// surfaced the same way as a cancel caught between stages.
impl From<BackendError> for TaskError {
    fn from(err: BackendError) -> Self {
        match err.downcast::<Cancelled>() {
            Ok(_) => Self::Cancelled,
            Err(err) => Self::Backend(err),
        }
    }
}

impl From<UnsupportedDetector> for TaskError {
    fn from(err: UnsupportedDetector) -> Self {
        Self::UnsupportedConfiguration { found: err.found }
    }
}

impl From<ConfigError> for TaskError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Unsupported(err) => err.into(),
            ConfigError::Invalid(err) => err.into(),
        }
    }
}

impl From<NetNotLoaded> for TaskError {
    fn from(err: NetNotLoaded) -> Self {
        Self::NetNotLoaded { net: err.net }
    }
}
