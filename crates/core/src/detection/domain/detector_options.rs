//! Detector configuration: which backend to run and how to tune it.
//!
//! The set of detectors is closed. Each variant carries its own parameter
//! type, and the variant itself selects the backend, so there is no separate
//! discriminant to keep in sync.
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_INPUT_SIZE, DEFAULT_MAX_NUM_SCALES, DEFAULT_MAX_RESULTS, DEFAULT_MIN_CONFIDENCE,
    DEFAULT_MIN_FACE_SIZE, DEFAULT_MTCNN_SCORE_THRESHOLDS, DEFAULT_SCALE_FACTOR,
    DEFAULT_SCORE_THRESHOLD, INPUT_SIZE_STRIDE, MTCNN_NET, SSD_MOBILENET_V1_NET,
    TINY_FACE_DETECTOR_NET, TINY_YOLOV2_NET,
};

#[derive(Debug, Error, PartialEq)]
pub enum OptionsError {
    #[error("{name} must be in (0, 1), got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },
    #[error("{name} must be at least 1")]
    Zero { name: &'static str },
    #[error("input_size must be a multiple of {stride}, got {0}", stride = INPUT_SIZE_STRIDE)]
    InputSize(u32),
    #[error("scale_steps must all be positive, got {0}")]
    ScaleStep(f64),
    #[error("invalid {detector} options: {message}")]
    Malformed {
        detector: DetectorKind,
        message: String,
    },
    #[error("malformed options document: {0}")]
    Document(String),
}

#[derive(Debug, Error, PartialEq)]
#[error(
    "unsupported detector configuration `{found}`: expected one of \
     mtcnn | tiny_face_detector | ssd_mobilenet_v1 | tiny_yolov2"
)]
pub struct UnsupportedDetector {
    pub found: String,
}

/// Why an untyped options document could not be resolved.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedDetector),
    #[error(transparent)]
    Invalid(#[from] OptionsError),
}

fn unit_range(name: &'static str, value: f64) -> Result<(), OptionsError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(OptionsError::OutOfUnitRange { name, value })
    }
}

fn non_zero(name: &'static str, value: usize) -> Result<(), OptionsError> {
    if value == 0 {
        Err(OptionsError::Zero { name })
    } else {
        Ok(())
    }
}

fn input_size(value: u32) -> Result<(), OptionsError> {
    if value == 0 || value % INPUT_SIZE_STRIDE != 0 {
        Err(OptionsError::InputSize(value))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-variant options
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SsdMobilenetV1Fields")]
pub struct SsdMobilenetV1Options {
    min_confidence: f64,
    max_results: usize,
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SsdMobilenetV1Fields {
    min_confidence: f64,
    max_results: usize,
}

impl Default for SsdMobilenetV1Fields {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl TryFrom<SsdMobilenetV1Fields> for SsdMobilenetV1Options {
    type Error = OptionsError;

    fn try_from(f: SsdMobilenetV1Fields) -> Result<Self, Self::Error> {
        Self::new(f.min_confidence, f.max_results)
    }
}

impl SsdMobilenetV1Options {
    pub fn new(min_confidence: f64, max_results: usize) -> Result<Self, OptionsError> {
        let opts = Self {
            min_confidence,
            max_results,
        };
        opts.validate()?;
        Ok(opts)
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    fn validate(&self) -> Result<(), OptionsError> {
        unit_range("min_confidence", self.min_confidence)?;
        non_zero("max_results", self.max_results)
    }
}

impl Default for SsdMobilenetV1Options {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// Shared parameters of the two tiny YOLO-style detectors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TinyDetectorFields")]
pub struct TinyDetectorParams {
    input_size: u32,
    score_threshold: f64,
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TinyDetectorFields {
    input_size: u32,
    score_threshold: f64,
}

impl Default for TinyDetectorFields {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

impl TryFrom<TinyDetectorFields> for TinyDetectorParams {
    type Error = OptionsError;

    fn try_from(f: TinyDetectorFields) -> Result<Self, Self::Error> {
        Self::new(f.input_size, f.score_threshold)
    }
}

impl TinyDetectorParams {
    pub fn new(input_size: u32, score_threshold: f64) -> Result<Self, OptionsError> {
        let params = Self {
            input_size,
            score_threshold,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn score_threshold(&self) -> f64 {
        self.score_threshold
    }

    fn validate(&self) -> Result<(), OptionsError> {
        input_size(self.input_size)?;
        unit_range("score_threshold", self.score_threshold)
    }
}

impl Default for TinyDetectorParams {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TinyFaceDetectorOptions(TinyDetectorParams);

impl TinyFaceDetectorOptions {
    pub fn new(input_size: u32, score_threshold: f64) -> Result<Self, OptionsError> {
        TinyDetectorParams::new(input_size, score_threshold).map(Self)
    }

    pub fn params(&self) -> &TinyDetectorParams {
        &self.0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TinyYolov2Options(TinyDetectorParams);

impl TinyYolov2Options {
    pub fn new(input_size: u32, score_threshold: f64) -> Result<Self, OptionsError> {
        TinyDetectorParams::new(input_size, score_threshold).map(Self)
    }

    pub fn params(&self) -> &TinyDetectorParams {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MtcnnFields")]
pub struct MtcnnOptions {
    min_face_size: u32,
    scale_factor: f64,
    max_num_scales: usize,
    score_thresholds: [f64; 3],
    /// Explicit pyramid scales; when set, replaces the scale_factor pyramid.
    scale_steps: Option<Vec<f64>>,
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MtcnnFields {
    min_face_size: u32,
    scale_factor: f64,
    max_num_scales: usize,
    score_thresholds: [f64; 3],
    scale_steps: Option<Vec<f64>>,
}

impl Default for MtcnnFields {
    fn default() -> Self {
        let d = MtcnnOptions::default();
        Self {
            min_face_size: d.min_face_size,
            scale_factor: d.scale_factor,
            max_num_scales: d.max_num_scales,
            score_thresholds: d.score_thresholds,
            scale_steps: d.scale_steps,
        }
    }
}

impl TryFrom<MtcnnFields> for MtcnnOptions {
    type Error = OptionsError;

    fn try_from(f: MtcnnFields) -> Result<Self, Self::Error> {
        let opts = Self {
            min_face_size: f.min_face_size,
            scale_factor: f.scale_factor,
            max_num_scales: f.max_num_scales,
            score_thresholds: f.score_thresholds,
            scale_steps: f.scale_steps,
        };
        opts.validate()?;
        Ok(opts)
    }
}

impl MtcnnOptions {
    pub fn builder() -> MtcnnOptionsBuilder {
        MtcnnOptionsBuilder::default()
    }

    pub fn min_face_size(&self) -> u32 {
        self.min_face_size
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn max_num_scales(&self) -> usize {
        self.max_num_scales
    }

    pub fn score_thresholds(&self) -> [f64; 3] {
        self.score_thresholds
    }

    pub fn scale_steps(&self) -> Option<&[f64]> {
        self.scale_steps.as_deref()
    }

    fn validate(&self) -> Result<(), OptionsError> {
        non_zero("min_face_size", self.min_face_size as usize)?;
        unit_range("scale_factor", self.scale_factor)?;
        non_zero("max_num_scales", self.max_num_scales)?;
        for t in self.score_thresholds {
            unit_range("score_thresholds", t)?;
        }
        if let Some(step) = self
            .scale_steps
            .iter()
            .flatten()
            .find(|s| !(**s > 0.0))
        {
            return Err(OptionsError::ScaleStep(*step));
        }
        Ok(())
    }
}

impl Default for MtcnnOptions {
    fn default() -> Self {
        Self {
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            scale_factor: DEFAULT_SCALE_FACTOR,
            max_num_scales: DEFAULT_MAX_NUM_SCALES,
            score_thresholds: DEFAULT_MTCNN_SCORE_THRESHOLDS,
            scale_steps: None,
        }
    }
}

/// Validating builder for [`MtcnnOptions`]; unset fields keep their defaults.
#[derive(Clone, Debug, Default)]
pub struct MtcnnOptionsBuilder {
    opts: MtcnnOptions,
}

impl MtcnnOptionsBuilder {
    pub fn min_face_size(mut self, value: u32) -> Self {
        self.opts.min_face_size = value;
        self
    }

    pub fn scale_factor(mut self, value: f64) -> Self {
        self.opts.scale_factor = value;
        self
    }

    pub fn max_num_scales(mut self, value: usize) -> Self {
        self.opts.max_num_scales = value;
        self
    }

    pub fn score_thresholds(mut self, value: [f64; 3]) -> Self {
        self.opts.score_thresholds = value;
        self
    }

    pub fn scale_steps(mut self, value: Vec<f64>) -> Self {
        self.opts.scale_steps = Some(value);
        self
    }

    pub fn build(self) -> Result<MtcnnOptions, OptionsError> {
        self.opts.validate()?;
        Ok(self.opts)
    }
}

// ---------------------------------------------------------------------------
// Variant set
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetectorKind {
    Mtcnn,
    TinyFaceDetector,
    SsdMobilenetV1,
    TinyYolov2,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 4] = [
        DetectorKind::Mtcnn,
        DetectorKind::TinyFaceDetector,
        DetectorKind::SsdMobilenetV1,
        DetectorKind::TinyYolov2,
    ];

    /// Net name used in configuration documents and logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Mtcnn => MTCNN_NET,
            Self::TinyFaceDetector => TINY_FACE_DETECTOR_NET,
            Self::SsdMobilenetV1 => SSD_MOBILENET_V1_NET,
            Self::TinyYolov2 => TINY_YOLOV2_NET,
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DetectorKind {
    type Err = UnsupportedDetector;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnsupportedDetector {
                found: s.to_string(),
            })
    }
}

/// The active detector and its parameters. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectorOptions {
    Mtcnn(MtcnnOptions),
    TinyFaceDetector(TinyFaceDetectorOptions),
    SsdMobilenetV1(SsdMobilenetV1Options),
    TinyYolov2(TinyYolov2Options),
}

impl DetectorOptions {
    pub fn kind(&self) -> DetectorKind {
        match self {
            Self::Mtcnn(_) => DetectorKind::Mtcnn,
            Self::TinyFaceDetector(_) => DetectorKind::TinyFaceDetector,
            Self::SsdMobilenetV1(_) => DetectorKind::SsdMobilenetV1,
            Self::TinyYolov2(_) => DetectorKind::TinyYolov2,
        }
    }

    /// Default parameters for the named detector.
    pub fn for_kind(kind: DetectorKind) -> Self {
        match kind {
            DetectorKind::Mtcnn => Self::Mtcnn(MtcnnOptions::default()),
            DetectorKind::TinyFaceDetector => Self::TinyFaceDetector(Default::default()),
            DetectorKind::SsdMobilenetV1 => Self::SsdMobilenetV1(Default::default()),
            DetectorKind::TinyYolov2 => Self::TinyYolov2(Default::default()),
        }
    }

    /// Parses `{"detector": "<name>", ...params}`.
    ///
    /// Unknown or missing detector names are [`ConfigError::Unsupported`]. A
    /// document that is not a JSON object is [`OptionsError::Document`].
    /// Parameters missing from the document keep their defaults and are
    /// validated like the constructors.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut doc: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|e| OptionsError::Document(e.to_string()))?;
        let name = match doc.remove("detector") {
            Some(serde_json::Value::String(name)) => name,
            Some(other) => other.to_string(),
            None => String::from("<missing detector>"),
        };
        let kind: DetectorKind = name.parse()?;
        let params = serde_json::Value::Object(doc);

        let options = match kind {
            DetectorKind::Mtcnn => Self::Mtcnn(parse_params(kind, params)?),
            DetectorKind::TinyFaceDetector => {
                Self::TinyFaceDetector(parse_params(kind, params)?)
            }
            DetectorKind::SsdMobilenetV1 => Self::SsdMobilenetV1(parse_params(kind, params)?),
            DetectorKind::TinyYolov2 => Self::TinyYolov2(parse_params(kind, params)?),
        };
        Ok(options)
    }
}

fn parse_params<T: DeserializeOwned>(
    detector: DetectorKind,
    params: serde_json::Value,
) -> Result<T, OptionsError> {
    serde_json::from_value(params).map_err(|e| OptionsError::Malformed {
        detector,
        message: e.to_string(),
    })
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self::SsdMobilenetV1(SsdMobilenetV1Options::default())
    }
}

impl From<MtcnnOptions> for DetectorOptions {
    fn from(o: MtcnnOptions) -> Self {
        Self::Mtcnn(o)
    }
}

impl From<TinyFaceDetectorOptions> for DetectorOptions {
    fn from(o: TinyFaceDetectorOptions) -> Self {
        Self::TinyFaceDetector(o)
    }
}

impl From<SsdMobilenetV1Options> for DetectorOptions {
    fn from(o: SsdMobilenetV1Options) -> Self {
        Self::SsdMobilenetV1(o)
    }
}

impl From<TinyYolov2Options> for DetectorOptions {
    fn from(o: TinyYolov2Options) -> Self {
        Self::TinyYolov2(o)
    }
}
