//! Image data accepted by detection tasks.
//!
//! Tasks never look inside the input; they clone the handle into their plan
//! and hand it to whichever backend the options select.
use std::path::Path;
use std::sync::Arc;

use ndarray::Array4;
use thiserror::Error;

use super::frame::Frame;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("pixel buffer has {actual} bytes, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// One of the accepted source representations.
///
/// Every variant is reference counted, so cloning an input into several
/// tasks never copies pixel data.
#[derive(Clone, Debug)]
pub enum NetInput {
    Pixels(Arc<Frame>),
    Image(Arc<image::RgbImage>),
    /// Batch-of-one tensor, either NCHW or NHWC.
    Tensor(Arc<Array4<f32>>),
}

impl NetInput {
    /// Decodes an image file into an RGB handle.
    pub fn open(path: &Path) -> Result<Self, InputError> {
        let img = image::open(path)?.to_rgb8();
        Ok(Self::Image(Arc::new(img)))
    }

    pub fn width(&self) -> u32 {
        match self {
            Self::Pixels(frame) => frame.width(),
            Self::Image(img) => img.width(),
            Self::Tensor(t) => {
                let (_, w) = tensor_hw(t.shape());
                w as u32
            }
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Pixels(frame) => frame.height(),
            Self::Image(img) => img.height(),
            Self::Tensor(t) => {
                let (h, _) = tensor_hw(t.shape());
                h as u32
            }
        }
    }

    /// Short name of the representation, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pixels(_) => "pixels",
            Self::Image(_) => "image",
            Self::Tensor(_) => "tensor",
        }
    }
}

/// Height and width of a 4-D tensor.
///
/// A trailing axis of 1 or 3 is read as channels (NHWC), anything else as NCHW.
fn tensor_hw(shape: &[usize]) -> (usize, usize) {
    match shape {
        [_, h, w, 1 | 3] => (*h, *w),
        [_, _, h, w] => (*h, *w),
        _ => (0, 0),
    }
}

impl From<Frame> for NetInput {
    fn from(frame: Frame) -> Self {
        Self::Pixels(Arc::new(frame))
    }
}

impl From<Arc<Frame>> for NetInput {
    fn from(frame: Arc<Frame>) -> Self {
        Self::Pixels(frame)
    }
}

impl From<image::RgbImage> for NetInput {
    fn from(img: image::RgbImage) -> Self {
        Self::Image(Arc::new(img))
    }
}

impl From<Array4<f32>> for NetInput {
    fn from(tensor: Array4<f32>) -> Self {
        Self::Tensor(Arc::new(tensor))
    }
}
