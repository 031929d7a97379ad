use ndarray::ArrayView3;

use super::net_input::InputError;

/// Raw interleaved pixel buffer in row-major order.
///
/// The buffer is checked against its dimensions at construction, so every
/// `Frame` in circulation can be viewed as an `[H, W, C]` array.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn try_new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        channels: u8,
    ) -> Result<Self, InputError> {
        let expected = (width as usize) * (height as usize) * (channels as usize);
        if data.len() != expected {
            return Err(InputError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length is checked in try_new")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

impl From<&image::RgbImage> for Frame {
    fn from(img: &image::RgbImage) -> Self {
        Self {
            data: img.as_raw().clone(),
            width: img.width(),
            height: img.height(),
            channels: 3,
        }
    }
}
