//! Image preprocessing: decode, crop, resize and normalize a face region
//! into the model's input tensor.
//!
//! The whole input is stretched to 112×112 (no square crop) with the
//! `image` crate's Triangle filter, i.e. bilinear resampling. Each channel
//! byte is mapped to `(b - 128) / 128`, giving values in [-1.0, 0.9921875].

use crate::error::RecognitionError;
use crate::types::{BoundingBox, Tensor, INPUT_SIZE, TENSOR_LEN};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use std::path::Path;

const NORM_MEAN: f32 = 128.0;
const NORM_STD: f32 = 128.0;
const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// An 8-bit RGB face image with non-zero dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceImage {
    rgb: RgbImage,
}

impl FaceImage {
    /// Wrap packed RGB bytes (`width * height * 3`).
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self, RecognitionError> {
        check_dimensions(width, height)?;
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(RecognitionError::InvalidImage(format!(
                "expected {expected} bytes for {width}x{height} RGB, got {}",
                data.len()
            )));
        }
        let rgb = RgbImage::from_raw(width, height, data).ok_or_else(|| {
            RecognitionError::InvalidImage(format!("{width}x{height} image does not fit buffer"))
        })?;
        Ok(Self { rgb })
    }

    /// Convert any decoded image, dropping alpha.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self, RecognitionError> {
        check_dimensions(image.width(), image.height())?;
        Ok(Self { rgb: image.into_rgb8() })
    }

    /// Decode an encoded image (JPEG, PNG, ...) from memory.
    pub fn decode(bytes: &[u8]) -> Result<Self, RecognitionError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| RecognitionError::InvalidImage(format!("decode failed: {e}")))?;
        Self::from_dynamic(image)
    }

    /// Read and decode an image file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RecognitionError> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| {
            RecognitionError::InvalidImage(format!("{}: {e}", path.display()))
        })?;
        Self::from_dynamic(image)
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.rgb
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), RecognitionError> {
    if width == 0 || height == 0 {
        return Err(RecognitionError::InvalidImage(format!(
            "image dimensions must be non-zero, got {width}x{height}"
        )));
    }
    Ok(())
}

/// Stateless image → tensor converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Resize `image` to 112×112 and normalize it into a fresh [`Tensor`].
    pub fn prepare(&self, image: &FaceImage) -> Result<Tensor, RecognitionError> {
        check_dimensions(image.width(), image.height())?;

        let size = INPUT_SIZE as u32;
        let resized = if image.rgb.dimensions() == (size, size) {
            image.rgb.clone()
        } else {
            imageops::resize(&image.rgb, size, size, RESIZE_FILTER)
        };

        let mut values = Vec::with_capacity(TENSOR_LEN);
        for pixel in resized.pixels() {
            let [r, g, b] = pixel.0;
            values.push(normalize(r));
            values.push(normalize(g));
            values.push(normalize(b));
        }

        if values.len() != TENSOR_LEN {
            return Err(RecognitionError::InvalidImage(format!(
                "resample produced {} values, expected {TENSOR_LEN}",
                values.len()
            )));
        }

        Ok(Tensor::new(values))
    }
}

fn normalize(channel: u8) -> f32 {
    (channel as f32 - NORM_MEAN) / NORM_STD
}

/// Crop a detector bounding box out of a full frame.
///
/// The box is rounded to whole pixels and clamped to the frame. Fails with
/// `InvalidImage` when nothing of the box lies inside the frame.
pub fn crop_region(frame: &FaceImage, bbox: &BoundingBox) -> Result<FaceImage, RecognitionError> {
    let coords = [bbox.x, bbox.y, bbox.width, bbox.height];
    if coords.iter().any(|v| !v.is_finite()) {
        return Err(RecognitionError::InvalidImage(format!(
            "bounding box has non-finite coordinates: {bbox:?}"
        )));
    }

    let frame_w = frame.width() as f32;
    let frame_h = frame.height() as f32;

    let x0 = bbox.x.round().clamp(0.0, frame_w);
    let y0 = bbox.y.round().clamp(0.0, frame_h);
    let x1 = (bbox.x + bbox.width).round().clamp(0.0, frame_w);
    let y1 = (bbox.y + bbox.height).round().clamp(0.0, frame_h);

    if x1 <= x0 || y1 <= y0 {
        return Err(RecognitionError::InvalidImage(format!(
            "bounding box {bbox:?} does not overlap {}x{} frame",
            frame.width(),
            frame.height()
        )));
    }

    let (x, y) = (x0 as u32, y0 as u32);
    let (w, h) = ((x1 - x0) as u32, (y1 - y0) as u32);
    let rgb = imageops::crop_imm(&frame.rgb, x, y, w, h).to_image();

    tracing::trace!(x, y, width = w, height = h, "cropped face region");
    Ok(FaceImage { rgb })
}
