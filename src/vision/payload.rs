//! Decoding of uploaded images

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use crate::classifier::ClassifierError;
use crate::error::AppError;

/// A decoded image, kept as RGB pixels plus its PNG encoding for upstream calls
#[derive(Debug, Clone)]
pub struct ImagePayload {
    image: DynamicImage,
    png: Bytes,
}

impl ImagePayload {
    /// Decode an upload in any supported format.
    ///
    /// Empty or undecodable bodies are a client error, never a silent null.
    pub fn decode(raw: &[u8]) -> Result<Self, AppError> {
        if raw.is_empty() {
            return Err(AppError::DecodeFailure("empty image body".to_string()));
        }

        let decoded = image::load_from_memory(raw)
            .map_err(|e| AppError::DecodeFailure(e.to_string()))?;
        let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());

        Self::from_image(rgb).map_err(|e| AppError::DecodeFailure(e.to_string()))
    }

    /// Wrap an already decoded image
    pub fn from_image(image: DynamicImage) -> Result<Self, ClassifierError> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| ClassifierError::Encoding(e.to_string()))?;
        Ok(Self {
            image,
            png: Bytes::from(buffer.into_inner()),
        })
    }

    /// Parse PNG bytes returned by an upstream service
    pub fn from_png(png: Bytes) -> Result<Self, ClassifierError> {
        let image = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .map_err(|e| ClassifierError::InvalidResponse(format!("not a PNG image: {}", e)))?;
        Ok(Self { image, png })
    }

    pub fn png_bytes(&self) -> &Bytes {
        &self.png
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([200, 40, 40]),
    ));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}
