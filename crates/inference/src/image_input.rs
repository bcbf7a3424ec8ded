use image::RgbImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageDecodeError {
    #[error("Image data is empty")]
    EmptyData,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(#[from] image::ImageError),
}

/// Decode uploaded bytes into an RGB buffer, sniffing the format from content.
///
/// Alpha is dropped and grayscale/palette images are expanded to three channels.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, ImageDecodeError> {
    if bytes.is_empty() {
        return Err(ImageDecodeError::EmptyData);
    }

    let image = image::load_from_memory(bytes)?;

    tracing::trace!(
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        bytes = bytes.len(),
        "Decoded image"
    );

    Ok(image.into_rgb8())
}
