//! Saving rendered frames and occlusion masks as images.

use image::{GrayImage, ImageBuffer, Rgba};
use obscurance_core::surface::quantize_unorm8;
use obscurance_core::{ColorSurface, MaskSurface};
use std::path::Path;

/// Saves tightly packed RGBA8 pixels to an image file.
///
/// The format follows the extension (`.png`, `.jpg`, `.jpeg`).
pub fn save_image(
    path: impl AsRef<Path>,
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<(), CaptureError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    // wgpu uses a top-left origin, so no vertical flip is needed
    let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_raw(width, height, data.to_vec())
        .ok_or(CaptureError::InvalidImageData)?;

    match extension.as_str() {
        "png" => {
            img.save_with_format(path, image::ImageFormat::Png)?;
        }
        "jpg" | "jpeg" => {
            let rgb_img = image::DynamicImage::ImageRgba8(img).to_rgb8();
            rgb_img.save_with_format(path, image::ImageFormat::Jpeg)?;
        }
        _ => {
            return Err(CaptureError::UnsupportedFormat(extension));
        }
    }

    log::debug!("saved {width}x{height} image to {}", path.display());
    Ok(())
}

/// Saves an occlusion mask as a grayscale PNG, white meaning occluded.
pub fn save_mask(path: impl AsRef<Path>, mask: &MaskSurface) -> Result<(), CaptureError> {
    let img = GrayImage::from_raw(mask.width(), mask.height(), mask.data().to_vec())
        .ok_or(CaptureError::InvalidImageData)?;
    img.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// Quantizes a color surface to RGBA8.
pub fn color_surface_to_rgba8(surface: &ColorSurface) -> Vec<u8> {
    surface
        .data()
        .iter()
        .flat_map(|c| c.to_array().map(quantize_unorm8))
        .collect()
}

/// Error type for capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to save image: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid image data")]
    InvalidImageData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_color_surface_quantization() {
        let surface = ColorSurface::new(2, 1, Vec4::new(1.0, 0.5, 0.0, 1.0));
        assert_eq!(
            color_surface_to_rgba8(&surface),
            vec![255, 128, 0, 255, 255, 128, 0, 255]
        );
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        assert!(matches!(
            save_image("frame.png", &[0u8; 5], 2, 2),
            Err(CaptureError::InvalidImageData)
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = save_image("frame.bmp", &[0u8; 4], 1, 1).unwrap_err();
        assert!(matches!(err, CaptureError::UnsupportedFormat(ext) if ext == "bmp"));
    }
}
