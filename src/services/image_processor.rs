// src/services/image_processor.rs
use crate::errors::TranslateError;
use crate::models::{OutputFormat, OutputSettings};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat as ImgFormat};

/// Upload after validation, possibly downscaled.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

pub struct ImageProcessor {
    max_dimension: u32,
}

fn mime_for(format: ImgFormat) -> Option<&'static str> {
    match format {
        ImgFormat::Png => Some("image/png"),
        ImgFormat::Jpeg => Some("image/jpeg"),
        ImgFormat::WebP => Some("image/webp"),
        ImgFormat::Gif => Some("image/gif"),
        ImgFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}

impl ImageProcessor {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    pub fn sniff_mime_type(&self, data: &[u8]) -> Result<&'static str, TranslateError> {
        let format = image::guess_format(data)
            .map_err(|e| TranslateError::ImageProcessing(format!("Unrecognized image data: {}", e)))?;
        mime_for(format).ok_or_else(|| {
            TranslateError::ImageProcessing(format!("Unsupported image format: {:?}", format))
        })
    }

    /// Checks the bytes decode as an image and downscales anything larger
    /// than the configured maximum on either side. Downscaled images are
    /// re-encoded as PNG.
    pub fn prepare_upload(&self, data: &[u8]) -> Result<PreparedImage, TranslateError> {
        let mime_type = self.sniff_mime_type(data)?;
        let img = image::load_from_memory(data)
            .map_err(|e| TranslateError::ImageProcessing(format!("Invalid image format: {}", e)))?;
        let (width, height) = img.dimensions();

        if width <= self.max_dimension && height <= self.max_dimension {
            return Ok(PreparedImage {
                data: data.to_vec(),
                mime_type: mime_type.to_string(),
                width,
                height,
            });
        }

        let resized = img.resize(
            self.max_dimension,
            self.max_dimension,
            image::imageops::FilterType::Lanczos3,
        );
        let (width, height) = resized.dimensions();

        let mut output = Vec::new();
        resized
            .write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
            .map_err(|e| {
                TranslateError::ImageProcessing(format!("Failed to encode resized image: {}", e))
            })?;

        Ok(PreparedImage {
            data: output,
            mime_type: "image/png".to_string(),
            width,
            height,
        })
    }

    /// Re-encodes a generated image into the configured output format.
    pub fn encode_for_download(&self, data: &[u8], settings: &OutputSettings) -> Result<Vec<u8>, TranslateError> {
        let img = image::load_from_memory(data)
            .map_err(|e| TranslateError::ImageProcessing(format!("Failed to load image: {}", e)))?;

        let mut output = Vec::new();
        match settings.format {
            OutputFormat::Png => img
                .write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
                .map_err(|e| TranslateError::ImageProcessing(format!("Failed to encode PNG: {}", e)))?,
            OutputFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
                let quality = settings.quality.clamp(1, 100);
                JpegEncoder::new_with_quality(&mut output, quality)
                    .encode(rgb.as_bytes(), rgb.width(), rgb.height(), ColorType::Rgb8)
                    .map_err(|e| TranslateError::ImageProcessing(format!("Failed to encode JPEG: {}", e)))?;
            }
        }
        Ok(output)
    }
}
