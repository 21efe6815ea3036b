// src/services/image_processor.rs
use crate::errors::PipelineError;
use crate::models::{NormalizedImage, UploadedImage};
use image::GenericImageView;

const ACCEPTED_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];
const JPEG_QUALITY: u8 = 85;

pub struct ImagePreprocessor;

impl ImagePreprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(
        &self,
        upload: &UploadedImage,
        max_bytes: usize,
        max_dimension: u32,
    ) -> Result<NormalizedImage, PipelineError> {
        // Size and type gates come before any decode work.
        if upload.data.len() > max_bytes {
            return Err(PipelineError::OversizedInput {
                size: upload.data.len(),
                max: max_bytes,
            });
        }
        if !ACCEPTED_TYPES.contains(&upload.content_type.as_str()) {
            return Err(PipelineError::UnsupportedFormat(upload.content_type.clone()));
        }

        let img = image::load_from_memory(&upload.data).map_err(|e| {
            PipelineError::UnsupportedFormat(format!(
                "declared {} but failed to decode: {}",
                upload.content_type, e
            ))
        })?;

        let (width, height) = img.dimensions();
        let img = if width > max_dimension || height > max_dimension {
            // resize() preserves aspect ratio within the bounding box
            img.resize(max_dimension, max_dimension, image::imageops::FilterType::Lanczos3)
        } else {
            img
        };

        let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
        let (out_width, out_height) = rgb.dimensions();

        let mut output = Vec::new();
        rgb.write_to(
            &mut std::io::Cursor::new(&mut output),
            image::ImageOutputFormat::Jpeg(JPEG_QUALITY),
        )
        .map_err(|e| PipelineError::ImageProcessing(format!("failed to re-encode: {}", e)))?;

        Ok(NormalizedImage {
            data: output,
            width: out_width,
            height: out_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UploadedImage;

    fn png_upload(width: u32, height: u32) -> UploadedImage {
        let buf = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut data = Vec::new();
        image::DynamicImage::ImageRgb8(buf)
            .write_to(&mut std::io::Cursor::new(&mut data), image::ImageOutputFormat::Png)
            .unwrap();
        UploadedImage::new("test.png".into(), "image/png".into(), data)
    }

    #[test]
    fn oversized_payload_rejected_before_decode() {
        // Garbage bytes: any decode attempt would fail with a format error
        // instead of the size error asserted here.
        let upload = UploadedImage::new("big.png".into(), "image/png".into(), vec![0u8; 600]);
        let err = ImagePreprocessor::new()
            .normalize(&upload, 500, 512)
            .unwrap_err();
        assert!(matches!(err, PipelineError::OversizedInput { size: 600, max: 500 }));
    }

    #[test]
    fn unsupported_type_rejected() {
        let upload = UploadedImage::new("anim.gif".into(), "image/gif".into(), vec![0u8; 10]);
        let err = ImagePreprocessor::new()
            .normalize(&upload, 1024, 512)
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat(t) if t == "image/gif"));
    }

    #[test]
    fn undecodable_payload_rejected() {
        let upload = UploadedImage::new("fake.png".into(), "image/png".into(), vec![1u8; 64]);
        let err = ImagePreprocessor::new()
            .normalize(&upload, 1024, 512)
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat(_)));
    }

    #[test]
    fn large_image_downscaled_with_aspect_preserved() {
        let upload = png_upload(800, 600);
        let normalized = ImagePreprocessor::new()
            .normalize(&upload, 10 * 1024 * 1024, 512)
            .unwrap();
        assert_eq!(normalized.width, 512);
        assert_eq!(normalized.height, 384);
    }

    #[test]
    fn small_image_keeps_dimensions() {
        let upload = png_upload(100, 80);
        let normalized = ImagePreprocessor::new()
            .normalize(&upload, 10 * 1024 * 1024, 512)
            .unwrap();
        assert_eq!((normalized.width, normalized.height), (100, 80));
        // Output is a decodable JPEG.
        let round = image::load_from_memory(&normalized.data).unwrap();
        assert_eq!(round.dimensions(), (100, 80));
    }
}
