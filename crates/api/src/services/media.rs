//! Image processing and upload to the image host.
//!
//! Uploaded images are decoded, resized to the slot they're destined for,
//! and re-encoded as JPEG before leaving the process. Re-encoding also
//! strips whatever metadata the original carried.

use std::io::Cursor;

use image::{ImageFormat, imageops::FilterType};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::config::MediaConfig;

/// Product images are normalized to this size.
pub const PRODUCT_IMAGE_SIZE: (u32, u32) = (2000, 1333);
/// User avatars are normalized to this square.
pub const USER_PHOTO_SIZE: (u32, u32) = (500, 500);

/// Errors from image processing and upload.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The bytes were not a decodable image.
    #[error("unreadable image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image host request failed: {0}")]
    Upload(#[from] reqwest::Error),

    #[error("image host returned {status}: {body}")]
    UploadStatus {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Client for the image host.
#[derive(Clone)]
pub struct MediaService {
    client: reqwest::Client,
    upload_url: String,
    api_key: SecretString,
}

impl MediaService {
    /// Build an image host client from the media configuration.
    #[must_use]
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url: config.upload_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Resize, re-encode, and upload one image; returns its public URL.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Decode` for bytes that aren't an image, and
    /// upload variants when the host call fails.
    pub async fn upload(
        &self,
        bytes: &[u8],
        filename: &str,
        (width, height): (u32, u32),
    ) -> Result<String, MediaError> {
        let jpeg = process_image(bytes, width, height)?;

        let part = reqwest::multipart::Part::bytes(jpeg)
            .file_name(filename.to_owned())
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.upload_url)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::UploadStatus { status, body });
        }
        let uploaded: UploadResponse = response.json().await?;
        Ok(uploaded.url)
    }
}

/// Decode arbitrary image bytes, fit them into `width` x `height`, and
/// re-encode as JPEG.
fn process_image(bytes: &[u8], width: u32, height: u32) -> Result<Vec<u8>, image::ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    let resized = decoded.resize_to_fill(width, height, FilterType::Lanczos3);
    let mut out = Cursor::new(Vec::new());
    resized.write_to(&mut out, ImageFormat::Jpeg)?;
    Ok(out.into_inner())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{DynamicImage, GenericImageView};

    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(width, height);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_process_image_resizes_and_reencodes() {
        let jpeg = process_image(&png_bytes(100, 100), 50, 30).unwrap();
        let round_tripped = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(round_tripped.dimensions(), (50, 30));
    }

    #[test]
    fn test_process_image_rejects_garbage() {
        assert!(process_image(b"definitely not an image", 10, 10).is_err());
    }
}
