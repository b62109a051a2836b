//! Cover artwork: download, square thumbnail, short-lived staging file.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{Result, TagMateError};

/// Edge length of the embedded square thumbnail, in pixels
pub const THUMBNAIL_SIZE: u32 = 300;

pub trait ArtworkFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

fn fetch_error(url: &str, reason: impl ToString) -> TagMateError {
    TagMateError::ArtworkFetch {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

pub struct HttpArtwork {
    client: reqwest::blocking::Client,
}

impl HttpArtwork {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("Mozilla/5.0")
            .build()
            .map_err(|e| fetch_error("<client>", e))?;
        Ok(Self { client })
    }
}

impl ArtworkFetcher for HttpArtwork {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(|e| fetch_error(url, e))?;
        Ok(bytes.to_vec())
    }
}

/// Center-crop and scale an image to a JPEG of
/// `THUMBNAIL_SIZE` x `THUMBNAIL_SIZE`.
pub fn thumbnail(bytes: &[u8]) -> std::result::Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let resized = img.resize_to_fill(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut out = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)?;
    Ok(out)
}

/// Thumbnail staged on disk for the duration of one group's tagging.
/// The file is removed when this value is dropped.
#[derive(Debug)]
pub struct ScopedArtwork {
    file: NamedTempFile,
}

impl ScopedArtwork {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.file.path())?)
    }
}

/// Fetch `url`, thumbnail it and stage the result in a temporary file.
pub fn stage_artwork(fetcher: &dyn ArtworkFetcher, url: &str) -> Result<ScopedArtwork> {
    let raw = fetcher.fetch(url)?;
    let jpeg = thumbnail(&raw).map_err(|e| fetch_error(url, e))?;

    let mut file = tempfile::Builder::new()
        .prefix("tagmate-art-")
        .suffix(".jpg")
        .tempfile()?;
    file.write_all(&jpeg)?;
    file.flush()?;
    Ok(ScopedArtwork { file })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    struct FixedArtwork(Vec<u8>);

    impl ArtworkFetcher for FixedArtwork {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, _| Rgb([(x % 256) as u8, 40, 200]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_thumbnail_is_square_jpeg() {
        let jpeg = thumbnail(&png(640, 480)).unwrap();
        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!(decoded.width(), THUMBNAIL_SIZE);
        assert_eq!(decoded.height(), THUMBNAIL_SIZE);
    }

    #[test]
    fn test_thumbnail_rejects_non_image() {
        assert!(thumbnail(b"<html>404</html>").is_err());
    }

    #[test]
    fn test_staged_artwork_is_removed_on_drop() {
        let staged = stage_artwork(&FixedArtwork(png(50, 80)), "https://img/x.png").unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        assert!(!staged.read().unwrap().is_empty());
        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_stage_reports_undecodable_download() {
        let err = stage_artwork(&FixedArtwork(b"nope".to_vec()), "https://img/x").unwrap_err();
        assert!(matches!(err, TagMateError::ArtworkFetch { ref url, .. } if url == "https://img/x"));
    }
}
