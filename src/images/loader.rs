use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use image::DynamicImage;

/// A decoded image ready for display. Opaque to the cache.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pixels: Option<DynamicImage>,
}

impl DecodedImage {
    pub fn new(url: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            url: url.into(),
            width: image.width(),
            height: image.height(),
            pixels: Some(image),
        }
    }

    /// Dimensions only, for hosts that keep pixels elsewhere (and for tests).
    pub fn placeholder(url: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            url: url.into(),
            width,
            height,
            pixels: None,
        }
    }

    pub fn pixels(&self) -> Option<&DynamicImage> {
        self.pixels.as_ref()
    }
}

/// Fetches and decodes one image. Implemented per host platform.
pub trait ImageLoader: Send + Sync + 'static {
    fn load(&self, url: &str) -> impl Future<Output = Result<DecodedImage>> + Send;
}

/// Reads images from disk, treating URLs as paths relative to `root`
/// (`/photos/a.jpg` resolves to `<root>/photos/a.jpg`).
#[derive(Debug, Clone)]
pub struct FsImageLoader {
    root: PathBuf,
}

impl FsImageLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, url: &str) -> PathBuf {
        self.root.join(url.trim_start_matches('/'))
    }
}

impl ImageLoader for FsImageLoader {
    fn load(&self, url: &str) -> impl Future<Output = Result<DecodedImage>> + Send {
        let path = self.resolve(url);
        let url = url.to_string();
        async move {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read image {}", path.display()))?;

            let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
                .await
                .context("image decode worker join failed")?
                .with_context(|| format!("Failed to decode image {}", path.display()))?;

            Ok(DecodedImage::new(url, image))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[tokio::test]
    async fn decodes_files_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("photos")).unwrap();
        let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(3, 2, Rgb([200, 10, 10]));
        buffer.save(dir.path().join("photos/red.png")).unwrap();

        let loader = FsImageLoader::new(dir.path());
        let decoded = loader.load("/photos/red.png").await.unwrap();

        assert_eq!((decoded.width, decoded.height), (3, 2));
        assert_eq!(decoded.url, "/photos/red.png");
        assert!(decoded.pixels().is_some());
    }

    #[tokio::test]
    async fn missing_and_corrupt_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"not an image").unwrap();
        let loader = FsImageLoader::new(dir.path());

        assert!(loader.load("/nope.jpg").await.is_err());
        assert!(loader.load("broken.jpg").await.is_err());
    }
}
