//! Decoded images and where they come from.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbImage};
use log::debug;

use crate::error::{Result, VitrineError};

/// Side length every image is resized to before color analysis.
pub const ANALYSIS_SIZE: u32 = 160;

/// An image ready for every vision backend: the original encoded bytes for
/// remote encoders and a fixed-size RGB raster for local analysis.
#[derive(Clone)]
pub struct PreparedImage {
    bytes: Arc<[u8]>,
    pixels: RgbImage,
    name: Option<String>,
}

impl fmt::Debug for PreparedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedImage")
            .field("bytes", &self.bytes.len())
            .field("name", &self.name)
            .finish()
    }
}

impl PreparedImage {
    /// Decode encoded image bytes (any format the `image` crate recognizes).
    pub fn decode(bytes: impl Into<Arc<[u8]>>, name: Option<String>) -> Result<Self> {
        let bytes = bytes.into();
        let decoded = image::load_from_memory(&bytes)?;
        Ok(Self {
            pixels: analysis_raster(&decoded),
            bytes,
            name,
        })
    }

    /// Wrap an in-memory raster, encoding it as PNG for remote backends.
    pub fn from_rgb(image: RgbImage, name: Option<String>) -> Result<Self> {
        let dynamic = DynamicImage::ImageRgb8(image);
        let mut buffer = Cursor::new(Vec::new());
        dynamic.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(Self {
            pixels: analysis_raster(&dynamic),
            bytes: buffer.into_inner().into(),
            name,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The image resized to `ANALYSIS_SIZE` square.
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// File name the image was loaded from, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

fn analysis_raster(image: &DynamicImage) -> RgbImage {
    image::imageops::resize(
        &image.to_rgb8(),
        ANALYSIS_SIZE,
        ANALYSIS_SIZE,
        FilterType::Triangle,
    )
}

/// Resolves catalog image references to encoded bytes at build time.
pub trait ImageSource: Send + Sync + fmt::Debug {
    fn load(&self, reference: &str) -> Result<Vec<u8>>;
}

/// Image references relative to a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryImageSource {
    root: PathBuf,
}

impl DirectoryImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageSource for DirectoryImageSource {
    fn load(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self.root.join(reference);
        std::fs::read(&path).map_err(|e| {
            VitrineError::fetch_failure(format!("{}: {e}", path.display()))
        })
    }
}

/// Last path segment of a reference or URL, without query string.
pub fn file_name(reference: &str) -> Option<String> {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    path.rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Fetch an image over HTTP with a hard timeout.
pub async fn fetch_url(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| VitrineError::internal(format!("failed to create HTTP client: {e}")))?;
    debug!("fetching query image {url}");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| VitrineError::fetch_failure(format!("{url}: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(VitrineError::fetch_failure(format!("{url}: HTTP {status}")));
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| VitrineError::fetch_failure(format!("{url}: {e}")))?;
    Ok(body.to_vec())
}
