//! External codec collaborators and their on-disk implementations.
//!
//! The pipeline never touches pixels directly; it talks to small trait
//! seams (probe, crop, compress, resize, encode) so capture backends can be
//! swapped out and failures injected under test. [`DiskCodec`] is the
//! production implementation working on image files in a scratch directory.

use crate::compression::CompressionStrategy;
use crate::error::{AppError, Result};
use crate::geometry::CropRect;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use futures::future::BoxFuture;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// JPEG quality used for intermediate crop output.
const CROP_JPEG_QUALITY: u8 = 90;

/// Native pixel dimensions reported by a metadata probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Output encoding for the resize codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

/// How the resize codec fits the source into the target box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentMode {
    /// Preserve aspect ratio, fit entirely within the target box.
    Contain,
    /// Preserve aspect ratio, fill the target box, cropping overflow.
    Cover,
    /// Ignore aspect ratio and match the target box exactly.
    Stretch,
}

/// A resize codec invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResizeRequest {
    pub target_width: u32,
    pub target_height: u32,
    pub format: OutputFormat,
    /// Quality on the 0-100 scale.
    pub quality: u8,
    /// Only quarter-turn rotations are supported.
    pub rotation_degrees: u16,
    pub mode: ContentMode,
    /// When set, sources already within the target box pass through
    /// unscaled (they are still re-encoded).
    pub only_scale_down: bool,
}

/// Reads image metadata without transforming anything.
pub trait MediaProbe: Send + Sync {
    /// Native pixel dimensions of the image at `image`.
    fn dimensions<'a>(&'a self, image: &'a Path)
    -> BoxFuture<'a, Result<ImageDimensions>>;

    /// Size of the file at `image` in bytes.
    fn byte_size<'a>(&'a self, image: &'a Path) -> BoxFuture<'a, Result<u64>>;
}

/// Extracts a rectangular window into a new image file.
pub trait CropCodec: Send + Sync {
    fn crop<'a>(
        &'a self,
        image: &'a Path,
        rect: CropRect,
    ) -> BoxFuture<'a, Result<PathBuf>>;
}

/// Adaptive compressor: bounds dimensions and re-encodes at a quality.
pub trait CompressionCodec: Send + Sync {
    fn compress<'a>(
        &'a self,
        image: &'a Path,
        strategy: &'a CompressionStrategy,
    ) -> BoxFuture<'a, Result<PathBuf>>;
}

/// Scales an image to explicit target dimensions.
pub trait ResizeCodec: Send + Sync {
    fn resize<'a>(
        &'a self,
        image: &'a Path,
        request: &'a ResizeRequest,
    ) -> BoxFuture<'a, Result<PathBuf>>;
}

/// Encodes an image file to a base64 string for submission payloads.
pub trait Base64Encoder: Send + Sync {
    fn encode<'a>(&'a self, image: &'a Path) -> BoxFuture<'a, Result<String>>;
}

/// Production codec working on files in a scratch directory.
///
/// Every transforming operation writes a new file named after the stage
/// that produced it; inputs are never modified in place. Clones share the
/// output sequence counter, so handing one codec to several seams is safe.
#[derive(Clone)]
pub struct DiskCodec {
    work_dir: PathBuf,
    sequence: Arc<AtomicU64>,
}

impl DiskCodec {
    /// Creates the codec, making sure the scratch directory exists.
    pub fn new(work_dir: impl Into<PathBuf>) -> Result<Self> {
        let work_dir = work_dir.into();
        fs::create_dir_all(&work_dir)?;
        Ok(Self {
            work_dir,
            sequence: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Directory where output files are written.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn next_output(&self, stage: &str, extension: &str) -> PathBuf {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.work_dir
            .join(format!("{stage}_{millis}_{sequence}.{extension}"))
    }

    fn write_jpeg(
        &self,
        image: &DynamicImage,
        quality: u8,
        stage: &str,
        err: fn(String) -> AppError,
    ) -> Result<PathBuf> {
        let path = self.next_output(stage, "jpg");
        let mut buffer = Vec::new();
        let encoder =
            JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        image
            .to_rgb8()
            .write_with_encoder(encoder)
            .map_err(|e| err(format!("failed to encode JPEG: {e}")))?;
        fs::write(&path, buffer)?;
        Ok(path)
    }
}

impl MediaProbe for DiskCodec {
    fn dimensions<'a>(
        &'a self,
        image: &'a Path,
    ) -> BoxFuture<'a, Result<ImageDimensions>> {
        Box::pin(async move {
            let (width, height) = image::image_dimensions(image).map_err(|e| {
                AppError::probe(format!(
                    "failed to read dimensions of {}: {e}",
                    image.display()
                ))
            })?;
            Ok(ImageDimensions { width, height })
        })
    }

    fn byte_size<'a>(&'a self, image: &'a Path) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            let metadata = fs::metadata(image).map_err(|e| {
                AppError::probe(format!("failed to stat {}: {e}", image.display()))
            })?;
            Ok(metadata.len())
        })
    }
}

impl CropCodec for DiskCodec {
    fn crop<'a>(
        &'a self,
        image: &'a Path,
        rect: CropRect,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(async move {
            if rect.is_empty() {
                return Err(AppError::crop("crop region is empty"));
            }
            let source = image::open(image).map_err(|e| {
                AppError::crop(format!("failed to open {}: {e}", image.display()))
            })?;
            let (width, height) = (source.width(), source.height());
            if u64::from(rect.x) + u64::from(rect.width) > u64::from(width)
                || u64::from(rect.y) + u64::from(rect.height) > u64::from(height)
            {
                return Err(AppError::crop(format!(
                    "crop region {}x{}+{}+{} exceeds image bounds {}x{}",
                    rect.width, rect.height, rect.x, rect.y, width, height
                )));
            }
            let cropped = source.crop_imm(rect.x, rect.y, rect.width, rect.height);
            self.write_jpeg(&cropped, CROP_JPEG_QUALITY, "crop", AppError::CropCodec)
        })
    }
}

impl CompressionCodec for DiskCodec {
    fn compress<'a>(
        &'a self,
        image: &'a Path,
        strategy: &'a CompressionStrategy,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(async move {
            if !(strategy.quality > 0.0 && strategy.quality <= 1.0) {
                return Err(AppError::compression(format!(
                    "quality {} is outside (0, 1]",
                    strategy.quality
                )));
            }
            let source = image::open(image).map_err(|e| {
                AppError::compression(format!(
                    "failed to open {}: {e}",
                    image.display()
                ))
            })?;
            // keep_metadata is part of the collaborator contract; a JPEG
            // re-encode through this codec does not carry metadata over.
            let output = match fit_within(&source, strategy.max_width, strategy.max_height)
            {
                Some(resized) => resized,
                None => source,
            };
            let quality = (strategy.quality * 100.0).round() as u8;
            self.write_jpeg(&output, quality, "compress", AppError::CompressionCodec)
        })
    }
}

impl ResizeCodec for DiskCodec {
    fn resize<'a>(
        &'a self,
        image: &'a Path,
        request: &'a ResizeRequest,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(async move {
            if request.target_width == 0 || request.target_height == 0 {
                return Err(AppError::resize("target dimensions must be positive"));
            }
            let source = image::open(image).map_err(|e| {
                AppError::resize(format!("failed to open {}: {e}", image.display()))
            })?;
            let rotated = match request.rotation_degrees % 360 {
                0 => source,
                90 => source.rotate90(),
                180 => source.rotate180(),
                270 => source.rotate270(),
                other => {
                    return Err(AppError::invalid_input(format!(
                        "unsupported rotation: {other} degrees"
                    )));
                }
            };
            let output = match scale_to_request(&rotated, request) {
                Some(scaled) => scaled,
                None => rotated,
            };
            match request.format {
                OutputFormat::Jpeg => self.write_jpeg(
                    &output,
                    request.quality,
                    "resize",
                    AppError::ResizeCodec,
                ),
                OutputFormat::Png => {
                    let path = self.next_output("resize", "png");
                    output.save_with_format(&path, ImageFormat::Png).map_err(
                        |e| AppError::resize(format!("failed to encode PNG: {e}")),
                    )?;
                    Ok(path)
                }
            }
        })
    }
}

impl Base64Encoder for DiskCodec {
    fn encode<'a>(&'a self, image: &'a Path) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let bytes = fs::read(image).map_err(|e| {
                AppError::encoding(format!("failed to read {}: {e}", image.display()))
            })?;
            Ok(BASE64.encode(bytes))
        })
    }
}

/// Crop strategy that hands the original image back unchanged.
///
/// Some capture backends have no offset-crop support; this keeps the OCR
/// flow shaped the same while leaving visual cropping to the presentation
/// layer.
pub struct PassthroughCrop;

impl CropCodec for PassthroughCrop {
    fn crop<'a>(
        &'a self,
        image: &'a Path,
        _rect: CropRect,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(async move { Ok(image.to_path_buf()) })
    }
}

fn fit_within(source: &DynamicImage, max_width: u32, max_height: u32) -> Option<DynamicImage> {
    if source.width() <= max_width && source.height() <= max_height {
        return None;
    }
    Some(source.resize(max_width, max_height, FilterType::Lanczos3))
}

fn scale_to_request(source: &DynamicImage, request: &ResizeRequest) -> Option<DynamicImage> {
    if request.only_scale_down
        && source.width() <= request.target_width
        && source.height() <= request.target_height
    {
        return None;
    }
    let scaled = match request.mode {
        ContentMode::Contain => source.resize(
            request.target_width,
            request.target_height,
            FilterType::Lanczos3,
        ),
        ContentMode::Cover => source.resize_to_fill(
            request.target_width,
            request.target_height,
            FilterType::Lanczos3,
        ),
        ContentMode::Stretch => source.resize_exact(
            request.target_width,
            request.target_height,
            FilterType::Lanczos3,
        ),
    };
    Some(scaled)
}
