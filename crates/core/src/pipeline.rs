//! The image transform pipeline.
//!
//! Two flows share the collaborator seams: [`process_for_ocr`] crops to the
//! capture mask and bounds the width for legibility, while
//! [`process_for_submission`] compresses by byte-size strategy for upload.
//! Each flow runs sequentially per image; codec failures are handled at the
//! point of invocation with at most one fallback attempt.
//!
//! [`process_for_ocr`]: TransformPipeline::process_for_ocr
//! [`process_for_submission`]: TransformPipeline::process_for_submission

use crate::codec::{
    Base64Encoder, CompressionCodec, ContentMode, CropCodec, DiskCodec, MediaProbe,
    OutputFormat, ResizeCodec, ResizeRequest,
};
use crate::compression::{CompressionPlanner, CompressionStrategy, CompressionTier};
use crate::error::{AppError, Result};
use crate::geometry::{CARD_CROP_PADDING, GeometryMapper, MaskGeometry};
use crate::settings::Settings;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Width ceiling applied before text extraction.
pub const OCR_WIDTH_CEILING: u32 = 2000;

/// JPEG quality of the OCR-oriented output, on the 0-100 scale.
pub const OCR_JPEG_QUALITY: u8 = 85;

/// Result of the OCR-oriented flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OcrImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// False when the crop codec failed and the uncropped image was used.
    pub cropped: bool,
}

/// Result of the submission-oriented flow.
///
/// `ratio_percent` is negative when compression grew the file; callers must
/// tolerate that, it is not an error.
#[derive(Clone, Debug, PartialEq)]
pub struct CompressionOutcome {
    pub path: PathBuf,
    pub original_size: u64,
    pub compressed_size: u64,
    pub ratio_percent: f64,
    /// The strategy the planner selected (also reported when the fallback
    /// codec produced the output).
    pub strategy: CompressionStrategy,
    /// Size band that selected the strategy; `None` in fixed mode.
    pub tier: Option<CompressionTier>,
    pub used_fallback: bool,
}

/// Orchestrates probes and codecs into the two processing flows.
///
/// Settings are treated as a read-only snapshot for the lifetime of the
/// pipeline; reload settings by constructing a new pipeline.
pub struct TransformPipeline {
    probe: Box<dyn MediaProbe>,
    crop_codec: Box<dyn CropCodec>,
    compression_codec: Box<dyn CompressionCodec>,
    resize_codec: Box<dyn ResizeCodec>,
    encoder: Box<dyn Base64Encoder>,
    settings: Settings,
}

impl TransformPipeline {
    /// Creates a pipeline backed by [`DiskCodec`] in `work_dir`.
    pub fn new(settings: Settings, work_dir: impl Into<PathBuf>) -> Result<Self> {
        let codec = DiskCodec::new(work_dir)?;
        Ok(Self::with_components(
            Box::new(codec.clone()),
            Box::new(codec.clone()),
            Box::new(codec.clone()),
            Box::new(codec.clone()),
            Box::new(codec),
            settings,
        ))
    }

    /// Creates a pipeline from explicit collaborators.
    pub fn with_components(
        probe: Box<dyn MediaProbe>,
        crop_codec: Box<dyn CropCodec>,
        compression_codec: Box<dyn CompressionCodec>,
        resize_codec: Box<dyn ResizeCodec>,
        encoder: Box<dyn Base64Encoder>,
        settings: Settings,
    ) -> Self {
        Self {
            probe,
            crop_codec,
            compression_codec,
            resize_codec,
            encoder,
            settings,
        }
    }

    /// The settings snapshot this pipeline was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Prepares a captured document image for text extraction.
    ///
    /// Crops to the native-pixel window derived from `mask` with the
    /// standard outward padding, then bounds the width to
    /// [`OCR_WIDTH_CEILING`] and re-encodes at [`OCR_JPEG_QUALITY`]. A crop
    /// codec failure is recovered by continuing with the uncropped image;
    /// probe and resize failures propagate.
    pub async fn process_for_ocr(
        &self,
        image: &Path,
        mask: &MaskGeometry,
    ) -> Result<OcrImage> {
        ensure_location(image)?;
        let dims = self.probe.dimensions(image).await?;
        let rect = GeometryMapper::compute_crop_rect(
            dims.width,
            dims.height,
            mask,
            CARD_CROP_PADDING,
        )?;
        debug!(
            x = rect.x,
            y = rect.y,
            width = rect.width,
            height = rect.height,
            "computed crop window"
        );

        let (working, cropped) = match self.crop_codec.crop(image, rect).await {
            Ok(path) => (path, true),
            Err(error) => {
                warn!(%error, "crop codec failed, continuing with the uncropped image");
                (image.to_path_buf(), false)
            }
        };

        let current = self.probe.dimensions(&working).await?;
        let (target_width, target_height) = if current.width > OCR_WIDTH_CEILING {
            let ratio = f64::from(OCR_WIDTH_CEILING) / f64::from(current.width);
            (
                OCR_WIDTH_CEILING,
                (f64::from(current.height) * ratio).round() as u32,
            )
        } else {
            (current.width, current.height)
        };

        // The target already preserves the aspect ratio, so the codec is
        // asked for those exact dimensions.
        let request = ResizeRequest {
            target_width,
            target_height,
            format: OutputFormat::Jpeg,
            quality: OCR_JPEG_QUALITY,
            rotation_degrees: 0,
            mode: ContentMode::Stretch,
            only_scale_down: false,
        };
        let path = self.resize_codec.resize(&working, &request).await?;
        info!(
            width = target_width,
            height = target_height,
            cropped,
            "image prepared for text extraction"
        );
        Ok(OcrImage {
            path,
            width: target_width,
            height: target_height,
            cropped,
        })
    }

    /// Compresses an image for upload using the byte-size strategy.
    ///
    /// When the compression codec fails, the resize codec is tried once
    /// with the fallback quality, contain scaling and scale-down-only
    /// semantics. When that also fails, the original compression error is
    /// surfaced to the caller.
    pub async fn process_for_submission(
        &self,
        image: &Path,
    ) -> Result<CompressionOutcome> {
        ensure_location(image)?;
        let original_size = self.probe.byte_size(image).await?;
        let plan = CompressionPlanner::select_strategy(original_size, &self.settings);
        debug!(
            bytes = original_size,
            tier = plan.tier_label(),
            quality = plan.strategy.quality,
            "selected compression strategy"
        );

        let (path, used_fallback) = match self
            .compression_codec
            .compress(image, &plan.strategy)
            .await
        {
            Ok(path) => (path, false),
            Err(primary) => {
                warn!(error = %primary, "compression codec failed, trying the resize codec");
                let quality = (CompressionPlanner::fallback_quality(&self.settings)
                    * 100.0)
                    .round() as u8;
                let request = ResizeRequest {
                    target_width: plan.strategy.max_width,
                    target_height: plan.strategy.max_height,
                    format: OutputFormat::Jpeg,
                    quality,
                    rotation_degrees: 0,
                    mode: ContentMode::Contain,
                    only_scale_down: true,
                };
                match self.resize_codec.resize(image, &request).await {
                    Ok(path) => (path, true),
                    Err(secondary) => {
                        warn!(error = %secondary, "fallback resize codec also failed");
                        return Err(primary);
                    }
                }
            }
        };

        let compressed_size = self.probe.byte_size(&path).await?;
        let ratio_percent = if original_size == 0 {
            0.0
        } else {
            (original_size as f64 - compressed_size as f64) / original_size as f64
                * 100.0
        };
        info!(
            original_size,
            compressed_size, ratio_percent, used_fallback, "compression complete"
        );
        Ok(CompressionOutcome {
            path,
            original_size,
            compressed_size,
            ratio_percent,
            strategy: plan.strategy,
            tier: plan.tier,
            used_fallback,
        })
    }

    /// Base64-encodes a processed image for a submission payload.
    pub async fn encode_base64(&self, image: &Path) -> Result<String> {
        ensure_location(image)?;
        self.encoder.encode(image).await
    }
}

fn ensure_location(image: &Path) -> Result<()> {
    if image.as_os_str().is_empty() {
        return Err(AppError::invalid_input("image location is empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ImageDimensions;
    use crate::geometry::CropRect;
    use futures::future::BoxFuture;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MapProbe {
        dims: HashMap<PathBuf, ImageDimensions>,
        sizes: HashMap<PathBuf, u64>,
    }

    impl MapProbe {
        fn new() -> Self {
            Self {
                dims: HashMap::new(),
                sizes: HashMap::new(),
            }
        }

        fn with_dims(mut self, path: &str, width: u32, height: u32) -> Self {
            self.dims
                .insert(PathBuf::from(path), ImageDimensions { width, height });
            self
        }

        fn with_size(mut self, path: &str, size: u64) -> Self {
            self.sizes.insert(PathBuf::from(path), size);
            self
        }
    }

    impl MediaProbe for MapProbe {
        fn dimensions<'a>(
            &'a self,
            image: &'a Path,
        ) -> BoxFuture<'a, Result<ImageDimensions>> {
            Box::pin(async move {
                self.dims.get(image).copied().ok_or_else(|| {
                    AppError::probe(format!("no dimensions for {}", image.display()))
                })
            })
        }

        fn byte_size<'a>(&'a self, image: &'a Path) -> BoxFuture<'a, Result<u64>> {
            Box::pin(async move {
                self.sizes.get(image).copied().ok_or_else(|| {
                    AppError::probe(format!("no byte size for {}", image.display()))
                })
            })
        }
    }

    struct StubCrop {
        output: Option<PathBuf>,
        seen: Mutex<Vec<CropRect>>,
    }

    impl StubCrop {
        fn succeeding(output: &str) -> Self {
            Self {
                output: Some(PathBuf::from(output)),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                output: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl CropCodec for StubCrop {
        fn crop<'a>(
            &'a self,
            _image: &'a Path,
            rect: CropRect,
        ) -> BoxFuture<'a, Result<PathBuf>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(rect);
                self.output
                    .clone()
                    .ok_or_else(|| AppError::crop("injected crop failure"))
            })
        }
    }

    struct StubCompressor {
        result: std::result::Result<PathBuf, String>,
        seen: Mutex<Vec<CompressionStrategy>>,
    }

    impl StubCompressor {
        fn succeeding(output: &str) -> Self {
            Self {
                result: Ok(PathBuf::from(output)),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                result: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl CompressionCodec for StubCompressor {
        fn compress<'a>(
            &'a self,
            _image: &'a Path,
            strategy: &'a CompressionStrategy,
        ) -> BoxFuture<'a, Result<PathBuf>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(strategy.clone());
                match &self.result {
                    Ok(path) => Ok(path.clone()),
                    Err(message) => Err(AppError::compression(message.clone())),
                }
            })
        }
    }

    struct RecordingResizer {
        output: Option<PathBuf>,
        seen: Mutex<Vec<(PathBuf, ResizeRequest)>>,
    }

    impl RecordingResizer {
        fn succeeding(output: &str) -> Self {
            Self {
                output: Some(PathBuf::from(output)),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                output: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<(PathBuf, ResizeRequest)> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl ResizeCodec for RecordingResizer {
        fn resize<'a>(
            &'a self,
            image: &'a Path,
            request: &'a ResizeRequest,
        ) -> BoxFuture<'a, Result<PathBuf>> {
            Box::pin(async move {
                self.seen
                    .lock()
                    .unwrap()
                    .push((image.to_path_buf(), request.clone()));
                self.output
                    .clone()
                    .ok_or_else(|| AppError::resize("injected resize failure"))
            })
        }
    }

    struct StubEncoder;

    impl Base64Encoder for StubEncoder {
        fn encode<'a>(&'a self, _image: &'a Path) -> BoxFuture<'a, Result<String>> {
            Box::pin(async move { Ok("ZmFrZQ==".to_string()) })
        }
    }

    fn mask() -> MaskGeometry {
        MaskGeometry::centered_card(400.0, 800.0).unwrap()
    }

    fn pipeline_with(
        probe: MapProbe,
        crop: StubCrop,
        compressor: StubCompressor,
        resizer: RecordingResizer,
    ) -> TransformPipeline {
        TransformPipeline::with_components(
            Box::new(probe),
            Box::new(crop),
            Box::new(compressor),
            Box::new(resizer),
            Box::new(StubEncoder),
            Settings::default(),
        )
    }

    #[tokio::test]
    async fn ocr_crops_then_bounds_the_width() {
        let probe = MapProbe::new()
            .with_dims("in.png", 3000, 6000)
            .with_dims("cropped.jpg", 2850, 5850);
        let resizer = RecordingResizer::succeeding("final.jpg");
        let pipeline = TransformPipeline::with_components(
            Box::new(probe),
            Box::new(StubCrop::succeeding("cropped.jpg")),
            Box::new(StubCompressor::succeeding("unused.jpg")),
            Box::new(resizer),
            Box::new(StubEncoder),
            Settings::default(),
        );

        let result = pipeline
            .process_for_ocr(Path::new("in.png"), &mask())
            .await
            .unwrap();

        assert_eq!(result.path, PathBuf::from("final.jpg"));
        assert!(result.cropped);
        assert_eq!(result.width, 2000);
        // 5850 * 2000 / 2850 = 4105.26, rounded to nearest.
        assert_eq!(result.height, 4105);
    }

    #[tokio::test]
    async fn ocr_resize_request_carries_the_fixed_quality() {
        let probe = MapProbe::new()
            .with_dims("in.png", 1000, 1600)
            .with_dims("cropped.jpg", 900, 600);
        let resizer =
            std::sync::Arc::new(RecordingResizer::succeeding("final.jpg"));
        let pipeline = TransformPipeline::with_components(
            Box::new(probe),
            Box::new(StubCrop::succeeding("cropped.jpg")),
            Box::new(StubCompressor::succeeding("unused.jpg")),
            Box::new(SharedResizer(resizer.clone())),
            Box::new(StubEncoder),
            Settings::default(),
        );

        let result = pipeline
            .process_for_ocr(Path::new("in.png"), &mask())
            .await
            .unwrap();
        assert_eq!((result.width, result.height), (900, 600));

        let requests = resizer.requests();
        assert_eq!(requests.len(), 1);
        let (input, request) = &requests[0];
        assert_eq!(input, &PathBuf::from("cropped.jpg"));
        assert_eq!(
            request,
            &ResizeRequest {
                target_width: 900,
                target_height: 600,
                format: OutputFormat::Jpeg,
                quality: OCR_JPEG_QUALITY,
                rotation_degrees: 0,
                mode: ContentMode::Stretch,
                only_scale_down: false,
            }
        );
    }

    #[tokio::test]
    async fn ocr_falls_back_to_the_uncropped_image() {
        let probe = MapProbe::new().with_dims("in.png", 1200, 1800);
        let resizer = RecordingResizer::succeeding("final.jpg");
        let pipeline = pipeline_with(
            probe,
            StubCrop::failing(),
            StubCompressor::succeeding("unused.jpg"),
            resizer,
        );

        let result = pipeline
            .process_for_ocr(Path::new("in.png"), &mask())
            .await
            .unwrap();

        assert!(!result.cropped);
        // Width is under the ceiling, so dimensions pass through.
        assert_eq!((result.width, result.height), (1200, 1800));
    }

    #[tokio::test]
    async fn ocr_fallback_resizes_the_original_location() {
        let probe = MapProbe::new().with_dims("in.png", 2500, 1000);
        let resizer =
            std::sync::Arc::new(RecordingResizer::succeeding("final.jpg"));
        let pipeline = TransformPipeline::with_components(
            Box::new(probe),
            Box::new(StubCrop::failing()),
            Box::new(StubCompressor::succeeding("unused.jpg")),
            Box::new(SharedResizer(resizer.clone())),
            Box::new(StubEncoder),
            Settings::default(),
        );

        let result = pipeline
            .process_for_ocr(Path::new("in.png"), &mask())
            .await
            .unwrap();

        assert!(!result.cropped);
        assert_eq!((result.width, result.height), (2000, 800));
        let requests = resizer.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, PathBuf::from("in.png"));
    }

    #[tokio::test]
    async fn ocr_propagates_probe_failures() {
        let pipeline = pipeline_with(
            MapProbe::new(),
            StubCrop::succeeding("cropped.jpg"),
            StubCompressor::succeeding("unused.jpg"),
            RecordingResizer::succeeding("final.jpg"),
        );

        let err = pipeline
            .process_for_ocr(Path::new("in.png"), &mask())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Probe(_)));
    }

    #[tokio::test]
    async fn ocr_rejects_an_empty_location() {
        let pipeline = pipeline_with(
            MapProbe::new(),
            StubCrop::succeeding("cropped.jpg"),
            StubCompressor::succeeding("unused.jpg"),
            RecordingResizer::succeeding("final.jpg"),
        );

        let err = pipeline
            .process_for_ocr(Path::new(""), &mask())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn submission_applies_the_planned_tier() {
        let probe = MapProbe::new()
            .with_size("in.jpg", 3 * 1024 * 1024)
            .with_size("compressed.jpg", 1024 * 1024);
        let pipeline = pipeline_with(
            probe,
            StubCrop::succeeding("unused.jpg"),
            StubCompressor::succeeding("compressed.jpg"),
            RecordingResizer::succeeding("unused.jpg"),
        );

        let outcome = pipeline
            .process_for_submission(Path::new("in.jpg"))
            .await
            .unwrap();

        assert_eq!(outcome.tier, Some(CompressionTier::Medium));
        assert_eq!(outcome.strategy.quality, 0.7);
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.original_size, 3 * 1024 * 1024);
        assert_eq!(outcome.compressed_size, 1024 * 1024);
        assert!((outcome.ratio_percent - 66.666).abs() < 0.01);
    }

    #[tokio::test]
    async fn submission_tolerates_growth_with_a_negative_ratio() {
        let probe = MapProbe::new()
            .with_size("in.jpg", 1000)
            .with_size("compressed.jpg", 1500);
        let pipeline = pipeline_with(
            probe,
            StubCrop::succeeding("unused.jpg"),
            StubCompressor::succeeding("compressed.jpg"),
            RecordingResizer::succeeding("unused.jpg"),
        );

        let outcome = pipeline
            .process_for_submission(Path::new("in.jpg"))
            .await
            .unwrap();
        assert_eq!(outcome.ratio_percent, -50.0);
    }

    #[tokio::test]
    async fn submission_falls_back_to_the_resize_codec() {
        let probe = MapProbe::new()
            .with_size("in.jpg", 2 * 1024 * 1024)
            .with_size("fallback.jpg", 512 * 1024);
        let resizer =
            std::sync::Arc::new(RecordingResizer::succeeding("fallback.jpg"));
        let pipeline = TransformPipeline::with_components(
            Box::new(probe),
            Box::new(StubCrop::succeeding("unused.jpg")),
            Box::new(StubCompressor::failing("codec exploded")),
            Box::new(SharedResizer(resizer.clone())),
            Box::new(StubEncoder),
            Settings::default(),
        );

        let outcome = pipeline
            .process_for_submission(Path::new("in.jpg"))
            .await
            .unwrap();

        assert!(outcome.used_fallback);
        assert_eq!(outcome.path, PathBuf::from("fallback.jpg"));
        assert_eq!(outcome.compressed_size, 512 * 1024);
        assert_eq!(outcome.tier, Some(CompressionTier::Medium));

        let requests = resizer.requests();
        assert_eq!(requests.len(), 1);
        let (input, request) = &requests[0];
        assert_eq!(input, &PathBuf::from("in.jpg"));
        assert_eq!(
            request,
            &ResizeRequest {
                target_width: 2000,
                target_height: 2000,
                format: OutputFormat::Jpeg,
                // Medium preset 0.7 converted to the percent scale.
                quality: 70,
                rotation_degrees: 0,
                mode: ContentMode::Contain,
                only_scale_down: true,
            }
        );
    }

    #[tokio::test]
    async fn submission_surfaces_the_original_error_when_fallback_fails() {
        let probe = MapProbe::new().with_size("in.jpg", 2 * 1024 * 1024);
        let pipeline = pipeline_with(
            probe,
            StubCrop::succeeding("unused.jpg"),
            StubCompressor::failing("primary boom"),
            RecordingResizer::failing(),
        );

        let err = pipeline
            .process_for_submission(Path::new("in.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CompressionCodec(_)));
        assert!(err.to_string().contains("primary boom"));
    }

    #[tokio::test]
    async fn submission_propagates_byte_probe_failures() {
        let pipeline = pipeline_with(
            MapProbe::new(),
            StubCrop::succeeding("unused.jpg"),
            StubCompressor::succeeding("compressed.jpg"),
            RecordingResizer::succeeding("unused.jpg"),
        );

        let err = pipeline
            .process_for_submission(Path::new("in.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Probe(_)));
    }

    #[tokio::test]
    async fn submission_rejects_an_empty_location() {
        let pipeline = pipeline_with(
            MapProbe::new(),
            StubCrop::succeeding("unused.jpg"),
            StubCompressor::succeeding("compressed.jpg"),
            RecordingResizer::succeeding("unused.jpg"),
        );

        let err = pipeline
            .process_for_submission(Path::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn encode_rejects_an_empty_location() {
        let pipeline = pipeline_with(
            MapProbe::new(),
            StubCrop::succeeding("unused.jpg"),
            StubCompressor::succeeding("compressed.jpg"),
            RecordingResizer::succeeding("unused.jpg"),
        );

        let err = pipeline.encode_base64(Path::new("")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let encoded = pipeline
            .encode_base64(Path::new("some.jpg"))
            .await
            .unwrap();
        assert_eq!(encoded, "ZmFrZQ==");
    }

    /// Lets a test keep a handle on a resizer that was moved into the
    /// pipeline.
    struct SharedResizer(std::sync::Arc<RecordingResizer>);

    impl ResizeCodec for SharedResizer {
        fn resize<'a>(
            &'a self,
            image: &'a Path,
            request: &'a ResizeRequest,
        ) -> BoxFuture<'a, Result<PathBuf>> {
            self.0.resize(image, request)
        }
    }
}
