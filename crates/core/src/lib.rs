//! DocShot Core Library
//!
//! This library prepares captured document photos for automated processing,
//! including mask-based cropping, size-tiered compression, and submission to
//! an extraction endpoint.
//!
//! # Overview
//!
//! DocShot takes photos of identity cards and receipts as they come off a
//! capture screen and turns them into clean submission payloads. The library
//! handles:
//!
//! - **Geometry**: Screen-space capture masks mapped to native pixels via the
//!   [`geometry`] module
//! - **Image Processing**: Cropping, resizing, and compression via [`codec`]
//!   and [`pipeline`]
//! - **Watermarking**: Receipt reference labels via [`watermark`]
//! - **Submission**: Endpoint client for extraction and verification via
//!   [`api`]
//!
//! # Quick Start
//!
//! The simplest way to use the library is through the [`DocShot`] facade:
//!
//! ```ignore
//! use docshot_core::DocShot;
//! use std::path::Path;
//!
//! // Initialize with environment configuration
//! docshot_core::init();
//! let app = DocShot::new()?;
//!
//! // Prepare an identity card photo captured on a 390x844 screen
//! let payload = app
//!     .prepare_document(Path::new("card.jpg"), 390.0, 844.0)
//!     .await?;
//!
//! // Submit it for field extraction
//! let fields = app.submission_client()?.extract_document(&payload.base64).await?;
//! ```
//!
//! # Module Structure
//!
//! - [`api`]: Submission endpoint client
//! - [`codec`]: Disk-backed image codecs and their seams
//! - [`compression`]: Byte-size tiers and strategy planning
//! - [`config`]: Environment configuration
//! - [`error`]: Error types and result aliases
//! - [`geometry`]: Capture-mask to pixel-window mapping
//! - [`pipeline`]: OCR and submission processing flows
//! - [`settings`]: Persisted user settings
//! - [`specimen`]: Stored receipt specimens
//! - [`watermark`]: Receipt watermark composition

pub mod api;
pub mod codec;
pub mod compression;
pub mod config;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod settings;
pub mod specimen;
pub mod watermark;

// Re-export primary types for convenience
pub use api::SubmissionClient;
pub use codec::DiskCodec;
pub use compression::{CompressionMode, CompressionTier};
pub use config::Config;
pub use error::{AppError, Result};
pub use geometry::MaskGeometry;
pub use pipeline::{CompressionOutcome, OcrImage, TransformPipeline};
pub use settings::{JsonSettingsStore, Settings, SettingsStore};
pub use specimen::{Specimen, SpecimenStore};
pub use watermark::{UnavailableViewCapture, WatermarkComposer, WatermarkOutcome};

use std::path::Path;

/// A document image processed for extraction, plus its wire encoding.
#[derive(Clone, Debug)]
pub struct DocumentPayload {
    pub image: OcrImage,
    pub base64: String,
}

/// A receipt image processed for submission, plus its wire encoding.
#[derive(Clone, Debug)]
pub struct ReceiptPayload {
    pub outcome: CompressionOutcome,
    /// Present when watermarking was requested; `has_watermark` inside says
    /// whether it actually happened.
    pub watermark: Option<WatermarkOutcome>,
    pub base64: String,
}

/// Main entry point for the DocShot application.
///
/// This struct provides a facade over the various subsystems,
/// handling initialization and orchestration. It's the recommended
/// way to use the library for most use cases.
///
/// # Example
///
/// ```ignore
/// use docshot_core::DocShot;
///
/// let app = DocShot::new()?;
/// let payload = app.prepare_receipt(Path::new("receipt.jpg"), true).await?;
/// ```
pub struct DocShot {
    config: Config,
    settings: Settings,
    pipeline: TransformPipeline,
    composer: WatermarkComposer,
}

impl DocShot {
    /// Creates a new DocShot instance with persisted settings.
    ///
    /// Loads configuration from environment variables (including `.env`
    /// files) and settings from the platform config directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No config directory can be determined
    /// - The stored settings fail validation
    /// - The working directory cannot be created
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        let settings = JsonSettingsStore::new()?.load();
        Self::assemble(config, settings)
    }

    /// Creates an instance with explicit settings.
    ///
    /// Use this when settings come from somewhere other than the platform
    /// store, such as a test harness or an embedding application.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings fail validation or the working
    /// directory cannot be created.
    pub fn with_settings(settings: Settings) -> Result<Self> {
        let config = Config::load()?;
        Self::assemble(config, settings)
    }

    fn assemble(config: Config, settings: Settings) -> Result<Self> {
        settings.validate()?;
        let pipeline = TransformPipeline::new(settings.clone(), &config.work_dir)?;
        let probe = DiskCodec::new(&config.work_dir)?;
        let composer =
            WatermarkComposer::new(Box::new(probe), Box::new(UnavailableViewCapture));
        Ok(Self {
            config,
            settings,
            pipeline,
            composer,
        })
    }

    /// Prepares an identity document photo for field extraction.
    ///
    /// The photo is cropped to the card mask centered on a screen of the
    /// given logical size, bounded for legibility, and base64-encoded.
    ///
    /// # Arguments
    /// * `image` - Path to the captured photo
    /// * `screen_width` - Logical width of the capture screen, in points
    /// * `screen_height` - Logical height of the capture screen, in points
    pub async fn prepare_document(
        &self,
        image: &Path,
        screen_width: f64,
        screen_height: f64,
    ) -> Result<DocumentPayload> {
        let mask = MaskGeometry::centered_card(screen_width, screen_height)?;
        let ocr = self.pipeline.process_for_ocr(image, &mask).await?;
        let base64 = self.pipeline.encode_base64(&ocr.path).await?;
        Ok(DocumentPayload { image: ocr, base64 })
    }

    /// Prepares a receipt photo for submission.
    ///
    /// When `watermark` is set, a reference label is composed onto the image
    /// first; if the rendering surface cannot deliver, the original image is
    /// used and the payload records that. The result is then compressed by
    /// the size-tier strategy and base64-encoded.
    pub async fn prepare_receipt(
        &self,
        image: &Path,
        watermark: bool,
    ) -> Result<ReceiptPayload> {
        let (source, watermark_outcome) = if watermark {
            let outcome = self.composer.compose(image).await?;
            (outcome.path.clone(), Some(outcome))
        } else {
            (image.to_path_buf(), None)
        };
        let outcome = self.pipeline.process_for_submission(&source).await?;
        let base64 = self.pipeline.encode_base64(&outcome.path).await?;
        Ok(ReceiptPayload {
            outcome,
            watermark: watermark_outcome,
            base64,
        })
    }

    /// Builds a submission client for the configured endpoint.
    ///
    /// The `DOCSHOT_ENDPOINT` environment variable wins over the persisted
    /// `api_endpoint` setting, so deployments can redirect submissions
    /// without touching stored settings.
    pub fn submission_client(&self) -> Result<SubmissionClient> {
        match &self.config.endpoint_override {
            Some(endpoint) => {
                SubmissionClient::from_parts(endpoint, self.settings.api_timeout_ms)
            }
            None => SubmissionClient::new(&self.settings),
        }
    }

    /// Returns a reference to the environment configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the settings snapshot this instance was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the underlying processing pipeline.
    pub fn pipeline(&self) -> &TransformPipeline {
        &self.pipeline
    }
}

/// Initializes the library by loading environment variables.
///
/// Call this once at application startup before using any other functions.
/// This loads `.env` files if present and sets up the environment.
pub fn init() {
    let _ = dotenvy::dotenv();
}
