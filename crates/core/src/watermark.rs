//! Receipt watermark composition.
//!
//! A receipt image is rendered behind a tiled reference label and captured
//! back as a new image. Rendering needs a view surface, which is modeled by
//! the [`ViewCapture`] seam; when no surface is available (or it misbehaves)
//! the original image is kept and the outcome says so.

use crate::codec::MediaProbe;
use crate::error::{AppError, Result};
use futures::future::BoxFuture;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

const LABEL_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Timing and sizing knobs for the composition flow.
#[derive(Clone, Debug)]
pub struct WatermarkConfig {
    /// Width cap for the rendered view; taller images scale down
    /// proportionally.
    pub max_width: u32,
    /// Pause between the view reporting ready and the capture, so tiled
    /// labels finish painting.
    pub settle_delay: Duration,
    /// How long to wait for the view to load the image before giving up.
    pub load_timeout: Duration,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            max_width: 800,
            settle_delay: Duration::from_millis(500),
            load_timeout: Duration::from_secs(10),
        }
    }
}

/// Everything a view needs to render one watermarked receipt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositionSpec {
    pub image: PathBuf,
    pub label: String,
    pub width: u32,
    pub height: u32,
}

/// What the composer hands back; `has_watermark` is false when the original
/// image was kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatermarkOutcome {
    pub path: PathBuf,
    pub label: String,
    pub has_watermark: bool,
}

/// A surface that can render a composition and capture it as an image.
pub trait ViewCapture: Send + Sync {
    /// Resolves once the view has loaded the source image.
    fn prepare<'a>(&'a self, composition: &'a CompositionSpec) -> BoxFuture<'a, Result<()>>;

    /// Captures the rendered view; `None` means the surface produced
    /// nothing usable.
    fn capture<'a>(
        &'a self,
        composition: &'a CompositionSpec,
    ) -> BoxFuture<'a, Result<Option<PathBuf>>>;
}

/// Stand-in for environments without a rendering surface. It reports ready
/// at once and never captures, so composition falls back to the original
/// image.
pub struct UnavailableViewCapture;

impl ViewCapture for UnavailableViewCapture {
    fn prepare<'a>(&'a self, _composition: &'a CompositionSpec) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn capture<'a>(
        &'a self,
        _composition: &'a CompositionSpec,
    ) -> BoxFuture<'a, Result<Option<PathBuf>>> {
        Box::pin(async { Ok(None) })
    }
}

/// Generates a reference label: `R`, six digits from the clock, three
/// random characters.
pub fn generate_label() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..3)
        .map(|_| LABEL_CHARSET[rng.random_range(0..LABEL_CHARSET.len())] as char)
        .collect();
    format!("R{:06}{}", epoch_millis() % 1_000_000, suffix)
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Drives the watermark flow: probe, size the view, wait for it to load,
/// let it settle, capture.
///
/// View trouble is never fatal. The composer logs it and keeps the original
/// image, because a submission without a watermark is still reviewable.
/// Only probe failures propagate, since they mean the source image itself
/// is unusable.
pub struct WatermarkComposer {
    probe: Box<dyn MediaProbe>,
    capture: Box<dyn ViewCapture>,
    config: WatermarkConfig,
}

impl WatermarkComposer {
    pub fn new(probe: Box<dyn MediaProbe>, capture: Box<dyn ViewCapture>) -> Self {
        Self::with_config(probe, capture, WatermarkConfig::default())
    }

    pub fn with_config(
        probe: Box<dyn MediaProbe>,
        capture: Box<dyn ViewCapture>,
        config: WatermarkConfig,
    ) -> Self {
        Self {
            probe,
            capture,
            config,
        }
    }

    /// Composes a watermarked copy of `image`, or hands the original back
    /// with `has_watermark: false` when the view cannot deliver.
    pub async fn compose(&self, image: &Path) -> Result<WatermarkOutcome> {
        if image.as_os_str().is_empty() {
            return Err(AppError::invalid_input("image location is empty"));
        }
        let dims = self.probe.dimensions(image).await?;
        let label = generate_label();

        let (width, height) = if dims.width > self.config.max_width {
            let ratio = f64::from(self.config.max_width) / f64::from(dims.width);
            (
                self.config.max_width,
                (f64::from(dims.height) * ratio).round() as u32,
            )
        } else {
            (dims.width, dims.height)
        };
        let composition = CompositionSpec {
            image: image.to_path_buf(),
            label: label.clone(),
            width,
            height,
        };

        let prepared = tokio::time::timeout(
            self.config.load_timeout,
            self.capture.prepare(&composition),
        )
        .await;
        match prepared {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(%error, "watermark view failed to load, keeping the original image");
                return Ok(keep_original(image, label));
            }
            Err(_) => {
                warn!("watermark view did not become ready in time, keeping the original image");
                return Ok(keep_original(image, label));
            }
        }

        tokio::time::sleep(self.config.settle_delay).await;

        match self.capture.capture(&composition).await {
            Ok(Some(path)) => {
                info!(label = %label, "captured watermarked image");
                Ok(WatermarkOutcome {
                    path,
                    label,
                    has_watermark: true,
                })
            }
            Ok(None) => {
                warn!("watermark capture produced no image, keeping the original");
                Ok(keep_original(image, label))
            }
            Err(error) => {
                warn!(%error, "watermark capture failed, keeping the original image");
                Ok(keep_original(image, label))
            }
        }
    }
}

fn keep_original(image: &Path, label: String) -> WatermarkOutcome {
    WatermarkOutcome {
        path: image.to_path_buf(),
        label,
        has_watermark: false,
    }
}
