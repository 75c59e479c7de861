use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use docshot_core::watermark::WatermarkConfig;
use docshot_core::{
    CompressionTier, DiskCodec, MaskGeometry, Settings, TransformPipeline,
    UnavailableViewCapture, WatermarkComposer,
};
use image::{ImageBuffer, Rgb};
use rand::Rng;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

fn save_gradient(path: &Path, width: u32, height: u32) {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    img.save(path).unwrap();
}

/// Noise defeats PNG compression, which makes file sizes predictable enough
/// to land in a chosen tier.
fn save_noise(path: &Path, width: u32, height: u32) {
    let mut rng = rand::rng();
    let img = ImageBuffer::from_fn(width, height, |_, _| {
        Rgb([rng.random::<u8>(), rng.random::<u8>(), rng.random::<u8>()])
    });
    img.save(path).unwrap();
}

fn pipeline_in(dir: &Path, settings: Settings) -> TransformPipeline {
    TransformPipeline::new(settings, dir.join("work")).unwrap()
}

/// An identity card photographed at 3000x2000 on a 400x800 portrait screen:
/// the orientations disagree, so the mask maps through swapped axes.
#[tokio::test]
async fn card_flow_crops_and_bounds_a_real_photo() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("card.png");
    save_gradient(&source, 3000, 2000);

    let pipeline = pipeline_in(dir.path(), Settings::default());
    let mask = MaskGeometry::centered_card(400.0, 800.0).unwrap();

    let result = pipeline.process_for_ocr(&source, &mask).await.unwrap();

    assert!(result.cropped);
    assert_eq!((result.width, result.height), (901, 1980));
    let dims = image::image_dimensions(&result.path).unwrap();
    assert_eq!(dims, (901, 1980));
}

#[tokio::test]
async fn small_files_take_the_light_tier() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("receipt.png");
    save_gradient(&source, 200, 100);

    let pipeline = pipeline_in(dir.path(), Settings::default());
    let outcome = pipeline.process_for_submission(&source).await.unwrap();

    assert_eq!(outcome.tier, Some(CompressionTier::Light));
    assert_eq!(outcome.strategy.quality, 0.8);
    assert!(!outcome.used_fallback);
    assert!(outcome.path.exists());
    assert!(outcome.compressed_size > 0);
    // Small images fit inside the dimension caps and keep their size.
    let dims = image::image_dimensions(&outcome.path).unwrap();
    assert_eq!(dims, (200, 100));
}

#[tokio::test]
async fn megabyte_files_take_the_medium_tier() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("receipt.png");
    save_noise(&source, 1000, 700);

    let original_size = fs::metadata(&source).unwrap().len();
    assert!(
        original_size >= 1024 * 1024,
        "noise image should exceed the light tier, got {original_size} bytes"
    );

    let pipeline = pipeline_in(dir.path(), Settings::default());
    let outcome = pipeline.process_for_submission(&source).await.unwrap();

    assert_eq!(outcome.tier, Some(CompressionTier::Medium));
    assert_eq!(outcome.strategy.quality, 0.7);
    assert!(!outcome.used_fallback);
    assert_eq!(outcome.original_size, original_size);
    assert!(outcome.path.exists());
}

#[tokio::test]
async fn compression_respects_the_dimension_caps() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("receipt.png");
    save_gradient(&source, 1200, 800);

    let settings = Settings {
        max_width: 500,
        max_height: 500,
        ..Settings::default()
    };
    let pipeline = pipeline_in(dir.path(), settings);
    let outcome = pipeline.process_for_submission(&source).await.unwrap();

    let (width, height) = image::image_dimensions(&outcome.path).unwrap();
    assert!(width <= 500 && height <= 500);
    assert_eq!((width, height), (500, 333));
}

/// Without a rendering surface the composer hands the source back unchanged,
/// labeled but unmarked, and compression still accepts it.
#[tokio::test]
async fn missing_surface_still_yields_a_submittable_receipt() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("receipt.png");
    save_gradient(&source, 640, 480);

    let probe = DiskCodec::new(dir.path().join("work")).unwrap();
    let composer = WatermarkComposer::with_config(
        Box::new(probe),
        Box::new(UnavailableViewCapture),
        WatermarkConfig {
            settle_delay: Duration::from_millis(1),
            ..WatermarkConfig::default()
        },
    );

    let marked = composer.compose(&source).await.unwrap();
    assert!(!marked.has_watermark);
    assert_eq!(marked.path, source);
    assert_eq!(marked.label.len(), 10);

    let pipeline = pipeline_in(dir.path(), Settings::default());
    let outcome = pipeline.process_for_submission(&marked.path).await.unwrap();
    assert!(outcome.path.exists());
}

#[tokio::test]
async fn encoded_payloads_decode_back_to_the_file() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("receipt.png");
    save_gradient(&source, 64, 64);

    let pipeline = pipeline_in(dir.path(), Settings::default());
    let encoded = pipeline.encode_base64(&source).await.unwrap();

    let decoded = BASE64.decode(encoded).unwrap();
    assert_eq!(decoded, fs::read(&source).unwrap());
}
