use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use docshot_core::{
    init, CompressionMode, DocShot, JsonSettingsStore, Settings, SettingsStore,
    Specimen, SpecimenStore,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prepare an identity card photo for field extraction
    Idcard {
        /// Path to the captured photo
        image: PathBuf,

        /// Logical width of the capture screen, in points
        #[arg(long, default_value_t = 390.0)]
        screen_width: f64,

        /// Logical height of the capture screen, in points
        #[arg(long, default_value_t = 844.0)]
        screen_height: f64,

        /// Submit the prepared image to the extraction endpoint
        #[arg(long)]
        submit: bool,
    },

    /// Prepare a receipt photo for submission
    Receipt {
        /// Path to the captured photo
        image: PathBuf,

        /// Skip the reference-label watermark
        #[arg(long)]
        no_watermark: bool,

        /// Submit the prepared image for verification against stored specimens
        #[arg(long)]
        submit: bool,
    },

    /// Manage stored receipt specimens
    Specimen {
        #[command(subcommand)]
        action: SpecimenAction,
    },

    /// Inspect or change persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum SpecimenAction {
    /// Compress, encode and store a receipt image as a specimen
    Add {
        /// Path to the receipt photo
        image: PathBuf,
    },

    /// List stored specimens
    List,

    /// Remove all stored specimens
    Clear,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the current settings as JSON
    Show,

    /// Change one setting and persist it
    Set {
        /// Setting name, e.g. `mode` or `max_width`
        key: String,

        /// New value
        value: String,
    },

    /// Remove stored settings so defaults apply again
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup
    init();
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Idcard {
            image,
            screen_width,
            screen_height,
            submit,
        } => run_idcard(image, screen_width, screen_height, submit).await,
        Command::Receipt {
            image,
            no_watermark,
            submit,
        } => run_receipt(image, no_watermark, submit).await,
        Command::Specimen { action } => run_specimen(action).await,
        Command::Settings { action } => run_settings(action),
    }
}

fn init_tracing() {
    // Logs go to stderr so command output stays pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run_idcard(
    image: PathBuf,
    screen_width: f64,
    screen_height: f64,
    submit: bool,
) -> Result<()> {
    let app = DocShot::new().context("Failed to initialize")?;
    let payload = app
        .prepare_document(&image, screen_width, screen_height)
        .await
        .context("Failed to prepare the document image")?;

    println!("Prepared: {}", payload.image.path.display());
    println!(
        "Dimensions: {}x{}",
        payload.image.width, payload.image.height
    );
    if !payload.image.cropped {
        println!("Note: cropping failed, the full photo was used");
    }

    if submit {
        let client = app
            .submission_client()
            .context("Failed to build the submission client")?;
        let response = client
            .extract_document(&payload.base64)
            .await
            .context("Submission failed")?;
        println!("{}", serde_json::to_string_pretty(&response)?);
    }
    Ok(())
}

async fn run_receipt(image: PathBuf, no_watermark: bool, submit: bool) -> Result<()> {
    let app = DocShot::new().context("Failed to initialize")?;
    let payload = app
        .prepare_receipt(&image, !no_watermark)
        .await
        .context("Failed to prepare the receipt image")?;

    let outcome = &payload.outcome;
    println!("Prepared: {}", outcome.path.display());
    println!(
        "Size: {} -> {} ({:.1}% saved)",
        format_byte_size(outcome.original_size),
        format_byte_size(outcome.compressed_size),
        outcome.ratio_percent
    );
    match outcome.tier {
        Some(tier) => println!("Tier: {} (quality {:.2})", tier, outcome.strategy.quality),
        None => println!("Tier: fixed (quality {:.2})", outcome.strategy.quality),
    }
    if let Some(mark) = &payload.watermark {
        if mark.has_watermark {
            println!("Watermark: {}", mark.label);
        } else {
            println!("Watermark: unavailable, submitting without one");
        }
    }

    if submit {
        let store = SpecimenStore::new().context("Failed to open the specimen store")?;
        let specimens = store.load();
        if specimens.is_empty() {
            bail!("no stored specimens; add one with `docshot specimen add <image>`");
        }
        let specimen_images: Vec<String> =
            specimens.into_iter().map(|specimen| specimen.base64).collect();
        let client = app
            .submission_client()
            .context("Failed to build the submission client")?;
        let response = client
            .verify_receipt(&payload.base64, &specimen_images)
            .await
            .context("Submission failed")?;
        println!("{}", serde_json::to_string_pretty(&response)?);
    }
    Ok(())
}

async fn run_specimen(action: SpecimenAction) -> Result<()> {
    match action {
        SpecimenAction::Add { image } => {
            let app = DocShot::new().context("Failed to initialize")?;
            let payload = app
                .prepare_receipt(&image, false)
                .await
                .context("Failed to prepare the specimen image")?;

            let store =
                SpecimenStore::new().context("Failed to open the specimen store")?;
            store
                .append(Specimen::captured_now(&image, payload.base64))
                .context("Failed to store the specimen")?;
            println!(
                "Stored specimen {} ({})",
                image.display(),
                format_byte_size(payload.outcome.compressed_size)
            );
            println!("Total specimens: {}", store.count());
        }
        SpecimenAction::List => {
            let store =
                SpecimenStore::new().context("Failed to open the specimen store")?;
            let specimens = store.load();
            if specimens.is_empty() {
                println!("No stored specimens");
            } else {
                for (index, specimen) in specimens.iter().enumerate() {
                    println!(
                        "{}. {} (captured_at_ms: {})",
                        index + 1,
                        specimen.image_path.display(),
                        specimen.captured_at_ms
                    );
                }
            }
        }
        SpecimenAction::Clear => {
            let store =
                SpecimenStore::new().context("Failed to open the specimen store")?;
            store.clear().context("Failed to clear specimens")?;
            println!("Cleared stored specimens");
        }
    }
    Ok(())
}

fn run_settings(action: SettingsAction) -> Result<()> {
    let store = JsonSettingsStore::new().context("Failed to locate the settings file")?;
    match action {
        SettingsAction::Show => {
            let settings = store.load();
            println!("{}", serde_json::to_string_pretty(&settings)?);
            println!("File: {}", store.path().display());
        }
        SettingsAction::Set { key, value } => {
            let mut settings = store.load();
            apply_setting(&mut settings, &key, &value)?;
            settings
                .validate()
                .context("The new value was rejected by validation")?;
            store.save(&settings).context("Failed to save settings")?;
            println!("Set {key} = {value}");
        }
        SettingsAction::Reset => {
            store.reset().context("Failed to reset settings")?;
            println!("Settings reset to defaults");
        }
    }
    Ok(())
}

fn apply_setting(settings: &mut Settings, key: &str, value: &str) -> Result<()> {
    match key {
        "mode" => {
            settings.mode = match value {
                "fixed" => CompressionMode::Fixed,
                "tiered" => CompressionMode::Tiered,
                other => bail!("unknown mode '{other}', expected 'fixed' or 'tiered'"),
            }
        }
        "fixed_quality" => settings.fixed_quality = parse_value(key, value)?,
        "light_quality" => settings.light_quality = parse_value(key, value)?,
        "medium_quality" => settings.medium_quality = parse_value(key, value)?,
        "aggressive_quality" => settings.aggressive_quality = parse_value(key, value)?,
        "max_width" => settings.max_width = parse_value(key, value)?,
        "max_height" => settings.max_height = parse_value(key, value)?,
        "keep_metadata" => settings.keep_metadata = parse_value(key, value)?,
        "api_endpoint" => settings.api_endpoint = value.to_string(),
        "api_timeout_ms" => settings.api_timeout_ms = parse_value(key, value)?,
        other => bail!("unknown setting '{other}'"),
    }
    Ok(())
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err| anyhow!("invalid value for {key}: {err}"))
}

/// Formats a byte count with two decimals above the byte range.
fn format_byte_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_sizes_format_with_binary_units() {
        assert_eq!(format_byte_size(0), "0 B");
        assert_eq!(format_byte_size(512), "512 B");
        assert_eq!(format_byte_size(1024), "1.00 KB");
        assert_eq!(format_byte_size(1536), "1.50 KB");
        assert_eq!(format_byte_size(3 * 1024 * 1024), "3.00 MB");
        assert_eq!(format_byte_size(5 * 1024 * 1024 * 1024), "5.00 GB");
    }

    #[test]
    fn settings_keys_apply_to_their_fields() {
        let mut settings = Settings::default();

        apply_setting(&mut settings, "mode", "fixed").unwrap();
        assert_eq!(settings.mode, CompressionMode::Fixed);

        apply_setting(&mut settings, "fixed_quality", "0.5").unwrap();
        assert_eq!(settings.fixed_quality, 0.5);

        apply_setting(&mut settings, "max_width", "1500").unwrap();
        assert_eq!(settings.max_width, 1500);

        apply_setting(&mut settings, "keep_metadata", "true").unwrap();
        assert!(settings.keep_metadata);

        apply_setting(&mut settings, "api_endpoint", "https://example.test/run").unwrap();
        assert_eq!(settings.api_endpoint, "https://example.test/run");
    }

    #[test]
    fn unknown_settings_keys_are_rejected() {
        let mut settings = Settings::default();
        let err = apply_setting(&mut settings, "no_such_key", "1").unwrap_err();
        assert!(err.to_string().contains("no_such_key"));
    }

    #[test]
    fn unparsable_values_name_the_key() {
        let mut settings = Settings::default();
        let err = apply_setting(&mut settings, "max_width", "wide").unwrap_err();
        assert!(err.to_string().contains("max_width"));
    }

    #[test]
    fn unknown_modes_are_rejected() {
        let mut settings = Settings::default();
        let err = apply_setting(&mut settings, "mode", "adaptive").unwrap_err();
        assert!(err.to_string().contains("adaptive"));
    }
}
