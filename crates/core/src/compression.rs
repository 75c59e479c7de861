//! Byte-size driven compression strategy selection.
//!
//! The planner inspects only the input file's byte size and the active
//! settings; it never looks at pixel content. The actual compression is
//! delegated to a codec collaborator.

use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound (exclusive) of the light tier.
pub const LIGHT_TIER_LIMIT_BYTES: u64 = 1024 * 1024;

/// Upper bound (exclusive) of the medium tier.
pub const MEDIUM_TIER_LIMIT_BYTES: u64 = 5 * 1024 * 1024;

/// Which settings fields drive strategy selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// One quality/size triple regardless of file size.
    Fixed,
    /// Three quality presets keyed by byte-size thresholds.
    Tiered,
}

/// Size band an input fell into under tiered selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionTier {
    Light,
    Medium,
    Aggressive,
}

impl fmt::Display for CompressionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Light => "light",
            Self::Medium => "medium",
            Self::Aggressive => "aggressive",
        };
        f.write_str(name)
    }
}

/// Parameters handed to the adaptive compression codec.
///
/// Immutable once selected; `quality` is on the (0, 1] scale used by the
/// codec collaborators, max dimensions bound the output size.
#[derive(Clone, Debug, PartialEq)]
pub struct CompressionStrategy {
    pub quality: f64,
    pub max_width: u32,
    pub max_height: u32,
    pub keep_metadata: bool,
}

/// A selected strategy together with the tier that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct CompressionPlan {
    pub strategy: CompressionStrategy,
    /// `None` when the settings were in fixed mode.
    pub tier: Option<CompressionTier>,
}

impl CompressionPlan {
    /// Human-readable name of the selection that was made.
    pub fn tier_label(&self) -> &'static str {
        match self.tier {
            None => "fixed",
            Some(CompressionTier::Light) => "light",
            Some(CompressionTier::Medium) => "medium",
            Some(CompressionTier::Aggressive) => "aggressive",
        }
    }
}

/// Selects compression strategies from byte size and settings.
pub struct CompressionPlanner;

impl CompressionPlanner {
    /// Picks the strategy for an input of `byte_size` bytes.
    ///
    /// Deterministic for identical `(byte_size, settings)`. In tiered mode
    /// the bands are `< 1 MiB` light, `[1 MiB, 5 MiB)` medium and
    /// `>= 5 MiB` aggressive; each band supplies its own quality while the
    /// max dimensions and metadata flag are shared across bands.
    pub fn select_strategy(byte_size: u64, settings: &Settings) -> CompressionPlan {
        match settings.mode {
            CompressionMode::Fixed => CompressionPlan {
                strategy: CompressionStrategy {
                    quality: settings.fixed_quality,
                    max_width: settings.max_width,
                    max_height: settings.max_height,
                    keep_metadata: settings.keep_metadata,
                },
                tier: None,
            },
            CompressionMode::Tiered => {
                let (tier, quality) = if byte_size < LIGHT_TIER_LIMIT_BYTES {
                    (CompressionTier::Light, settings.light_quality)
                } else if byte_size < MEDIUM_TIER_LIMIT_BYTES {
                    (CompressionTier::Medium, settings.medium_quality)
                } else {
                    (CompressionTier::Aggressive, settings.aggressive_quality)
                };
                CompressionPlan {
                    strategy: CompressionStrategy {
                        quality,
                        max_width: settings.max_width,
                        max_height: settings.max_height,
                        keep_metadata: settings.keep_metadata,
                    },
                    tier: Some(tier),
                }
            }
        }
    }

    /// Quality used when the compression codec fails and the resize codec
    /// takes over: the medium preset in tiered mode, the fixed preset
    /// otherwise.
    pub fn fallback_quality(settings: &Settings) -> f64 {
        match settings.mode {
            CompressionMode::Fixed => settings.fixed_quality,
            CompressionMode::Tiered => settings.medium_quality,
        }
    }
}
