//! Parameter types for conversions.
//!
//! [`ConversionOptions`] is the loosely-filled record a caller hands to the
//! bridge. It is normalized exactly once, at the boundary, into a
//! [`ConversionPlan`]; everything past that point works with already-clamped
//! values and never looks at raw user input again.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality as a fraction in `[0.01, 1]`. Accepts
//!   fractions or percentages on construction.
//! - [`ResizePolicy`]: Whether and how to bound the output dimensions.
//! - [`ConversionOptions`]: Caller-facing options, serde-compatible with the
//!   camelCase records the surrounding application sends.
//! - [`ConversionPlan`]: Normalized options consumed by the bridge.

use serde::{Deserialize, Serialize};

/// Lossy compression quality, always within `[0.01, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quality(f64);

impl Quality {
    pub const MIN: f64 = 0.01;
    pub const MAX: f64 = 1.0;

    /// Normalize a raw quality value.
    ///
    /// Values `<= 1` are read as a fraction, anything above as a percentage.
    /// Both are clamped to `[0.01, 1]`. NaN falls back to the default.
    ///
    /// ```
    /// # use pixo::bridge::Quality;
    /// assert_eq!(Quality::normalize(0.5).value(), 0.5);
    /// assert_eq!(Quality::normalize(85.0).value(), 0.85);
    /// assert_eq!(Quality::normalize(150.0).value(), 1.0);
    /// assert_eq!(Quality::normalize(0.0).value(), 0.01);
    /// ```
    pub fn normalize(raw: f64) -> Self {
        if raw.is_nan() {
            return Self::default();
        }
        let fraction = if raw <= 1.0 { raw } else { raw / 100.0 };
        Self(fraction.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Quality on the 1–100 scale used by most encoders.
    pub fn percent(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.8)
    }
}

/// How the output dimensions are bounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizePolicy {
    /// Keep the source dimensions.
    Keep,
    /// Scale uniformly so neither axis exceeds `max`.
    Fit { max: f64 },
    /// Force both axes to exactly `max`, ignoring the aspect ratio.
    Exact { max: f64 },
}

/// Conversion options as supplied by the caller.
///
/// Only `quality` is expected from every caller; the rest default the way the
/// application's settings screen does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ConversionOptions {
    /// Fraction in `[0, 1]` or percentage in `(1, 100]`.
    pub quality: f64,
    pub preserve_metadata: bool,
    /// JPEG only.
    pub progressive: bool,
    /// Drops color-model and profile entries even when preserving metadata.
    pub strip_color_profile: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_dimension: Option<f64>,
    pub maintain_aspect_ratio: bool,
    /// PNG deflate effort, 0–9. Ignored by other formats.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<u8>,
    /// Encode WebP losslessly, ignoring `quality`.
    pub webp_lossless: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            quality: Quality::default().value(),
            preserve_metadata: true,
            progressive: false,
            strip_color_profile: false,
            max_dimension: None,
            maintain_aspect_ratio: true,
            compression_level: None,
            webp_lossless: false,
        }
    }
}

impl ConversionOptions {
    pub fn with_quality(quality: f64) -> Self {
        Self {
            quality,
            ..Self::default()
        }
    }

    /// Validate and normalize into the plan the bridge executes.
    pub fn normalize(&self) -> ConversionPlan {
        let resize = match self.max_dimension {
            Some(max) if max.is_finite() && max > 0.0 => {
                if self.maintain_aspect_ratio {
                    ResizePolicy::Fit { max }
                } else {
                    ResizePolicy::Exact { max }
                }
            }
            _ => ResizePolicy::Keep,
        };

        ConversionPlan {
            quality: Quality::normalize(self.quality),
            preserve_metadata: self.preserve_metadata,
            progressive: self.progressive,
            strip_color_profile: self.strip_color_profile,
            resize,
            png_compression: self.compression_level.map(|level| level.min(9)),
            webp_lossless: self.webp_lossless,
        }
    }
}

/// Normalized conversion options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionPlan {
    pub quality: Quality,
    pub preserve_metadata: bool,
    pub progressive: bool,
    pub strip_color_profile: bool,
    pub resize: ResizePolicy,
    pub png_compression: Option<u8>,
    pub webp_lossless: bool,
}

impl ConversionPlan {
    /// Plan for a size estimate: quality only, no metadata, no resize.
    pub fn quality_only(quality: Quality) -> Self {
        Self {
            quality,
            preserve_metadata: false,
            progressive: false,
            strip_color_profile: false,
            resize: ResizePolicy::Keep,
            png_compression: None,
            webp_lossless: false,
        }
    }
}
