//! Configuration module.
//!
//! Handles loading, validating, and merging `pixo.toml`. Stock defaults form
//! the base layer; the user file only overrides what it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! # output_root = "/var/tmp"  # Root for pixo-output/ (default: system temp dir)
//! bridge = "auto"             # auto | native | copy
//!
//! [defaults]
//! format = "jpg"              # Target format when none is given
//! quality = 85                # 1-100 (fractions in (0, 1] also accepted)
//! preserve_metadata = true
//!
//! [[presets]]
//! id = "thumbs"
//! name = "Thumbnails"
//! from = "png"                # optional
//! to = "webp"
//!
//! [presets.options]           # ConversionOptions field names
//! quality = 60
//! maxDimension = 256
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::bridge::{BridgeChoice, ConversionOptions, OutputDir};
use crate::formats::TargetFormat;
use crate::presets::{Preset, builtin_presets};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "pixo.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `pixo.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PixoConfig {
    /// Root under which `pixo-output/` is created. `None` = system temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_root: Option<PathBuf>,
    /// Bridge implementation to compose.
    pub bridge: BridgeChoice,
    /// Application default settings.
    pub defaults: DefaultsConfig,
    /// User presets, listed after the built-in ones.
    pub presets: Vec<Preset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsConfig {
    pub format: String,
    pub quality: f64,
    pub preserve_metadata: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            format: "jpg".to_string(),
            quality: 85.0,
            preserve_metadata: true,
        }
    }
}

impl DefaultsConfig {
    /// Conversion options implied by the defaults.
    pub fn options(&self) -> ConversionOptions {
        ConversionOptions {
            preserve_metadata: self.preserve_metadata,
            ..ConversionOptions::with_quality(self.quality)
        }
    }
}

impl PixoConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if TargetFormat::parse(&self.defaults.format).is_none() {
            return Err(ConfigError::Validation(format!(
                "defaults.format '{}' is not a supported output format",
                self.defaults.format
            )));
        }
        let quality = self.defaults.quality;
        if quality.is_nan() || quality <= 0.0 || quality > 100.0 {
            return Err(ConfigError::Validation(
                "defaults.quality must be in (0, 100]".into(),
            ));
        }

        let mut seen: HashSet<String> = builtin_presets().into_iter().map(|p| p.id).collect();
        for preset in &self.presets {
            if !seen.insert(preset.id.clone()) {
                return Err(ConfigError::Validation(format!(
                    "preset id '{}' is already defined",
                    preset.id
                )));
            }
            if TargetFormat::parse(&preset.to).is_none() {
                return Err(ConfigError::Validation(format!(
                    "preset '{}': '{}' is not a supported output format",
                    preset.id, preset.to
                )));
            }
            if preset.options.max_dimension.is_some_and(|max| !max.is_finite() || max <= 0.0) {
                return Err(ConfigError::Validation(format!(
                    "preset '{}': maxDimension must be > 0",
                    preset.id
                )));
            }
            if preset.options.compression_level.is_some_and(|level| level > 9) {
                return Err(ConfigError::Validation(format!(
                    "preset '{}': compressionLevel must be 0-9",
                    preset.id
                )));
            }
        }
        Ok(())
    }

    pub fn output_dir(&self) -> OutputDir {
        match &self.output_root {
            Some(root) => OutputDir::new(root),
            None => OutputDir::system_temp(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PixoConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay, arrays included, replace base values.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PixoConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PixoConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `pixo.toml` from the given directory, falling back to stock defaults.
pub fn load_config(dir: &Path) -> Result<PixoConfig, ConfigError> {
    load_config_file(&dir.join(CONFIG_FILE_NAME), false)
}

/// Load a specific config file. With `required`, a missing file is an error.
pub fn load_config_file(path: &Path, required: bool) -> Result<PixoConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    if required && overlay.is_none() {
        return Err(ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("config file not found: {}", path.display()),
        )));
    }
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `pixo.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Pixo Configuration
# ==================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Root directory for converted files; they land in <output_root>/pixo-output/.
# Omit to use the system temporary directory.
# output_root = "/var/tmp"

# Conversion bridge:
#   auto   - native codecs when they work, plain copy otherwise
#   native - always transcode
#   copy   - never transcode, copy the source bytes
bridge = "auto"

# ---------------------------------------------------------------------------
# Default settings
# ---------------------------------------------------------------------------
[defaults]
# Target format used when a command does not name one.
# One of: png, jpg, webp, heic, bmp, pdf
format = "jpg"

# Lossy quality, 1-100. Fractions in (0, 1] are accepted too.
quality = 85

# Copy EXIF and color profile into converted files.
preserve_metadata = true

# ---------------------------------------------------------------------------
# User presets (listed after the built-in ones)
# ---------------------------------------------------------------------------
# [[presets]]
# id = "thumbs"
# name = "Thumbnails"
# from = "png"            # optional
# to = "webp"
#
# [presets.options]       # quality, preserveMetadata, progressive,
# quality = 60            # stripColorProfile, maxDimension,
# maxDimension = 256      # maintainAspectRatio, compressionLevel, webpLossless
"##
}
