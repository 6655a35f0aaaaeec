//! Copy-only bridge for builds without working codecs.
//!
//! Keeps the conversion contract (fresh output path, size statistics, typed
//! errors) but copies the source bytes unchanged. Dimensions are not known and
//! reported as zero.

use super::calculations::compression_ratio;
use super::contract::{BridgeError, ConversionBridge, ConversionResult, Dimensions, ImageMetadata};
use super::params::{ConversionOptions, Quality};
use super::paths::{OutputDir, creation_date, discard, existing_source, file_size};
use crate::formats::{TargetFormat, detect_format_from_path};
use std::fs;
use std::time::Instant;
use tracing::{debug, info};

/// Size factor assumed for uncompressed or lossless targets.
const LOSSLESS_GROWTH: f64 = 1.5;
/// Smallest share of the source a lossy estimate goes down to.
const MIN_LOSSY_SHARE: f64 = 0.2;

#[derive(Debug, Clone, Default)]
pub struct CopyBridge {
    output: OutputDir,
}

impl CopyBridge {
    pub fn new(output: OutputDir) -> Self {
        Self { output }
    }

    pub fn output_dir(&self) -> &OutputDir {
        &self.output
    }
}

impl ConversionBridge for CopyBridge {
    fn convert_image(
        &self,
        source_path: &str,
        target_format: &str,
        _options: &ConversionOptions,
    ) -> Result<ConversionResult, BridgeError> {
        let started = Instant::now();
        debug!(source = source_path, format = target_format, "copy convert_image");

        let source = existing_source(source_path)
            .ok_or_else(|| BridgeError::SourceNotFound(source_path.to_string()))?;
        let target = TargetFormat::parse(target_format)
            .ok_or_else(|| BridgeError::EncoderUnavailable(target_format.to_string()))?;
        let format = target_format.trim().to_ascii_lowercase();
        let output_path = self.output.allocate(&format)?;

        if let Err(e) = fs::copy(&source, &output_path) {
            discard(&output_path);
            return Err(e.into());
        }

        let original_size = file_size(&source);
        let converted_size = file_size(&output_path);
        info!(source = %source.display(), format = %target, "copied without transcoding");
        Ok(ConversionResult {
            output_path: output_path.to_string_lossy().into_owned(),
            original_size,
            converted_size,
            compression_ratio: compression_ratio(original_size, converted_size),
            duration_ms: started.elapsed().as_millis() as u64,
            format,
            dimensions: Dimensions {
                width: 0,
                height: 0,
            },
        })
    }

    fn get_image_metadata(&self, path: &str) -> Result<ImageMetadata, BridgeError> {
        let source = existing_source(path)
            .ok_or_else(|| BridgeError::MetadataFailed(format!("cannot open {path}")))?;
        Ok(ImageMetadata {
            width: 0,
            height: 0,
            format: detect_format_from_path(&source).id().to_string(),
            color_space: ImageMetadata::UNKNOWN_COLOR_SPACE.to_string(),
            has_alpha: false,
            dpi: ImageMetadata::DEFAULT_DPI,
            orientation: ImageMetadata::DEFAULT_ORIENTATION,
            exif_data: None,
            file_size: file_size(&source),
            creation_date: creation_date(&source),
        })
    }

    fn estimate_output_size(
        &self,
        source_path: &str,
        target_format: &str,
        quality: f64,
    ) -> Result<u64, BridgeError> {
        let source = existing_source(source_path)
            .ok_or_else(|| BridgeError::EstimateFailed(format!("cannot open {source_path}")))?;
        let size = file_size(&source) as f64;
        let factor = match target_format.trim().to_ascii_lowercase().as_str() {
            "png" | "bmp" => LOSSLESS_GROWTH,
            _ => Quality::normalize(quality).value().max(MIN_LOSSY_SHARE),
        };
        Ok((size * factor).round() as u64)
    }

    fn is_native(&self) -> bool {
        false
    }
}
