//! The transcoding bridge.
//!
//! ```text
//! convert_image(source, target, options)
//!   ├─ resolve source          → SourceNotFound
//!   ├─ decode (+ properties)   → DecodeFailed
//!   ├─ parse target token      → EncoderUnavailable
//!   ├─ allocate output path
//!   ├─ pdf:    render page → write
//!   └─ raster: resize → encoder lookup → output properties
//!              → encode in memory → write
//! ```
//!
//! Encoding always happens in memory first. A file appears at the allocated
//! path only once the encoder succeeded, so a failed conversion never leaves a
//! plausible output behind.

use super::calculations::{compression_ratio, pdf_size_estimate};
use super::codecs::{self, DecodedImage, RasterEncoder, ResizeOutcome};
use super::contract::{BridgeError, ConversionBridge, ConversionResult, Dimensions, ImageMetadata};
use super::params::{ConversionOptions, Quality};
use super::paths::{OutputDir, creation_date, discard, existing_source, file_size};
use super::pdf;
use super::properties::{OutputProperties, build_output_properties, read_exif_summary};
use crate::formats::{RasterFormat, TargetFormat, extension_of};
use image::DynamicImage;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Bridge backed by real decoders and encoders.
#[derive(Debug, Clone, Default)]
pub struct NativeBridge {
    output: OutputDir,
}

impl NativeBridge {
    pub fn new(output: OutputDir) -> Self {
        Self { output }
    }

    pub fn output_dir(&self) -> &OutputDir {
        &self.output
    }

    /// Whether the baseline codecs work in this build: a PNG and a JPEG must
    /// both encode and decode back.
    pub fn codecs_available() -> bool {
        let pixel = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(2, 2, image::Rgb([200, 40, 40])));
        [RasterFormat::Png, RasterFormat::Jpeg].into_iter().all(|format| {
            codecs::encoder_for(format)
                .and_then(|encoder| {
                    encoder
                        .encode(&pixel, &OutputProperties::quality_only(Quality::default()))
                        .ok()
                })
                .and_then(|bytes| image::load_from_memory(&bytes).ok())
                .is_some_and(|decoded| decoded.width() == 2)
        })
    }

    fn write_pdf(&self, decoded: &DecodedImage, output_path: &Path) -> Result<Dimensions, BridgeError> {
        let bytes = pdf::render_single_page(&decoded.image)
            .map_err(|e| BridgeError::EncodeFailed(e.to_string()))?;
        persist(output_path, &bytes)?;
        Ok(decoded.properties.dimensions)
    }

    fn write_raster(
        &self,
        decoded: DecodedImage,
        format: RasterFormat,
        output_path: &Path,
        options: &ConversionOptions,
    ) -> Result<Dimensions, BridgeError> {
        let plan = options.normalize();

        let image = match codecs::resize(decoded.image, plan.resize) {
            ResizeOutcome::FellBack { image, reason } => {
                debug!(%reason, "continuing with the source image");
                image
            }
            outcome => outcome.into_image(),
        };

        let encoder = resolve_encoder(format)?;
        debug!(encoder = %TargetFormat::Raster(encoder.format()), "encoding");
        let properties = build_output_properties(&decoded.properties, &plan, format);
        let bytes = encoder
            .encode(&image, &properties)
            .map_err(|e| BridgeError::EncodeFailed(e.to_string()))?;
        persist(output_path, &bytes)?;

        Ok(Dimensions {
            width: image.width(),
            height: image.height(),
        })
    }
}

fn resolve_encoder(format: RasterFormat) -> Result<&'static dyn RasterEncoder, BridgeError> {
    codecs::encoder_for(format).ok_or_else(|| {
        BridgeError::EncoderUnavailable(TargetFormat::Raster(format).id().to_string())
    })
}

/// Write an encoded buffer, removing whatever a failed write left behind.
fn persist(path: &Path, bytes: &[u8]) -> Result<(), BridgeError> {
    fs::write(path, bytes).map_err(|e| {
        discard(path);
        BridgeError::from(e)
    })
}

impl ConversionBridge for NativeBridge {
    fn convert_image(
        &self,
        source_path: &str,
        target_format: &str,
        options: &ConversionOptions,
    ) -> Result<ConversionResult, BridgeError> {
        let started = Instant::now();
        debug!(source = source_path, format = target_format, "convert_image");

        let source = existing_source(source_path)
            .ok_or_else(|| BridgeError::SourceNotFound(source_path.to_string()))?;
        let decoded =
            codecs::decode(&source).map_err(|e| BridgeError::DecodeFailed(e.to_string()))?;
        let target = TargetFormat::parse(target_format)
            .ok_or_else(|| BridgeError::EncoderUnavailable(target_format.to_string()))?;
        let format = target_format.trim().to_ascii_lowercase();
        let output_path = self.output.allocate(&format)?;

        let dimensions = match target {
            TargetFormat::Pdf => self.write_pdf(&decoded, &output_path)?,
            TargetFormat::Raster(raster) => {
                self.write_raster(decoded, raster, &output_path, options)?
            }
        };

        let original_size = file_size(&source);
        let converted_size = file_size(&output_path);
        let result = ConversionResult {
            output_path: output_path.to_string_lossy().into_owned(),
            original_size,
            converted_size,
            compression_ratio: compression_ratio(original_size, converted_size),
            duration_ms: started.elapsed().as_millis() as u64,
            format,
            dimensions,
        };
        info!(
            source = %source.display(),
            format = %result.format,
            original_size,
            converted_size,
            duration_ms = result.duration_ms,
            "converted"
        );
        Ok(result)
    }

    fn get_image_metadata(&self, path: &str) -> Result<ImageMetadata, BridgeError> {
        debug!(path, "get_image_metadata");
        let source = existing_source(path)
            .ok_or_else(|| BridgeError::MetadataFailed(format!("cannot open {path}")))?;
        let properties =
            codecs::probe(&source).map_err(|e| BridgeError::MetadataFailed(e.to_string()))?;
        let exif = read_exif_summary(&source).unwrap_or_default();

        let color_space = properties
            .color_profile
            .and_then(|profile| profile.name)
            .or(exif.color_space)
            .unwrap_or_else(|| ImageMetadata::UNKNOWN_COLOR_SPACE.to_string());

        Ok(ImageMetadata {
            width: properties.dimensions.width,
            height: properties.dimensions.height,
            format: extension_of(&source),
            color_space,
            has_alpha: properties.has_alpha,
            dpi: exif.dpi.unwrap_or(ImageMetadata::DEFAULT_DPI),
            orientation: exif.orientation.unwrap_or(ImageMetadata::DEFAULT_ORIENTATION),
            exif_data: (!exif.fields.is_empty()).then_some(exif.fields),
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
        debug!(source = source_path, format = target_format, "estimate_output_size");
        let source = existing_source(source_path)
            .ok_or_else(|| BridgeError::EstimateFailed(format!("cannot open {source_path}")))?;
        // Even the PDF heuristic only answers for sources that decode.
        let decoded =
            codecs::decode(&source).map_err(|e| BridgeError::EstimateFailed(e.to_string()))?;

        let format = match TargetFormat::parse(target_format) {
            Some(TargetFormat::Pdf) => return Ok(pdf_size_estimate(file_size(&source))),
            Some(TargetFormat::Raster(format)) => format,
            None => {
                return Err(BridgeError::EstimateFailed(format!(
                    "no encoder for {target_format}"
                )));
            }
        };

        let encoder = codecs::encoder_for(format)
            .ok_or_else(|| BridgeError::EstimateFailed(format!("no encoder for {target_format}")))?;
        let bytes = encoder
            .encode(
                &decoded.image,
                &OutputProperties::quality_only(Quality::normalize(quality)),
            )
            .map_err(|e| BridgeError::EstimateFailed(e.to_string()))?;
        Ok(bytes.len() as u64)
    }

    fn is_native(&self) -> bool {
        true
    }
}
