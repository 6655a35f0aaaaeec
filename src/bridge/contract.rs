//! Bridge trait and the records that cross it.
//!
//! The [`ConversionBridge`] trait defines the three operations the surrounding
//! application calls: convert, read metadata, and estimate the output size.
//! Every failure comes back as a [`BridgeError`] with a stable machine code.
//!
//! The production implementation is
//! [`NativeBridge`](super::native::NativeBridge); the copy-only
//! [`CopyBridge`](super::fallback::CopyBridge) stands in when native codecs
//! are missing. Which one runs is decided once, by
//! [`select_bridge`](super::select_bridge).

use super::params::ConversionOptions;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Source file does not exist: {0}")]
    SourceNotFound(String),
    #[error("Unable to decode source image: {0}")]
    DecodeFailed(String),
    #[error("Target format is not supported on this device: {0}")]
    EncoderUnavailable(String),
    #[error("Failed to encode converted image: {0}")]
    EncodeFailed(String),
    #[error("Unable to read image metadata: {0}")]
    MetadataFailed(String),
    #[error("Unable to estimate output size: {0}")]
    EstimateFailed(String),
    #[error("{0}")]
    ConversionFailed(String),
}

impl BridgeError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceNotFound(_) => "source_not_found",
            Self::DecodeFailed(_) => "decode_failed",
            Self::EncoderUnavailable(_) => "encoder_unavailable",
            Self::EncodeFailed(_) => "encode_failed",
            Self::MetadataFailed(_) => "metadata_failed",
            Self::EstimateFailed(_) => "estimate_failed",
            Self::ConversionFailed(_) => "conversion_failed",
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        Self::ConversionFailed(err.to_string())
    }
}

impl Serialize for BridgeError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BridgeError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    /// Absolute path of the freshly written file.
    pub output_path: String,
    pub original_size: u64,
    pub converted_size: u64,
    pub compression_ratio: f64,
    pub duration_ms: u64,
    /// Lower-cased target format token.
    pub format: String,
    /// Dimensions of the image actually written.
    pub dimensions: Dimensions,
}

/// Read-only descriptor of an image file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    /// Lower-cased file extension.
    pub format: String,
    pub color_space: String,
    pub has_alpha: bool,
    /// Vertical resolution.
    pub dpi: f64,
    /// EXIF orientation code, 1 when absent.
    pub orientation: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif_data: Option<BTreeMap<String, String>>,
    pub file_size: u64,
    /// ISO-8601.
    pub creation_date: String,
}

impl ImageMetadata {
    pub const DEFAULT_DPI: f64 = 72.0;
    pub const DEFAULT_ORIENTATION: u16 = 1;
    pub const UNKNOWN_COLOR_SPACE: &'static str = "unknown";
}

/// The conversion boundary.
///
/// Operations are synchronous and blocking; callers run them off their
/// interactive thread. Implementations hold no mutable shared state, so one
/// bridge can serve concurrent calls.
pub trait ConversionBridge: Send + Sync {
    /// Decode, transform and re-encode `source_path` into `target_format`.
    fn convert_image(
        &self,
        source_path: &str,
        target_format: &str,
        options: &ConversionOptions,
    ) -> Result<ConversionResult, BridgeError>;

    /// Read the property dictionary of an image without decoding pixels.
    fn get_image_metadata(&self, path: &str) -> Result<ImageMetadata, BridgeError>;

    /// Byte size the conversion would produce, without writing anything.
    fn estimate_output_size(
        &self,
        source_path: &str,
        target_format: &str,
        quality: f64,
    ) -> Result<u64, BridgeError>;

    /// Whether this bridge actually transcodes.
    fn is_native(&self) -> bool;
}
