//! # Pixo
//!
//! Image conversion bridge: transcode between PNG, JPEG, WebP, HEIC and BMP,
//! or wrap a raster into a single-page PDF. Sources are never modified; every
//! conversion writes a fresh `pixo-<uuid>.<format>` file under
//! `<output_root>/pixo-output/`.
//!
//! # Architecture
//!
//! The application talks to one trait, [`bridge::ConversionBridge`], with
//! three operations:
//!
//! ```text
//! convert_image        source + format + options  →  ConversionResult
//! get_image_metadata   source                     →  ImageMetadata
//! estimate_output_size source + format + quality  →  byte count
//! ```
//!
//! Two implementations exist. [`bridge::NativeBridge`] decodes, resizes and
//! re-encodes. [`bridge::CopyBridge`] copies bytes and is chosen when the
//! native codecs are missing. [`bridge::select_bridge`] decides once at
//! startup.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`bridge`] | The bridge trait, both implementations, codecs, PDF writer |
//! | [`formats`] | Input and target format catalog, extension detection |
//! | [`presets`] | Built-in and user conversion presets |
//! | [`batch`] | Sequential multi-file conversion with progress events |
//! | [`config`] | `pixo.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Encode In Memory, Write Once
//!
//! Encoders produce a byte buffer; the output file is written only after
//! encoding succeeds. A failed conversion never leaves a partial file behind.
//!
//! ## Quality Is Normalized Once
//!
//! Callers may pass `0.85` or `85`. [`bridge::Quality::normalize`] maps both to
//! the same value, clamped to `[0.01, 1]`, and every encoder reads from that.
//!
//! ## HEIC Is A Feature
//!
//! HEIC goes through the system libheif and is gated behind the `heic` cargo
//! feature. Without it, HEIC targets report `encoder_unavailable` and the rest
//! of the crate stays pure Rust plus libwebp.

pub mod batch;
pub mod bridge;
pub mod config;
pub mod formats;
pub mod output;
pub mod presets;

#[cfg(test)]
pub(crate) mod test_helpers;
