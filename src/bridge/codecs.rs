//! Decoders, the resize step, and one encoder per raster format.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (PNG, JPEG, WebP, BMP, GIF, TIFF) | `image` crate, format sniffed from content |
//! | Decode (HEIC/HEIF) | `libheif-rs` (`heic` feature) |
//! | Properties (ICC, EXIF, alpha) | `image::ImageDecoder` accessors, before pixel decode |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → PNG, BMP | `image::codecs::{png, bmp}` |
//! | Encode → JPEG | `jpeg-encoder` (quality, progressive, APP1 EXIF, ICC) |
//! | Encode → WebP | `webp` (libwebp, lossy at quality or lossless) |
//! | Encode → HEIC | `libheif-rs` (`heic` feature) |
//!
//! Every encoder writes into memory. The bridge persists the buffer only
//! after encoding succeeded, and the size estimate just measures it.

use super::contract::Dimensions;
use super::params::ResizePolicy;
use super::properties::{ColorProfile, EXIF_MARKER, OutputProperties, SourceProperties, exif_payload};
use crate::formats::RasterFormat;
use image::codecs::bmp::BmpEncoder;
use image::codecs::png::{self, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageEncoder, ImageReader};
use std::borrow::Cow;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Image(#[from] image::ImageError),
    #[error("{0}")]
    Unsupported(String),
    #[error("{0}")]
    Encode(String),
}

/// A decoded source and the properties read before decoding its pixels.
pub struct DecodedImage {
    pub image: DynamicImage,
    pub properties: SourceProperties,
}

// ============================================================================
// Decode
// ============================================================================

/// Brands of the ISO-BMFF `ftyp` box that mark an HEIF still image.
const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1",
];

/// Content sniff for HEIC/HEIF, independent of the file extension.
pub fn is_heif(path: &Path) -> bool {
    let mut header = [0u8; 12];
    let read = std::fs::File::open(path).and_then(|mut f| f.read_exact(&mut header));
    read.is_ok() && &header[4..8] == b"ftyp" && HEIF_BRANDS.iter().any(|b| &header[8..12] == *b)
}

fn open_decoder(path: &Path) -> Result<impl ImageDecoder, CodecError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    Ok(reader.into_decoder()?)
}

fn read_properties(decoder: &mut impl ImageDecoder) -> SourceProperties {
    let (width, height) = decoder.dimensions();
    // Unreadable metadata is treated as absent, never as a decode failure.
    let icc = decoder.icc_profile().ok().flatten();
    let exif = decoder.exif_metadata().ok().flatten();
    SourceProperties {
        dimensions: Dimensions { width, height },
        has_alpha: decoder.color_type().has_alpha(),
        color_profile: icc.filter(|b| !b.is_empty()).map(ColorProfile::from_icc),
        exif: exif.filter(|b| !b.is_empty()).map(exif_payload),
    }
}

/// Decode a source and its properties.
pub fn decode(path: &Path) -> Result<DecodedImage, CodecError> {
    if is_heif(path) {
        return decode_heif(path);
    }
    let mut decoder = open_decoder(path)?;
    let properties = read_properties(&mut decoder);
    let image = DynamicImage::from_decoder(decoder)?;
    Ok(DecodedImage { image, properties })
}

/// Read properties from the header only, without decoding pixels.
pub fn probe(path: &Path) -> Result<SourceProperties, CodecError> {
    if is_heif(path) {
        return probe_heif(path);
    }
    let mut decoder = open_decoder(path)?;
    Ok(read_properties(&mut decoder))
}

#[cfg(feature = "heic")]
fn decode_heif(path: &Path) -> Result<DecodedImage, CodecError> {
    super::heif::decode(path)
}

#[cfg(not(feature = "heic"))]
fn decode_heif(_path: &Path) -> Result<DecodedImage, CodecError> {
    Err(heif_disabled())
}

#[cfg(feature = "heic")]
fn probe_heif(path: &Path) -> Result<SourceProperties, CodecError> {
    super::heif::probe(path)
}

#[cfg(not(feature = "heic"))]
fn probe_heif(_path: &Path) -> Result<SourceProperties, CodecError> {
    Err(heif_disabled())
}

#[cfg(not(feature = "heic"))]
fn heif_disabled() -> CodecError {
    CodecError::Unsupported("HEIC/HEIF support is not compiled in".into())
}

// ============================================================================
// Resize
// ============================================================================

/// Upper bound on the pixel buffer a resize may allocate (1 GiB).
pub const MAX_RESIZE_BYTES: u64 = 1 << 30;

/// Result of the resize step. Failure is a value, not an error: the caller
/// always gets an image to encode.
#[derive(Debug)]
pub enum ResizeOutcome {
    /// The policy did not require a resize.
    Unchanged(DynamicImage),
    Resized(DynamicImage),
    /// The resize could not be performed; this is the untouched source.
    FellBack { image: DynamicImage, reason: String },
}

impl ResizeOutcome {
    pub fn into_image(self) -> DynamicImage {
        match self {
            Self::Unchanged(image) | Self::Resized(image) => image,
            Self::FellBack { image, .. } => image,
        }
    }
}

/// Bound the image per the policy with Lanczos3, keeping its color type and
/// bit depth. Never upscales a source that already fits.
pub fn resize(image: DynamicImage, policy: ResizePolicy) -> ResizeOutcome {
    let source = Dimensions {
        width: image.width(),
        height: image.height(),
    };
    let Some(target) = super::calculations::resize_target(source, policy) else {
        return ResizeOutcome::Unchanged(image);
    };

    let bytes = target.width as u64 * target.height as u64 * image.color().bytes_per_pixel() as u64;
    if bytes > MAX_RESIZE_BYTES {
        let reason = format!(
            "{}x{} needs {} bytes, over the {} byte limit",
            target.width, target.height, bytes, MAX_RESIZE_BYTES
        );
        warn!(%reason, "resize skipped, encoding at source dimensions");
        return ResizeOutcome::FellBack { image, reason };
    }

    debug!(
        from = %format!("{}x{}", source.width, source.height),
        to = %format!("{}x{}", target.width, target.height),
        "resizing"
    );
    ResizeOutcome::Resized(image.resize_exact(target.width, target.height, FilterType::Lanczos3))
}

// ============================================================================
// Encode
// ============================================================================

/// Capability to encode one raster format.
pub trait RasterEncoder: Sync {
    fn format(&self) -> RasterFormat;

    /// Encode into memory. Encoders ignore properties their container
    /// cannot carry.
    fn encode(
        &self,
        image: &DynamicImage,
        properties: &OutputProperties,
    ) -> Result<Vec<u8>, CodecError>;
}

/// Look up the encoder for a format. `None` when this build has none.
pub fn encoder_for(format: RasterFormat) -> Option<&'static dyn RasterEncoder> {
    match format {
        RasterFormat::Png => Some(&PngWriter),
        RasterFormat::Jpeg => Some(&JpegWriter),
        RasterFormat::WebP => Some(&WebpWriter),
        RasterFormat::Bmp => Some(&BmpWriter),
        RasterFormat::Heic => heic_encoder(),
    }
}

#[cfg(feature = "heic")]
fn heic_encoder() -> Option<&'static dyn RasterEncoder> {
    Some(&super::heif::HeicWriter)
}

#[cfg(not(feature = "heic"))]
fn heic_encoder() -> Option<&'static dyn RasterEncoder> {
    None
}

/// 8-bit L/LA/RGB/RGBA view of an image, converting only when needed.
pub(crate) fn to_8bit(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => Cow::Borrowed(image),
        _ => Cow::Owned(to_rgb_or_rgba8(image)),
    }
}

/// RGB8, or RGBA8 when the image has alpha.
pub(crate) fn to_rgb_or_rgba8(image: &DynamicImage) -> DynamicImage {
    if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    }
}

struct PngWriter;

impl RasterEncoder for PngWriter {
    fn format(&self) -> RasterFormat {
        RasterFormat::Png
    }

    fn encode(
        &self,
        image: &DynamicImage,
        properties: &OutputProperties,
    ) -> Result<Vec<u8>, CodecError> {
        // PNG carries 16-bit samples; only float images need converting.
        let image = match image {
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                Cow::Owned(to_rgb_or_rgba8(image))
            }
            _ => Cow::Borrowed(image),
        };

        let compression = match properties.png_compression {
            None | Some(4..=6) => png::CompressionType::Default,
            Some(0..=3) => png::CompressionType::Fast,
            Some(_) => png::CompressionType::Best,
        };

        let mut buf = Vec::new();
        let mut encoder =
            PngEncoder::new_with_quality(&mut buf, compression, png::FilterType::Adaptive);
        if let Some(profile) = &properties.color_profile {
            if let Err(e) = encoder.set_icc_profile(profile.icc.clone()) {
                debug!(error = %e, "PNG encoder refused the ICC profile");
            }
        }
        image.write_with_encoder(encoder)?;
        Ok(buf)
    }
}

struct JpegWriter;

/// Largest payload an APP segment can hold.
const MAX_APP_SEGMENT: usize = 65_533;

impl RasterEncoder for JpegWriter {
    fn format(&self) -> RasterFormat {
        RasterFormat::Jpeg
    }

    fn encode(
        &self,
        image: &DynamicImage,
        properties: &OutputProperties,
    ) -> Result<Vec<u8>, CodecError> {
        let width = u16::try_from(image.width())
            .map_err(|_| CodecError::Encode(format!("width {} exceeds JPEG limit", image.width())))?;
        let height = u16::try_from(image.height()).map_err(|_| {
            CodecError::Encode(format!("height {} exceeds JPEG limit", image.height()))
        })?;

        // JPEG has no alpha channel; grayscale stays single-channel.
        let (data, color) = if image.color().has_color() {
            (image.to_rgb8().into_raw(), jpeg_encoder::ColorType::Rgb)
        } else {
            (image.to_luma8().into_raw(), jpeg_encoder::ColorType::Luma)
        };

        let mut buf = Vec::new();
        let mut encoder = jpeg_encoder::Encoder::new(&mut buf, properties.lossy_quality.percent());
        encoder.set_progressive(properties.jpeg.is_some_and(|j| j.progressive));

        if let Some(exif) = &properties.exif {
            let mut segment = Vec::with_capacity(EXIF_MARKER.len() + exif.len());
            segment.extend_from_slice(EXIF_MARKER);
            segment.extend_from_slice(exif);
            if segment.len() > MAX_APP_SEGMENT {
                warn!(len = segment.len(), "EXIF block too large for APP1, dropped");
            } else {
                encoder
                    .add_app_segment(1, &segment)
                    .map_err(|e| CodecError::Encode(e.to_string()))?;
            }
        }
        if let Some(profile) = &properties.color_profile {
            encoder
                .add_icc_profile(&profile.icc)
                .map_err(|e| CodecError::Encode(e.to_string()))?;
        }

        encoder
            .encode(&data, width, height, color)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

struct WebpWriter;

impl RasterEncoder for WebpWriter {
    fn format(&self) -> RasterFormat {
        RasterFormat::WebP
    }

    fn encode(
        &self,
        image: &DynamicImage,
        properties: &OutputProperties,
    ) -> Result<Vec<u8>, CodecError> {
        // libwebp takes RGB8/RGBA8 only.
        let image = to_rgb_or_rgba8(image);
        let encoder = webp::Encoder::from_image(&image)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        let memory = if properties.webp_lossless {
            encoder.encode_lossless()
        } else {
            encoder.encode((properties.lossy_quality.value() * 100.0) as f32)
        };
        if memory.is_empty() {
            return Err(CodecError::Encode("libwebp produced no output".into()));
        }
        Ok(memory.to_vec())
    }
}

struct BmpWriter;

impl RasterEncoder for BmpWriter {
    fn format(&self) -> RasterFormat {
        RasterFormat::Bmp
    }

    fn encode(
        &self,
        image: &DynamicImage,
        _properties: &OutputProperties,
    ) -> Result<Vec<u8>, CodecError> {
        let image = to_8bit(image);
        let mut buf = Vec::new();
        image.write_with_encoder(BmpEncoder::new(&mut buf))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::params::Quality;
    use crate::test_helpers::*;
    use image::ImageFormat;
    use tempfile::TempDir;

    fn props(quality: f64) -> OutputProperties {
        OutputProperties::quality_only(Quality::normalize(quality))
    }

    fn rgb(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(gradient_rgb(width, height))
    }

    // =========================================================================
    // Decode / probe
    // =========================================================================

    #[test]
    fn decode_png_reads_dimensions_and_alpha() {
        let tmp = TempDir::new().unwrap();
        let path = write_png_rgba(&tmp.path().join("a.png"), 40, 30);

        let decoded = decode(&path).unwrap();
        assert_eq!(decoded.image.width(), 40);
        assert_eq!(decoded.image.height(), 30);
        assert!(decoded.properties.has_alpha);
        assert_eq!(decoded.properties.exif, None);
    }

    #[test]
    fn decode_ignores_misleading_extension() {
        let tmp = TempDir::new().unwrap();
        let path = write_png(&tmp.path().join("a.png"), 12, 8);
        let renamed = tmp.path().join("actually-png.jpg");
        std::fs::rename(&path, &renamed).unwrap();

        assert_eq!(decode(&renamed).unwrap().image.width(), 12);
    }

    #[test]
    fn decode_garbage_fails() {
        let tmp = TempDir::new().unwrap();
        let path = write_garbage(&tmp.path().join("a.png"));
        assert!(decode(&path).is_err());
    }

    #[test]
    fn probe_reads_jpeg_metadata_segments() {
        let tmp = TempDir::new().unwrap();
        let path = write_jpeg_with_metadata(
            &tmp.path().join("a.jpg"),
            32,
            16,
            Some(exif_block(6, 300)),
            Some(icc_profile_v2("Display P3")),
        );

        let props = probe(&path).unwrap();
        assert_eq!(
            props.dimensions,
            Dimensions {
                width: 32,
                height: 16
            }
        );
        assert!(!props.has_alpha);
        assert_eq!(props.exif, Some(exif_block(6, 300)));
        assert_eq!(
            props.color_profile.and_then(|p| p.name).as_deref(),
            Some("Display P3")
        );
    }

    #[test]
    fn heif_sniff() {
        let tmp = TempDir::new().unwrap();
        let heic = tmp.path().join("a.jpg");
        std::fs::write(&heic, b"\0\0\0\x18ftypheic\0\0\0\0mif1heic").unwrap();
        assert!(is_heif(&heic));

        // A PNG under a HEIC name is still a PNG.
        let png = write_png(&tmp.path().join("b.png"), 4, 4);
        let misnamed = tmp.path().join("b.heic");
        std::fs::rename(&png, &misnamed).unwrap();
        assert!(!is_heif(&misnamed));
        assert!(!is_heif(Path::new("/nonexistent.heic")));
    }

    #[cfg(not(feature = "heic"))]
    #[test]
    fn heif_without_feature_is_unsupported() {
        let tmp = TempDir::new().unwrap();
        let heic = tmp.path().join("a.heic");
        std::fs::write(&heic, b"\0\0\0\x18ftypheic\0\0\0\0mif1heic").unwrap();
        assert!(matches!(decode(&heic), Err(CodecError::Unsupported(_))));
        assert!(matches!(probe(&heic), Err(CodecError::Unsupported(_))));
    }

    // =========================================================================
    // Resize
    // =========================================================================

    #[test]
    fn resize_fit_keeps_aspect() {
        let outcome = resize(rgb(400, 200), ResizePolicy::Fit { max: 100.0 });
        assert!(matches!(outcome, ResizeOutcome::Resized(_)));
        let image = outcome.into_image();
        assert_eq!((image.width(), image.height()), (100, 50));
    }

    #[test]
    fn resize_exact_distorts() {
        let outcome = resize(rgb(400, 200), ResizePolicy::Exact { max: 100.0 });
        let image = outcome.into_image();
        assert_eq!((image.width(), image.height()), (100, 100));
    }

    #[test]
    fn resize_preserves_color_type() {
        let rgba16 = DynamicImage::ImageRgba16(DynamicImage::ImageRgba8(gradient_rgba(64, 64)).to_rgba16());
        let outcome = resize(rgba16, ResizePolicy::Fit { max: 32.0 });
        assert_eq!(outcome.into_image().color(), image::ColorType::Rgba16);
    }

    #[test]
    fn resize_small_source_is_unchanged() {
        let outcome = resize(rgb(50, 40), ResizePolicy::Fit { max: 100.0 });
        assert!(matches!(outcome, ResizeOutcome::Unchanged(_)));
        assert_eq!(outcome.into_image().width(), 50);
    }

    #[test]
    fn resize_over_budget_falls_back_to_source() {
        // A 70000x1 strip forced to 65000x65000 would need ~12 GiB.
        let strip = rgb(70_000, 1);
        let outcome = resize(strip, ResizePolicy::Exact { max: 65_000.0 });
        match outcome {
            ResizeOutcome::FellBack { image, reason } => {
                assert_eq!((image.width(), image.height()), (70_000, 1));
                assert!(reason.contains("65000x65000"));
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    // =========================================================================
    // Encoders
    // =========================================================================

    #[test]
    fn every_builtin_raster_format_has_an_encoder() {
        for format in [
            RasterFormat::Png,
            RasterFormat::Jpeg,
            RasterFormat::WebP,
            RasterFormat::Bmp,
        ] {
            let encoder = encoder_for(format).unwrap();
            assert_eq!(encoder.format(), format);
        }
    }

    #[cfg(not(feature = "heic"))]
    #[test]
    fn heic_encoder_missing_without_feature() {
        assert!(encoder_for(RasterFormat::Heic).is_none());
    }

    #[test]
    fn png_output_decodes_with_same_dimensions() {
        let bytes = encoder_for(RasterFormat::Png)
            .unwrap()
            .encode(&rgb(33, 17), &props(0.8))
            .unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (33, 17));
    }

    #[test]
    fn png_keeps_sixteen_bit_samples() {
        let rgb16 = DynamicImage::ImageRgb16(rgb(8, 8).to_rgb16());
        let bytes = encoder_for(RasterFormat::Png)
            .unwrap()
            .encode(&rgb16, &props(0.8))
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb16);
    }

    #[test]
    fn png_embeds_icc_profile() {
        let mut properties = props(0.8);
        properties.color_profile = Some(ColorProfile::from_icc(icc_profile_v2("Wide")));
        let bytes = encoder_for(RasterFormat::Png)
            .unwrap()
            .encode(&rgb(8, 8), &properties)
            .unwrap();

        let mut decoder = image::codecs::png::PngDecoder::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.icc_profile().unwrap(), Some(icc_profile_v2("Wide")));
    }

    #[test]
    fn jpeg_quality_changes_size() {
        let image = rgb(128, 128);
        let encoder = encoder_for(RasterFormat::Jpeg).unwrap();
        let low = encoder.encode(&image, &props(0.1)).unwrap();
        let high = encoder.encode(&image, &props(1.0)).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn jpeg_drops_alpha() {
        let rgba = DynamicImage::ImageRgba8(gradient_rgba(16, 16));
        let bytes = encoder_for(RasterFormat::Jpeg)
            .unwrap()
            .encode(&rgba, &props(0.8))
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn jpeg_progressive_marker() {
        let mut properties = props(0.8);
        properties.jpeg = Some(super::super::properties::JpegProperties { progressive: true });
        let bytes = encoder_for(RasterFormat::Jpeg)
            .unwrap()
            .encode(&rgb(32, 32), &properties)
            .unwrap();
        // SOF2 marks progressive DCT
        assert!(bytes.windows(2).any(|w| w == [0xFF, 0xC2]));
    }

    #[test]
    fn jpeg_carries_exif_and_icc() {
        let mut properties = props(0.8);
        properties.exif = Some(exif_block(3, 240));
        properties.color_profile = Some(ColorProfile::from_icc(icc_profile_v2("Display P3")));
        let bytes = encoder_for(RasterFormat::Jpeg)
            .unwrap()
            .encode(&rgb(16, 16), &properties)
            .unwrap();

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.jpg");
        std::fs::write(&path, bytes).unwrap();
        let read_back = probe(&path).unwrap();
        assert_eq!(read_back.exif, Some(exif_block(3, 240)));
        assert_eq!(
            read_back.color_profile.and_then(|p| p.name).as_deref(),
            Some("Display P3")
        );
    }

    #[test]
    fn jpeg_rejects_oversized_dimensions() {
        let wide = rgb(70_000, 1);
        let result = encoder_for(RasterFormat::Jpeg)
            .unwrap()
            .encode(&wide, &props(0.8));
        assert!(matches!(result, Err(CodecError::Encode(_))));
    }

    #[test]
    fn webp_lossy_and_lossless() {
        let image = rgb(64, 64);
        let encoder = encoder_for(RasterFormat::WebP).unwrap();

        let lossy = encoder.encode(&image, &props(0.5)).unwrap();
        assert_eq!(image::guess_format(&lossy).unwrap(), ImageFormat::WebP);

        let mut lossless_props = props(0.5);
        lossless_props.webp_lossless = true;
        let lossless = encoder.encode(&image, &lossless_props).unwrap();
        let decoded = image::load_from_memory(&lossless).unwrap();
        assert_eq!(decoded.to_rgb8(), gradient_rgb(64, 64));
    }

    #[test]
    fn bmp_converts_sixteen_bit_input() {
        let rgb16 = DynamicImage::ImageRgb16(rgb(10, 6).to_rgb16());
        let bytes = encoder_for(RasterFormat::Bmp)
            .unwrap()
            .encode(&rgb16, &props(0.8))
            .unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Bmp);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (10, 6));
    }
}
