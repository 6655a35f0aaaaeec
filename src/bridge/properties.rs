//! Image property dictionaries.
//!
//! [`SourceProperties`] is what a decoder reports about the source before any
//! transform; [`OutputProperties`] is what gets handed to an encoder. The step
//! between them, [`build_output_properties`], is a pure function:
//!
//! 1. start from the source properties when metadata is preserved, else empty
//! 2. drop the color profile when asked to
//! 3. always carry the lossy quality (lossless encoders ignore it)
//! 4. JPEG additionally gets the progressive flag
//!
//! EXIF is kept as the raw TIFF payload (no `Exif\0\0` marker) and read back
//! into a summary with `kamadak-exif` for [`ImageMetadata`](super::ImageMetadata).

use super::contract::Dimensions;
use super::params::{ConversionPlan, Quality};
use crate::formats::RasterFormat;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Marker that prefixes EXIF data inside a JPEG APP1 segment.
pub const EXIF_MARKER: &[u8] = b"Exif\0\0";

/// Embedded color profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorProfile {
    pub name: Option<String>,
    pub icc: Vec<u8>,
}

impl ColorProfile {
    pub fn from_icc(icc: Vec<u8>) -> Self {
        Self {
            name: icc_profile_name(&icc),
            icc,
        }
    }
}

/// Properties read from a source image before any transform.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceProperties {
    pub dimensions: Dimensions,
    pub has_alpha: bool,
    pub color_profile: Option<ColorProfile>,
    /// Raw TIFF-structured EXIF payload.
    pub exif: Option<Vec<u8>>,
}

/// JPEG-specific sub-dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JpegProperties {
    pub progressive: bool,
}

/// Properties handed to an encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputProperties {
    pub exif: Option<Vec<u8>>,
    pub color_profile: Option<ColorProfile>,
    pub lossy_quality: Quality,
    pub jpeg: Option<JpegProperties>,
    pub png_compression: Option<u8>,
    pub webp_lossless: bool,
}

impl OutputProperties {
    /// Only the quality entry set.
    pub fn quality_only(quality: Quality) -> Self {
        Self {
            exif: None,
            color_profile: None,
            lossy_quality: quality,
            jpeg: None,
            png_compression: None,
            webp_lossless: false,
        }
    }
}

/// Build the encoder-side dictionary from source properties and the plan.
pub fn build_output_properties(
    source: &SourceProperties,
    plan: &ConversionPlan,
    format: RasterFormat,
) -> OutputProperties {
    let mut output = OutputProperties::quality_only(plan.quality);

    if plan.preserve_metadata {
        output.exif = source.exif.clone();
        output.color_profile = source.color_profile.clone();
    }
    if plan.strip_color_profile {
        output.color_profile = None;
    }

    match format {
        RasterFormat::Jpeg => {
            let mut jpeg = output.jpeg.unwrap_or_default();
            jpeg.progressive = plan.progressive;
            output.jpeg = Some(jpeg);
        }
        RasterFormat::Png => output.png_compression = plan.png_compression,
        RasterFormat::WebP => output.webp_lossless = plan.webp_lossless,
        RasterFormat::Heic | RasterFormat::Bmp => {}
    }

    output
}

/// Strip the APP1 marker if a decoder left it in place.
pub fn exif_payload(raw: Vec<u8>) -> Vec<u8> {
    match raw.strip_prefix(EXIF_MARKER) {
        Some(payload) => payload.to_vec(),
        None => raw,
    }
}

// ============================================================================
// ICC profile description
// ============================================================================

fn be_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes(bytes.try_into().ok()?))
}

/// Read the `desc` tag of an ICC profile (v2 `desc` or v4 `mluc`).
pub fn icc_profile_name(icc: &[u8]) -> Option<String> {
    const HEADER_LEN: usize = 128;
    const ENTRY_LEN: usize = 12;

    let count = be_u32(icc, HEADER_LEN)? as usize;
    (0..count.min(256))
        .map(|i| HEADER_LEN + 4 + i * ENTRY_LEN)
        .find(|&entry| icc.get(entry..entry + 4) == Some(b"desc".as_slice()))
        .and_then(|entry| {
            let offset = be_u32(icc, entry + 4)? as usize;
            let size = be_u32(icc, entry + 8)? as usize;
            let tag = icc.get(offset..offset.checked_add(size)?)?;
            text_description(tag)
        })
}

fn text_description(tag: &[u8]) -> Option<String> {
    let text = match tag.get(0..4)? {
        b"desc" => {
            let len = be_u32(tag, 8)? as usize;
            let ascii = tag.get(12..12usize.checked_add(len)?)?;
            String::from_utf8_lossy(ascii).into_owned()
        }
        b"mluc" => {
            // First record: language(2) country(2) length(4) offset(4)
            let len = be_u32(tag, 20)? as usize;
            let offset = be_u32(tag, 24)? as usize;
            let utf16: Vec<u16> = tag
                .get(offset..offset.checked_add(len)?)?
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&utf16)
        }
        _ => return None,
    };
    let trimmed = text.trim_matches(char::from(0)).trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ============================================================================
// EXIF summary
// ============================================================================

/// The EXIF entries the metadata record surfaces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifSummary {
    pub orientation: Option<u16>,
    /// Vertical resolution in dots per inch.
    pub dpi: Option<f64>,
    pub color_space: Option<String>,
    pub fields: BTreeMap<String, String>,
}

/// Read EXIF straight from the image container. `None` when absent or unreadable.
pub fn read_exif_summary(path: &Path) -> Option<ExifSummary> {
    let file = File::open(path).ok()?;
    let exif = exif::Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .ok()?;
    Some(summarize(&exif))
}

fn summarize(exif: &exif::Exif) -> ExifSummary {
    use exif::{In, Tag, Value};

    let uint = |tag: Tag| {
        exif.get_field(tag, In::PRIMARY)
            .and_then(|f| f.value.get_uint(0))
    };

    let orientation = uint(Tag::Orientation).and_then(|v| u16::try_from(v).ok());

    let resolution = exif
        .get_field(Tag::YResolution, In::PRIMARY)
        .and_then(|f| match f.value {
            Value::Rational(ref v) if !v.is_empty() && v[0].denom != 0 => Some(v[0].to_f64()),
            _ => None,
        });
    // ResolutionUnit 3 = centimeters
    let dpi = resolution.map(|r| match uint(Tag::ResolutionUnit) {
        Some(3) => r * 2.54,
        _ => r,
    });

    let color_space = uint(Tag::ColorSpace).map(|v| match v {
        1 => "sRGB".to_string(),
        0xFFFF => "Uncalibrated".to_string(),
        other => format!("ColorSpace({other})"),
    });

    let fields = exif
        .fields()
        .filter(|f| f.ifd_num == In::PRIMARY)
        .map(|f| (f.tag.to_string(), f.display_value().to_string()))
        .collect();

    ExifSummary {
        orientation,
        dpi,
        color_space,
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::params::{ConversionOptions, ResizePolicy};
    use crate::test_helpers::{exif_block, icc_profile_v2, icc_profile_v4};

    fn source_with_everything() -> SourceProperties {
        SourceProperties {
            dimensions: Dimensions {
                width: 10,
                height: 10,
            },
            has_alpha: false,
            color_profile: Some(ColorProfile::from_icc(icc_profile_v2("Display P3"))),
            exif: Some(vec![1, 2, 3]),
        }
    }

    fn plan(options: ConversionOptions) -> ConversionPlan {
        options.normalize()
    }

    #[test]
    fn preserve_copies_source_entries() {
        let source = source_with_everything();
        let out = build_output_properties(
            &source,
            &plan(ConversionOptions::with_quality(85.0)),
            RasterFormat::Png,
        );
        assert_eq!(out.exif, Some(vec![1, 2, 3]));
        assert_eq!(out.color_profile, source.color_profile);
        assert_eq!(out.lossy_quality.value(), 0.85);
        assert_eq!(out.jpeg, None);
    }

    #[test]
    fn without_preserve_starts_empty() {
        let options = ConversionOptions {
            preserve_metadata: false,
            ..ConversionOptions::default()
        };
        let out = build_output_properties(
            &source_with_everything(),
            &plan(options),
            RasterFormat::WebP,
        );
        assert_eq!(out.exif, None);
        assert_eq!(out.color_profile, None);
    }

    #[test]
    fn strip_color_profile_keeps_exif() {
        let options = ConversionOptions {
            strip_color_profile: true,
            ..ConversionOptions::default()
        };
        let out = build_output_properties(
            &source_with_everything(),
            &plan(options),
            RasterFormat::Jpeg,
        );
        assert_eq!(out.color_profile, None);
        assert_eq!(out.exif, Some(vec![1, 2, 3]));
    }

    #[test]
    fn jpeg_gets_progressive_flag() {
        let options = ConversionOptions {
            progressive: true,
            ..ConversionOptions::default()
        };
        let out = build_output_properties(
            &source_with_everything(),
            &plan(options.clone()),
            RasterFormat::Jpeg,
        );
        assert_eq!(out.jpeg, Some(JpegProperties { progressive: true }));

        let png = build_output_properties(
            &source_with_everything(),
            &plan(options),
            RasterFormat::Png,
        );
        assert_eq!(png.jpeg, None);
    }

    #[test]
    fn jpeg_sub_dictionary_exists_even_when_not_progressive() {
        let out = build_output_properties(
            &source_with_everything(),
            &plan(ConversionOptions::default()),
            RasterFormat::Jpeg,
        );
        assert_eq!(out.jpeg, Some(JpegProperties { progressive: false }));
    }

    #[test]
    fn format_specific_entries_stay_with_their_format() {
        let options = ConversionOptions {
            compression_level: Some(9),
            webp_lossless: true,
            max_dimension: Some(5.0),
            ..ConversionOptions::default()
        };
        let plan = plan(options);
        assert!(matches!(plan.resize, ResizePolicy::Fit { .. }));

        let png = build_output_properties(&source_with_everything(), &plan, RasterFormat::Png);
        assert_eq!(png.png_compression, Some(9));
        assert!(!png.webp_lossless);

        let webp = build_output_properties(&source_with_everything(), &plan, RasterFormat::WebP);
        assert_eq!(webp.png_compression, None);
        assert!(webp.webp_lossless);
    }

    #[test]
    fn exif_payload_strips_marker() {
        let mut raw = EXIF_MARKER.to_vec();
        raw.extend_from_slice(b"MM\0*");
        assert_eq!(exif_payload(raw), b"MM\0*".to_vec());
        assert_eq!(exif_payload(b"II*\0".to_vec()), b"II*\0".to_vec());
    }

    #[test]
    fn icc_v2_description() {
        assert_eq!(
            icc_profile_name(&icc_profile_v2("sRGB IEC61966-2.1")).as_deref(),
            Some("sRGB IEC61966-2.1")
        );
    }

    #[test]
    fn icc_v4_multilocalized_description() {
        assert_eq!(
            icc_profile_name(&icc_profile_v4("Display P3")).as_deref(),
            Some("Display P3")
        );
    }

    #[test]
    fn icc_garbage_has_no_name() {
        assert_eq!(icc_profile_name(&[]), None);
        assert_eq!(icc_profile_name(&[0u8; 200]), None);
        let mut truncated = icc_profile_v2("Name");
        truncated.truncate(150);
        assert_eq!(icc_profile_name(&truncated), None);
    }

    #[test]
    fn exif_summary_reads_orientation_and_dpi() {
        let exif = exif::Reader::new().read_raw(exif_block(6, 300)).unwrap();
        let summary = summarize(&exif);
        assert_eq!(summary.orientation, Some(6));
        assert_eq!(summary.dpi, Some(300.0));
        assert_eq!(summary.color_space.as_deref(), Some("sRGB"));
        assert!(summary.fields.contains_key("Orientation"));
    }

    #[test]
    fn exif_summary_of_missing_file_is_none() {
        assert_eq!(read_exif_summary(Path::new("/nonexistent/a.jpg")), None);
    }
}
