//! Shared test utilities for the pixo test suite.
//!
//! Builds small synthetic fixtures on the fly (no binary files checked in):
//! gradient images in every writable container, an EXIF block with a known
//! orientation and resolution, and minimal ICC profiles carrying a name.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let source = write_png(&tmp.path().join("a.png"), 300, 400);
//! ```

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};
use std::path::{Path, PathBuf};

// =========================================================================
// Pixel sources
// =========================================================================

pub fn gradient_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

pub fn gradient_rgba(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, ((x + y) % 256) as u8])
    })
}

// =========================================================================
// Fixture files
// =========================================================================

pub fn write_png(path: &Path, width: u32, height: u32) -> PathBuf {
    gradient_rgb(width, height).save(path).unwrap();
    path.to_path_buf()
}

pub fn write_png_rgba(path: &Path, width: u32, height: u32) -> PathBuf {
    gradient_rgba(width, height).save(path).unwrap();
    path.to_path_buf()
}

pub fn write_png_with_icc(path: &Path, width: u32, height: u32, icc: Vec<u8>) -> PathBuf {
    let img = gradient_rgb(width, height);
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = PngEncoder::new(std::io::BufWriter::new(file));
    encoder.set_icc_profile(icc).unwrap();
    encoder
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    path.to_path_buf()
}

pub fn write_bmp(path: &Path, width: u32, height: u32) -> PathBuf {
    gradient_rgb(width, height).save(path).unwrap();
    path.to_path_buf()
}

/// Baseline JPEG with no metadata segments.
pub fn write_jpeg(path: &Path, width: u32, height: u32) -> PathBuf {
    write_jpeg_with_metadata(path, width, height, None, None)
}

/// JPEG carrying an optional APP1 EXIF block and an optional ICC profile.
pub fn write_jpeg_with_metadata(
    path: &Path,
    width: u32,
    height: u32,
    exif: Option<Vec<u8>>,
    icc: Option<Vec<u8>>,
) -> PathBuf {
    let img = gradient_rgb(width, height);
    let mut bytes = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut bytes, 90);
    if let Some(exif) = exif {
        let mut segment = crate::bridge::EXIF_MARKER.to_vec();
        segment.extend_from_slice(&exif);
        encoder.add_app_segment(1, &segment).unwrap();
    }
    if let Some(icc) = icc {
        encoder.add_icc_profile(&icc).unwrap();
    }
    encoder
        .encode(
            img.as_raw(),
            width as u16,
            height as u16,
            jpeg_encoder::ColorType::Rgb,
        )
        .unwrap();
    std::fs::write(path, bytes).unwrap();
    path.to_path_buf()
}

/// Write bytes that no decoder accepts.
pub fn write_garbage(path: &Path) -> PathBuf {
    std::fs::write(path, b"definitely not an image").unwrap();
    path.to_path_buf()
}

// =========================================================================
// Metadata blocks
// =========================================================================

/// Big-endian TIFF-structured EXIF payload (no `Exif\0\0` marker) with
/// Orientation, YResolution (inches) and an Exif sub-IFD holding
/// ColorSpace = sRGB.
pub fn exif_block(orientation: u16, dpi: u32) -> Vec<u8> {
    const IFD0: u32 = 8;
    const IFD0_ENTRIES: u16 = 4;
    let rational_at = IFD0 + 2 + IFD0_ENTRIES as u32 * 12 + 4;
    let exif_ifd_at = rational_at + 8;

    let mut out = Vec::new();
    out.extend_from_slice(b"MM");
    out.extend_from_slice(&42u16.to_be_bytes());
    out.extend_from_slice(&IFD0.to_be_bytes());

    let entry = |out: &mut Vec<u8>, tag: u16, typ: u16, value: [u8; 4]| {
        out.extend_from_slice(&tag.to_be_bytes());
        out.extend_from_slice(&typ.to_be_bytes());
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&value);
    };
    let short = |v: u16| {
        let b = v.to_be_bytes();
        [b[0], b[1], 0, 0]
    };

    out.extend_from_slice(&IFD0_ENTRIES.to_be_bytes());
    entry(&mut out, 0x0112, 3, short(orientation));
    entry(&mut out, 0x011B, 5, rational_at.to_be_bytes());
    entry(&mut out, 0x0128, 3, short(2));
    entry(&mut out, 0x8769, 4, exif_ifd_at.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());

    out.extend_from_slice(&dpi.to_be_bytes());
    out.extend_from_slice(&1u32.to_be_bytes());

    out.extend_from_slice(&1u16.to_be_bytes());
    entry(&mut out, 0xA001, 3, short(1));
    out.extend_from_slice(&0u32.to_be_bytes());

    out
}

fn icc_with_desc(desc: Vec<u8>) -> Vec<u8> {
    let tag_offset = 128 + 4 + 12;
    let mut out = vec![0u8; 128];
    out.extend_from_slice(&1u32.to_be_bytes());
    out.extend_from_slice(b"desc");
    out.extend_from_slice(&(tag_offset as u32).to_be_bytes());
    out.extend_from_slice(&(desc.len() as u32).to_be_bytes());
    out.extend_from_slice(&desc);
    let total = out.len() as u32;
    out[0..4].copy_from_slice(&total.to_be_bytes());
    out
}

/// Minimal ICC v2 profile whose `desc` tag holds `name`.
pub fn icc_profile_v2(name: &str) -> Vec<u8> {
    let mut desc = Vec::new();
    desc.extend_from_slice(b"desc");
    desc.extend_from_slice(&[0; 4]);
    desc.extend_from_slice(&(name.len() as u32 + 1).to_be_bytes());
    desc.extend_from_slice(name.as_bytes());
    desc.push(0);
    icc_with_desc(desc)
}

/// Minimal ICC v4 profile whose `desc` tag is a one-record `mluc`.
pub fn icc_profile_v4(name: &str) -> Vec<u8> {
    let utf16: Vec<u8> = name.encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
    let mut desc = Vec::new();
    desc.extend_from_slice(b"mluc");
    desc.extend_from_slice(&[0; 4]);
    desc.extend_from_slice(&1u32.to_be_bytes());
    desc.extend_from_slice(&12u32.to_be_bytes());
    desc.extend_from_slice(b"enUS");
    desc.extend_from_slice(&(utf16.len() as u32).to_be_bytes());
    desc.extend_from_slice(&28u32.to_be_bytes());
    desc.extend_from_slice(&utf16);
    icc_with_desc(desc)
}
