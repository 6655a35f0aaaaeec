//! HEIC/HEIF decode and encode through libheif (`heic` feature).

use super::codecs::{CodecError, DecodedImage, RasterEncoder, to_rgb_or_rgba8};
use super::contract::Dimensions;
use super::properties::{ColorProfile, OutputProperties, SourceProperties};
use crate::formats::RasterFormat;
use image::{DynamicImage, RgbImage, RgbaImage};
use libheif_rs::{
    Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, ImageHandle,
    LibHeif, RgbChroma,
};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn heif_error(err: libheif_rs::HeifError) -> CodecError {
    CodecError::Unsupported(format!("libheif: {err}"))
}

fn open(path: &Path) -> Result<HeifContext<'static>, CodecError> {
    let path = path
        .to_str()
        .ok_or_else(|| CodecError::Unsupported(format!("non UTF-8 path: {}", path.display())))?;
    HeifContext::read_from_file(path).map_err(heif_error)
}

fn handle_properties(handle: &ImageHandle, path: &Path) -> SourceProperties {
    // kamadak-exif understands the HEIF container and hands back the TIFF payload.
    let exif = File::open(path).ok().and_then(|file| {
        exif::Reader::new()
            .read_from_container(&mut BufReader::new(file))
            .ok()
            .map(|exif| exif.buf().to_vec())
    });
    SourceProperties {
        dimensions: Dimensions {
            width: handle.width(),
            height: handle.height(),
        },
        has_alpha: handle.has_alpha_channel(),
        color_profile: handle
            .color_profile_raw()
            .map(|raw| raw.data)
            .filter(|icc| !icc.is_empty())
            .map(ColorProfile::from_icc),
        exif,
    }
}

pub(super) fn probe(path: &Path) -> Result<SourceProperties, CodecError> {
    let ctx = open(path)?;
    let handle = ctx.primary_image_handle().map_err(heif_error)?;
    Ok(handle_properties(&handle, path))
}

pub(super) fn decode(path: &Path) -> Result<DecodedImage, CodecError> {
    let ctx = open(path)?;
    let handle = ctx.primary_image_handle().map_err(heif_error)?;
    let properties = handle_properties(&handle, path);

    let (chroma, channels) = if properties.has_alpha {
        (RgbChroma::Rgba, 4)
    } else {
        (RgbChroma::Rgb, 3)
    };
    let lib = LibHeif::new();
    let decoded = lib
        .decode(&handle, ColorSpace::Rgb(chroma), None)
        .map_err(heif_error)?;
    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| CodecError::Unsupported("libheif returned no interleaved plane".into()))?;

    // Rows may be padded beyond width * channels.
    let row = plane.width as usize * channels;
    let mut pixels = Vec::with_capacity(row * plane.height as usize);
    for y in 0..plane.height as usize {
        let start = y * plane.stride;
        let line = plane
            .data
            .get(start..start + row)
            .ok_or_else(|| CodecError::Unsupported("truncated HEIF plane".into()))?;
        pixels.extend_from_slice(line);
    }

    let image = if properties.has_alpha {
        RgbaImage::from_raw(plane.width, plane.height, pixels).map(DynamicImage::ImageRgba8)
    } else {
        RgbImage::from_raw(plane.width, plane.height, pixels).map(DynamicImage::ImageRgb8)
    }
    .ok_or_else(|| CodecError::Unsupported("HEIF plane size mismatch".into()))?;

    Ok(DecodedImage { image, properties })
}

pub(super) struct HeicWriter;

impl RasterEncoder for HeicWriter {
    fn format(&self) -> RasterFormat {
        RasterFormat::Heic
    }

    fn encode(
        &self,
        image: &DynamicImage,
        properties: &OutputProperties,
    ) -> Result<Vec<u8>, CodecError> {
        let source = to_rgb_or_rgba8(image);
        let (width, height) = (source.width(), source.height());
        let (chroma, channels) = if source.color().has_alpha() {
            (RgbChroma::Rgba, 4)
        } else {
            (RgbChroma::Rgb, 3)
        };

        let mut heif_image = Image::new(width, height, ColorSpace::Rgb(chroma)).map_err(heif_error)?;
        heif_image
            .create_plane(Channel::Interleaved, width, height, 8)
            .map_err(heif_error)?;
        {
            let planes = heif_image.planes_mut();
            let plane = planes
                .interleaved
                .ok_or_else(|| CodecError::Encode("libheif allocated no interleaved plane".into()))?;
            let row = width as usize * channels;
            for (y, line) in source.as_bytes().chunks_exact(row).enumerate() {
                let start = y * plane.stride;
                plane.data[start..start + row].copy_from_slice(line);
            }
        }

        let lib = LibHeif::new();
        let mut encoder = lib
            .encoder_for_format(CompressionFormat::Hevc)
            .map_err(heif_error)?;
        encoder
            .set_quality(EncoderQuality::Lossy(properties.lossy_quality.percent()))
            .map_err(heif_error)?;

        let mut ctx = HeifContext::new().map_err(heif_error)?;
        let handle = ctx
            .encode_image(&heif_image, &mut encoder, None)
            .map_err(heif_error)?;
        if let Some(exif) = &properties.exif {
            ctx.add_exif_metadata(&handle, exif).map_err(heif_error)?;
        }
        ctx.write_to_bytes()
            .map_err(|e| CodecError::Encode(format!("libheif: {e}")))
    }
}
