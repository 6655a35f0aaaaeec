//! Single-page PDF writer.
//!
//! The page is exactly the size of the image, one point per pixel, and the
//! image is drawn over the whole page. Pixels are stored as a FlateDecode
//! image XObject; an alpha channel becomes a soft mask.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn image_stream(
    width: u32,
    height: u32,
    color_space: &str,
    samples: &[u8],
) -> Result<Stream, PdfError> {
    let data = deflate(samples)?;
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.as_bytes().to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    dict.set("Length", Object::Integer(data.len() as i64));
    Ok(Stream::new(dict, data))
}

/// Render `image` as a one-page PDF document.
pub fn render_single_page(image: &DynamicImage) -> Result<Vec<u8>, PdfError> {
    let (width, height) = (image.width(), image.height());
    let mut doc = Document::with_version("1.5");

    let mut xobject = if image.color().has_color() {
        image_stream(width, height, "DeviceRGB", image.to_rgb8().as_raw())?
    } else {
        image_stream(width, height, "DeviceGray", image.to_luma8().as_raw())?
    };

    if image.color().has_alpha() {
        let alpha: Vec<u8> = image.to_rgba8().pixels().map(|p| p.0[3]).collect();
        let smask = image_stream(width, height, "DeviceGray", &alpha)?;
        let smask_id = doc.add_object(Object::Stream(smask));
        xobject.dict.set("SMask", Object::Reference(smask_id));
    }
    let image_id = doc.add_object(Object::Stream(xobject));

    let w = Object::Integer(width as i64);
    let h = Object::Integer(height as i64);
    let zero = || Object::Integer(0);
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new("cm", vec![w.clone(), zero(), zero(), h.clone(), zero(), zero()]),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![zero(), zero(), w, h],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf)?;
    Ok(buf)
}
