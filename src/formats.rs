//! Format catalog.
//!
//! Finite enumerations of what can be read and what can be written, plus the
//! descriptors the surrounding application shows next to each format.
//!
//! | Format | Input | Output | Lossy | Alpha |
//! |---|---|---|---|---|
//! | PNG  | ✓ | ✓ |   | ✓ |
//! | JPEG | ✓ | ✓ | ✓ |   |
//! | WebP | ✓ | ✓ | ✓ | ✓ |
//! | HEIC | ✓ | ✓ | ✓ |   |
//! | BMP  | ✓ | ✓ |   |   |
//! | GIF  | ✓ |   |   |   |
//! | TIFF | ✓ |   |   |   |
//! | PDF  |   | ✓ |   |   |
//!
//! Token parsing is case-insensitive and accepts the usual aliases
//! (`jpeg`, `heif`, `tif`). Unknown tokens parse to `None`.

use std::fmt;
use std::path::Path;

/// Raster formats with an encoder behind them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterFormat {
    Png,
    Jpeg,
    WebP,
    Heic,
    Bmp,
}

/// Any format the bridge can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    Raster(RasterFormat),
    Pdf,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 6] = [
        TargetFormat::Raster(RasterFormat::Png),
        TargetFormat::Raster(RasterFormat::Jpeg),
        TargetFormat::Raster(RasterFormat::WebP),
        TargetFormat::Raster(RasterFormat::Heic),
        TargetFormat::Raster(RasterFormat::Bmp),
        TargetFormat::Pdf,
    ];

    /// Parse a case-insensitive format token.
    pub fn parse(token: &str) -> Option<Self> {
        let format = match token.trim().to_ascii_lowercase().as_str() {
            "png" => Self::Raster(RasterFormat::Png),
            "jpg" | "jpeg" => Self::Raster(RasterFormat::Jpeg),
            "webp" => Self::Raster(RasterFormat::WebP),
            "heic" | "heif" => Self::Raster(RasterFormat::Heic),
            "bmp" => Self::Raster(RasterFormat::Bmp),
            "pdf" => Self::Pdf,
            _ => return None,
        };
        Some(format)
    }

    pub fn id(self) -> &'static str {
        self.meta().id
    }

    pub fn meta(self) -> &'static FormatMeta {
        match self {
            Self::Raster(RasterFormat::Png) => &PNG,
            Self::Raster(RasterFormat::Jpeg) => &JPG,
            Self::Raster(RasterFormat::WebP) => &WEBP,
            Self::Raster(RasterFormat::Heic) => &HEIC,
            Self::Raster(RasterFormat::Bmp) => &BMP,
            Self::Pdf => &PDF,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Formats accepted as conversion sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputFormat {
    Png,
    Jpg,
    WebP,
    Heic,
    Bmp,
    Gif,
    Tiff,
}

impl InputFormat {
    pub const ALL: [InputFormat; 7] = [
        InputFormat::Png,
        InputFormat::Jpg,
        InputFormat::WebP,
        InputFormat::Heic,
        InputFormat::Bmp,
        InputFormat::Gif,
        InputFormat::Tiff,
    ];

    pub fn parse(token: &str) -> Option<Self> {
        let format = match token.trim().to_ascii_lowercase().as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpg,
            "webp" => Self::WebP,
            "heic" | "heif" => Self::Heic,
            "bmp" => Self::Bmp,
            "gif" => Self::Gif,
            "tif" | "tiff" => Self::Tiff,
            _ => return None,
        };
        Some(format)
    }

    pub fn id(self) -> &'static str {
        self.meta().id
    }

    pub fn meta(self) -> &'static FormatMeta {
        match self {
            Self::Png => &PNG,
            Self::Jpg => &JPG,
            Self::WebP => &WEBP,
            Self::Heic => &HEIC,
            Self::Bmp => &BMP,
            Self::Gif => &GIF,
            Self::Tiff => &TIFF,
        }
    }

    /// Output formats offered for this input: every output except itself.
    pub fn conversion_targets(self) -> Vec<TargetFormat> {
        TargetFormat::ALL
            .into_iter()
            .filter(|target| target.id() != self.id())
            .collect()
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Descriptor of a format.
#[derive(Debug, PartialEq, Eq)]
pub struct FormatMeta {
    pub id: &'static str,
    pub label: &'static str,
    pub extension: &'static str,
    pub mime_type: &'static str,
    pub description: &'static str,
    pub lossy: bool,
    pub alpha: bool,
    pub is_input: bool,
    pub is_output: bool,
}

const PNG: FormatMeta = FormatMeta {
    id: "png",
    label: "PNG",
    extension: ".png",
    mime_type: "image/png",
    description: "Lossless • Alpha",
    lossy: false,
    alpha: true,
    is_input: true,
    is_output: true,
};

const JPG: FormatMeta = FormatMeta {
    id: "jpg",
    label: "JPEG",
    extension: ".jpg",
    mime_type: "image/jpeg",
    description: "Universal • Lossy",
    lossy: true,
    alpha: false,
    is_input: true,
    is_output: true,
};

const WEBP: FormatMeta = FormatMeta {
    id: "webp",
    label: "WebP",
    extension: ".webp",
    mime_type: "image/webp",
    description: "Modern • Web",
    lossy: true,
    alpha: true,
    is_input: true,
    is_output: true,
};

const HEIC: FormatMeta = FormatMeta {
    id: "heic",
    label: "HEIC",
    extension: ".heic",
    mime_type: "image/heic",
    description: "Apple • Efficient",
    lossy: true,
    alpha: false,
    is_input: true,
    is_output: true,
};

const BMP: FormatMeta = FormatMeta {
    id: "bmp",
    label: "BMP",
    extension: ".bmp",
    mime_type: "image/bmp",
    description: "Legacy • Uncompressed",
    lossy: false,
    alpha: false,
    is_input: true,
    is_output: true,
};

const GIF: FormatMeta = FormatMeta {
    id: "gif",
    label: "GIF",
    extension: ".gif",
    mime_type: "image/gif",
    description: "Static frame only",
    lossy: false,
    alpha: false,
    is_input: true,
    is_output: false,
};

const TIFF: FormatMeta = FormatMeta {
    id: "tiff",
    label: "TIFF",
    extension: ".tiff",
    mime_type: "image/tiff",
    description: "Professional • Lossless",
    lossy: false,
    alpha: false,
    is_input: true,
    is_output: false,
};

const PDF: FormatMeta = FormatMeta {
    id: "pdf",
    label: "PDF",
    extension: ".pdf",
    mime_type: "application/pdf",
    description: "Document format",
    lossy: false,
    alpha: false,
    is_input: false,
    is_output: true,
};

/// Lower-cased extension of a path, empty when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Guess the input format from a file name, defaulting to JPEG.
pub fn detect_format_from_path(path: &Path) -> InputFormat {
    InputFormat::parse(&extension_of(path)).unwrap_or(InputFormat::Jpg)
}

/// Whether a path carries an extension the bridge accepts as input.
pub fn is_supported_input(path: &Path) -> bool {
    InputFormat::parse(&extension_of(path)).is_some()
}

/// Human-readable byte size (`0 B`, `512 B`, `1.5 KB`, `12 MB`).
pub fn readable_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if size == 0 {
        return "0 B".to_string();
    }

    let mut index = 0;
    let mut value = size as f64;
    while value >= 1024.0 && index < UNITS.len() - 1 {
        value /= 1024.0;
        index += 1;
    }

    if value >= 10.0 || index == 0 {
        format!("{:.0} {}", value, UNITS[index])
    } else {
        format!("{:.1} {}", value, UNITS[index])
    }
}
