//! Image conversion bridge.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Convert** | decode → resize (Lanczos3) → encode in memory → write |
//! | **Metadata** | decoder header + ICC `desc` tag + `kamadak-exif` |
//! | **Estimate** | full in-memory encode, quality only; PDF uses a fixed ratio |
//! | **PDF** | single page via `lopdf`, pixels deflated with `flate2` |
//!
//! The module is split into:
//! - **Contract**: [`ConversionBridge`] trait, result records, [`BridgeError`]
//! - **Parameters**: [`ConversionOptions`] and its normalized [`ConversionPlan`]
//! - **Calculations**: Pure functions for resize targets and size statistics
//! - **Properties**: Source/output metadata dictionaries
//! - **Codecs**: Decoders, the resize step and one encoder per raster format
//! - **Bridges**: [`NativeBridge`] and the copy-only [`CopyBridge`]
//!
//! Which bridge runs is decided once, at composition time, by
//! [`select_bridge`]. Call sites only ever see `dyn ConversionBridge`.

mod calculations;
mod codecs;
pub mod contract;
mod fallback;
#[cfg(feature = "heic")]
mod heif;
mod native;
mod params;
mod paths;
mod pdf;
mod properties;

pub use calculations::{compression_ratio, delta_percent, pdf_size_estimate, resize_target};
pub use contract::{BridgeError, ConversionBridge, ConversionResult, Dimensions, ImageMetadata};
pub use fallback::CopyBridge;
pub use native::NativeBridge;
pub use params::{ConversionOptions, ConversionPlan, Quality, ResizePolicy};
pub use paths::{OUTPUT_DIR_NAME, OutputDir, normalize_source};
pub use properties::EXIF_MARKER;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Which bridge implementation to compose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeChoice {
    /// Native when its codecs work, copy otherwise.
    #[default]
    Auto,
    Native,
    Copy,
}

/// Build the bridge for `choice`, writing under `output`.
pub fn select_bridge(choice: BridgeChoice, output: OutputDir) -> Box<dyn ConversionBridge> {
    match choice {
        BridgeChoice::Native => Box::new(NativeBridge::new(output)),
        BridgeChoice::Copy => Box::new(CopyBridge::new(output)),
        BridgeChoice::Auto => {
            if NativeBridge::codecs_available() {
                info!("using native conversion bridge");
                Box::new(NativeBridge::new(output))
            } else {
                warn!("native codecs unavailable, falling back to copy bridge");
                Box::new(CopyBridge::new(output))
            }
        }
    }
}
