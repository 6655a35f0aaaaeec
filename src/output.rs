//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Convert
//!
//! ```text
//! IMG_0001.heic → jpg 1200x800
//!     Output: /tmp/pixo-output/pixo-3f0c….jpg
//!     Size: 2.1 MB → 412 KB (19.6%)
//!     Time: 182 ms
//! ```
//!
//! ## Batch
//!
//! ```text
//! 001/003 a.png
//!     → pixo-….webp (1.2 MB → 240 KB)
//! 002/003 b.png
//!     → pixo-….webp (800 KB → 96 KB)
//! ...
//! Converted 3 of 3
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::batch::{BatchEvent, BatchOutcome};
use crate::bridge::{BridgeError, ConversionResult, ImageMetadata};
use crate::formats::readable_size;
use crate::presets::Preset;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn size_change(original: u64, converted: u64) -> String {
    format!("{} → {}", readable_size(original), readable_size(converted))
}

// ============================================================================
// Convert / metadata / estimate
// ============================================================================

pub fn format_conversion(source: &str, result: &ConversionResult) -> Vec<String> {
    let dims = match (result.dimensions.width, result.dimensions.height) {
        (0, 0) => String::new(),
        (w, h) => format!(" {}x{}", w, h),
    };
    vec![
        format!("{} → {}{}", file_name(source), result.format, dims),
        format!("    Output: {}", result.output_path),
        format!(
            "    Size: {} ({:.1}%)",
            size_change(result.original_size, result.converted_size),
            result.compression_ratio * 100.0
        ),
        format!("    Time: {} ms", result.duration_ms),
    ]
}

pub fn print_conversion(source: &str, result: &ConversionResult) {
    for line in format_conversion(source, result) {
        println!("{}", line);
    }
}

pub fn format_metadata(path: &str, meta: &ImageMetadata) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{} ({}, {}x{})",
            file_name(path),
            meta.format,
            meta.width,
            meta.height
        ),
        format!("    Color space: {}", meta.color_space),
        format!("    Alpha: {}", if meta.has_alpha { "yes" } else { "no" }),
        format!("    DPI: {}", meta.dpi),
        format!("    Orientation: {}", meta.orientation),
        format!("    Size: {}", readable_size(meta.file_size)),
        format!("    Created: {}", meta.creation_date),
    ];
    if let Some(exif) = &meta.exif_data {
        lines.push(format!("    EXIF: {} fields", exif.len()));
    }
    lines
}

pub fn print_metadata(path: &str, meta: &ImageMetadata) {
    for line in format_metadata(path, meta) {
        println!("{}", line);
    }
}

pub fn format_estimate(source: &str, format: &str, bytes: u64) -> String {
    format!("{} → {} ≈ {}", file_name(source), format.to_ascii_lowercase(), readable_size(bytes))
}

/// One-line error with its machine code.
pub fn format_error(err: &BridgeError) -> String {
    format!("error[{}]: {}", err.code(), err)
}

// ============================================================================
// Batch
// ============================================================================

pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::ItemStarted(progress) => vec![format!(
            "{}/{} {}",
            format_index(progress.completed + 1),
            format_index(progress.total),
            progress.current
        )],
        BatchEvent::ItemFinished { record, .. } => vec![format!(
            "    → {} ({})",
            record.output_name,
            size_change(record.stats.original_size, record.stats.converted_size)
        )],
    }
}

pub fn format_batch_summary(outcome: &BatchOutcome, total: usize) -> Vec<String> {
    let mut line = format!("Converted {} of {}", outcome.records.len(), total);
    if outcome.cancelled {
        line.push_str(" (cancelled)");
    }
    let mut lines = vec![line];
    let original: u64 = outcome.records.iter().map(|r| r.stats.original_size).sum();
    let converted: u64 = outcome.records.iter().map(|r| r.stats.converted_size).sum();
    if !outcome.records.is_empty() {
        lines.push(format!("    Total: {}", size_change(original, converted)));
    }
    lines
}

pub fn print_batch_summary(outcome: &BatchOutcome, total: usize) {
    for line in format_batch_summary(outcome, total) {
        println!("{}", line);
    }
}

// ============================================================================
// Presets
// ============================================================================

pub fn format_presets(presets: &[Preset]) -> Vec<String> {
    presets
        .iter()
        .map(|preset| {
            let route = match &preset.from {
                Some(from) => format!("{} → {}", from, preset.to),
                None => format!("any → {}", preset.to),
            };
            let plan = preset.options.normalize();
            let mut line = format!(
                "{:<14} {:<14} {:<14} q{}",
                preset.id,
                preset.name,
                route,
                plan.quality.percent()
            );
            if preset.system {
                line.push_str(" [system]");
            }
            line
        })
        .collect()
}

pub fn print_presets(presets: &[Preset]) {
    for line in format_presets(presets) {
        println!("{}", line);
    }
}
