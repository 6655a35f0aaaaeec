//! Pure calculation functions for dimensions and size statistics.
//!
//! All functions here are pure and testable without any I/O or images.

use super::contract::Dimensions;
use super::params::ResizePolicy;

/// Share of the original file size reported as the PDF size estimate.
pub const PDF_ESTIMATE_FACTOR: f64 = 0.95;

/// Calculate the output dimensions for a resize policy.
///
/// Returns `None` when the source already fits (no upscaling) or the policy
/// keeps the source dimensions.
///
/// # Examples
/// ```
/// # use pixo::bridge::{Dimensions, ResizePolicy, resize_target};
/// let source = Dimensions { width: 4000, height: 2000 };
/// assert_eq!(
///     resize_target(source, ResizePolicy::Fit { max: 1000.0 }),
///     Some(Dimensions { width: 1000, height: 500 })
/// );
/// assert_eq!(
///     resize_target(source, ResizePolicy::Exact { max: 1000.0 }),
///     Some(Dimensions { width: 1000, height: 1000 })
/// );
/// ```
pub fn resize_target(source: Dimensions, policy: ResizePolicy) -> Option<Dimensions> {
    let (max, exact) = match policy {
        ResizePolicy::Keep => return None,
        ResizePolicy::Fit { max } => (max, false),
        ResizePolicy::Exact { max } => (max, true),
    };

    let width = source.width as f64;
    let height = source.height as f64;
    if width <= max && height <= max {
        return None;
    }

    let (target_w, target_h) = if exact {
        (max, max)
    } else {
        let scale = (max / width).min(max / height);
        (width * scale, height * scale)
    };

    Some(Dimensions {
        width: to_pixels(target_w),
        height: to_pixels(target_h),
    })
}

/// Round to whole pixels, never below one.
fn to_pixels(value: f64) -> u32 {
    value.round().clamp(1.0, u32::MAX as f64) as u32
}

/// `converted / original`, or exactly `1.0` when the original is empty.
pub fn compression_ratio(original_size: u64, converted_size: u64) -> f64 {
    if original_size == 0 {
        1.0
    } else {
        converted_size as f64 / original_size as f64
    }
}

/// Heuristic PDF size: 95% of the source file, rounded.
pub fn pdf_size_estimate(original_size: u64) -> u64 {
    (original_size as f64 * PDF_ESTIMATE_FACTOR).round() as u64
}

/// Size change in percent, `0.0` when the original is empty.
pub fn delta_percent(original_size: u64, converted_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    (converted_size as f64 - original_size as f64) / original_size as f64 * 100.0
}
