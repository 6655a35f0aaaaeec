//! Sequential batch driver.
//!
//! Calls the bridge once per item, strictly one after another, and reports
//! progress through an optional channel:
//!
//! ```text
//! item 0: ItemStarted  { completed: 0, overall: 0/n }
//!         convert_image(...)
//!         ItemFinished { completed: 1, overall: 1/n, record }
//! item 1: ...
//! ```
//!
//! Cancellation is checked before each item starts and never interrupts the
//! item in flight. The first failing item aborts the batch; the error carries
//! the records completed before it.

use crate::bridge::{
    BridgeError, ConversionBridge, ConversionOptions, ConversionResult, Dimensions,
    delta_percent,
};
use crate::formats::is_supported_input;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("item {index} ({}) failed: {error}", path.display())]
    Item {
        index: usize,
        path: PathBuf,
        #[source]
        error: BridgeError,
        completed: Vec<ConversionRecord>,
    },
}

/// One source queued for conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub source: PathBuf,
    pub name: String,
    /// Size known when the item was queued.
    pub size: u64,
}

impl BatchItem {
    pub fn from_path(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let name = file_name(&source);
        let size = std::fs::metadata(&source).map(|m| m.len()).unwrap_or(0);
        Self { source, name, size }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// Progress of the current item, 0 or 1.
    pub item_progress: f64,
    pub overall: f64,
    pub current: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    ItemStarted(Progress),
    ItemFinished {
        progress: Progress,
        record: ConversionRecord,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeStats {
    pub original_size: u64,
    pub converted_size: u64,
    pub compression_ratio: f64,
    pub delta_percent: f64,
}

/// History entry for one completed conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRecord {
    pub id: String,
    pub source_path: String,
    pub source_name: String,
    pub output_path: String,
    pub output_name: String,
    pub format: String,
    pub dimensions: Dimensions,
    pub duration_ms: u64,
    pub stats: SizeStats,
    pub created_at: String,
    pub metadata_preserved: bool,
}

impl ConversionRecord {
    pub fn new(item: &BatchItem, result: &ConversionResult, options: &ConversionOptions) -> Self {
        // Copy bridges on some platforms report 0; the queued size is the better guess.
        // The ratio stays the bridge's own, the delta is against the queued size.
        let original_size = if result.original_size > 0 {
            result.original_size
        } else {
            item.size
        };
        Self {
            id: Uuid::new_v4().to_string(),
            source_path: item.source.to_string_lossy().into_owned(),
            source_name: item.name.clone(),
            output_path: result.output_path.clone(),
            output_name: file_name(Path::new(&result.output_path)),
            format: result.format.clone(),
            dimensions: result.dimensions,
            duration_ms: result.duration_ms,
            stats: SizeStats {
                original_size,
                converted_size: result.converted_size,
                compression_ratio: result.compression_ratio,
                delta_percent: delta_percent(item.size, result.converted_size),
            },
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            metadata_preserved: options.preserve_metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub records: Vec<ConversionRecord>,
    pub cancelled: bool,
}

/// Convert `items` one at a time.
pub fn run_batch(
    bridge: &dyn ConversionBridge,
    items: &[BatchItem],
    target_format: &str,
    options: &ConversionOptions,
    cancel: &CancelToken,
    events: Option<Sender<BatchEvent>>,
) -> Result<BatchOutcome, BatchError> {
    let total = items.len();
    let mut records = Vec::with_capacity(total);
    let emit = |event: BatchEvent| {
        if let Some(tx) = &events {
            // A dropped receiver only means nobody is watching.
            tx.send(event).ok();
        }
    };

    for (index, item) in items.iter().enumerate() {
        if cancel.is_cancelled() {
            info!(completed = index, total, "batch cancelled");
            return Ok(BatchOutcome {
                records,
                cancelled: true,
            });
        }

        emit(BatchEvent::ItemStarted(Progress {
            completed: index,
            total,
            item_progress: 0.0,
            overall: index as f64 / total as f64,
            current: item.name.clone(),
        }));
        debug!(index, source = %item.source.display(), "batch item");

        let source = item.source.to_string_lossy();
        let result = match bridge.convert_image(&source, target_format, options) {
            Ok(result) => result,
            Err(error) => {
                warn!(index, source = %item.source.display(), code = error.code(), "batch item failed");
                return Err(BatchError::Item {
                    index,
                    path: item.source.clone(),
                    error,
                    completed: records,
                });
            }
        };

        let record = ConversionRecord::new(item, &result, options);
        emit(BatchEvent::ItemFinished {
            progress: Progress {
                completed: index + 1,
                total,
                item_progress: 1.0,
                overall: (index + 1) as f64 / total as f64,
                current: item.name.clone(),
            },
            record: record.clone(),
        });
        records.push(record);
    }

    info!(converted = records.len(), "batch complete");
    Ok(BatchOutcome {
        records,
        cancelled: false,
    })
}

/// Expand files and directories into the sorted list of convertible files.
pub fn collect_sources(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut sources: Vec<PathBuf> = paths
        .iter()
        .flat_map(|path| {
            WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| is_supported_input(path))
        })
        .collect();
    sources.sort();
    sources.dedup();
    sources
}
