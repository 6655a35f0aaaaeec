//! Source path resolution and output path allocation.
//!
//! Output files are write-once: every allocation gets a fresh v4 UUID, so two
//! calls never share a path and nothing is ever overwritten.
//!
//! ```text
//! {root}/pixo-output/pixo-3f0c…e1.webp
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Directory created under the output root.
pub const OUTPUT_DIR_NAME: &str = "pixo-output";

const FILE_SCHEME: &str = "file://";

/// Strip a `file://` prefix. Returns `None` for an empty path.
pub fn normalize_source(input: &str) -> Option<PathBuf> {
    let value = input.strip_prefix(FILE_SCHEME).unwrap_or(input);
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

/// Normalize and require an existing file.
pub fn existing_source(input: &str) -> Option<PathBuf> {
    normalize_source(input).filter(|path| path.is_file())
}

/// Process-owned output location. The directory is created lazily, on the
/// first allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Rooted in the system temporary directory.
    pub fn system_temp() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR_NAME)
    }

    /// Create the directory tree (tolerating a concurrent creator) and
    /// return a fresh absolute path with the given extension.
    pub fn allocate(&self, extension: &str) -> io::Result<PathBuf> {
        let dir = self.dir();
        // create_dir_all already treats an existing directory as success,
        // including one created by a racing call.
        fs::create_dir_all(&dir)?;

        let name = format!(
            "pixo-{}.{}",
            Uuid::new_v4(),
            extension.to_ascii_lowercase()
        );
        std::path::absolute(dir.join(name))
    }
}

impl Default for OutputDir {
    fn default() -> Self {
        Self::system_temp()
    }
}

/// File size on disk, `0` when it cannot be read.
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Filesystem creation time as ISO-8601, falling back to now.
pub fn creation_date(path: &Path) -> String {
    let created = fs::metadata(path)
        .and_then(|m| m.created())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    created.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Remove a file that must not be mistaken for a conversion output.
pub(crate) fn discard(path: &Path) {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), error = %e, "could not remove partial output");
        }
        _ => {}
    }
}
