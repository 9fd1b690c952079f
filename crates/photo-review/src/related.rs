//! Sidecar and companion-file discovery
//!
//! A RAW file is often shot alongside a JPEG and edited with an XMP sidecar;
//! all of them share the file stem.

use std::fs;
use std::path::{Path, PathBuf};

/// Files next to `path` that share its stem, such as the JPEG and XMP
/// sidecar of a RAW file. `path` itself is included.
pub fn find_related_files(path: &Path) -> Vec<PathBuf> {
    if !path.exists() {
        return Vec::new();
    }

    let Some(stem) = path.file_stem() else {
        return vec![path.to_path_buf()];
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let entries = match fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(dir = %parent.display(), error = %err, "could not list related files");
            return vec![path.to_path_buf()];
        }
    };

    let mut related: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|candidate| candidate.is_file() && candidate.file_stem() == Some(stem))
        .collect();
    related.sort();
    related
}
