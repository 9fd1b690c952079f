//! Image file discovery

use std::path::{Path, PathBuf};
use anyhow::{bail, Result};
use walkdir::WalkDir;

/// Formats whose metadata is read with exiftool when it is available
pub const EXIFTOOL_EXTENSIONS: &[&str] = &[
    "arw", "nef", "cr2", "cr3", "dng", "raw", "raf", "orf", "rw2", "pef", "srw", "sr2",
    "heic", "heif", "png", "webp",
];

/// Every format the metadata analyzer accepts
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "arw", "nef", "cr2", "cr3", "dng", "raw", "raf", "orf", "rw2", "pef", "srw", "sr2",
    "heic", "heif", "png", "webp", "jpg", "jpeg", "tif", "tiff",
];

/// Duplicate search also covers formats without useful EXIF
pub const DUPLICATE_EXTENSIONS: &[&str] = &[
    "arw", "nef", "cr2", "cr3", "dng", "raw", "raf", "orf", "rw2", "pef", "srw", "sr2",
    "heic", "heif", "png", "webp", "jpg", "jpeg", "tif", "tiff", "bmp", "gif",
];

const RAW_EXTENSIONS: &[&str] = &[
    "arw", "nef", "cr2", "cr3", "dng", "raw", "raf", "orf", "rw2", "pef", "srw", "sr2",
];

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Check if `path` has one of `extensions` (lowercase, without dot)
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    lowercase_extension(path)
        .map(|ext| extensions.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Check if this file should be read through exiftool first
pub fn prefers_exiftool(path: &Path) -> bool {
    has_extension(path, EXIFTOOL_EXTENSIONS)
}

/// Check if this is a RAW file based on extension
pub fn is_raw(path: &Path) -> bool {
    has_extension(path, RAW_EXTENSIONS)
}

/// Recursively collect files under `root` with one of `extensions`.
///
/// Results are sorted by file name, then by full path, so that files shot in
/// sequence line up regardless of which subfolder they sit in. Unreadable
/// directory entries are skipped.
pub fn find_images(root: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("Folder not found: {}", root.display());
    }

    let mut images: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_extension(path, extensions))
        .collect();

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
    Ok(images)
}
