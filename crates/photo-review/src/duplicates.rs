//! Exact-duplicate detection
//!
//! Files are first grouped by size so only same-sized candidates are read;
//! candidates are then hashed with SHA-256 in parallel.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use metadata_reader::{find_images, DUPLICATE_EXTENSIONS};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const HASH_BLOCK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Hex SHA-256 shared by every file in the group
    pub hash: String,
    /// Size of each file in bytes
    pub size: u64,
    /// Sorted paths, always two or more
    pub files: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Bytes that would be freed by keeping a single copy
    pub fn redundant_bytes(&self) -> u64 {
        self.size * self.files.len().saturating_sub(1) as u64
    }
}

/// Hex SHA-256 of the file contents, read in 64 KiB blocks
pub fn file_hash(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::with_capacity(HASH_BLOCK_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BLOCK_SIZE];

    loop {
        let read = reader
            .read(&mut buffer)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Find groups of byte-identical images under `root`.
///
/// `progress` receives `(processed, total)` once per hashed file, where
/// `total` counts only the files that share their size with another file.
/// Calls arrive in increasing order of `processed`. A root that is missing
/// or not a directory yields no groups.
pub fn find_duplicates<F>(root: &Path, progress: F) -> Result<Vec<DuplicateGroup>>
where
    F: Fn(usize, usize) + Sync,
{
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut by_size: BTreeMap<u64, Vec<PathBuf>> = BTreeMap::new();
    for path in find_images(root, DUPLICATE_EXTENSIONS)? {
        match fs::metadata(&path) {
            Ok(meta) => by_size.entry(meta.len()).or_default().push(path),
            Err(err) => tracing::debug!(path = %path.display(), error = %err, "skipping unreadable file"),
        }
    }

    let candidates: Vec<(u64, PathBuf)> = by_size
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .flat_map(|(size, paths)| paths.into_iter().map(move |path| (size, path)))
        .collect();

    let total = candidates.len();
    tracing::debug!(candidates = total, "hashing files with matching sizes");

    let processed = Mutex::new(0usize);
    let hashed: Vec<(u64, String, PathBuf)> = candidates
        .into_par_iter()
        .filter_map(|(size, path)| {
            let hash = match file_hash(&path) {
                Ok(hash) => Some(hash),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "could not hash file");
                    None
                }
            };

            {
                let mut done = processed.lock();
                *done += 1;
                progress(*done, total);
            }

            hash.map(|hash| (size, hash, path))
        })
        .collect();

    let mut by_hash: BTreeMap<(u64, String), Vec<PathBuf>> = BTreeMap::new();
    for (size, hash, path) in hashed {
        by_hash.entry((size, hash)).or_default().push(path);
    }

    let groups = by_hash
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|((size, hash), mut files)| {
            files.sort();
            DuplicateGroup { hash, size, files }
        })
        .collect();

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_hash_is_sha256_hex() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.jpg");
        fs::write(&path, b"")?;
        assert_eq!(
            file_hash(&path)?,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        Ok(())
    }

    #[test]
    fn test_finds_identical_files_only() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path();
        fs::write(root.join("img1.jpg"), b"image_content_A")?;
        fs::write(root.join("img2.jpg"), b"image_content_A")?;
        fs::write(root.join("img3.jpg"), b"image_content_B")?;
        fs::write(root.join("img4.png"), b"unique_content_longer")?;
        fs::create_dir(root.join("sub"))?;
        fs::write(root.join("sub").join("img5.heic"), b"image_content_A")?;
        fs::write(root.join("notes.txt"), b"image_content_A")?;

        let calls = Mutex::new(Vec::new());
        let groups = find_duplicates(root, |done, total| calls.lock().push((done, total)))?;

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.size, 15);
        assert_eq!(group.hash.len(), 64);
        let names: Vec<String> = group
            .files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["img1.jpg", "img2.jpg", "img5.heic"]);
        assert_eq!(group.redundant_bytes(), 30);

        // img1, img2, img3 and img5 share a size; img4 is never read
        let calls = calls.into_inner();
        assert_eq!(calls, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
        Ok(())
    }

    #[test]
    fn test_no_duplicates() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.jpg"), b"one")?;
        fs::write(dir.path().join("b.jpg"), b"three")?;
        assert!(find_duplicates(dir.path(), |_, _| {})?.is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_root_is_empty() -> Result<()> {
        assert!(find_duplicates(Path::new("/nonexistent/photos"), |_, _| {})?.is_empty());
        Ok(())
    }

    #[test]
    fn test_file_root_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("img1.jpg");
        fs::write(&file, b"image_content_A")?;
        assert!(find_duplicates(&file, |_, _| {})?.is_empty());
        Ok(())
    }
}
