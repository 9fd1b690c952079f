//! Metadata extraction with source fallback
//!
//! RAW and container formats are sent to exiftool in batches; a record is
//! only taken from exiftool when it carries all four exposure values. Every
//! other file, and every file exiftool could not fully resolve, is read with
//! the embedded EXIF parser in parallel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::embedded::read_embedded;
use crate::exiftool::{resolve_exiftool, ExiftoolRunner};
use crate::metadata::PhotoMetadata;
use crate::scan::prefers_exiftool;

/// Paths sent to exiftool per `-execute`
const EXIFTOOL_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Try exiftool first for RAW/HEIC/PNG/WebP files
    pub use_exiftool: bool,
    /// Explicit exiftool executable; `PATH` or a bundled copy otherwise
    pub exiftool_path: Option<PathBuf>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            use_exiftool: true,
            exiftool_path: None,
        }
    }
}

pub struct MetadataReader {
    options: ReaderOptions,
    runner: Option<ExiftoolRunner>,
    runner_unavailable: bool,
}

impl MetadataReader {
    pub fn new(options: ReaderOptions) -> Self {
        Self {
            options,
            runner: None,
            runner_unavailable: false,
        }
    }

    /// Lazily start exiftool; a failed start is reported once and remembered
    fn runner(&mut self) -> Option<&mut ExiftoolRunner> {
        if !self.options.use_exiftool || self.runner_unavailable {
            return None;
        }

        if self.runner.is_none() {
            let executable = resolve_exiftool(self.options.exiftool_path.as_deref());
            match ExiftoolRunner::with_executable(&executable) {
                Ok(runner) => self.runner = Some(runner),
                Err(err) => {
                    tracing::warn!(error = %err, "exiftool unavailable, using embedded EXIF reader only");
                    self.runner_unavailable = true;
                    return None;
                }
            }
        }

        self.runner.as_mut()
    }

    /// Complete records for `paths` from exiftool, keyed by path
    fn read_with_exiftool(&mut self, paths: &[PathBuf]) -> HashMap<PathBuf, PhotoMetadata> {
        let mut resolved = HashMap::new();
        if paths.is_empty() {
            return resolved;
        }

        for batch in paths.chunks(EXIFTOOL_BATCH_SIZE) {
            let Some(runner) = self.runner() else {
                break;
            };

            match runner.extract(batch) {
                Ok(records) => {
                    for record in records {
                        if record.has_exposure_settings() {
                            resolved.insert(record.path.clone(), record);
                        } else {
                            tracing::debug!(path = %record.path.display(), "exiftool record incomplete, falling back");
                        }
                    }
                }
                Err(err) => {
                    // The process state is unknown after a failed exchange
                    tracing::warn!(error = %err, files = batch.len(), "exiftool batch failed");
                    self.runner = None;
                }
            }
        }

        resolved
    }

    /// Read metadata for every path, reporting progress as files complete.
    ///
    /// `progress` receives the number of files finished since its last call.
    /// Files without usable metadata are dropped (and logged at debug level).
    /// The result is sorted by path.
    pub fn read_all<F>(&mut self, paths: &[PathBuf], progress: F) -> Vec<PhotoMetadata>
    where
        F: Fn(usize) + Sync,
    {
        let exiftool_candidates: Vec<PathBuf> = paths
            .iter()
            .filter(|path| prefers_exiftool(path))
            .cloned()
            .collect();

        let mut resolved = self.read_with_exiftool(&exiftool_candidates);
        if !resolved.is_empty() {
            progress(resolved.len());
        }

        let remaining: Vec<&PathBuf> = paths
            .iter()
            .filter(|path| !resolved.contains_key(path.as_path()))
            .collect();

        let embedded: Vec<PhotoMetadata> = remaining
            .par_iter()
            .filter_map(|path| {
                let record = match read_embedded(path) {
                    Ok(record) => record,
                    Err(err) => {
                        tracing::debug!(path = %path.display(), error = %err, "no metadata extracted");
                        None
                    }
                };
                progress(1);
                record
            })
            .collect();

        let mut records: Vec<PhotoMetadata> = resolved.drain().map(|(_, record)| record).collect();
        records.extend(embedded);
        records.sort_by(|a, b| a.path.cmp(&b.path));
        records
    }

    /// Read metadata for a single file
    pub fn read_one(&mut self, path: &Path) -> Option<PhotoMetadata> {
        self.read_all(&[path.to_path_buf()], |_| {}).into_iter().next()
    }
}

impl Default for MetadataReader {
    fn default() -> Self {
        Self::new(ReaderOptions::default())
    }
}
