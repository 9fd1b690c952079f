//! Extracted photo metadata

use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lens name recorded when no source reports one
pub const UNKNOWN_LENS: &str = "Unknown";

/// Which extractor produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataSource {
    Exiftool,
    Embedded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    pub path: PathBuf,
    /// Exposure time in seconds
    pub shutter_speed: Option<f64>,
    /// F-number
    pub aperture: Option<f64>,
    /// Focal length in mm
    pub focal_length: Option<f64>,
    /// 35mm-equivalent focal length in mm
    pub focal_length_35mm: Option<f64>,
    pub iso: Option<f64>,
    pub lens: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub capture_time: Option<DateTime<Utc>>,
    pub source: MetadataSource,
}

impl PhotoMetadata {
    /// Create an empty record for `path`
    pub fn new(path: impl Into<PathBuf>, source: MetadataSource) -> Self {
        Self {
            path: path.into(),
            shutter_speed: None,
            aperture: None,
            focal_length: None,
            focal_length_35mm: None,
            iso: None,
            lens: UNKNOWN_LENS.to_string(),
            make: None,
            model: None,
            capture_time: None,
            source,
        }
    }

    /// All four exposure values are present
    pub fn has_exposure_settings(&self) -> bool {
        self.shutter_speed.is_some()
            && self.aperture.is_some()
            && self.focal_length.is_some()
            && self.iso.is_some()
    }

    /// A lens name other than the placeholder was recorded
    pub fn has_known_lens(&self) -> bool {
        self.lens != UNKNOWN_LENS
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()?.to_str()
    }
}
