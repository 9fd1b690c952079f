//! YAML configuration for the analyzer binary

use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use metadata_reader::ReaderOptions;
use metadata_stats::AnalysisConfig;
use photo_review::SharpnessConfig;
use serde::{Deserialize, Serialize};

const CONFIG_DIR_NAME: &str = "image-metadata-analyzer";
const CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub analysis: AnalysisConfig,
    pub sharpness: SharpnessConfig,
    pub reader: ReaderOptions,
}

impl AnalyzerConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// `<config_dir>/image-metadata-analyzer/config.yaml`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load `explicit` if given, else the per-user file when present, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_yaml_file(path)
                .with_context(|| format!("loading config from {}", path.display()));
        }

        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "using per-user config");
                Self::from_yaml_file(&path)
                    .with_context(|| format!("loading config from {}", path.display()))
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.analysis.max_focal_buckets > 0,
            "analysis.max_focal_buckets must be greater than zero"
        );
        ensure!(self.sharpness.grid_size > 0, "sharpness.grid_size must be greater than zero");
        ensure!(
            self.sharpness.blur_threshold <= self.sharpness.sharp_threshold,
            "sharpness.blur_threshold ({}) must not exceed sharpness.sharp_threshold ({})",
            self.sharpness.blur_threshold,
            self.sharpness.sharp_threshold
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() -> Result<()> {
        let config = AnalyzerConfig::default();
        assert_eq!(config.analysis.max_focal_buckets, 25);
        assert_eq!(config.analysis.top_lenses, 5);
        assert_eq!(config.sharpness.grid_size, 8);
        assert!(config.reader.use_exiftool);
        config.validate()
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() -> Result<()> {
        let config: AnalyzerConfig = serde_yaml::from_str(
            "analysis:\n  max_focal_buckets: 10\nsharpness:\n  blur_threshold: 50.0\nreader:\n  use_exiftool: false\n",
        )?;
        assert_eq!(config.analysis.max_focal_buckets, 10);
        assert_eq!(config.analysis.top_combinations, 25);
        assert_eq!(config.sharpness.blur_threshold, 50.0);
        assert_eq!(config.sharpness.sharp_threshold, 500.0);
        assert!(!config.reader.use_exiftool);
        assert!(config.reader.exiftool_path.is_none());
        Ok(())
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AnalyzerConfig::default();
        config.sharpness.blur_threshold = 600.0;
        assert!(config.validate().is_err());

        let mut config = AnalyzerConfig::default();
        config.sharpness.grid_size = 0;
        assert!(config.validate().is_err());

        let mut config = AnalyzerConfig::default();
        config.analysis.max_focal_buckets = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "reader:\n  exiftool_path: /opt/exiftool/exiftool\n")?;

        let config = AnalyzerConfig::load(Some(&path))?;
        assert_eq!(config.reader.exiftool_path, Some(PathBuf::from("/opt/exiftool/exiftool")));

        assert!(AnalyzerConfig::load(Some(&dir.path().join("missing.yaml"))).is_err());
        Ok(())
    }
}
