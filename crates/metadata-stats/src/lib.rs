//! Aggregation and summary statistics over photo metadata
//!
//! The centerpiece is [`aggregate`], which folds near-identical focal lengths
//! into a bounded number of chart buckets. [`summarize`] builds the full text
//! report on top of it.

pub mod aggregate;
pub mod format;
pub mod summary;

pub use aggregate::{aggregate, aggregate_default, FocalBucket, DEFAULT_MAX_BUCKETS};
pub use format::{format_aperture, format_focal_label, format_shutter_speed, format_value};
pub use summary::{summarize, AnalysisConfig, FieldStats, MetadataSummary, RankedCount};
