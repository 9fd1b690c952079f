//! Statistical summary of a photo collection
//!
//! Produces descriptive statistics for the exposure values plus ranked
//! "most used" listings, ready to print as a text report or serialize to
//! JSON.

use std::collections::HashMap;
use std::fmt;
use chrono::{DateTime, Utc};
use metadata_reader::PhotoMetadata;
use serde::{Deserialize, Serialize};

use crate::aggregate::{aggregate, FocalBucket, DEFAULT_MAX_BUCKETS};
use crate::format::{format_aperture, format_shutter_speed, format_value};

/// How many entries each ranked listing keeps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_focal_buckets: usize,
    pub top_lenses: usize,
    pub top_focal_lengths: usize,
    pub top_combinations: usize,
    pub top_apertures: usize,
    pub top_isos: usize,
    pub top_shutter_speeds: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_focal_buckets: DEFAULT_MAX_BUCKETS,
            top_lenses: 5,
            top_focal_lengths: 15,
            top_combinations: 25,
            top_apertures: 5,
            top_isos: 5,
            top_shutter_speeds: 25,
        }
    }
}

/// Descriptive statistics for one numeric field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; absent with fewer than two values
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl FieldStats {
    /// Compute statistics over `values`, ignoring NaN; `None` if nothing is left
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let std = (count > 1).then(|| {
            let squared: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (squared / (count - 1) as f64).sqrt()
        });

        Some(Self {
            count,
            mean,
            std,
            min: sorted[0],
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted[count - 1],
        })
    }
}

/// Linear-interpolated quantile of a sorted, non-empty slice
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// A value and how often it occurred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCount {
    pub label: String,
    pub count: usize,
}

/// Exact occurrence counts of finite values, sorted by value
fn count_values(values: impl IntoIterator<Item = f64>) -> Vec<(f64, usize)> {
    let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    let mut counts: Vec<(f64, usize)> = Vec::new();
    for value in sorted {
        match counts.last_mut() {
            Some((last, count)) if *last == value => *count += 1,
            _ => counts.push((value, 1)),
        }
    }
    counts
}

/// Most frequent values first, smaller values first on ties
fn rank_values(
    values: impl IntoIterator<Item = f64>,
    limit: usize,
    label: impl Fn(f64) -> String,
) -> Vec<RankedCount> {
    let mut counts = count_values(values);
    // stable sort keeps ascending value order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(limit)
        .map(|(value, count)| RankedCount { label: label(value), count })
        .collect()
}

fn rank_labels<'a>(labels: impl IntoIterator<Item = &'a str>, limit: usize) -> Vec<RankedCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }

    let mut ranked: Vec<RankedCount> = counts
        .into_iter()
        .map(|(label, count)| RankedCount { label: label.to_string(), count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    ranked.truncate(limit);
    ranked
}

/// Most frequent aperture/focal-length pairs
fn rank_combinations(records: &[PhotoMetadata], limit: usize) -> Vec<RankedCount> {
    let mut pairs: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| Some((r.aperture?, r.focal_length?)))
        .filter(|(a, f)| a.is_finite() && f.is_finite())
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.total_cmp(&b.1)));

    let mut counts: Vec<((f64, f64), usize)> = Vec::new();
    for pair in pairs {
        match counts.last_mut() {
            Some((last, count)) if *last == pair => *count += 1,
            _ => counts.push((pair, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    counts
        .into_iter()
        .take(limit)
        .map(|((aperture, focal), count)| RankedCount {
            label: format!("{} @ {}mm", format_aperture(aperture), format_value(focal)),
            count,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSummary {
    pub total_images: usize,
    pub shutter_speed: Option<FieldStats>,
    pub aperture: Option<FieldStats>,
    pub focal_length: Option<FieldStats>,
    pub iso: Option<FieldStats>,
    pub top_lenses: Vec<RankedCount>,
    pub top_focal_lengths: Vec<RankedCount>,
    pub top_combinations: Vec<RankedCount>,
    pub top_apertures: Vec<RankedCount>,
    pub top_isos: Vec<RankedCount>,
    pub top_shutter_speeds: Vec<RankedCount>,
    pub top_equivalent_focal_lengths: Vec<RankedCount>,
    /// Focal lengths merged into chart buckets, ascending
    pub focal_buckets: Vec<FocalBucket>,
    pub first_capture: Option<DateTime<Utc>>,
    pub last_capture: Option<DateTime<Utc>>,
    #[serde(skip)]
    config: AnalysisConfig,
}

/// Summarize a set of metadata records
pub fn summarize(records: &[PhotoMetadata], config: &AnalysisConfig) -> MetadataSummary {
    let focal_lengths: Vec<f64> = records.iter().filter_map(|r| r.focal_length).collect();

    MetadataSummary {
        total_images: records.len(),
        shutter_speed: FieldStats::from_values(records.iter().filter_map(|r| r.shutter_speed)),
        aperture: FieldStats::from_values(records.iter().filter_map(|r| r.aperture)),
        focal_length: FieldStats::from_values(focal_lengths.iter().copied()),
        iso: FieldStats::from_values(records.iter().filter_map(|r| r.iso)),
        top_lenses: rank_labels(records.iter().map(|r| r.lens.as_str()), config.top_lenses),
        top_focal_lengths: rank_values(
            focal_lengths.iter().copied(),
            config.top_focal_lengths,
            format_value,
        ),
        top_combinations: rank_combinations(records, config.top_combinations),
        top_apertures: rank_values(
            records.iter().filter_map(|r| r.aperture),
            config.top_apertures,
            format_aperture,
        ),
        top_isos: rank_values(records.iter().filter_map(|r| r.iso), config.top_isos, format_value),
        top_shutter_speeds: rank_values(
            records.iter().filter_map(|r| r.shutter_speed),
            config.top_shutter_speeds,
            format_shutter_speed,
        ),
        top_equivalent_focal_lengths: rank_values(
            records.iter().filter_map(|r| r.focal_length_35mm).map(f64::round),
            config.top_focal_lengths,
            |v| format!("{}mm", format_value(v)),
        ),
        focal_buckets: aggregate(&focal_lengths, config.max_focal_buckets),
        first_capture: records.iter().filter_map(|r| r.capture_time).min(),
        last_capture: records.iter().filter_map(|r| r.capture_time).max(),
        config: config.clone(),
    }
}

impl MetadataSummary {
    pub fn is_empty(&self) -> bool {
        self.total_images == 0
    }
}

fn write_ranked(f: &mut fmt::Formatter<'_>, title: &str, ranked: &[RankedCount]) -> fmt::Result {
    writeln!(f, "\n{}", title)?;
    if ranked.is_empty() {
        return writeln!(f, "  (none)");
    }
    for entry in ranked {
        writeln!(f, "  {}: {}", entry.label, entry.count)?;
    }
    Ok(())
}

fn write_stats_row(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    stats: &Option<FieldStats>,
) -> fmt::Result {
    let Some(s) = stats else {
        return Ok(());
    };
    let std = s.std.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "NaN".to_string());
    writeln!(
        f,
        "{:<14}{:>7}{:>12.4}{:>12}{:>12.4}{:>12.4}{:>12.4}{:>12.4}{:>12.4}",
        name, s.count, s.mean, std, s.min, s.q25, s.median, s.q75, s.max
    )
}

impl fmt::Display for MetadataSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n--- Image Metadata Analysis ---")?;
        if self.is_empty() {
            return writeln!(f, "No data to analyze.");
        }
        writeln!(f, "Total images with EXIF data analyzed: {}", self.total_images)?;
        if let (Some(first), Some(last)) = (self.first_capture, self.last_capture) {
            writeln!(
                f,
                "Captured between {} and {}",
                first.format("%Y-%m-%d"),
                last.format("%Y-%m-%d")
            )?;
        }

        writeln!(f, "\n--- Basic Statistics ---")?;
        writeln!(
            f,
            "{:<14}{:>7}{:>12}{:>12}{:>12}{:>12}{:>12}{:>12}{:>12}",
            "", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
        )?;
        write_stats_row(f, "Shutter Speed", &self.shutter_speed)?;
        write_stats_row(f, "Aperture", &self.aperture)?;
        write_stats_row(f, "Focal Length", &self.focal_length)?;
        write_stats_row(f, "ISO", &self.iso)?;

        writeln!(f, "\n--- Most Common Settings ---")?;
        write_ranked(f, &format!("Top {} Lenses:", self.config.top_lenses), &self.top_lenses)?;
        write_ranked(
            f,
            &format!("Top {} Focal Lengths (mm):", self.config.top_focal_lengths),
            &self.top_focal_lengths,
        )?;
        write_ranked(
            f,
            &format!("Top {} Aperture & Focal Length Combinations:", self.config.top_combinations),
            &self.top_combinations,
        )?;
        write_ranked(
            f,
            &format!("Top {} Apertures (f-stop):", self.config.top_apertures),
            &self.top_apertures,
        )?;
        write_ranked(f, &format!("Top {} ISOs:", self.config.top_isos), &self.top_isos)?;
        write_ranked(
            f,
            &format!("Top {} Shutter Speeds:", self.config.top_shutter_speeds),
            &self.top_shutter_speeds,
        )?;
        if !self.top_equivalent_focal_lengths.is_empty() {
            write_ranked(
                f,
                "Equivalent Focal Lengths (35mm):",
                &self.top_equivalent_focal_lengths,
            )?;
        }

        writeln!(f, "\nFocal Length Distribution:")?;
        for bucket in &self.focal_buckets {
            writeln!(f, "  {}: {}", bucket.label, bucket.count)?;
        }

        writeln!(f, "\n----------------------------")
    }
}
