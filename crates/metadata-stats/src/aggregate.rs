//! Focal-length bucketing for chart axes and ranked listings
//!
//! Zoom lenses rarely report the exact same focal length twice, so a plain
//! histogram sprawls into dozens of near-identical bars. Values are folded
//! into a bounded number of buckets by a greedy sweep over the sorted distinct
//! values: a bucket starts at its smallest value (the anchor) and absorbs every
//! following value whose relative distance from the anchor stays within a
//! threshold. The threshold is found by bisection, so merging is only as
//! aggressive as the bucket cap requires and the closest values merge first.

use serde::{Deserialize, Serialize};

use crate::format::{format_focal_label, format_value};

/// Bucket cap used by the focal-length chart and report
pub const DEFAULT_MAX_BUCKETS: usize = 25;

/// Upper end of the threshold search (200% relative difference)
const MAX_THRESHOLD: f64 = 2.0;

/// Bisection steps; plenty for convergence at focal-length magnitudes
const SEARCH_ITERATIONS: usize = 20;

/// Anchors at or below this are compared by absolute distance in mm
const ZERO_ANCHOR_EPSILON: f64 = 1e-9;

/// One display bucket of merged focal lengths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocalBucket {
    /// `"50 mm"` for a single value, `"24-28 mm"` for a range
    pub label: String,
    /// Number of observations folded into this bucket
    pub count: usize,
    /// Smallest raw value in the bucket
    pub sort_key: f64,
}

impl FocalBucket {
    fn from_group(group: &[(f64, usize)]) -> Self {
        let min = group[0].0;
        let max = group[group.len() - 1].0;
        let count = group.iter().map(|(_, count)| count).sum();

        let low = format_value(min);
        let high = format_value(max);
        let label = if group.len() == 1 || low == high {
            format!("{} mm", low)
        } else {
            format!("{}-{} mm", low, high)
        };

        Self { label, count, sort_key: min }
    }
}

/// Aggregate with the default cap of [`DEFAULT_MAX_BUCKETS`]
pub fn aggregate_default(observations: &[f64]) -> Vec<FocalBucket> {
    aggregate(observations, DEFAULT_MAX_BUCKETS)
}

/// Collapse focal-length observations into at most `max_buckets` buckets.
///
/// Every distinct value lands in exactly one bucket and the bucket counts sum
/// to the number of (finite) observations. Buckets are returned in ascending
/// `sort_key` order. A cap of zero is treated as one. NaN and infinite
/// observations are skipped.
pub fn aggregate(observations: &[f64], max_buckets: usize) -> Vec<FocalBucket> {
    let max_buckets = max_buckets.max(1);
    let distinct = count_distinct(observations);

    if distinct.is_empty() {
        return Vec::new();
    }

    if distinct.len() <= max_buckets {
        return distinct
            .iter()
            .map(|&(value, count)| FocalBucket {
                label: format_focal_label(value),
                count,
                sort_key: value,
            })
            .collect();
    }

    let threshold = find_threshold(&distinct, max_buckets);
    group_by_threshold(&distinct, threshold)
        .into_iter()
        .map(FocalBucket::from_group)
        .collect()
}

/// Sorted distinct finite values with their exact occurrence counts
fn count_distinct(observations: &[f64]) -> Vec<(f64, usize)> {
    let mut values: Vec<f64> = observations
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        // fold -0.0 into 0.0
        .map(|value| value + 0.0)
        .collect();
    values.sort_by(f64::total_cmp);

    let mut distinct: Vec<(f64, usize)> = Vec::new();
    for value in values {
        match distinct.last_mut() {
            Some((last, count)) if *last == value => *count += 1,
            _ => distinct.push((value, 1)),
        }
    }
    distinct
}

/// Distance of `candidate` from a bucket anchor
fn anchor_distance(anchor: f64, candidate: f64) -> f64 {
    let delta = candidate - anchor;
    if anchor > ZERO_ANCHOR_EPSILON {
        delta / anchor
    } else {
        delta
    }
}

/// Greedy left-to-right sweep; each group is a contiguous run of `distinct`
fn group_by_threshold(distinct: &[(f64, usize)], threshold: f64) -> Vec<&[(f64, usize)]> {
    let mut groups = Vec::new();
    let mut start = 0;

    for (index, &(value, _)) in distinct.iter().enumerate().skip(1) {
        if anchor_distance(distinct[start].0, value) > threshold {
            groups.push(&distinct[start..index]);
            start = index;
        }
    }
    groups.push(&distinct[start..]);

    groups
}

/// Smallest threshold whose sweep yields no more than `max_buckets` groups
fn find_threshold(distinct: &[(f64, usize)], max_buckets: usize) -> f64 {
    let fits = |threshold: f64| group_by_threshold(distinct, threshold).len() <= max_buckets;

    // Values more than 3x apart (or spread around a zero anchor) can exceed
    // the cap even at MAX_THRESHOLD; widen until the cap is reachable.
    let mut low = 0.0;
    let mut high = MAX_THRESHOLD;
    while !fits(high) && high.is_finite() {
        low = high;
        high *= 2.0;
    }

    let mut best = high;
    for _ in 0..SEARCH_ITERATIONS {
        let mid = (low + high) / 2.0;
        if fits(mid) {
            best = mid;
            high = mid;
        } else {
            low = mid;
        }
    }

    best
}
