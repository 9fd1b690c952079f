//! Behavioural tests for focal-length bucketing.

use metadata_stats::{aggregate, aggregate_default, FocalBucket};

fn bucket(label: &str, count: usize, sort_key: f64) -> FocalBucket {
    FocalBucket { label: label.to_string(), count, sort_key }
}

fn sorted(mut buckets: Vec<FocalBucket>) -> Vec<FocalBucket> {
    buckets.sort_by(|a, b| a.sort_key.total_cmp(&b.sort_key));
    buckets
}

fn total(buckets: &[FocalBucket]) -> usize {
    buckets.iter().map(|b| b.count).sum()
}

/// A zoom-heavy library: many focal lengths with micro-variation
fn zoom_library() -> Vec<f64> {
    let mut values = Vec::new();
    for step in 0..60 {
        let focal = 24.0 + step as f64 * 1.3;
        for _ in 0..(step % 4 + 1) {
            values.push(focal);
        }
    }
    values.extend([200.0, 200.0, 210.0, 400.0, 600.0]);
    values
}

#[test]
fn empty_input_yields_no_buckets() {
    assert!(aggregate(&[], 25).is_empty());
    assert!(aggregate(&[], 1).is_empty());
    assert!(aggregate(&[], 0).is_empty());
}

#[test]
fn single_value() {
    assert_eq!(aggregate_default(&[50.0]), vec![bucket("50 mm", 1, 50.0)]);
}

#[test]
fn no_merge_keeps_one_bucket_per_distinct_value() {
    let data = [24.0, 35.0, 50.0, 50.0, 24.5];
    let buckets = sorted(aggregate(&data, 25));
    assert_eq!(
        buckets,
        vec![
            bucket("24 mm", 1, 24.0),
            bucket("24.5 mm", 1, 24.5),
            bucket("35 mm", 1, 35.0),
            bucket("50 mm", 2, 50.0),
        ]
    );
    assert_eq!(total(&buckets), data.len());
}

#[test]
fn forced_merge_pairs_neighbours() {
    let buckets = sorted(aggregate(&[10.0, 11.0, 20.0, 21.0, 30.0, 31.0], 3));
    assert_eq!(
        buckets,
        vec![
            bucket("10-11 mm", 2, 10.0),
            bucket("20-21 mm", 2, 20.0),
            bucket("30-31 mm", 2, 30.0),
        ]
    );
}

#[test]
fn relatively_closer_values_merge_first() {
    let buckets = sorted(aggregate(&[16.0, 20.0, 300.0, 304.0], 3));
    assert_eq!(
        buckets,
        vec![
            bucket("16 mm", 1, 16.0),
            bucket("20 mm", 1, 20.0),
            bucket("300-304 mm", 2, 300.0),
        ]
    );
}

#[test]
fn range_collapses_when_endpoints_format_identically() {
    let buckets = sorted(aggregate(&[50.0, 50.02, 85.0], 2));
    assert_eq!(buckets, vec![bucket("50 mm", 2, 50.0), bucket("85 mm", 1, 85.0)]);
}

#[test]
fn fractional_range_labels() {
    let buckets = aggregate(&[10.5, 10.5, 11.2], 1);
    assert_eq!(buckets, vec![bucket("10.5-11.2 mm", 3, 10.5)]);
}

#[test]
fn repeated_whole_value() {
    assert_eq!(aggregate(&[50.0, 50.0], 10), vec![bucket("50 mm", 2, 50.0)]);
}

#[test]
fn zero_cap_is_treated_as_one() {
    let buckets = aggregate(&[18.0, 24.0, 35.0], 0);
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].count, 3);
    assert_eq!(buckets[0].label, "18-35 mm");
}

#[test]
fn cap_holds_even_for_wide_spreads() {
    let data = [1.0, 10.0, 100.0, 1000.0];
    for cap in 1..=4 {
        let buckets = aggregate(&data, cap);
        assert!(buckets.len() <= cap, "cap {} produced {} buckets", cap, buckets.len());
        assert_eq!(total(&buckets), data.len());
    }
}

#[test]
fn counts_are_conserved_and_cap_respected() {
    let data = zoom_library();
    for cap in [1, 2, 3, 5, 8, 13, 25, 100] {
        let buckets = aggregate(&data, cap);
        assert!(buckets.len() <= cap);
        assert!(buckets.iter().all(|b| b.count > 0));
        assert_eq!(total(&buckets), data.len());
    }
}

#[test]
fn buckets_partition_distinct_values_in_order() {
    let data = zoom_library();
    let mut distinct = data.clone();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();

    let buckets = aggregate(&data, 8);
    // ascending, non-overlapping anchors
    for pair in buckets.windows(2) {
        assert!(pair[0].sort_key < pair[1].sort_key);
    }

    // every distinct value belongs to the bucket whose anchor precedes it
    let mut owner_counts = vec![0usize; buckets.len()];
    for value in &data {
        let owner = buckets.iter().rposition(|b| b.sort_key <= *value).unwrap();
        owner_counts[owner] += 1;
    }
    let counts: Vec<usize> = buckets.iter().map(|b| b.count).collect();
    assert_eq!(owner_counts, counts);

    // every anchor is itself an observed value
    for b in &buckets {
        assert!(distinct.contains(&b.sort_key));
    }
}

#[test]
fn zero_focal_lengths_do_not_panic() {
    let buckets = aggregate(&[0.0, 0.0, 0.0], 1);
    assert_eq!(buckets, vec![bucket("0 mm", 3, 0.0)]);

    let buckets = sorted(aggregate(&[0.0, 0.0, 24.0, 25.0, 70.0], 2));
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0], bucket("0 mm", 2, 0.0));
    assert_eq!(buckets[1], bucket("24-70 mm", 3, 24.0));
}

#[test]
fn negative_values_bucket_like_any_other_float() {
    let buckets = aggregate(&[-5.0, -4.0, 10.0, 11.0], 2);
    assert_eq!(buckets.len(), 2);
    assert_eq!(total(&buckets), 4);
    assert_eq!(buckets[0].sort_key, -5.0);
}

#[test]
fn non_finite_values_are_skipped() {
    let buckets = aggregate(&[f64::NAN, 50.0, f64::INFINITY], 25);
    assert_eq!(buckets, vec![bucket("50 mm", 1, 50.0)]);
}
