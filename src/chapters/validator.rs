//! Repair of model-proposed chapter boundaries.
//!
//! [`validate`] is pure and deterministic. Whatever the model returned, the
//! output is sorted, non-overlapping, contained in `[0, duration]`, holds at
//! most `max_boundaries` entries, and every boundary but possibly the last
//! spans at least `min_duration`. Gaps between boundaries are tolerated.

use crate::types::TimeBoundary;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryRules {
    pub min_duration: f64,
    /// Counts above this are coarsened to the longest `max_boundaries`
    pub cap_threshold: usize,
    pub max_boundaries: usize,
}

impl Default for BoundaryRules {
    fn default() -> Self {
        Self {
            min_duration: 60.0,
            cap_threshold: 10,
            max_boundaries: 8,
        }
    }
}

pub fn validate(boundaries: &[TimeBoundary], duration: f64, rules: &BoundaryRules) -> Vec<TimeBoundary> {
    if !duration.is_finite() || duration <= 0.0 {
        return Vec::new();
    }

    let sanitized = sanitize(boundaries, duration);
    let capped = cap_count(sanitized, rules);
    let mut merged = merge_short_runs(capped, rules.min_duration);
    settle_final_boundary(&mut merged, duration, rules.min_duration);
    coarsen_to_limit(&mut merged, rules.max_boundaries.max(1));
    clamp(merged, duration, rules.min_duration)
}

/// Drop non-finite entries, pull everything inside `[0, duration]`, sort
fn sanitize(boundaries: &[TimeBoundary], duration: f64) -> Vec<TimeBoundary> {
    let mut sanitized: Vec<TimeBoundary> = boundaries
        .iter()
        .filter(|b| b.start.is_finite() && b.end.is_finite())
        .filter(|b| b.start < duration)
        .map(|b| {
            let start = b.start.max(0.0);
            TimeBoundary::new(start, b.end.min(duration).max(start))
        })
        .collect();

    sanitized.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.end.total_cmp(&b.end)));
    sanitized
}

/// An over-fragmented list keeps only its longest boundaries
fn cap_count(boundaries: Vec<TimeBoundary>, rules: &BoundaryRules) -> Vec<TimeBoundary> {
    if boundaries.len() <= rules.cap_threshold {
        return boundaries;
    }

    let mut by_length = boundaries;
    by_length.sort_by(|a, b| b.duration().total_cmp(&a.duration()));
    by_length.truncate(rules.max_boundaries);
    by_length.sort_by(|a, b| a.start.total_cmp(&b.start));
    by_length
}

/// Left-to-right run-length merge: a boundary shorter than `min_duration`
/// absorbs the ones after it until it is long enough. Overlapping starts are
/// pushed forward to the previous end.
fn merge_short_runs(boundaries: Vec<TimeBoundary>, min_duration: f64) -> Vec<TimeBoundary> {
    let mut merged: Vec<TimeBoundary> = Vec::with_capacity(boundaries.len());
    let mut iter = boundaries.into_iter();

    let Some(mut current) = iter.next() else {
        return merged;
    };

    for next in iter {
        if current.duration() < min_duration {
            current.end = current.end.max(next.end);
            continue;
        }

        let start = next.start.max(current.end);
        if next.end <= start {
            // Entirely covered by the current boundary
            continue;
        }

        merged.push(current);
        current = TimeBoundary::new(start, next.end);
    }

    merged.push(current);
    merged
}

/// The last boundary always ends at `duration`; if it is still too short it
/// is folded into its predecessor.
fn settle_final_boundary(boundaries: &mut Vec<TimeBoundary>, duration: f64, min_duration: f64) {
    let Some(last) = boundaries.last_mut() else {
        return;
    };
    last.end = duration;

    if last.duration() < min_duration && boundaries.len() > 1 {
        boundaries.pop();
        if let Some(previous) = boundaries.last_mut() {
            previous.end = duration;
        }
    }
}

/// Merge the shortest boundary into its shorter neighbour until at most
/// `limit` remain
fn coarsen_to_limit(boundaries: &mut Vec<TimeBoundary>, limit: usize) {
    while boundaries.len() > limit && boundaries.len() > 1 {
        let shortest = boundaries
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.duration().total_cmp(&b.duration()))
            .map(|(i, _)| i)
            .unwrap_or(0);

        let neighbour = if shortest == 0 {
            1
        } else if shortest == boundaries.len() - 1 {
            shortest - 1
        } else if boundaries[shortest + 1].duration() < boundaries[shortest - 1].duration() {
            shortest + 1
        } else {
            shortest - 1
        };

        let (keep, remove) = (shortest.min(neighbour), shortest.max(neighbour));
        boundaries[keep].end = boundaries[keep].end.max(boundaries[remove].end);
        boundaries.remove(remove);
    }
}

fn clamp(boundaries: Vec<TimeBoundary>, duration: f64, min_duration: f64) -> Vec<TimeBoundary> {
    boundaries
        .into_iter()
        .filter_map(|mut b| {
            b.end = b.end.min(duration);
            if b.start >= b.end {
                b.end = (b.start + min_duration).min(duration);
            }
            (b.start < b.end).then_some(b)
        })
        .collect()
}

/// `parts` equal boundaries covering `[0, duration]`
pub fn equal_split(duration: f64, parts: usize) -> Vec<TimeBoundary> {
    if !duration.is_finite() || duration <= 0.0 || parts == 0 {
        return Vec::new();
    }

    let step = duration / parts as f64;
    (0..parts)
        .map(|i| {
            let start = step * i as f64;
            let end = if i + 1 == parts { duration } else { step * (i + 1) as f64 };
            TimeBoundary::new(start, end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(start: f64, end: f64) -> TimeBoundary {
        TimeBoundary::new(start, end)
    }

    fn rules() -> BoundaryRules {
        BoundaryRules::default()
    }

    /// Deterministic pseudo-random boundaries for property checks
    fn scrambled_boundaries(seed: u64, count: usize, duration: f64) -> Vec<TimeBoundary> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as f64 / (1u64 << 31) as f64
        };
        (0..count)
            .map(|_| {
                let start = next() * duration * 1.2 - duration * 0.1;
                let length = next() * duration * 0.4 - duration * 0.05;
                b(start, start + length)
            })
            .collect()
    }

    fn assert_invariants(output: &[TimeBoundary], duration: f64, min_duration: f64) {
        assert!(output.len() <= 8, "too many boundaries: {}", output.len());
        for (i, boundary) in output.iter().enumerate() {
            assert!(0.0 <= boundary.start, "{:?}", output);
            assert!(boundary.start <= boundary.end, "{:?}", output);
            assert!(boundary.end <= duration, "{:?}", output);
            if i + 1 < output.len() {
                assert!(boundary.duration() >= min_duration, "short boundary {:?}", output);
                assert!(output[i + 1].start >= boundary.end, "overlap {:?}", output);
            }
        }
    }

    #[test]
    fn test_short_runs_merge_into_one() {
        let output = validate(&[b(0.0, 10.0), b(10.0, 20.0), b(20.0, 90.0)], 90.0, &rules());
        assert_eq!(output, vec![b(0.0, 90.0)]);
    }

    #[test]
    fn test_well_formed_boundaries_unchanged() {
        let input = vec![b(0.0, 120.0), b(120.0, 300.0), b(300.0, 480.0), b(480.0, 600.0)];
        assert_eq!(validate(&input, 600.0, &rules()), input);
    }

    #[test]
    fn test_final_boundary_extends_to_duration() {
        let output = validate(&[b(0.0, 100.0), b(100.0, 250.0)], 400.0, &rules());
        assert_eq!(output, vec![b(0.0, 100.0), b(100.0, 400.0)]);
    }

    #[test]
    fn test_short_final_boundary_folds_into_previous() {
        let output = validate(&[b(0.0, 200.0), b(200.0, 420.0), b(420.0, 440.0)], 450.0, &rules());
        assert_eq!(output, vec![b(0.0, 200.0), b(200.0, 450.0)]);
    }

    #[test]
    fn test_single_short_video_keeps_one_boundary() {
        assert_eq!(validate(&[b(0.0, 20.0)], 30.0, &rules()), vec![b(0.0, 30.0)]);
    }

    #[test]
    fn test_fragmented_output_is_capped() {
        let input: Vec<TimeBoundary> = (0..20).map(|i| b(i as f64 * 70.0, (i + 1) as f64 * 70.0)).collect();
        let output = validate(&input, 1400.0, &rules());
        assert!(output.len() <= 8);
        assert_invariants(&output, 1400.0, 60.0);
    }

    #[test]
    fn test_nine_boundaries_coarsened_to_eight() {
        let input: Vec<TimeBoundary> = (0..9).map(|i| b(i as f64 * 100.0, (i + 1) as f64 * 100.0)).collect();
        let output = validate(&input, 900.0, &rules());
        assert_eq!(output.len(), 8);
        assert_eq!(output.last().unwrap().end, 900.0);
    }

    #[test]
    fn test_overlaps_pushed_forward() {
        let output = validate(&[b(0.0, 150.0), b(100.0, 300.0)], 300.0, &rules());
        assert_eq!(output, vec![b(0.0, 150.0), b(150.0, 300.0)]);
    }

    #[test]
    fn test_out_of_range_and_non_finite_dropped() {
        let output = validate(
            &[b(f64::NAN, 10.0), b(-30.0, 100.0), b(500.0, 700.0), b(100.0, f64::INFINITY)],
            200.0,
            &rules(),
        );
        assert_eq!(output, vec![b(0.0, 200.0)]);
    }

    #[test]
    fn test_reversed_boundary_widened() {
        let output = validate(&[b(0.0, 100.0), b(150.0, 120.0)], 400.0, &rules());
        assert_invariants(&output, 400.0, 60.0);
        assert_eq!(output.last().unwrap().end, 400.0);
    }

    #[test]
    fn test_empty_input_and_zero_duration() {
        assert!(validate(&[], 100.0, &rules()).is_empty());
        assert!(validate(&[b(0.0, 10.0)], 0.0, &rules()).is_empty());
    }

    #[test]
    fn test_invariants_hold_for_scrambled_input() {
        for seed in 0..200u64 {
            let count = (seed % 16) as usize;
            let duration = 300.0 + (seed as f64) * 13.0;
            let input = scrambled_boundaries(seed, count, duration);
            let output = validate(&input, duration, &rules());

            assert_invariants(&output, duration, 60.0);
            if count >= 4 && input.iter().any(|b| b.start.is_finite() && b.start < duration) {
                assert!(!output.is_empty(), "seed {} produced nothing from {:?}", seed, input);
            }
        }
    }

    #[test]
    fn test_equal_split_covers_duration() {
        let parts = equal_split(600.0, 6);
        assert_eq!(parts.len(), 6);
        assert_eq!(parts[0], b(0.0, 100.0));
        assert_eq!(parts[5].end, 600.0);
        assert!(equal_split(0.0, 6).is_empty());
    }
}
